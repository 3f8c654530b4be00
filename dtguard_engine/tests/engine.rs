use std::cell::RefCell;
use std::rc::Rc;

use dtguard_core::{ConsoleSample, FusionMode, GuardCfg, ProbeKind, ViewportSample};
use dtguard_engine::*;

// ---------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------

#[derive(Debug, Default)]
struct SinkState {
    blur: bool,
    banner: bool,
    badge: bool,
    overlay: bool,
    mounts: u32,
}

#[derive(Clone, Default)]
struct FakeSink(Rc<RefCell<SinkState>>);

impl ReactionSink for FakeSink {
    fn set_blur(&mut self, on: bool) {
        self.0.borrow_mut().blur = on;
    }
    fn set_banner(&mut self, on: bool) {
        self.0.borrow_mut().banner = on;
    }
    fn set_badge(&mut self, on: bool) {
        self.0.borrow_mut().badge = on;
    }
    fn mount_overlay(&mut self) {
        let mut s = self.0.borrow_mut();
        s.overlay = true;
        s.mounts += 1;
    }
    fn remove_overlay(&mut self) {
        self.0.borrow_mut().overlay = false;
    }
    fn overlay_mounted(&self) -> bool {
        self.0.borrow().overlay
    }
}

struct FakeTransport {
    dispatched: Vec<Request>,
}

impl RequestTransport for FakeTransport {
    fn dispatch(&mut self, req: &Request) -> Result<Response, TransportError> {
        self.dispatched.push(req.clone());
        Ok(Response {
            status: 200,
            body: b"ok".to_vec(),
        })
    }
}

fn quiet_samples() -> Vec<RawSample> {
    vec![
        RawSample::Timing {
            trials_ms: vec![2.0],
        },
        RawSample::Viewport(ViewportSample {
            inner_w: 1280.0,
            inner_h: 720.0,
            outer_w: 1280.0,
            outer_h: 790.0,
            screen_w: 1280.0,
            screen_h: 800.0,
        }),
        RawSample::Console(ConsoleSample::default()),
        RawSample::Inventory { native_hooks: 0 },
    ]
}

fn timing_hit_samples() -> Vec<RawSample> {
    let mut s = quiet_samples();
    s[0] = RawSample::Timing {
        trials_ms: vec![210.0],
    };
    s
}

fn two_probe_samples() -> Vec<RawSample> {
    let mut s = timing_hit_samples();
    s[1] = RawSample::Viewport(ViewportSample {
        inner_w: 1280.0,
        inner_h: 400.0,
        outer_w: 1280.0,
        outer_h: 790.0,
        screen_w: 1280.0,
        screen_h: 800.0,
    });
    s
}

fn new_guard(opts: GuardOptions) -> (DevToolsGuard, Rc<RefCell<SinkState>>) {
    let sink = FakeSink::default();
    let state = sink.0.clone();
    let mut guard = DevToolsGuard::new(opts, Box::new(sink), 0);
    guard.start(0);
    (guard, state)
}

fn overlay_opts() -> GuardOptions {
    GuardOptions {
        reactions: ReactionConfig {
            overlay_on_open: true,
            self_heal_delay_ms: 100,
            ..ReactionConfig::default()
        },
        ..GuardOptions::default()
    }
}

// ---------------------------------------------------------------------
// Detection and reaction behavior
// ---------------------------------------------------------------------

#[test]
fn quiet_probes_never_transition() {
    let (mut guard, _) = new_guard(GuardOptions::default());
    let events = Rc::new(RefCell::new(0u32));
    let seen = events.clone();
    guard.on_change(move |_| *seen.borrow_mut() += 1);

    for now in (100..4000).step_by(300) {
        assert!(guard.tick(&quiet_samples(), now).is_none());
    }
    assert!(!guard.is_open());
    assert_eq!(*events.borrow(), 0);
}

#[test]
fn soft_policy_timing_trial_opens_once() {
    let (mut guard, state) = new_guard(GuardOptions::default());
    let events: Rc<RefCell<Vec<(bool, String)>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = events.clone();
    guard.on_change(move |t| seen.borrow_mut().push((t.open, t.reason.clone())));

    let t = guard.tick(&timing_hit_samples(), 100);
    assert!(t.is_some());
    assert!(guard.is_open());

    // Repeating the identical verdict emits nothing further.
    assert!(guard.tick(&timing_hit_samples(), 200).is_none());

    let events = events.borrow();
    assert_eq!(events.len(), 1);
    assert!(events[0].0);
    assert!(events[0].1.contains("debugger-timing"));

    // Reactions applied before the notification was observable at all.
    assert!(state.borrow().blur);
    assert!(state.borrow().banner);
}

#[test]
fn aggressive_policy_needs_quorum() {
    let opts = GuardOptions {
        cfg: GuardCfg::aggressive(),
        ..GuardOptions::default()
    };
    let (mut guard, _) = new_guard(opts);

    // Aggressive profile uses ratio refinement: the quiet viewport sample has
    // a healthy ratio, so only timing triggers. One probe is below quorum.
    assert!(guard.tick(&timing_hit_samples(), 100).is_none());
    assert!(!guard.is_open());

    // Timing + low-ratio viewport: quorum of two reached.
    let t = guard.tick(&two_probe_samples(), 400);
    assert!(t.is_some());
    assert!(guard.is_open());
}

#[test]
fn hysteresis_keeps_open_until_confirmed() {
    let opts = GuardOptions {
        cfg: GuardCfg::aggressive(),
        ..GuardOptions::default()
    };
    let (mut guard, _) = new_guard(opts);
    guard.tick(&two_probe_samples(), 0);
    assert!(guard.is_open());

    // Single quiet tick: still open.
    assert!(guard.tick(&quiet_samples(), 100).is_none());
    assert!(guard.is_open());

    // Second confirming pass after the close delay flips closed.
    let t = guard.tick(&quiet_samples(), 1200);
    assert!(t.is_some());
    assert!(!guard.is_open());
}

#[test]
fn unsubscribe_stops_exactly_that_callback() {
    let (mut guard, _) = new_guard(GuardOptions::default());

    let a = Rc::new(RefCell::new(0u32));
    let b = Rc::new(RefCell::new(0u32));
    let (ra, rb) = (a.clone(), b.clone());

    let id_a = guard.on_change(move |_| *ra.borrow_mut() += 1);
    guard.on_change(move |_| *rb.borrow_mut() += 1);

    guard.tick(&timing_hit_samples(), 100);
    assert_eq!((*a.borrow(), *b.borrow()), (1, 1));

    assert!(guard.unsubscribe(id_a));
    assert!(!guard.unsubscribe(id_a));

    guard.force_state(false, "test-reset", 200);
    assert_eq!((*a.borrow(), *b.borrow()), (1, 2));
}

#[test]
fn panicking_subscriber_does_not_block_others() {
    let (mut guard, _) = new_guard(GuardOptions::default());
    let ok = Rc::new(RefCell::new(0u32));
    let seen = ok.clone();

    guard.on_change(|_| panic!("bad subscriber"));
    guard.on_change(move |_| *seen.borrow_mut() += 1);

    guard.tick(&timing_hit_samples(), 100);
    assert!(guard.is_open());
    assert_eq!(*ok.borrow(), 1);
}

#[test]
fn network_gate_blocks_while_open_and_restores_exactly() {
    let opts = GuardOptions {
        reactions: ReactionConfig {
            block_network_on_open: true,
            block_mode: BlockMode::SynthesizedError,
            ..ReactionConfig::default()
        },
        ..GuardOptions::default()
    };
    let (mut guard, _) = new_guard(opts);

    let inner = FakeTransport {
        dispatched: Vec::new(),
    };
    let mut gated =
        GatedTransport::install(inner, guard.gate_flag(), BlockMode::SynthesizedError);

    let req = Request {
        method: "POST".to_string(),
        url: "https://example.test/api".to_string(),
        body: vec![1, 2, 3],
    };

    guard.tick(&timing_hit_samples(), 100);
    assert!(guard.is_open());

    // While open: synthesized error, nothing reaches the transport.
    let resp = gated.dispatch(&req).unwrap();
    assert_eq!(resp.status, 503);

    guard.force_state(false, "test-close", 200);

    // After close: delegated with byte-identical arguments.
    let resp = gated.dispatch(&req).unwrap();
    assert_eq!(resp.status, 200);

    let inner = gated.into_inner();
    assert_eq!(inner.dispatched, vec![req]);
}

#[test]
fn network_gate_reject_mode() {
    let flag = new_gate_flag();
    flag.store(true, std::sync::atomic::Ordering::Relaxed);
    let mut gated = GatedTransport::install(
        FakeTransport {
            dispatched: Vec::new(),
        },
        flag,
        BlockMode::Reject,
    );
    let req = Request {
        method: "GET".to_string(),
        url: "https://example.test/".to_string(),
        body: Vec::new(),
    };
    assert!(matches!(
        gated.dispatch(&req),
        Err(TransportError::Blocked)
    ));
}

#[test]
fn overlay_self_heals_and_reports_once_per_removal() {
    let (mut guard, state) = new_guard(overlay_opts());
    let tampers: Rc<RefCell<Vec<TamperKind>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = tampers.clone();
    guard.on_tamper(move |ev| seen.borrow_mut().push(ev.kind));

    guard.tick(&timing_hit_samples(), 100);
    assert!(state.borrow().overlay);
    assert_eq!(state.borrow().mounts, 1);

    // External DOM mutation tears the overlay out.
    state.borrow_mut().overlay = false;

    // First tick after removal: tamper fires, heal delay not yet elapsed.
    guard.tick(&timing_hit_samples(), 150);
    assert_eq!(tampers.borrow().as_slice(), &[TamperKind::OverlayRemoved]);
    assert!(!state.borrow().overlay);

    // Past the heal delay: remounted, still exactly one tamper event.
    guard.tick(&timing_hit_samples(), 260);
    assert!(state.borrow().overlay);
    assert_eq!(state.borrow().mounts, 2);
    assert_eq!(tampers.borrow().len(), 1);

    // A second removal reports again.
    state.borrow_mut().overlay = false;
    guard.tick(&timing_hit_samples(), 300);
    assert_eq!(tampers.borrow().len(), 2);
}

#[test]
fn overlay_removed_on_close() {
    let (mut guard, state) = new_guard(overlay_opts());
    guard.tick(&timing_hit_samples(), 100);
    assert!(state.borrow().overlay);

    guard.force_state(false, "test-close", 200);
    assert!(!state.borrow().overlay);
    assert!(!state.borrow().blur);
    assert!(!state.borrow().banner);
}

// ---------------------------------------------------------------------
// Lifecycle, scheduler, options
// ---------------------------------------------------------------------

#[test]
fn opt_out_query_disables_everything() {
    assert!(opted_out("?dtguard=off"));
    assert!(opted_out("a=1&dtguard=0"));
    assert!(!opted_out("dtguard=on"));
    assert!(!opted_out(""));

    let opts = GuardOptions::from_query("?foo=1&dtguard=off");
    assert!(opts.disabled);

    let sink = FakeSink::default();
    let state = sink.0.clone();
    let mut guard = DevToolsGuard::new(opts, Box::new(sink), 0);
    guard.start(0);

    let ready = Rc::new(RefCell::new(false));
    let seen = ready.clone();
    guard.on_ready(move || *seen.borrow_mut() = true);

    assert!(guard.tick(&timing_hit_samples(), 100).is_none());
    assert!(!guard.is_open());
    assert!(!*ready.borrow());

    // No observable side effect at all.
    let s = state.borrow();
    assert!(!s.blur && !s.banner && !s.badge && !s.overlay);
}

#[test]
fn ready_fires_exactly_once() {
    let sink = FakeSink::default();
    let mut guard = DevToolsGuard::new(GuardOptions::default(), Box::new(sink), 0);

    let count = Rc::new(RefCell::new(0u32));
    let seen = count.clone();
    guard.on_ready(move || *seen.borrow_mut() += 1);

    guard.start(0);
    guard.start(0);
    assert_eq!(*count.borrow(), 1);

    // Late subscriber runs immediately.
    let late = Rc::new(RefCell::new(0u32));
    let seen = late.clone();
    guard.on_ready(move || *seen.borrow_mut() += 1);
    assert_eq!(*late.borrow(), 1);
}

struct FakeHost {
    trial_ms: f64,
    fail_console: bool,
}

impl HostProbes for FakeHost {
    fn timing_trials(&mut self, trials: u32) -> Result<Vec<f64>, ProbeError> {
        Ok(vec![self.trial_ms; trials as usize])
    }
    fn viewport(&mut self) -> Result<Option<ViewportSample>, ProbeError> {
        Ok(None)
    }
    fn console_coercion(&mut self) -> Result<ConsoleSample, ProbeError> {
        if self.fail_console {
            Err(ProbeError::Unavailable(ProbeKind::ConsoleCoercion))
        } else {
            Ok(ConsoleSample::default())
        }
    }
    fn inventory_hooks(&mut self) -> Result<u32, ProbeError> {
        Ok(0)
    }
}

#[test]
fn scheduler_gates_pull_evaluation() {
    let (mut guard, _) = new_guard(GuardOptions::default());
    let mut host = FakeHost {
        trial_ms: 300.0,
        fail_console: false,
    };

    // Before any deadline: nothing runs.
    assert!(guard.run_due(&mut host, 100).is_none());
    assert!(!guard.is_open());

    // Resize schedules a debounced recheck that detects the slow trial.
    guard.handle_event(LifecycleEvent::Resize, 100);
    assert!(guard.run_due(&mut host, 200).is_none()); // debounce not elapsed
    let t = guard.run_due(&mut host, 260);
    assert!(t.is_some());
    assert!(guard.is_open());
}

#[test]
fn probe_fault_is_counted_as_evidence() {
    let opts = GuardOptions {
        cfg: GuardCfg {
            mode: FusionMode::Quorum,
            ..GuardCfg::default()
        },
        ..GuardOptions::default()
    };
    let (mut guard, _) = new_guard(opts);
    let mut host = FakeHost {
        trial_ms: 300.0,
        fail_console: true,
    };

    // Slow timing + failed console probe: two pieces of evidence.
    let t = guard.evaluate_now(&mut host, 100);
    assert!(t.is_some());
    let t = t.unwrap();
    assert!(t.reason.contains("debugger-timing"));
    assert!(t.reason.contains("probe-fault"));
}

#[test]
fn explicit_toggles_override_until_next_transition() {
    let (mut guard, state) = new_guard(GuardOptions::default());

    guard.set_blur(true);
    assert!(state.borrow().blur);

    // Ticks don't undo the explicit override while belief stays closed.
    guard.tick(&quiet_samples(), 100);
    assert!(state.borrow().blur);

    guard.set_badge_visible(false);
    guard.tick(&quiet_samples(), 200);
    assert!(!state.borrow().badge);

    // The next transition reasserts automatic state.
    guard.tick(&timing_hit_samples(), 300);
    assert!(state.borrow().blur);
    guard.force_state(false, "test-close", 1500);
    assert!(!state.borrow().blur);
    guard.tick(&quiet_samples(), 1600);
    assert!(state.borrow().badge);
}

#[test]
fn status_snapshot_and_serialization() {
    let (mut guard, _) = new_guard(GuardOptions::default());
    guard.tick(&timing_hit_samples(), 100);

    let status = guard.status(150);
    assert!(status.active);
    assert!(status.open);
    assert!(!status.network_blocked);
    assert_eq!(status.timestamp_ms, 150);
    assert!(status.reason.contains("debugger-timing"));
    assert!((0.0..=1.0).contains(&status.suspicion));

    let json = serde_json::to_value(&status).unwrap();
    assert_eq!(json["open"], true);

    // Belief snapshot round-trips through serde and restores silently.
    let snap = guard.snapshot();
    let raw = serde_json::to_string(&snap).unwrap();
    let snap2: GuardSnapshot = serde_json::from_str(&raw).unwrap();

    let (mut other, state) = new_guard(GuardOptions::default());
    let events = Rc::new(RefCell::new(0u32));
    let seen = events.clone();
    other.on_change(move |_| *seen.borrow_mut() += 1);
    other.restore(snap2);

    assert!(other.is_open());
    assert_eq!(*events.borrow(), 0);
    assert!(state.borrow().blur);
}

#[test]
fn integrity_mismatch_reports_tamper() {
    let (mut guard, _) = new_guard(GuardOptions::default());
    let tampers: Rc<RefCell<Vec<TamperEvent>>> = Rc::new(RefCell::new(Vec::new()));
    let seen = tampers.clone();
    guard.on_tamper(move |ev| seen.borrow_mut().push(ev.clone()));

    guard.record_integrity(b"guard source v1");
    assert!(guard.verify_integrity(b"guard source v1", 100));
    assert!(tampers.borrow().is_empty());

    assert!(!guard.verify_integrity(b"patched source", 200));
    let tampers = tampers.borrow();
    assert_eq!(tampers.len(), 1);
    assert_eq!(tampers[0].kind, TamperKind::IntegrityMismatch);
    assert_eq!(
        tampers[0].detail.as_deref(),
        Some(fingerprint(b"patched source").as_str())
    );
}

#[test]
fn shutdown_clears_restrictions() {
    let opts = GuardOptions {
        reactions: ReactionConfig {
            overlay_on_open: true,
            block_network_on_open: true,
            ..ReactionConfig::default()
        },
        ..GuardOptions::default()
    };
    let (mut guard, state) = new_guard(opts);
    let flag = guard.gate_flag();

    guard.tick(&timing_hit_samples(), 100);
    assert!(flag.load(std::sync::atomic::Ordering::Relaxed));
    assert!(state.borrow().overlay);

    guard.shutdown(200);
    assert!(!guard.is_active());
    assert!(!flag.load(std::sync::atomic::Ordering::Relaxed));
    let s = state.borrow();
    assert!(!s.blur && !s.banner && !s.badge && !s.overlay);
    drop(s);

    // Dead guard: no more evaluation.
    assert!(guard.tick(&timing_hit_samples(), 300).is_none());
}
