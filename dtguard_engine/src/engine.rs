use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::Ordering;

use tracing::{debug, warn};

use dtguard_core::{
    apply_probe_profiles, compute_suspicion, default_probe_profiles, guard_tick, BeliefState,
    GuardCfg, ProbeProfiles, SignalBaselines, SuspicionParams, Transition, ViewportSample,
};

use crate::events::{TamperEvent, TamperKind};
use crate::integrity::{fingerprint, IntegrityCheck};
use crate::netgate::{new_gate_flag, GateFlag};
use crate::reaction::{ReactionConfig, ReactionSink, Reactor};
use crate::sample::{build_report, collect_samples, BasicInterpreter, HostProbes, RawSample};
use crate::schedule::{LifecycleEvent, Scheduler, SchedulerCfg};

/// Handle returned by subscription calls; deregisters exactly one callback.
pub type SubscriptionId = u64;

/// The opt-out query flag. Checked before anything is installed.
pub fn opted_out(query: &str) -> bool {
    let q = query.trim_start_matches(['?', '#']);
    q.split('&')
        .any(|kv| matches!(kv.trim(), "dtguard=off" | "dtguard=0"))
}

/// Everything supplied once at initialization.
#[derive(Clone, Debug)]
pub struct GuardOptions {
    /// When set, the guard installs nothing and emits nothing.
    pub disabled: bool,
    pub cfg: GuardCfg,
    pub reactions: ReactionConfig,
    pub scheduler: SchedulerCfg,
    pub profiles: ProbeProfiles,
    pub baselines: SignalBaselines,
    pub suspicion: SuspicionParams,
}

impl Default for GuardOptions {
    fn default() -> Self {
        Self {
            disabled: false,
            cfg: GuardCfg::default(),
            reactions: ReactionConfig::default(),
            scheduler: SchedulerCfg::default(),
            profiles: default_probe_profiles(),
            baselines: SignalBaselines::default(),
            suspicion: SuspicionParams::default(),
        }
    }
}

impl GuardOptions {
    /// Defaults with the opt-out flag honored from the page's query string.
    pub fn from_query(query: &str) -> Self {
        Self {
            disabled: opted_out(query),
            ..Self::default()
        }
    }
}

/// Point-in-time snapshot for diagnostics.
#[derive(Clone, Debug, serde::Serialize)]
pub struct GuardStatus {
    pub active: bool,
    pub open: bool,
    pub network_blocked: bool,
    pub timestamp_ms: u64,
    pub reason: String,
    pub suspicion: f32,
}

/// Belief snapshot for storage-agnostic persistence. Pure data; callers
/// decide how/where to store it.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GuardSnapshot {
    pub belief: BeliefState,
}

type ChangeCb = Box<dyn FnMut(&Transition)>;
type TamperCb = Box<dyn FnMut(&TamperEvent)>;
type ReadyCb = Box<dyn FnOnce()>;

/// One detection engine instance, constructed once by the host.
///
/// Single-threaded by design: probes, fusion, and reactions run to
/// completion inside one tick. Reaction side effects always complete before
/// subscribers are notified, and a panicking subscriber never prevents the
/// remaining ones from running.
pub struct DevToolsGuard {
    active: bool,
    started: bool,
    cfg: GuardCfg,
    profiles: ProbeProfiles,
    baselines: SignalBaselines,
    suspicion_params: SuspicionParams,
    interp: BasicInterpreter,
    sched: Scheduler,
    reactor: Reactor,
    belief: BeliefState,
    gate: GateFlag,
    change_subs: Vec<(SubscriptionId, ChangeCb)>,
    tamper_subs: Vec<(SubscriptionId, TamperCb)>,
    ready_subs: Vec<ReadyCb>,
    next_sub: SubscriptionId,
    last_suspicion: f32,
    integrity: Option<IntegrityCheck>,
}

impl DevToolsGuard {
    pub fn new(opts: GuardOptions, sink: Box<dyn ReactionSink>, now_ms: u64) -> Self {
        Self {
            active: !opts.disabled,
            started: false,
            sched: Scheduler::new(opts.scheduler, now_ms),
            reactor: Reactor::new(opts.reactions, sink),
            cfg: opts.cfg,
            profiles: opts.profiles,
            baselines: opts.baselines,
            suspicion_params: opts.suspicion,
            interp: BasicInterpreter::default(),
            belief: BeliefState::default(),
            gate: new_gate_flag(),
            change_subs: Vec::new(),
            tamper_subs: Vec::new(),
            ready_subs: Vec::new(),
            next_sub: 1,
            last_suspicion: 0.0,
            integrity: None,
        }
    }

    /// Arm the engine: initial badge state, then the ready event, once.
    /// A disabled guard performs no observable action here.
    pub fn start(&mut self, _now_ms: u64) {
        if !self.active || self.started {
            return;
        }
        self.started = true;
        self.reactor.apply_initial();
        debug!("guard started");
        for cb in self.ready_subs.drain(..) {
            let _ = catch_unwind(AssertUnwindSafe(cb));
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_open(&self) -> bool {
        self.belief.open
    }

    /// Shared flag for installing a `GatedTransport`.
    pub fn gate_flag(&self) -> GateFlag {
        self.gate.clone()
    }

    // ---- evaluation funnel -------------------------------------------------

    /// Push model: evaluate one batch of raw samples. Every trigger path
    /// ends up here; no path bypasses fusion.
    pub fn tick(&mut self, samples: &[RawSample], now_ms: u64) -> Option<Transition> {
        if !self.active {
            return None;
        }

        let mut report = build_report(&self.interp, samples, &self.cfg);
        apply_probe_profiles(&mut report, &self.profiles);
        self.last_suspicion = self.score_samples(samples);

        let transition = guard_tick(&report, &self.cfg, &mut self.belief, now_ms);
        if let Some(t) = &transition {
            self.apply_transition(t);
        }

        if let Some(ev) = self.reactor.reconcile(self.belief.open, now_ms) {
            self.emit_tamper(ev);
        }

        transition
    }

    /// Pull model: sample the host's probes, then evaluate.
    pub fn evaluate_now(
        &mut self,
        host: &mut dyn HostProbes,
        now_ms: u64,
    ) -> Option<Transition> {
        if !self.active {
            return None;
        }
        let samples = collect_samples(host, &self.cfg);
        self.tick(&samples, now_ms)
    }

    /// Scheduler-gated evaluation: runs only when a deadline is due.
    pub fn run_due(&mut self, host: &mut dyn HostProbes, now_ms: u64) -> Option<Transition> {
        if !self.active || !self.started {
            return None;
        }
        if self.sched.poll(now_ms) {
            self.evaluate_now(host, now_ms)
        } else {
            None
        }
    }

    /// Record a lifecycle event for a delayed opportunistic recheck.
    pub fn handle_event(&mut self, ev: LifecycleEvent, now_ms: u64) {
        if self.active {
            self.sched.note_event(ev, now_ms);
        }
    }

    /// Explicit belief override; same transition contract as fusion.
    pub fn force_state(&mut self, open: bool, reason: &str, now_ms: u64) -> Option<Transition> {
        if !self.active {
            return None;
        }
        let transition = self.belief.force(open, reason, now_ms);
        if let Some(t) = &transition {
            self.apply_transition(t);
        }
        transition
    }

    // ---- subscriptions -----------------------------------------------------

    pub fn on_change(&mut self, cb: impl FnMut(&Transition) + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.change_subs.push((id, Box::new(cb)));
        id
    }

    /// Returns true when the handle matched a live subscription.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.change_subs.len();
        self.change_subs.retain(|(sid, _)| *sid != id);
        self.change_subs.len() != before
    }

    pub fn on_tamper(&mut self, cb: impl FnMut(&TamperEvent) + 'static) -> SubscriptionId {
        let id = self.next_id();
        self.tamper_subs.push((id, Box::new(cb)));
        id
    }

    pub fn unsubscribe_tamper(&mut self, id: SubscriptionId) -> bool {
        let before = self.tamper_subs.len();
        self.tamper_subs.retain(|(sid, _)| *sid != id);
        self.tamper_subs.len() != before
    }

    /// Fires once after setup completes. Subscribing after start invokes the
    /// callback immediately.
    pub fn on_ready(&mut self, cb: impl FnOnce() + 'static) {
        if !self.active {
            return;
        }
        if self.started {
            let _ = catch_unwind(AssertUnwindSafe(cb));
        } else {
            self.ready_subs.push(Box::new(cb));
        }
    }

    // ---- direct toggles ----------------------------------------------------

    /// Explicit badge toggle, independent of belief. Overrides the automatic
    /// reaction until the next transition.
    pub fn set_badge_visible(&mut self, show: bool) {
        if self.active {
            self.reactor.set_badge(show);
        }
    }

    /// Explicit blur toggle; overrides until the next transition.
    pub fn set_blur(&mut self, show: bool) {
        if self.active {
            self.reactor.set_blur(show);
        }
    }

    // ---- diagnostics & persistence -----------------------------------------

    pub fn status(&self, now_ms: u64) -> GuardStatus {
        GuardStatus {
            active: self.active,
            open: self.belief.open,
            network_blocked: self.gate.load(Ordering::Relaxed),
            timestamp_ms: now_ms,
            reason: self.belief.reason.clone(),
            suspicion: self.last_suspicion,
        }
    }

    pub fn snapshot(&self) -> GuardSnapshot {
        GuardSnapshot {
            belief: self.belief.clone(),
        }
    }

    /// Restore a belief snapshot silently: reactions are reconciled to the
    /// restored state, no events fire.
    pub fn restore(&mut self, snap: GuardSnapshot) {
        self.belief = snap.belief;
        let synthetic = Transition {
            open: self.belief.open,
            reason: self.belief.reason.clone(),
            at_ms: self.belief.last_changed_ms,
        };
        self.sync_gate(self.belief.open);
        self.reactor.apply_transition(&synthetic);
    }

    /// Record the guard's own source fingerprint for later verification.
    pub fn record_integrity(&mut self, source: &[u8]) {
        self.integrity = Some(IntegrityCheck::new(fingerprint(source)));
    }

    /// Re-hash the source and compare. A mismatch is reported through the
    /// tamper channel; with no recorded fingerprint this is a no-op.
    pub fn verify_integrity(&mut self, source: &[u8], now_ms: u64) -> bool {
        if !self.active {
            return true;
        }
        let Some(check) = &self.integrity else {
            return true;
        };
        match check.verify(source) {
            Ok(()) => true,
            Err(actual) => {
                self.emit_tamper(TamperEvent {
                    kind: TamperKind::IntegrityMismatch,
                    detail: Some(actual),
                    at_ms: now_ms,
                });
                false
            }
        }
    }

    /// Clear timers, pending work, and every visual/network restriction.
    pub fn shutdown(&mut self, _now_ms: u64) {
        if !self.active {
            return;
        }
        self.active = false;
        self.sched.disarm();
        self.gate.store(false, Ordering::Relaxed);
        self.reactor.clear_all();
        debug!("guard shut down");
    }

    // ---- internals ---------------------------------------------------------

    fn next_id(&mut self) -> SubscriptionId {
        let id = self.next_sub;
        self.next_sub += 1;
        id
    }

    fn sync_gate(&self, open: bool) {
        let block = open && self.reactor.config().block_network_on_open;
        self.gate.store(block, Ordering::Relaxed);
    }

    fn apply_transition(&mut self, t: &Transition) {
        debug!(open = t.open, reason = %t.reason, "belief transition");
        // Side effects first, subscribers after.
        self.sync_gate(t.open);
        self.reactor.apply_transition(t);
        for (id, cb) in &mut self.change_subs {
            if catch_unwind(AssertUnwindSafe(|| cb(t))).is_err() {
                warn!(subscription = *id, "change subscriber panicked");
            }
        }
    }

    fn emit_tamper(&mut self, ev: TamperEvent) {
        warn!(kind = ev.kind.tag(), "tamper observed");
        for (id, cb) in &mut self.tamper_subs {
            if catch_unwind(AssertUnwindSafe(|| cb(&ev))).is_err() {
                warn!(subscription = *id, "tamper subscriber panicked");
            }
        }
    }

    fn score_samples(&self, samples: &[RawSample]) -> f32 {
        let mut trials: Vec<f64> = Vec::new();
        let mut viewport: Option<ViewportSample> = None;
        for s in samples {
            match s {
                RawSample::Timing { trials_ms } => trials.extend_from_slice(trials_ms),
                RawSample::Viewport(v) => viewport = Some(*v),
                _ => {}
            }
        }
        compute_suspicion(
            &trials,
            viewport.as_ref(),
            &self.baselines,
            &self.suspicion_params,
        )
    }
}
