//! Adapter layer: convert raw host observations into `dtguard_core` probe
//! results.
//!
//! This module is intentionally policy-light:
//! - No IO
//! - No async
//! - No fusion logic (lives in core)
//!
//! Hosts either push `RawSample`s directly or implement `HostProbes` and let
//! `collect_samples` drive the probes.

use dtguard_core::{
    console_signal, inventory_signal, timing_signal, viewport_signal, ConsoleSample, GuardCfg,
    ProbeKind, ProbeResult, TickReport, ViewportSample,
};

use crate::error::ProbeError;

/// One raw observation from the host environment. The engine does not
/// interpret these beyond handing them to a `SampleInterpreter`.
#[derive(Clone, Debug)]
pub enum RawSample {
    /// Elapsed times of the breakpoint-trap trials this tick.
    Timing { trials_ms: Vec<f64> },
    Viewport(ViewportSample),
    Console(ConsoleSample),
    /// Count of native inspector-injected global helpers present.
    Inventory { native_hooks: u32 },
    /// A probe that could not run. Suspicious in itself.
    Fault { probe: ProbeKind, detail: String },
}

/// Clamp raw values into sane ranges so a hostile or buggy host cannot skew
/// the weighted tally with absurd magnitudes.
#[derive(Clone, Copy, Debug)]
pub struct Normalizer {
    pub trial_max_ms: f64,
    pub gap_max_px: f64,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            trial_max_ms: 60_000.0,
            gap_max_px: 20_000.0,
        }
    }
}

impl Normalizer {
    #[inline]
    fn clamp(x: f64, max: f64) -> f64 {
        if !x.is_finite() {
            return 0.0;
        }
        x.clamp(0.0, max)
    }

    pub fn trial(&self, ms: f64) -> f64 {
        Self::clamp(ms, self.trial_max_ms)
    }

    pub fn viewport(&self, v: ViewportSample) -> ViewportSample {
        ViewportSample {
            inner_w: Self::clamp(v.inner_w, self.gap_max_px),
            inner_h: Self::clamp(v.inner_h, self.gap_max_px),
            outer_w: Self::clamp(v.outer_w, self.gap_max_px),
            outer_h: Self::clamp(v.outer_h, self.gap_max_px),
            screen_w: Self::clamp(v.screen_w, self.gap_max_px),
            screen_h: Self::clamp(v.screen_h, self.gap_max_px),
        }
    }
}

/// Trait: map one raw sample into zero or more probe results.
pub trait SampleInterpreter {
    fn interpret(&self, sample: &RawSample, cfg: &GuardCfg) -> Vec<ProbeResult>;
}

/// Default interpreter: normalize, then run the core signal heuristics.
#[derive(Clone, Debug, Default)]
pub struct BasicInterpreter {
    pub normalizer: Normalizer,
}

impl SampleInterpreter for BasicInterpreter {
    fn interpret(&self, sample: &RawSample, cfg: &GuardCfg) -> Vec<ProbeResult> {
        match sample {
            RawSample::Timing { trials_ms } => {
                let trials: Vec<f64> = trials_ms.iter().map(|t| self.normalizer.trial(*t)).collect();
                let hit = timing_signal(&trials, cfg.timing_threshold_ms);
                vec![verdict(ProbeKind::DebuggerTiming, hit)]
            }
            RawSample::Viewport(v) => {
                let v = self.normalizer.viewport(*v);
                let hit = viewport_signal(&v, cfg);
                vec![verdict(ProbeKind::ViewportGap, hit)]
            }
            RawSample::Console(s) => match console_signal(s) {
                // Suppressed logging: no opinion, not even a quiet verdict.
                None => Vec::new(),
                Some(hit) => vec![verdict(ProbeKind::ConsoleCoercion, hit)],
            },
            RawSample::Inventory { native_hooks } => {
                let hit = inventory_signal(*native_hooks, cfg.inventory_min_hooks);
                vec![verdict(ProbeKind::GlobalInventory, hit)]
            }
            RawSample::Fault { probe, .. } => vec![ProbeResult::fault(*probe)],
        }
    }
}

fn verdict(kind: ProbeKind, hit: bool) -> ProbeResult {
    if hit {
        ProbeResult::triggered(kind)
    } else {
        ProbeResult::quiet(kind)
    }
}

/// Build one tick's report from a batch of raw samples.
pub fn build_report<I: SampleInterpreter>(
    interp: &I,
    samples: &[RawSample],
    cfg: &GuardCfg,
) -> TickReport {
    let mut report = TickReport::new();
    for s in samples {
        for r in interp.interpret(s, cfg) {
            report.push(r);
        }
    }
    report
}

/// Pull-model seam: the host environment the probes sample. Implementations
/// inject real browser plumbing or fakes in tests.
pub trait HostProbes {
    /// Run the breakpoint-trap trial `trials` times; returns elapsed times.
    fn timing_trials(&mut self, trials: u32) -> Result<Vec<f64>, ProbeError>;
    /// Current window geometry, or `None` when the host has no window.
    fn viewport(&mut self) -> Result<Option<ViewportSample>, ProbeError>;
    fn console_coercion(&mut self) -> Result<ConsoleSample, ProbeError>;
    fn inventory_hooks(&mut self) -> Result<u32, ProbeError>;
}

/// Run every probe against the host. A failing probe becomes a `Fault`
/// sample rather than aborting the batch.
pub fn collect_samples(host: &mut dyn HostProbes, cfg: &GuardCfg) -> Vec<RawSample> {
    let mut out = Vec::with_capacity(4);

    match host.timing_trials(cfg.timing_trials) {
        Ok(trials_ms) => out.push(RawSample::Timing { trials_ms }),
        Err(e) => out.push(fault(e)),
    }
    match host.viewport() {
        Ok(Some(v)) => out.push(RawSample::Viewport(v)),
        Ok(None) => {}
        Err(e) => out.push(fault(e)),
    }
    match host.console_coercion() {
        Ok(s) => out.push(RawSample::Console(s)),
        Err(e) => out.push(fault(e)),
    }
    match host.inventory_hooks() {
        Ok(native_hooks) => out.push(RawSample::Inventory { native_hooks }),
        Err(e) => out.push(fault(e)),
    }

    out
}

fn fault(e: ProbeError) -> RawSample {
    RawSample::Fault {
        probe: e.kind(),
        detail: e.to_string(),
    }
}
