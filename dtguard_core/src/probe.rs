/// Reason tag for a probe failure surfaced as evidence.
pub const FAULT_REASON: &str = "probe-fault";

/// The independent heuristics the guard runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ProbeKind {
    DebuggerTiming,
    ViewportGap,
    ConsoleCoercion,
    GlobalInventory,
}

impl ProbeKind {
    /// Stable tag used in transition reasons and telemetry.
    pub fn reason_tag(&self) -> &'static str {
        match self {
            ProbeKind::DebuggerTiming => "debugger-timing",
            ProbeKind::ViewportGap => "viewport-gap",
            ProbeKind::ConsoleCoercion => "console-probe",
            ProbeKind::GlobalInventory => "global-inventory",
        }
    }
}

/// One probe's verdict for one tick. Created fresh per tick, consumed by the
/// fusion policy, discarded.
#[derive(Clone, Debug)]
pub struct ProbeResult {
    pub kind: ProbeKind,
    pub triggered: bool,
    pub reason: String,
    pub weight: f32,
}

impl ProbeResult {
    pub fn triggered(kind: ProbeKind) -> Self {
        Self {
            kind,
            triggered: true,
            reason: kind.reason_tag().to_string(),
            weight: 1.0,
        }
    }

    pub fn quiet(kind: ProbeKind) -> Self {
        Self {
            kind,
            triggered: false,
            reason: String::new(),
            weight: 1.0,
        }
    }

    /// A probe that failed to run: suspicious in itself, counted as evidence.
    pub fn fault(kind: ProbeKind) -> Self {
        Self {
            kind,
            triggered: true,
            reason: FAULT_REASON.to_string(),
            weight: 1.0,
        }
    }
}

/// Aggregated view of one tick's verdicts.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tally {
    /// Count of triggered probes.
    pub triggered: u32,
    /// Count of probes that reported at all.
    pub total: u32,
    /// Weighted triggered fraction in [0,1].
    pub score: f32,
}

/// All probe verdicts collected during a single evaluation.
#[derive(Clone, Debug, Default)]
pub struct TickReport {
    pub results: Vec<ProbeResult>,
}

impl TickReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, r: ProbeResult) {
        self.results.push(r);
    }

    /// Weighted aggregation into a single tally. Weighting is purely numeric;
    /// zero or negative weights contribute nothing.
    pub fn to_tally(&self) -> Tally {
        if self.results.is_empty() {
            return Tally::default();
        }

        let mut triggered = 0u32;
        let mut total = 0u32;
        let mut sum_hit = 0.0f32;
        let mut sum_w = 0.0f32;

        for r in &self.results {
            total += 1;
            if r.triggered {
                triggered += 1;
            }
            let w = if r.weight.is_finite() { r.weight.max(0.0) } else { 0.0 };
            if w == 0.0 {
                continue;
            }
            if r.triggered {
                sum_hit += w;
            }
            sum_w += w;
        }

        let score = if sum_w > 0.0 { sum_hit / sum_w } else { 0.0 };

        Tally {
            triggered,
            total,
            score,
        }
    }

    /// Distinct triggered reasons joined with `+`, in insertion order.
    pub fn reason_string(&self) -> String {
        let mut out = String::new();
        for r in &self.results {
            if !r.triggered || r.reason.is_empty() {
                continue;
            }
            if out.split('+').any(|seen| seen == r.reason) {
                continue;
            }
            if !out.is_empty() {
                out.push('+');
            }
            out.push_str(&r.reason);
        }
        out
    }

    /// Whether any result of the given kind triggered this tick.
    pub fn kind_triggered(&self, kind: ProbeKind) -> bool {
        self.results.iter().any(|r| r.kind == kind && r.triggered)
    }
}
