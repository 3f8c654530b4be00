use crate::belief::{BeliefState, Transition};
use crate::cfg::GuardCfg;
use crate::probe::{ProbeKind, TickReport};

/// How probe verdicts combine into an open decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum FusionMode {
    /// OR of timing and viewport: either alone flips open. Non-intrusive.
    Soft,
    /// Count-based: `open_quorum` triggered probes required. Independent
    /// signals failing together is what keeps flapping down.
    Quorum,
    /// Weighted triggered score past `min_suspicion`.
    Weighted,
}

/// Fusion outcome for one tick. `reason` is empty for a quiet decision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Decision {
    pub open: bool,
    pub reason: String,
}

/// Combine one tick's verdicts into an open/quiet decision.
pub fn decide_open(report: &TickReport, cfg: &GuardCfg) -> Decision {
    let open = match cfg.mode {
        FusionMode::Soft => {
            report.kind_triggered(ProbeKind::DebuggerTiming)
                || report.kind_triggered(ProbeKind::ViewportGap)
        }
        FusionMode::Quorum => {
            let t = report.to_tally();
            cfg.open_quorum > 0 && t.triggered >= cfg.open_quorum
        }
        FusionMode::Weighted => {
            let t = report.to_tally();
            t.score.is_finite() && t.score >= cfg.min_suspicion
        }
    };

    let reason = if open { report.reason_string() } else { String::new() };
    Decision { open, reason }
}

/// Strict pass run only while open: confirms the quiet state before the belief
/// is allowed to flip back. Opening is easy, closing requires confirmation.
pub fn confirm_closed(report: &TickReport, cfg: &GuardCfg) -> bool {
    report.to_tally().triggered <= cfg.close_quorum
}

/// One full evaluation: fuse the report, then apply it to the belief.
/// Every trigger path (timer, resize, focus, visibility) funnels through here.
pub fn guard_tick(
    report: &TickReport,
    cfg: &GuardCfg,
    belief: &mut BeliefState,
    now_ms: u64,
) -> Option<Transition> {
    let decision = decide_open(report, cfg);
    let confirmed_quiet = !decision.open && confirm_closed(report, cfg);
    belief.apply(decision.open, &decision.reason, confirmed_quiet, now_ms, cfg)
}
