use crate::fuse::FusionMode;

/// Detection thresholds. Every heuristic cutoff is tunable here because the
/// false-positive/negative trade-off is environment-dependent (zoom level,
/// OS chrome, accessibility tooling).
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct GuardCfg {
    /// A single debugger-trap trial counts as triggered past this elapsed time.
    pub timing_threshold_ms: f64,
    /// Trials per tick; ANY trial over threshold triggers.
    pub timing_trials: u32,
    /// Simple mode: either viewport axis gap past this triggers.
    pub gap_px: f64,
    /// Ratio refinement: require low inner/screen ratio AND a larger gap.
    pub use_ratio_refinement: bool,
    pub ratio_min: f64,
    pub ratio_gap_px: f64,
    /// Inventory probe: native inspector-injected helpers required to trigger.
    pub inventory_min_hooks: u32,
    pub mode: FusionMode,
    /// Quorum mode: triggered probes required to flip open.
    pub open_quorum: u32,
    /// Close confirmation: max triggered probes a confirming pass tolerates.
    pub close_quorum: u32,
    /// Confirming passes required to flip closed.
    pub close_confirmations: u32,
    /// Minimum spacing between counted confirming passes.
    pub close_delay_ms: u64,
    /// Weighted mode: weighted triggered score required to flip open.
    pub min_suspicion: f32,
    pub hyst_disable: bool,
}

impl Default for GuardCfg {
    fn default() -> Self {
        Self {
            timing_threshold_ms: 200.0,
            timing_trials: 1,
            gap_px: 160.0,
            use_ratio_refinement: false,
            ratio_min: 0.7,
            ratio_gap_px: 240.0,
            inventory_min_hooks: 2,
            mode: FusionMode::Soft,
            open_quorum: 2,
            close_quorum: 0,
            close_confirmations: 2,
            close_delay_ms: 1000,
            min_suspicion: 0.6,
            hyst_disable: false,
        }
    }
}

impl GuardCfg {
    /// Aggressive profile: repeated timing trials, ratio-refined viewport
    /// check, and count-based fusion over all probes.
    pub fn aggressive() -> Self {
        Self {
            timing_trials: 3,
            timing_threshold_ms: 120.0,
            use_ratio_refinement: true,
            mode: FusionMode::Quorum,
            ..Self::default()
        }
    }
}
