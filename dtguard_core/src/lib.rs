pub mod signal;
pub mod probe;

pub mod belief;
pub mod cfg;
pub mod fuse;
pub mod profiles;
pub mod suspicion;

pub use signal::{
    console_signal, inventory_signal, timing_signal, viewport_signal, ConsoleSample,
    ViewportSample,
};
pub use probe::{ProbeKind, ProbeResult, Tally, TickReport, FAULT_REASON};

pub use belief::{BeliefState, Transition, QUIET_REASON};
pub use cfg::GuardCfg;
pub use fuse::{confirm_closed, decide_open, guard_tick, Decision, FusionMode};
pub use profiles::{apply_probe_profiles, default_probe_profiles, ProbeProfile, ProbeProfiles};
pub use suspicion::{compute_suspicion, SignalBaselines, SuspicionParams};
