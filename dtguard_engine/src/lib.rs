//! dtguard_engine
//!
//! Outside-world facing orchestration layer for `dtguard_core`.
//!
//! Responsibilities:
//! - own the single `DevToolsGuard` instance and its `BeliefState`
//! - convert raw host observations into probe results via adapters
//! - drive the fusion pipeline from timers and lifecycle events
//! - apply reactions (blur, banner, badge, overlay, network gate) on
//!   belief transitions, before notifying subscribers
//!
//! Non-goals:
//! - no IO
//! - no async
//! - no fusion policy (lives in core)
//! - not a security boundary: every signal is client-controlled

pub mod error;
pub mod events;
pub mod sample;

pub mod engine;
pub mod integrity;
pub mod netgate;
pub mod overlay;
pub mod reaction;
pub mod schedule;

pub use error::{ProbeError, TransportError};
pub use events::{TamperEvent, TamperKind};
pub use sample::{
    build_report, collect_samples, BasicInterpreter, HostProbes, Normalizer, RawSample,
    SampleInterpreter,
};

pub use engine::{
    opted_out, DevToolsGuard, GuardOptions, GuardSnapshot, GuardStatus, SubscriptionId,
};
pub use integrity::{fingerprint, IntegrityCheck};
pub use netgate::{new_gate_flag, GateFlag, GatedTransport, Request, RequestTransport, Response};
pub use overlay::OverlayGuard;
pub use reaction::{BlockMode, NullSink, ReactionConfig, ReactionSink, Reactor};
pub use schedule::{LifecycleEvent, Scheduler, SchedulerCfg};
