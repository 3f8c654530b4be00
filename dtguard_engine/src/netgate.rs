//! Network gating as an explicit decorator.
//!
//! The guard never mutates ambient request primitives. Instead the host
//! wraps its transport in a `GatedTransport` once at initialization; the
//! wrapper owns the original implementation and consults the guard's shared
//! gate flag on every dispatch. When no transport exists to wrap, gating is
//! simply absent — a no-op, never a crash.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::TransportError;
use crate::reaction::BlockMode;

/// Shared open/closed gate owned by the guard.
pub type GateFlag = Arc<AtomicBool>;

pub fn new_gate_flag() -> GateFlag {
    Arc::new(AtomicBool::new(false))
}

/// An outgoing request as seen by the gate. Byte-level so delegation can be
/// verified to be identical.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: String,
    pub body: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    /// The synthesized reply handed out while the gate is closed to traffic.
    pub fn synthesized_block() -> Self {
        Self {
            status: 503,
            body: Vec::new(),
        }
    }
}

/// The underlying request primitive (fetch/XHR equivalent).
pub trait RequestTransport {
    fn dispatch(&mut self, req: &Request) -> Result<Response, TransportError>;
}

/// Decorator owning the original transport. Installed once; `into_inner`
/// restores the original exactly.
pub struct GatedTransport<T: RequestTransport> {
    inner: T,
    flag: GateFlag,
    mode: BlockMode,
}

impl<T: RequestTransport> GatedTransport<T> {
    pub fn install(inner: T, flag: GateFlag, mode: BlockMode) -> Self {
        Self { inner, flag, mode }
    }

    /// Uninstall: hand back the original transport.
    pub fn into_inner(self) -> T {
        self.inner
    }

    pub fn blocked(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl<T: RequestTransport> RequestTransport for GatedTransport<T> {
    fn dispatch(&mut self, req: &Request) -> Result<Response, TransportError> {
        if self.blocked() {
            return match self.mode {
                BlockMode::SynthesizedError => Ok(Response::synthesized_block()),
                BlockMode::Reject => Err(TransportError::Blocked),
            };
        }
        // Gate open: delegate with the arguments untouched.
        self.inner.dispatch(req)
    }
}
