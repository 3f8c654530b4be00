use dtguard_core::ProbeKind;

/// A host probe failed to run. Per policy this is itself evidence: the
/// caller converts it into a triggered fault result instead of aborting.
#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("probe {0:?} unavailable on this host")]
    Unavailable(ProbeKind),
    #[error("probe {kind:?} failed: {detail}")]
    Host { kind: ProbeKind, detail: String },
}

impl ProbeError {
    pub fn kind(&self) -> ProbeKind {
        match self {
            ProbeError::Unavailable(k) => *k,
            ProbeError::Host { kind, .. } => *kind,
        }
    }
}

/// Request-dispatch failures surfaced by the gated transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Rejected by the gate while the inspector is believed open.
    #[error("request blocked: inspector believed open")]
    Blocked,
    #[error("transport failure: {0}")]
    Transport(String),
}
