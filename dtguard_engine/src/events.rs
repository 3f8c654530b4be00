/// Tamper observations surfaced to host code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum TamperKind {
    /// The protective overlay was found removed from the document.
    OverlayRemoved,
    /// A self-integrity check did not match the recorded fingerprint.
    IntegrityMismatch,
}

impl TamperKind {
    pub fn tag(&self) -> &'static str {
        match self {
            TamperKind::OverlayRemoved => "overlay-removed",
            TamperKind::IntegrityMismatch => "integrity-mismatch",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TamperEvent {
    pub kind: TamperKind,
    pub detail: Option<String>,
    pub at_ms: u64,
}
