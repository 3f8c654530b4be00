//! Content fingerprint of the guard's own source, recorded for diagnostics.
//! Failure is reported through the tamper channel, not acted on.

/// Hex blake3 digest of the given bytes.
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// One-shot self-integrity check against a recorded fingerprint.
#[derive(Clone, Debug)]
pub struct IntegrityCheck {
    expected: String,
}

impl IntegrityCheck {
    pub fn new(expected: impl Into<String>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    pub fn expected(&self) -> &str {
        &self.expected
    }

    /// Returns the observed digest when it does not match.
    pub fn verify(&self, bytes: &[u8]) -> Result<(), String> {
        let actual = fingerprint(bytes);
        if actual == self.expected {
            Ok(())
        } else {
            Err(actual)
        }
    }
}
