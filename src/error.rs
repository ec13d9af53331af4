//! Error types surfaced by patch and bank decoding.
//!
//! Rendering itself is infallible: every parameter is clamped at decode or
//! set time, so only structural violations of the SysEx formats can fail.

/// Errors reported by the DX7 patch and bank decoders.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// Bank data is not exactly the 4104 bytes of a 32-voice bulk dump.
    #[error("bank data must be exactly {expected} bytes, got {actual}")]
    BadBankLength { expected: usize, actual: usize },

    /// The 6-byte bank header does not match `F0 43 00 09 20 00`.
    #[error("bank header mismatch: expected {expected:02X?}, got {actual:02X?}")]
    BadBankHeader { expected: [u8; 6], actual: [u8; 6] },

    /// Voice data is not exactly the 128 bytes of a packed voice.
    #[error("voice data must be exactly {expected} bytes, got {actual}")]
    BadVoiceLength { expected: usize, actual: usize },

    /// Operator accessors use the DX7 front-panel numbering 1..=6.
    #[error("operator index must be in 1..=6, got {0}")]
    BadOperatorIndex(usize),
}

/// Result alias for decoder operations.
pub type Result<T> = std::result::Result<T, Error>;
