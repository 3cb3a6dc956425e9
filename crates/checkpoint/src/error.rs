//! Error types for the larder-checkpoint crate.

/// Error type for envelope encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CheckpointError {
    /// Returned when the buffer is shorter than the envelope requires.
    #[error("truncated envelope: need {need} bytes, got {got}")]
    Truncated {
        /// Bytes required to continue decoding.
        need: usize,
        /// Bytes actually available.
        got: usize,
    },

    /// Returned when the magic prefix does not match.
    #[error("bad magic: not a checkpoint envelope")]
    BadMagic,

    /// Returned when the schema version is not the one this build reads.
    #[error("schema version mismatch: expected {expected}, got {got}")]
    SchemaMismatch {
        /// Schema version this build understands.
        expected: u32,
        /// Schema version found in the envelope.
        got: u32,
    },

    /// Returned when the CRC32 trailer does not match the payload.
    #[error("crc mismatch: expected {expected:#010x}, got {got:#010x}")]
    CrcMismatch {
        /// CRC stored in the trailer.
        expected: u32,
        /// CRC computed over the payload.
        got: u32,
    },

    /// Returned when a decoded field is malformed.
    #[error("invalid field '{field}': {reason}")]
    InvalidField {
        /// Name of the malformed field.
        field: &'static str,
        /// Why it could not be decoded.
        reason: String,
    },
}
