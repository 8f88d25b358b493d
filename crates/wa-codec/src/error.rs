//! Error types for WA-string encoding, decoding, and async dispatch.

use thiserror::Error;

/// Coarse failure classes, stable across error message changes.
///
/// Callers branching on failures (quarantine corrupt input, retry dispatch
/// failures, reject oversized payloads) should match on these instead of on
/// individual [`DecodeError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The input carries no recognized format marker.
    MalformedInput,
    /// The payload could not be transcoded, decompressed, or parsed.
    CorruptData,
    /// Decompressed output exceeded the configured ceiling.
    DecompressedTooLarge,
    /// A value or map key has a type the wire format cannot carry.
    UnsupportedValueType,
    /// The text payload strategy failed to serialize or parse.
    SerializationFailure,
    /// The background task could not deliver a result.
    DispatchFailure,
}

impl ErrorKind {
    /// Returns a stable identifier for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::MalformedInput => "malformed_input",
            ErrorKind::CorruptData => "corrupt_data",
            ErrorKind::DecompressedTooLarge => "decompressed_too_large",
            ErrorKind::UnsupportedValueType => "unsupported_value_type",
            ErrorKind::SerializationFailure => "serialization_failure",
            ErrorKind::DispatchFailure => "dispatch_failure",
        }
    }
}

/// Error while decoding a WA-string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    // === Malformed input ===
    #[error("input does not start with a recognized format marker")]
    UnknownFormat,

    #[error("format version {version} is not supported")]
    UnsupportedFormat { version: u32 },

    // === Transcoding ===
    #[error("transcoded payload length {len} is not decodable")]
    InvalidLength { len: usize },

    #[error("byte {byte:#04x} is not in the transcoding alphabet")]
    InvalidSymbol { byte: u8 },

    // === Decompression ===
    #[error("inflate failed: {0}")]
    Inflate(String),

    #[error("decompressed output exceeds the {max} byte ceiling")]
    DecompressedTooLarge { max: usize },

    // === Binary serialization stream ===
    #[error("serialization stream revision {revision} is not supported")]
    UnsupportedRevision { revision: u8 },

    #[error("unexpected end of stream while reading {context}")]
    UnexpectedEof { context: &'static str },

    #[error("invalid token byte {tag:#04x}")]
    InvalidTag { tag: u8 },

    #[error("string back-reference {index} points outside the dictionary")]
    InvalidStringRef { index: u64 },

    #[error("table back-reference {index} points outside the dictionary")]
    InvalidTableRef { index: u64 },

    #[error("number payload did not parse")]
    InvalidNumber,

    #[error("{found} cannot be used as a map key")]
    UnsupportedKey { found: &'static str },

    #[error("value nesting exceeds the supported depth")]
    DepthLimitExceeded,

    // === Text payload strategy ===
    #[error("text payload deserialization failed: {0}")]
    Deserialize(String),

    // === Async dispatch ===
    #[error("background decode failed: {0}")]
    Dispatch(String),
}

impl DecodeError {
    /// Returns the failure class for this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DecodeError::UnknownFormat | DecodeError::UnsupportedFormat { .. } => {
                ErrorKind::MalformedInput
            }
            DecodeError::DecompressedTooLarge { .. } => ErrorKind::DecompressedTooLarge,
            DecodeError::UnsupportedKey { .. } => ErrorKind::UnsupportedValueType,
            DecodeError::Deserialize(_) => ErrorKind::SerializationFailure,
            DecodeError::Dispatch(_) => ErrorKind::DispatchFailure,
            _ => ErrorKind::CorruptData,
        }
    }
}

/// Error while encoding a WA-string.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("string length {len} exceeds the 24-bit wire limit")]
    StringTooLong { len: usize },

    #[error("container entry count {len} exceeds the 24-bit wire limit")]
    ContainerTooLarge { len: usize },

    #[error("string dictionary is full (more than 16777215 distinct strings)")]
    StringDictionaryFull,

    #[error("value nesting exceeds the supported depth")]
    DepthLimitExceeded,

    #[error("deflate compression failed: {0}")]
    Compression(String),

    #[error("text payload serialization failed: {0}")]
    Serialize(String),

    #[error("background encode failed: {0}")]
    Dispatch(String),
}
