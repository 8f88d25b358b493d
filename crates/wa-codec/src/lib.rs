//! Codec for WeakAuras-compatible import strings.
//!
//! This crate encodes and decodes the paste-safe strings used to share
//! auras, in both generations of the format.
//!
//! # Overview
//!
//! WA-strings are built for chat boxes and forum posts:
//! - **Paste-safe**: payloads are transcoded to a 64-symbol alphabet of
//!   letters, digits, and parentheses, with no padding
//! - **Compressed**: every payload is raw-deflated before transcoding
//! - **Two generations**: v1 (`!` prefix) wraps serialized text, v2
//!   (`!WA:2!` prefix) wraps a compact binary value stream
//!
//! # Quick Start
//!
//! ```rust
//! use serde_json::json;
//!
//! let value = json!({
//!     "name": "My Aura",
//!     "spellIds": [12345, 67890],
//!     "enabled": true,
//! });
//!
//! // Encode to a shareable string
//! let encoded = wa_codec::encode(&value).unwrap();
//! assert!(encoded.starts_with("!WA:2!"));
//!
//! // Decode back to a value tree
//! let decoded = wa_codec::decode_value(&encoded).unwrap();
//! assert_eq!(decoded, value);
//! ```
//!
//! # Modules
//!
//! - [`codec`]: The [`WaCodec`] pipeline with sync and async surfaces
//! - [`format`]: Format markers and version detection
//! - [`text`]: Pluggable text strategies for v1 payloads
//! - [`error`]: Error types and classification
//! - [`limits`]: Security limits for decoding
//!
//! # Security
//!
//! The decoder is designed to safely handle untrusted input:
//! - Decompression is bounded by a configurable ceiling (8 MiB by default)
//! - Container nesting is capped on both encode and decode
//! - Declared collection sizes are never trusted for pre-allocation
//! - Invalid data is rejected with descriptive errors
//!
//! # Wire Format
//!
//! A WA-string is `marker + transcode(deflate(payload))`:
//! - v1: `!` marker, payload is serialized text (AceSerializer by default)
//! - v2: `!WA:2!` marker, payload is a tagged binary value stream with
//!   back-references for repeated strings and tables
//!
//! The decoder dispatches on the marker before touching payload bytes.

pub mod codec;
pub mod error;
pub mod format;
pub mod limits;
pub mod text;

mod compress;
mod serial;
mod transcode;

// Re-export commonly used types at crate root
pub use codec::{decode, decode_value, encode, CodecConfig, Payload, WaCodec};
pub use error::{DecodeError, EncodeError, ErrorKind};
pub use format::{detect_version, FormatVersion};
pub use text::{AceFormat, JsonFormat, TextFormat};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
