//! Format version markers and detection.
//!
//! Every WA-string opens with a plain-text marker naming its wire format:
//! `!WA:2!` for binary serialization payloads, a bare `!` for deflated text
//! payloads. Detection checks the longer marker first; `:` is not in the
//! transcoding alphabet, so the `!WA:` namespace can never collide with a
//! valid v1 payload. Anything else is rejected before a single payload byte
//! is inspected.

use crate::error::DecodeError;
use crate::limits::{MARKER_BINARY, MARKER_DEFLATE, MARKER_NAMESPACE};

/// Wire format version of a WA-string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FormatVersion {
    /// `!` followed by a deflated text payload.
    Deflate = 1,
    /// `!WA:2!` followed by a deflated binary serialization stream.
    BinarySerialization = 2,
}

impl FormatVersion {
    /// Converts a version number to a format, if supported.
    pub fn from_u8(version: u8) -> Option<Self> {
        match version {
            1 => Some(FormatVersion::Deflate),
            2 => Some(FormatVersion::BinarySerialization),
            _ => None,
        }
    }

    /// Returns the literal marker prefixing strings of this format.
    pub fn marker(self) -> &'static str {
        match self {
            FormatVersion::Deflate => MARKER_DEFLATE,
            FormatVersion::BinarySerialization => MARKER_BINARY,
        }
    }
}

/// A WA-string split into its format version and transcoded payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TaggedPayload<'a> {
    pub version: FormatVersion,
    pub payload: &'a str,
}

impl<'a> TaggedPayload<'a> {
    /// Splits `src` into marker and payload without touching payload bytes.
    ///
    /// Trailing ASCII whitespace is stripped first; chat clients and shell
    /// pipelines routinely append a newline to pasted strings.
    pub fn parse(src: &'a str) -> Result<Self, DecodeError> {
        let src = src.trim_ascii_end();

        if let Some(rest) = src.strip_prefix(MARKER_NAMESPACE) {
            let Some((version, payload)) = rest.split_once('!') else {
                return Err(DecodeError::UnknownFormat);
            };
            if version == "2" {
                return Ok(Self {
                    version: FormatVersion::BinarySerialization,
                    payload,
                });
            }
            // a canonically numbered marker we do not speak yet
            return match version.parse::<u32>() {
                Ok(v) if v.to_string() == version => Err(DecodeError::UnsupportedFormat { version: v }),
                _ => Err(DecodeError::UnknownFormat),
            };
        }

        match src.strip_prefix(MARKER_DEFLATE) {
            Some(payload) => Ok(Self {
                version: FormatVersion::Deflate,
                payload,
            }),
            None => Err(DecodeError::UnknownFormat),
        }
    }
}

/// Returns the format version `src` claims, without decoding anything.
///
/// `None` means no recognized marker; the payload may still turn out to be
/// corrupt when actually decoded.
pub fn detect_version(src: &str) -> Option<FormatVersion> {
    TaggedPayload::parse(src).ok().map(|tagged| tagged.version)
}
