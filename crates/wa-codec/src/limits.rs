//! Wire constants and security limits.
//!
//! Decoding operates on untrusted strings pasted from chat or downloaded in
//! bulk, so every limit here exists to bound allocation before a hostile
//! input can trigger it.

/// Marker prefixing format v1 strings (deflate over a text payload).
pub const MARKER_DEFLATE: &str = "!";

/// Marker prefixing format v2 strings (deflate over a binary serialization
/// stream).
pub const MARKER_BINARY: &str = "!WA:2!";

/// Namespace shared by every versioned `!WA:<n>!` marker.
pub const MARKER_NAMESPACE: &str = "!WA:";

/// Revision byte opening every binary serialization stream.
pub const STREAM_REVISION: u8 = 1;

/// Default ceiling on decompressed payload size (8 MiB).
///
/// Deflate reaches compression ratios above 1000:1 on repetitive input, so a
/// few hundred bytes of string can claim to inflate to gigabytes. The
/// ceiling is enforced on bytes actually produced, never on a declared size.
pub const DEFAULT_MAX_DECOMPRESSED: usize = 8 * 1024 * 1024;

/// Maximum nesting depth accepted while reading or writing value trees.
pub const MAX_DEPTH: usize = 128;

/// Largest integer magnitude the fixed-width integer tokens carry (2^56 - 1).
///
/// Magnitudes above this travel as decimal digit strings instead.
pub const MAX_WIRE_INT: u64 = (1 << 56) - 1;

/// Largest string byte length, container entry count, and dictionary index
/// the 24-bit wide tokens can express.
pub const MAX_WIRE_LEN: usize = (1 << 24) - 1;

/// Deflate level used when the configuration does not name one.
pub const DEFAULT_COMPRESSION: u32 = 9;
