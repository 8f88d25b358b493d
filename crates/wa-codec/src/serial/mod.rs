//! Binary serialization stream carried by format v2 payloads.
//!
//! This module implements the token stream inside a v2 WA-string after
//! transcoding and decompression:
//! - Tags (token families and the full tag set)
//! - Primitives (byte-level readers and writers)
//! - Values (tree serialization with string and table dictionaries)

mod primitives;
mod tag;
mod value;

pub(crate) use value::{deserialize_first, serialize};
