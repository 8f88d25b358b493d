//! Deflate compression and budget-capped decompression.
//!
//! Payloads travel as raw deflate streams with no zlib or gzip framing and
//! no declared length, so the only safe way to bound decompression is to
//! stop producing output at the ceiling and then check whether the stream
//! wanted to keep going.

use std::io::Read;

use flate2::Compression;
use flate2::read::{DeflateDecoder, DeflateEncoder};

use crate::error::{DecodeError, EncodeError};

/// Compresses `data` as a raw deflate stream.
pub(crate) fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>, EncodeError> {
    let mut out = Vec::new();
    DeflateEncoder::new(data, Compression::new(level.min(9)))
        .read_to_end(&mut out)
        .map_err(|err| EncodeError::Compression(err.to_string()))?;
    Ok(out)
}

/// Inflates a raw deflate stream, refusing to materialize more than
/// `max_size` bytes.
///
/// `None` disables the ceiling and is only safe for trusted input. A stream
/// that inflates to exactly `max_size` bytes succeeds; one more byte of
/// output fails with [`DecodeError::DecompressedTooLarge`].
pub(crate) fn inflate(data: &[u8], max_size: Option<usize>) -> Result<Vec<u8>, DecodeError> {
    let Some(max_size) = max_size else {
        let mut out = Vec::new();
        DeflateDecoder::new(data)
            .read_to_end(&mut out)
            .map_err(|err| DecodeError::Inflate(err.to_string()))?;
        return Ok(out);
    };

    let mut out = Vec::new();
    let mut decoder = DeflateDecoder::new(data).take(max_size as u64);
    decoder
        .read_to_end(&mut out)
        .map_err(|err| DecodeError::Inflate(err.to_string()))?;

    if out.len() == max_size {
        // at the ceiling: the stream is oversized iff it has output left
        let mut probe = [0u8; 1];
        match decoder.into_inner().read(&mut probe) {
            Ok(0) => {}
            Ok(_) => return Err(DecodeError::DecompressedTooLarge { max: max_size }),
            Err(err) => return Err(DecodeError::Inflate(err.to_string())),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let data = b"the quick brown fox jumps over the lazy dog";
        let compressed = deflate(data, 9).unwrap();
        assert_eq!(inflate(&compressed, Some(1024)).unwrap(), data);
        assert_eq!(inflate(&compressed, None).unwrap(), data);
    }

    #[test]
    fn test_empty_round_trip() {
        let compressed = deflate(b"", 9).unwrap();
        assert_eq!(inflate(&compressed, Some(16)).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_ceiling_is_inclusive() {
        let data = vec![0u8; 50_000];
        let compressed = deflate(&data, 9).unwrap();
        // exactly at the ceiling decodes; one byte under fails
        assert_eq!(inflate(&compressed, Some(50_000)).unwrap().len(), 50_000);
        assert_eq!(
            inflate(&compressed, Some(49_999)),
            Err(DecodeError::DecompressedTooLarge { max: 49_999 })
        );
    }

    #[test]
    fn test_highly_compressed_bomb_is_cut_short() {
        // ~10 MiB of zeros deflates to a few KiB
        let bomb = deflate(&vec![0u8; 10 * 1024 * 1024], 9).unwrap();
        assert!(bomb.len() < 20_000);
        assert_eq!(
            inflate(&bomb, Some(4096)),
            Err(DecodeError::DecompressedTooLarge { max: 4096 })
        );
    }

    #[test]
    fn test_garbage_stream_fails() {
        let result = inflate(&[0x40, 0x20, 0x0C], Some(1024));
        assert!(matches!(result, Err(DecodeError::Inflate(_))));
    }

    #[test]
    fn test_unbounded_inflates_anything() {
        let data = vec![7u8; 300_000];
        let compressed = deflate(&data, 1).unwrap();
        assert_eq!(inflate(&compressed, None).unwrap(), data);
    }
}
