//! Binary-safe transcoding between compressed bytes and the WA-string
//! alphabet.
//!
//! The alphabet is the 64-symbol set `a-z A-Z 0-9 ( )`, chosen by the addon
//! ecosystem to survive chat channels that mangle `+`, `/`, and `=`. Packing
//! is little-endian: each group of three bytes becomes four symbols drawn
//! from the low six bits upward, with no padding. A final group of one byte
//! emits two symbols and a group of two emits three, so a payload length of
//! `4k + 1` symbols is impossible and rejected before any byte work.

use crate::error::DecodeError;

/// 64-symbol alphabet, indexed by 6-bit value.
const ALPHABET: &[u8; 64] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789()";

/// Sentinel marking bytes outside the alphabet in the decode tables.
const BAD_SYMBOL: u32 = u32::MAX;

const fn symbol_value(byte: u8) -> u32 {
    match byte {
        b'a'..=b'z' => (byte - b'a') as u32,
        b'A'..=b'Z' => (byte - b'A') as u32 + 26,
        b'0'..=b'9' => (byte - b'0') as u32 + 52,
        b'(' => 62,
        b')' => 63,
        _ => BAD_SYMBOL,
    }
}

const fn decode_table(shift: u32) -> [u32; 256] {
    let mut table = [BAD_SYMBOL; 256];
    let mut i = 0;
    while i < 256 {
        let value = symbol_value(i as u8);
        if value != BAD_SYMBOL {
            table[i] = value << shift;
        }
        i += 1;
    }
    table
}

// One table per symbol position; oring four lookups rebuilds the 24-bit
// group, and any out-of-alphabet byte saturates the result to BAD_SYMBOL.
const DECODE_0: [u32; 256] = decode_table(0);
const DECODE_1: [u32; 256] = decode_table(6);
const DECODE_2: [u32; 256] = decode_table(12);
const DECODE_3: [u32; 256] = decode_table(18);

/// Transcodes `data` into symbols appended after `prefix`.
pub(crate) fn encode_with_prefix(data: &[u8], prefix: &str) -> String {
    let mut out = String::with_capacity(prefix.len() + encoded_len(data.len()));
    out.push_str(prefix);

    let mut chunks = data.chunks_exact(3);
    for chunk in chunks.by_ref() {
        let word = chunk[0] as u32 | (chunk[1] as u32) << 8 | (chunk[2] as u32) << 16;
        out.push(ALPHABET[(word & 0x3F) as usize] as char);
        out.push(ALPHABET[(word >> 6 & 0x3F) as usize] as char);
        out.push(ALPHABET[(word >> 12 & 0x3F) as usize] as char);
        out.push(ALPHABET[(word >> 18) as usize] as char);
    }
    let rem = chunks.remainder();
    if !rem.is_empty() {
        // a group of n leftover bytes emits n + 1 symbols
        let mut word = 0u32;
        for (i, &byte) in rem.iter().enumerate() {
            word |= (byte as u32) << (8 * i as u32);
        }
        for position in 0..=rem.len() as u32 {
            out.push(ALPHABET[(word >> (6 * position) & 0x3F) as usize] as char);
        }
    }
    out
}

/// Transcodes a symbol payload back to bytes.
pub(crate) fn decode(payload: &str) -> Result<Vec<u8>, DecodeError> {
    let symbols = payload.as_bytes();
    if symbols.len() % 4 == 1 {
        return Err(DecodeError::InvalidLength { len: symbols.len() });
    }

    let mut out = Vec::with_capacity(decoded_len(symbols.len()));
    let mut chunks = symbols.chunks_exact(4);
    for chunk in chunks.by_ref() {
        let word = DECODE_0[chunk[0] as usize]
            | DECODE_1[chunk[1] as usize]
            | DECODE_2[chunk[2] as usize]
            | DECODE_3[chunk[3] as usize];
        if word == BAD_SYMBOL {
            return Err(bad_symbol(chunk));
        }
        out.extend_from_slice(&word.to_le_bytes()[..3]);
    }
    let rem = chunks.remainder();
    if !rem.is_empty() {
        // n + 1 leftover symbols rebuild n bytes; n = 0 was rejected above
        let mut word = 0u32;
        for (i, &symbol) in rem.iter().enumerate() {
            let value = symbol_value(symbol);
            if value == BAD_SYMBOL {
                return Err(DecodeError::InvalidSymbol { byte: symbol });
            }
            word |= value << (6 * i as u32);
        }
        out.extend_from_slice(&word.to_le_bytes()[..rem.len() - 1]);
    }
    Ok(out)
}

fn encoded_len(len: usize) -> usize {
    let leftover = len % 3;
    len / 3 * 4 + if leftover > 0 { leftover + 1 } else { 0 }
}

fn decoded_len(len: usize) -> usize {
    let leftover = len % 4;
    len / 4 * 3 + leftover.saturating_sub(1)
}

fn bad_symbol(chunk: &[u8]) -> DecodeError {
    let byte = chunk
        .iter()
        .copied()
        .find(|&b| symbol_value(b) == BAD_SYMBOL)
        .unwrap_or(0);
    DecodeError::InvalidSymbol { byte }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_pairs() {
        let pairs: &[(&[u8], &str)] = &[
            (b"", ""),
            (&[0], "aa"),
            (&[255], ")d"),
            (&[0, 0, 0], "aaaa"),
            (&[255, 255, 255], "))))"),
        ];
        for (bytes, symbols) in pairs {
            assert_eq!(encode_with_prefix(bytes, ""), *symbols);
            assert_eq!(decode(symbols).unwrap(), *bytes);
        }
    }

    #[test]
    fn test_round_trip_all_lengths() {
        // every remainder class and every byte value
        let data: Vec<u8> = (0..=255).collect();
        for len in 0..data.len() {
            let encoded = encode_with_prefix(&data[..len], "");
            assert_eq!(decode(&encoded).unwrap(), &data[..len], "length {len}");
        }
    }

    #[test]
    fn test_prefix_is_prepended_verbatim() {
        let encoded = encode_with_prefix(&[1, 2, 3], "!WA:2!");
        assert!(encoded.starts_with("!WA:2!"));
        assert_eq!(decode(&encoded["!WA:2!".len()..]).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_impossible_length_rejected() {
        for payload in ["a", "aaaaa", "aaaaaaaaa"] {
            assert_eq!(
                decode(payload),
                Err(DecodeError::InvalidLength { len: payload.len() })
            );
        }
    }

    #[test]
    fn test_out_of_alphabet_symbol_rejected() {
        for payload in ["a+aa", "====", "ab\u{00e9}", "aa!a"] {
            let result = decode(payload);
            assert!(
                matches!(result, Err(DecodeError::InvalidSymbol { .. })),
                "payload {payload:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn test_alphabet_boundaries() {
        // first and last symbol of each alphabet run
        assert_eq!(symbol_value(b'a'), 0);
        assert_eq!(symbol_value(b'z'), 25);
        assert_eq!(symbol_value(b'A'), 26);
        assert_eq!(symbol_value(b'Z'), 51);
        assert_eq!(symbol_value(b'0'), 52);
        assert_eq!(symbol_value(b'9'), 61);
        assert_eq!(symbol_value(b'('), 62);
        assert_eq!(symbol_value(b')'), 63);
        assert_eq!(symbol_value(b'+'), BAD_SYMBOL);
        assert_eq!(symbol_value(b'='), BAD_SYMBOL);
        assert_eq!(symbol_value(b':'), BAD_SYMBOL);
    }
}
