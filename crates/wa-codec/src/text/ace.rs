//! AceSerializer text grammar, the default v1 strategy.
//!
//! Payloads open with `^1`, close with `^^`, and carry one value between
//! them. Every token is `^` plus one ASCII byte: `^Z` null, `^B`/`^b`
//! booleans, `^N` a plain number, `^F<mantissa>^f<exponent>` an exact
//! binary float, `^S` an escaped string, `^T`..`^t` a table of key/value
//! pairs. Tables reuse the Lua conventions of the binary stream: arrays
//! travel with numeric keys `1..n` and come back as arrays, everything else
//! becomes an object.

use serde_json::{Map, Number, Value};

use crate::error::{DecodeError, EncodeError};
use crate::limits::MAX_DEPTH;
use crate::text::TextFormat;

/// AceSerializer revision 1 text strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct AceFormat;

impl TextFormat for AceFormat {
    fn serialize(&self, value: &Value) -> Result<String, EncodeError> {
        let mut out = String::with_capacity(64);
        out.push_str("^1");
        write_value(&mut out, value, MAX_DEPTH)?;
        out.push_str("^^");
        Ok(out)
    }

    fn deserialize(&self, text: &str) -> Result<Value, DecodeError> {
        let mut reader = TokenReader::new(text);
        if reader.read_token()? != "^1" {
            return Err(decode_err("not AceSerializer revision 1 data"));
        }
        // a bare trailer carries no value; bytes after the first value are
        // ignored, matching the binary stream
        Ok(read_value(&mut reader, MAX_DEPTH)?.unwrap_or(Value::Null))
    }
}

fn encode_err(reason: &str) -> EncodeError {
    EncodeError::Serialize(reason.to_owned())
}

fn decode_err(reason: &str) -> DecodeError {
    DecodeError::Deserialize(reason.to_owned())
}

// =============================================================================
// WRITING
// =============================================================================

fn write_value(out: &mut String, value: &Value, depth: usize) -> Result<(), EncodeError> {
    match value {
        Value::Null => out.push_str("^Z"),
        Value::Bool(true) => out.push_str("^B"),
        Value::Bool(false) => out.push_str("^b"),
        Value::Number(number) => write_number(out, number)?,
        Value::String(text) => {
            out.push_str("^S");
            write_escaped(out, text);
        }
        Value::Array(items) => {
            let depth = checked_depth(depth)?;
            out.push_str("^T");
            let mut index = itoa::Buffer::new();
            for (i, item) in items.iter().enumerate() {
                out.push_str("^N");
                out.push_str(index.format(i as u64 + 1));
                write_value(out, item, depth)?;
            }
            out.push_str("^t");
        }
        Value::Object(map) => {
            let depth = checked_depth(depth)?;
            out.push_str("^T");
            for (key, item) in map {
                write_key(out, key);
                write_value(out, item, depth)?;
            }
            out.push_str("^t");
        }
    }
    Ok(())
}

fn checked_depth(depth: usize) -> Result<usize, EncodeError> {
    depth
        .checked_sub(1)
        .ok_or_else(|| encode_err("table nesting exceeds the supported depth"))
}

/// Keys in canonical integer form travel as numbers, matching the Lua-side
/// convention for positional keys.
fn write_key(out: &mut String, key: &str) {
    match key.parse::<i64>() {
        Ok(number) if itoa::Buffer::new().format(number) == key => {
            out.push_str("^N");
            out.push_str(key);
        }
        _ => {
            out.push_str("^S");
            write_escaped(out, key);
        }
    }
}

fn write_number(out: &mut String, number: &Number) -> Result<(), EncodeError> {
    if let Some(unsigned) = number.as_u64() {
        out.push_str("^N");
        out.push_str(itoa::Buffer::new().format(unsigned));
        return Ok(());
    }
    if let Some(signed) = number.as_i64() {
        out.push_str("^N");
        out.push_str(itoa::Buffer::new().format(signed));
        return Ok(());
    }
    let Some(value) = number.as_f64() else {
        return Err(encode_err("number is not representable"));
    };

    let mut buffer = ryu::Buffer::new();
    let printed = buffer.format_finite(value);
    match printed.parse::<f64>() {
        Ok(reparsed) if reparsed == value => {
            out.push_str("^N");
            out.push_str(printed);
        }
        _ => {
            // exact fallback: sign, integral mantissa, binary exponent
            let (mantissa, exponent, sign) = explode_f64(value);
            out.push_str("^F");
            if sign < 0 {
                out.push('-');
            }
            out.push_str(itoa::Buffer::new().format(mantissa));
            out.push_str("^f");
            out.push_str(itoa::Buffer::new().format(exponent));
        }
    }
    Ok(())
}

/// Splits a double into integral mantissa, binary exponent, and sign, such
/// that `value = sign * mantissa * 2^exponent`.
fn explode_f64(value: f64) -> (u64, i16, i8) {
    let bits = value.to_bits();
    let sign: i8 = if bits >> 63 == 0 { 1 } else { -1 };
    let mut exponent = ((bits >> 52) & 0x7FF) as i16;
    let mantissa = if exponent == 0 {
        (bits & 0xF_FFFF_FFFF_FFFF) << 1
    } else {
        (bits & 0xF_FFFF_FFFF_FFFF) | 0x10_0000_0000_0000
    };
    exponent -= 1023 + 52;
    (mantissa, exponent, sign)
}

/// Escapes the bytes the grammar reserves: `^`, `~`, control bytes, space,
/// and DEL. Multi-byte characters pass through untouched.
fn write_escaped(out: &mut String, value: &str) {
    let mut copy_from = 0;
    for (i, byte) in value.bytes().enumerate() {
        let replacement = match byte {
            b @ 0x00..=0x1D | b @ 0x1F..=0x20 => b + 64,
            0x1E => 0x7A,
            0x5E => 0x7D,
            0x7E => 0x7C,
            0x7F => 0x7B,
            _ => continue,
        };
        out.push_str(&value[copy_from..i]);
        out.push('~');
        out.push(replacement as char);
        copy_from = i + 1;
    }
    out.push_str(&value[copy_from..]);
}

// =============================================================================
// READING
// =============================================================================

struct TokenReader<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> TokenReader<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn bytes(&self) -> &'s [u8] {
        self.src.as_bytes()
    }

    /// Next two-byte `^X` token without consuming it.
    fn peek_token(&self) -> Result<&'s str, DecodeError> {
        let bytes = self.bytes();
        if self.pos + 1 >= bytes.len() {
            return Err(decode_err("unexpected end of input"));
        }
        // the second byte must be ASCII so the slice stays on char bounds
        if bytes[self.pos] != b'^' || bytes[self.pos + 1] > 0x79 {
            return Err(decode_err("expected a control token"));
        }
        Ok(&self.src[self.pos..self.pos + 2])
    }

    fn read_token(&mut self) -> Result<&'s str, DecodeError> {
        let token = self.peek_token()?;
        self.pos += 2;
        Ok(token)
    }

    /// Text up to the next `^`, which stays unconsumed.
    fn read_plain(&mut self) -> Result<&'s str, DecodeError> {
        let start = self.pos;
        while let Some(&byte) = self.bytes().get(self.pos) {
            if byte == b'^' {
                return Ok(&self.src[start..self.pos]);
            }
            self.pos += 1;
        }
        Err(decode_err("unexpected end of input"))
    }

    /// Unescapes a `^S` payload, up to the next `^`.
    fn read_string(&mut self) -> Result<String, DecodeError> {
        let mut out = String::new();
        let mut copy_from = self.pos;
        loop {
            match self.bytes().get(self.pos) {
                None => return Err(decode_err("unexpected end of input")),
                Some(b'^') => {
                    out.push_str(&self.src[copy_from..self.pos]);
                    return Ok(out);
                }
                Some(b'~') => {
                    out.push_str(&self.src[copy_from..self.pos]);
                    let replacement = match self.bytes().get(self.pos + 1).copied() {
                        Some(b @ 0x40..=0x5D) | Some(b @ 0x5F..=0x60) => b - 64,
                        Some(0x7A) => 0x1E,
                        Some(0x7B) => 0x7F,
                        Some(0x7C) => 0x7E,
                        Some(0x7D) => 0x5E,
                        _ => return Err(decode_err("invalid escape character")),
                    };
                    self.pos += 2;
                    out.push(replacement as char);
                    copy_from = self.pos;
                }
                Some(_) => self.pos += 1,
            }
        }
    }
}

fn read_value(reader: &mut TokenReader<'_>, depth: usize) -> Result<Option<Value>, DecodeError> {
    let value = match reader.read_token()? {
        "^^" => return Ok(None),
        "^Z" => Value::Null,
        "^B" => Value::Bool(true),
        "^b" => Value::Bool(false),
        "^S" => Value::String(reader.read_string()?),
        "^N" => parse_plain_number(reader.read_plain()?)?,
        "^F" => {
            let mantissa: f64 = reader
                .read_plain()?
                .parse()
                .map_err(|_| decode_err("failed to parse a number"))?;
            if reader.read_token()? != "^f" {
                return Err(decode_err("mantissa is missing its exponent"));
            }
            let exponent: i32 = reader
                .read_plain()?
                .parse()
                .map_err(|_| decode_err("failed to parse a number"))?;
            float_value(assemble_f64(mantissa, exponent))
        }
        "^T" => read_table(reader, depth)?,
        _ => return Err(decode_err("unrecognized token")),
    };
    Ok(Some(value))
}

fn parse_plain_number(text: &str) -> Result<Value, DecodeError> {
    match text {
        // no tree representation for the infinities
        "1.#INF" | "inf" | "-1.#INF" | "-inf" => return Ok(Value::Null),
        _ => {}
    }
    if let Ok(unsigned) = text.parse::<u64>() {
        return Ok(Value::Number(Number::from(unsigned)));
    }
    if let Ok(signed) = text.parse::<i64>() {
        return Ok(Value::Number(Number::from(signed)));
    }
    let value: f64 = text
        .parse()
        .map_err(|_| decode_err("failed to parse a number"))?;
    Ok(float_value(value))
}

/// Rebuilds `mantissa * 2^exponent`, splitting the power in two so
/// subnormal results do not round through zero.
fn assemble_f64(mantissa: f64, exponent: i32) -> f64 {
    if (-1022..=1023).contains(&exponent) {
        mantissa * 2f64.powi(exponent)
    } else {
        let half = exponent / 2;
        mantissa * 2f64.powi(half) * 2f64.powi(exponent - half)
    }
}

fn float_value(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None => Value::Null,
    }
}

fn read_table(reader: &mut TokenReader<'_>, depth: usize) -> Result<Value, DecodeError> {
    let depth = depth
        .checked_sub(1)
        .ok_or_else(|| decode_err("table nesting exceeds the supported depth"))?;

    let mut keys = Vec::new();
    let mut values = Vec::new();
    loop {
        if reader.peek_token()? == "^t" {
            let _ = reader.read_token();
            break;
        }
        let key =
            read_value(reader, depth)?.ok_or_else(|| decode_err("missing table key"))?;
        if reader.peek_token()? == "^t" {
            return Err(decode_err("table entry is missing its value"));
        }
        let value =
            read_value(reader, depth)?.ok_or_else(|| decode_err("missing table value"))?;
        keys.push(key);
        values.push(value);
    }

    // keys 1..n in order mean an array, like the binary stream
    let is_sequence = keys.iter().zip(1u64..).all(|(key, i)| match key {
        Value::Number(number) => {
            number.as_u64() == Some(i) || number.as_f64() == Some(i as f64)
        }
        _ => false,
    });
    if is_sequence {
        return Ok(Value::Array(values));
    }

    let mut map = Map::new();
    for (key, value) in keys.into_iter().zip(values) {
        let key = match key {
            Value::String(text) => text,
            Value::Number(number) => number_key(&number),
            Value::Bool(true) => "true".to_owned(),
            Value::Bool(false) => "false".to_owned(),
            _ => return Err(decode_err("unsupported table key type")),
        };
        map.insert(key, value);
    }
    Ok(Value::Object(map))
}

/// Canonical text for a numeric map key; integral floats print as integers.
fn number_key(number: &Number) -> String {
    match number.as_f64() {
        Some(value) if number.is_f64() => value.to_string(),
        _ => number.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    fn round_trip(value: &Value) -> Value {
        let text = AceFormat.serialize(value).unwrap();
        AceFormat.deserialize(&text).unwrap()
    }

    #[test]
    fn test_scalar_wire() {
        let pairs = [
            (json!(null), "^1^Z^^"),
            (json!(true), "^1^B^^"),
            (json!(false), "^1^b^^"),
            (json!(5), "^1^N5^^"),
            (json!(-3), "^1^N-3^^"),
            (json!(1.5), "^1^N1.5^^"),
            (json!("hi"), "^1^Shi^^"),
        ];
        for (value, text) in &pairs {
            assert_eq!(AceFormat.serialize(value).unwrap(), *text);
            assert_eq!(AceFormat.deserialize(text).unwrap(), *value);
        }
    }

    #[test]
    fn test_table_wire() {
        assert_eq!(
            AceFormat.serialize(&json!({"a": 1})).unwrap(),
            "^1^T^Sa^N1^t^^"
        );
        assert_eq!(
            AceFormat.serialize(&json!(["x"])).unwrap(),
            "^1^T^N1^Sx^t^^"
        );
    }

    #[test]
    fn test_escaping_wire() {
        assert_eq!(AceFormat.serialize(&json!("^")).unwrap(), "^1^S~}^^");
        assert_eq!(
            AceFormat.serialize(&json!("a^b~c d")).unwrap(),
            "^1^Sa~}b~|c~`d^^"
        );
    }

    #[test]
    fn test_reserved_bytes_round_trip() {
        let value = json!("tab\there ^caret~ tilde\u{1E}rs\u{7F}del\0nul");
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_round_trip_values() {
        let values = [
            json!(0),
            json!(u64::MAX),
            json!(i64::MIN),
            json!(-0.0),
            json!(2.5e-10),
            json!([1, 2, 3]),
            json!([[true], [null, "x"]]),
            json!({"name": "aura", "scale": 1.5, "ids": [7, 8]}),
            json!({"01": "padded", "2.5": "fractional", "-3": "negative"}),
        ];
        for value in &values {
            assert_eq!(round_trip(value), *value, "value {value}");
        }
    }

    #[test]
    fn test_integer_and_float_stay_distinct() {
        assert!(round_trip(&json!(3)).is_u64());
        assert!(round_trip(&json!(3.0)).is_f64());
    }

    #[test]
    fn test_positional_keys_collapse_to_array() {
        assert_eq!(
            AceFormat.serialize(&json!({"1": "a", "2": "b"})).unwrap(),
            "^1^T^N1^Sa^N2^Sb^t^^"
        );
        assert_eq!(
            AceFormat.deserialize("^1^T^N1^Sa^N2^Sb^t^^").unwrap(),
            json!(["a", "b"])
        );
    }

    #[test]
    fn test_out_of_order_numeric_keys_stay_named() {
        assert_eq!(
            AceFormat.deserialize("^1^T^N2^Sa^N1^Sb^t^^").unwrap(),
            json!({"2": "a", "1": "b"})
        );
    }

    #[test]
    fn test_float_keys_coerce() {
        assert_eq!(
            AceFormat.deserialize("^1^T^N2.5^Sa^t^^").unwrap(),
            json!({"2.5": "a"})
        );
    }

    #[test]
    fn test_infinity_decodes_to_null() {
        assert_eq!(AceFormat.deserialize("^1^N1.#INF^^").unwrap(), Value::Null);
        assert_eq!(
            AceFormat.deserialize("^1^N-1.#INF^^").unwrap(),
            Value::Null
        );
    }

    #[test]
    fn test_mantissa_exponent_form_decodes() {
        // 4503599627370496 * 2^-52 == 1.0
        assert_eq!(
            AceFormat.deserialize("^1^F4503599627370496^f-52^^").unwrap(),
            json!(1.0)
        );
        // the smallest subnormal must not round through zero
        assert_eq!(
            AceFormat.deserialize("^1^F1^f-1074^^").unwrap(),
            json!(5.0e-324)
        );
        assert_eq!(
            AceFormat.deserialize("^1^F-4503599627370496^f-51^^").unwrap(),
            json!(-2.0)
        );
    }

    #[test]
    fn test_bad_header_rejected() {
        for text in ["", "x", "^2^Z^^", "Z^1"] {
            assert!(AceFormat.deserialize(text).is_err(), "text {text:?}");
        }
    }

    #[test]
    fn test_bare_trailer_is_null() {
        assert_eq!(AceFormat.deserialize("^1^^").unwrap(), Value::Null);
    }

    #[test]
    fn test_truncated_input_rejected() {
        for text in ["^1", "^1^N5", "^1^T^Sa", "^1^Sabc", "^1^F1"] {
            let result = AceFormat.deserialize(text);
            assert!(
                matches!(result, Err(DecodeError::Deserialize(_))),
                "text {text:?} gave {result:?}"
            );
        }
    }

    #[test]
    fn test_invalid_escape_rejected() {
        assert!(AceFormat.deserialize("^1^S~!^^").is_err());
        assert!(AceFormat.deserialize("^1^S~^^").is_err());
    }

    #[test]
    fn test_table_entry_missing_value_rejected() {
        let result = AceFormat.deserialize("^1^T^Sa^t^^");
        assert_eq!(
            result,
            Err(decode_err("table entry is missing its value"))
        );
    }

    #[test]
    fn test_depth_limits() {
        let mut nested = json!(1);
        for _ in 0..129 {
            nested = Value::Array(vec![nested]);
        }
        assert!(matches!(
            AceFormat.serialize(&nested),
            Err(EncodeError::Serialize(_))
        ));

        let mut text = String::from("^1");
        for _ in 0..140 {
            text.push_str("^T^N1");
        }
        text.push_str("^Z");
        for _ in 0..140 {
            text.push_str("^t");
        }
        text.push_str("^^");
        assert!(matches!(
            AceFormat.deserialize(&text),
            Err(DecodeError::Deserialize(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_any_string_round_trips(text in any::<String>()) {
            let value = Value::String(text);
            let encoded = AceFormat.serialize(&value).unwrap();
            prop_assert_eq!(AceFormat.deserialize(&encoded).unwrap(), value);
        }
    }
}
