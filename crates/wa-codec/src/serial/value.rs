//! Value tree (de)serialization for the binary stream.
//!
//! The stream is one revision byte followed by a single tagged value. Tables
//! follow the Lua convention: an object whose keys are exactly `"1".."n"` is
//! written as an array, a mix of positional and named keys becomes a mixed
//! token with both counts, and everything else is a map. Strings longer than
//! two bytes join a dictionary so repeats can travel as back-references.

use rustc_hash::FxHashMap;
use serde_json::{Map, Number, Value};

use crate::error::{DecodeError, EncodeError};
use crate::limits::{MAX_DEPTH, MAX_WIRE_INT, STREAM_REVISION};
use crate::serial::primitives::{Reader, Writer};
use crate::serial::tag::{
    EMBEDDED_LEN_SHIFT, EMBEDDED_TAG_SHIFT, EmbeddedTag, TAG_SHIFT, TypeTag,
};

/// Serializes one value tree into a stream, revision byte included.
pub(crate) fn serialize(value: &Value) -> Result<Vec<u8>, EncodeError> {
    let mut ser = Serializer {
        writer: Writer::with_capacity(128),
        string_refs: FxHashMap::default(),
    };
    ser.writer.write_byte(STREAM_REVISION);
    ser.write_value(value, MAX_DEPTH)?;
    Ok(ser.writer.into_bytes())
}

/// Deserializes the first value of a stream.
///
/// A stream holding nothing after the revision byte is null, and bytes after
/// the first value are ignored; both cases appear in strings produced by
/// existing writers.
pub(crate) fn deserialize_first(data: &[u8]) -> Result<Value, DecodeError> {
    let mut de = Deserializer {
        reader: Reader::new(data),
        string_refs: Vec::new(),
        table_refs: Vec::new(),
    };
    let revision = de.reader.read_byte("revision")?;
    if revision != STREAM_REVISION {
        return Err(DecodeError::UnsupportedRevision { revision });
    }
    Ok(de.read_value(MAX_DEPTH)?.unwrap_or(Value::Null))
}

/// Bytes needed for the narrowest big-endian integer holding `value`.
fn required_bytes(value: u64) -> usize {
    match value {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        0x1_0000..=0xFF_FFFF => 3,
        0x100_0000..=0xFFFF_FFFF => 4,
        _ => 7,
    }
}

/// Width in bytes of the length or index field following a sized tag.
fn tag_width(tag: TypeTag) -> usize {
    match tag {
        TypeTag::Str8
        | TypeTag::Map8
        | TypeTag::Array8
        | TypeTag::Mixed8
        | TypeTag::StrRef8
        | TypeTag::MapRef8 => 1,
        TypeTag::Str16
        | TypeTag::Map16
        | TypeTag::Array16
        | TypeTag::Mixed16
        | TypeTag::StrRef16
        | TypeTag::MapRef16 => 2,
        _ => 3,
    }
}

/// Returns `Some(i)` when `key` is the canonical decimal form of `i >= 1`.
fn sequence_index(key: &str) -> Option<u64> {
    if key.is_empty() || key.starts_with('0') || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse::<u64>().ok()
}

/// Non-finite doubles have no tree representation and become null.
fn float_value(value: f64) -> Value {
    match Number::from_f64(value) {
        Some(number) => Value::Number(number),
        None => Value::Null,
    }
}

/// Canonical text for a numeric map key; integral floats print as integers.
fn number_key(number: &Number) -> String {
    match number.as_f64() {
        Some(value) if number.is_f64() => value.to_string(),
        _ => number.to_string(),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a sequence",
        Value::Object(_) => "a table",
    }
}

// =============================================================================
// ENCODING
// =============================================================================

struct Serializer {
    writer: Writer,
    // value = 1-based dictionary index of an already written string
    string_refs: FxHashMap<String, u64>,
}

impl Serializer {
    fn write_value(&mut self, value: &Value, depth: usize) -> Result<(), EncodeError> {
        match value {
            Value::Null => self.write_tag(TypeTag::Null),
            Value::Bool(true) => self.write_tag(TypeTag::True),
            Value::Bool(false) => self.write_tag(TypeTag::False),
            Value::Number(number) => self.write_number(number),
            Value::String(text) => self.write_string(text)?,
            Value::Array(items) => self.write_array(items, depth)?,
            Value::Object(map) => self.write_table(map, depth)?,
        }
        Ok(())
    }

    fn write_tag(&mut self, tag: TypeTag) {
        self.writer.write_byte(tag.to_u8() << TAG_SHIFT);
    }

    fn write_embedded(&mut self, tag: EmbeddedTag, count: u8) {
        self.writer
            .write_byte((tag.to_u8() << EMBEDDED_TAG_SHIFT) | (count << EMBEDDED_LEN_SHIFT) | 2);
    }

    fn write_tagged_uint(&mut self, tag: TypeTag, value: u64, n: usize) {
        self.write_tag(tag);
        self.writer.write_uint(value, n);
    }

    fn write_number(&mut self, number: &Number) {
        if let Some(unsigned) = number.as_u64() {
            self.write_unsigned(unsigned);
        } else if let Some(signed) = number.as_i64() {
            // as_u64 caught everything non-negative
            self.write_negative(signed.unsigned_abs());
        } else if let Some(float) = number.as_f64() {
            // floats keep the float token even when integral, so the
            // integer/float distinction survives a round trip
            self.write_tag(TypeTag::Float);
            self.writer.write_f64(float);
        }
    }

    fn write_unsigned(&mut self, value: u64) {
        if value < 128 {
            self.writer.write_byte((value as u8) << 1 | 1);
        } else if value < 4096 {
            let packed = (value << 4) | 4;
            self.writer.write_byte(packed as u8);
            self.writer.write_byte((packed >> 8) as u8);
        } else if value <= MAX_WIRE_INT {
            match required_bytes(value) {
                2 => self.write_tagged_uint(TypeTag::Int16Pos, value, 2),
                3 => self.write_tagged_uint(TypeTag::Int24Pos, value, 3),
                4 => self.write_tagged_uint(TypeTag::Int32Pos, value, 4),
                _ => self.write_tagged_uint(TypeTag::Int64Pos, value, 7),
            }
        } else {
            self.write_number_text(TypeTag::FloatStrPos, value);
        }
    }

    fn write_negative(&mut self, magnitude: u64) {
        if magnitude < 4096 {
            let packed = (magnitude << 4) | 8 | 4;
            self.writer.write_byte(packed as u8);
            self.writer.write_byte((packed >> 8) as u8);
        } else if magnitude <= MAX_WIRE_INT {
            match required_bytes(magnitude) {
                2 => self.write_tagged_uint(TypeTag::Int16Neg, magnitude, 2),
                3 => self.write_tagged_uint(TypeTag::Int24Neg, magnitude, 3),
                4 => self.write_tagged_uint(TypeTag::Int32Neg, magnitude, 4),
                _ => self.write_tagged_uint(TypeTag::Int64Neg, magnitude, 7),
            }
        } else {
            self.write_number_text(TypeTag::FloatStrNeg, magnitude);
        }
    }

    /// Decimal digit token for magnitudes past the 56-bit integer ceiling;
    /// the sign rides on the tag.
    fn write_number_text(&mut self, tag: TypeTag, magnitude: u64) {
        let mut buffer = itoa::Buffer::new();
        let digits = buffer.format(magnitude);
        self.write_tag(tag);
        self.writer.write_byte(digits.len() as u8);
        self.writer.write_bytes(digits.as_bytes());
    }

    fn write_string(&mut self, value: &str) -> Result<(), EncodeError> {
        if let Some(&index) = self.string_refs.get(value) {
            match required_bytes(index) {
                1 => self.write_tagged_uint(TypeTag::StrRef8, index, 1),
                2 => self.write_tagged_uint(TypeTag::StrRef16, index, 2),
                3 => self.write_tagged_uint(TypeTag::StrRef24, index, 3),
                _ => return Err(EncodeError::StringDictionaryFull),
            }
            return Ok(());
        }

        let len = value.len();
        if len < 16 {
            self.write_embedded(EmbeddedTag::Str, len as u8);
        } else {
            match required_bytes(len as u64) {
                1 => self.write_tagged_uint(TypeTag::Str8, len as u64, 1),
                2 => self.write_tagged_uint(TypeTag::Str16, len as u64, 2),
                3 => self.write_tagged_uint(TypeTag::Str24, len as u64, 3),
                _ => return Err(EncodeError::StringTooLong { len }),
            }
        }

        if len > 2 {
            self.string_refs
                .insert(value.to_owned(), self.string_refs.len() as u64 + 1);
        }
        self.writer.write_bytes(value.as_bytes());
        Ok(())
    }

    fn write_array(&mut self, items: &[Value], depth: usize) -> Result<(), EncodeError> {
        let depth = depth
            .checked_sub(1)
            .ok_or(EncodeError::DepthLimitExceeded)?;
        self.write_array_header(items.len())?;
        for item in items {
            self.write_value(item, depth)?;
        }
        Ok(())
    }

    fn write_table(&mut self, map: &Map<String, Value>, depth: usize) -> Result<(), EncodeError> {
        let depth = depth
            .checked_sub(1)
            .ok_or(EncodeError::DepthLimitExceeded)?;

        // Lua sequence convention: keys "1".."n" form the positional part.
        let mut sequence: Vec<&Value> = Vec::new();
        let mut probe = itoa::Buffer::new();
        while let Some(item) = map.get(probe.format(sequence.len() as u64 + 1)) {
            sequence.push(item);
        }
        let sequence_len = sequence.len();
        let named_len = map.len() - sequence_len;

        if named_len == 0 {
            self.write_array_header(sequence_len)?;
            for item in sequence {
                self.write_value(item, depth)?;
            }
        } else if sequence_len == 0 {
            self.write_map_header(named_len)?;
            for (key, item) in map {
                self.write_string(key)?;
                self.write_value(item, depth)?;
            }
        } else {
            self.write_mixed_header(sequence_len, named_len)?;
            for item in sequence {
                self.write_value(item, depth)?;
            }
            for (key, item) in map {
                if sequence_index(key).is_some_and(|index| index <= sequence_len as u64) {
                    continue;
                }
                self.write_string(key)?;
                self.write_value(item, depth)?;
            }
        }
        Ok(())
    }

    fn write_array_header(&mut self, len: usize) -> Result<(), EncodeError> {
        if len < 16 {
            self.write_embedded(EmbeddedTag::Array, len as u8);
            return Ok(());
        }
        match required_bytes(len as u64) {
            1 => self.write_tagged_uint(TypeTag::Array8, len as u64, 1),
            2 => self.write_tagged_uint(TypeTag::Array16, len as u64, 2),
            3 => self.write_tagged_uint(TypeTag::Array24, len as u64, 3),
            _ => return Err(EncodeError::ContainerTooLarge { len }),
        }
        Ok(())
    }

    fn write_map_header(&mut self, len: usize) -> Result<(), EncodeError> {
        if len < 16 {
            self.write_embedded(EmbeddedTag::Map, len as u8);
            return Ok(());
        }
        match required_bytes(len as u64) {
            1 => self.write_tagged_uint(TypeTag::Map8, len as u64, 1),
            2 => self.write_tagged_uint(TypeTag::Map16, len as u64, 2),
            3 => self.write_tagged_uint(TypeTag::Map24, len as u64, 3),
            _ => return Err(EncodeError::ContainerTooLarge { len }),
        }
        Ok(())
    }

    /// Both counts share one width; small pairs pack into the tag byte with
    /// each count stored one less than its true value.
    fn write_mixed_header(
        &mut self,
        sequence_len: usize,
        named_len: usize,
    ) -> Result<(), EncodeError> {
        if sequence_len < 5 && named_len < 5 {
            let packed = ((named_len as u8 - 1) << 2) | (sequence_len as u8 - 1);
            self.write_embedded(EmbeddedTag::Mixed, packed);
            return Ok(());
        }
        let longest = sequence_len.max(named_len);
        let width = match required_bytes(longest as u64) {
            1 => {
                self.write_tag(TypeTag::Mixed8);
                1
            }
            2 => {
                self.write_tag(TypeTag::Mixed16);
                2
            }
            3 => {
                self.write_tag(TypeTag::Mixed24);
                3
            }
            _ => return Err(EncodeError::ContainerTooLarge { len: longest }),
        };
        self.writer.write_uint(sequence_len as u64, width);
        self.writer.write_uint(named_len as u64, width);
        Ok(())
    }
}

// =============================================================================
// DECODING
// =============================================================================

struct Deserializer<'a> {
    reader: Reader<'a>,
    string_refs: Vec<String>,
    table_refs: Vec<Value>,
}

impl Deserializer<'_> {
    /// Reads the next value; `None` at end of stream.
    fn read_value(&mut self, depth: usize) -> Result<Option<Value>, DecodeError> {
        let Some(byte) = self.reader.try_read_byte() else {
            return Ok(None);
        };

        if byte & 1 == 1 {
            // NNNN NNN1: 7-bit non-negative integer
            return Ok(Some(Value::Number(Number::from(byte >> 1))));
        }
        if byte & 3 == 2 {
            // CCCC TT10: embedded string/container
            let tag = EmbeddedTag::from_u8((byte & 0x0F) >> 2)
                .ok_or(DecodeError::InvalidTag { tag: byte })?;
            return self.read_embedded(tag, byte >> 4, depth).map(Some);
        }
        if byte & 7 == 4 {
            // NNNN S100: 12-bit integer plus sign, upper bits in the next byte
            let high = self.reader.read_byte("integer")? as u16;
            let magnitude = ((high << 8) | byte as u16) >> 4;
            let number = if byte & 0x08 != 0 {
                Number::from(-(magnitude as i64))
            } else {
                Number::from(magnitude)
            };
            return Ok(Some(Value::Number(number)));
        }
        // TTTT T000: full tag byte
        let tag = TypeTag::from_u8(byte >> 3).ok_or(DecodeError::InvalidTag { tag: byte })?;
        self.read_tagged(tag, depth).map(Some)
    }

    fn require_value(&mut self, depth: usize) -> Result<Value, DecodeError> {
        self.read_value(depth)?
            .ok_or(DecodeError::UnexpectedEof { context: "value" })
    }

    fn read_embedded(
        &mut self,
        tag: EmbeddedTag,
        count: u8,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        match tag {
            EmbeddedTag::Str => self.read_string(count as usize),
            EmbeddedTag::Map => self.read_map(count as usize, depth),
            EmbeddedTag::Array => self.read_array(count as usize, depth),
            // the packed nibble holds both counts, each one less than true
            EmbeddedTag::Mixed => {
                self.read_mixed((count & 3) as usize + 1, (count >> 2) as usize + 1, depth)
            }
        }
    }

    fn read_tagged(&mut self, tag: TypeTag, depth: usize) -> Result<Value, DecodeError> {
        match tag {
            TypeTag::Null => Ok(Value::Null),
            TypeTag::True => Ok(Value::Bool(true)),
            TypeTag::False => Ok(Value::Bool(false)),

            TypeTag::Int16Pos => self.read_int(2, false),
            TypeTag::Int16Neg => self.read_int(2, true),
            TypeTag::Int24Pos => self.read_int(3, false),
            TypeTag::Int24Neg => self.read_int(3, true),
            TypeTag::Int32Pos => self.read_int(4, false),
            TypeTag::Int32Neg => self.read_int(4, true),
            TypeTag::Int64Pos => self.read_int(7, false),
            TypeTag::Int64Neg => self.read_int(7, true),

            TypeTag::Float => {
                let value = self.reader.read_f64("float")?;
                Ok(float_value(value))
            }
            TypeTag::FloatStrPos => self.read_number_text(false),
            TypeTag::FloatStrNeg => self.read_number_text(true),

            TypeTag::Str8 | TypeTag::Str16 | TypeTag::Str24 => {
                let len = self.reader.read_uint(tag_width(tag), "string length")?;
                self.read_string(len as usize)
            }
            TypeTag::Map8 | TypeTag::Map16 | TypeTag::Map24 => {
                let count = self.reader.read_uint(tag_width(tag), "map count")?;
                self.read_map(count as usize, depth)
            }
            TypeTag::Array8 | TypeTag::Array16 | TypeTag::Array24 => {
                let count = self.reader.read_uint(tag_width(tag), "array count")?;
                self.read_array(count as usize, depth)
            }
            TypeTag::Mixed8 | TypeTag::Mixed16 | TypeTag::Mixed24 => {
                let width = tag_width(tag);
                let sequence_len = self.reader.read_uint(width, "mixed array count")?;
                let named_len = self.reader.read_uint(width, "mixed map count")?;
                self.read_mixed(sequence_len as usize, named_len as usize, depth)
            }
            TypeTag::StrRef8 | TypeTag::StrRef16 | TypeTag::StrRef24 => {
                let index = self.reader.read_uint(tag_width(tag), "string reference")?;
                self.read_string_ref(index)
            }
            TypeTag::MapRef8 | TypeTag::MapRef16 | TypeTag::MapRef24 => {
                let index = self.reader.read_uint(tag_width(tag), "table reference")?;
                self.read_table_ref(index)
            }
        }
    }

    fn read_int(&mut self, n: usize, negative: bool) -> Result<Value, DecodeError> {
        // magnitude fits 56 bits, negation cannot overflow
        let magnitude = self.reader.read_uint(n, "integer")?;
        let number = if negative {
            Number::from(-(magnitude as i64))
        } else {
            Number::from(magnitude)
        };
        Ok(Value::Number(number))
    }

    fn read_number_text(&mut self, negative: bool) -> Result<Value, DecodeError> {
        let len = self.reader.read_byte("number length")?;
        let bytes = self.reader.read_bytes(len as usize, "number text")?;
        let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidNumber)?;

        // integer magnitudes stay exact, i64::MIN included
        if let Ok(magnitude) = text.parse::<u64>() {
            if !negative {
                return Ok(Value::Number(Number::from(magnitude)));
            }
            if magnitude <= i64::MAX as u64 {
                return Ok(Value::Number(Number::from(-(magnitude as i64))));
            }
            if magnitude == i64::MAX as u64 + 1 {
                return Ok(Value::Number(Number::from(i64::MIN)));
            }
        }
        let value: f64 = text.parse().map_err(|_| DecodeError::InvalidNumber)?;
        Ok(float_value(if negative { -value } else { value }))
    }

    fn read_string(&mut self, len: usize) -> Result<Value, DecodeError> {
        let text = self.reader.read_text(len, "string")?;
        if len > 2 {
            self.string_refs.push(text.clone());
        }
        Ok(Value::String(text))
    }

    fn read_string_ref(&mut self, index: u64) -> Result<Value, DecodeError> {
        index
            .checked_sub(1)
            .and_then(|i| self.string_refs.get(i as usize))
            .cloned()
            .map(Value::String)
            .ok_or(DecodeError::InvalidStringRef { index })
    }

    fn read_table_ref(&mut self, index: u64) -> Result<Value, DecodeError> {
        index
            .checked_sub(1)
            .and_then(|i| self.table_refs.get(i as usize))
            .cloned()
            .ok_or(DecodeError::InvalidTableRef { index })
    }

    fn read_key(&mut self, depth: usize) -> Result<String, DecodeError> {
        match self.require_value(depth)? {
            Value::String(text) => Ok(text),
            Value::Number(number) => Ok(number_key(&number)),
            Value::Bool(true) => Ok("true".to_owned()),
            Value::Bool(false) => Ok("false".to_owned()),
            other => Err(DecodeError::UnsupportedKey {
                found: value_kind(&other),
            }),
        }
    }

    fn read_map(&mut self, count: usize, depth: usize) -> Result<Value, DecodeError> {
        let depth = depth
            .checked_sub(1)
            .ok_or(DecodeError::DepthLimitExceeded)?;
        let mut map = Map::new();
        for _ in 0..count {
            let key = self.read_key(depth)?;
            let value = self.require_value(depth)?;
            map.insert(key, value);
        }
        let table = Value::Object(map);
        self.table_refs.push(table.clone());
        Ok(table)
    }

    fn read_array(&mut self, count: usize, depth: usize) -> Result<Value, DecodeError> {
        let depth = depth
            .checked_sub(1)
            .ok_or(DecodeError::DepthLimitExceeded)?;
        // no up-front reservation; a hostile count must not allocate ahead
        // of the bytes that actually back it
        let mut items = Vec::new();
        for _ in 0..count {
            items.push(self.require_value(depth)?);
        }
        let table = Value::Array(items);
        self.table_refs.push(table.clone());
        Ok(table)
    }

    fn read_mixed(
        &mut self,
        sequence_len: usize,
        named_len: usize,
        depth: usize,
    ) -> Result<Value, DecodeError> {
        let depth = depth
            .checked_sub(1)
            .ok_or(DecodeError::DepthLimitExceeded)?;
        let mut map = Map::new();
        let mut index = itoa::Buffer::new();
        for i in 1..=sequence_len {
            let value = self.require_value(depth)?;
            map.insert(index.format(i as u64).to_owned(), value);
        }
        for _ in 0..named_len {
            let key = self.read_key(depth)?;
            let value = self.require_value(depth)?;
            map.insert(key, value);
        }
        let table = Value::Object(map);
        self.table_refs.push(table.clone());
        Ok(table)
    }
}
