//! Token tags for the binary serialization stream.
//!
//! A token's first byte selects one of four families by its low bits:
//!
//! ```text
//! NNNN NNN1  7-bit non-negative integer
//! CCCC TT10  embedded string/container, 2-bit kind + 4-bit count
//! NNNN S100  low four bits of a 12-bit integer plus its sign; the upper
//!            eight bits follow in the next byte
//! TTTT T000  full tag byte, tag in the high five bits
//! ```

/// Bit position of a full tag within its token byte.
pub(crate) const TAG_SHIFT: u8 = 3;

/// Bit position of the kind within an embedded token byte.
pub(crate) const EMBEDDED_TAG_SHIFT: u8 = 2;

/// Bit position of the count within an embedded token byte.
pub(crate) const EMBEDDED_LEN_SHIFT: u8 = 4;

/// Kind of an embedded token (counts below 16 packed into the tag byte).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum EmbeddedTag {
    Str = 0,
    Map = 1,
    Array = 2,
    Mixed = 3,
}

impl EmbeddedTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(EmbeddedTag::Str),
            1 => Some(EmbeddedTag::Map),
            2 => Some(EmbeddedTag::Array),
            3 => Some(EmbeddedTag::Mixed),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Full tag, stored in the high five bits of its token byte.
///
/// The `8`/`16`/`24` suffix is the width in bits of the length, count, or
/// back-reference index that follows the tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum TypeTag {
    Null = 0,
    Int16Pos = 1,
    Int16Neg = 2,
    Int24Pos = 3,
    Int24Neg = 4,
    Int32Pos = 5,
    Int32Neg = 6,
    Int64Pos = 7,
    Int64Neg = 8,
    Float = 9,
    FloatStrPos = 10,
    FloatStrNeg = 11,
    True = 12,
    False = 13,
    Str8 = 14,
    Str16 = 15,
    Str24 = 16,
    Map8 = 17,
    Map16 = 18,
    Map24 = 19,
    Array8 = 20,
    Array16 = 21,
    Array24 = 22,
    Mixed8 = 23,
    Mixed16 = 24,
    Mixed24 = 25,
    StrRef8 = 26,
    StrRef16 = 27,
    StrRef24 = 28,
    MapRef8 = 29,
    MapRef16 = 30,
    MapRef24 = 31,
}

impl TypeTag {
    pub fn from_u8(value: u8) -> Option<Self> {
        Some(match value {
            0 => TypeTag::Null,
            1 => TypeTag::Int16Pos,
            2 => TypeTag::Int16Neg,
            3 => TypeTag::Int24Pos,
            4 => TypeTag::Int24Neg,
            5 => TypeTag::Int32Pos,
            6 => TypeTag::Int32Neg,
            7 => TypeTag::Int64Pos,
            8 => TypeTag::Int64Neg,
            9 => TypeTag::Float,
            10 => TypeTag::FloatStrPos,
            11 => TypeTag::FloatStrNeg,
            12 => TypeTag::True,
            13 => TypeTag::False,
            14 => TypeTag::Str8,
            15 => TypeTag::Str16,
            16 => TypeTag::Str24,
            17 => TypeTag::Map8,
            18 => TypeTag::Map16,
            19 => TypeTag::Map24,
            20 => TypeTag::Array8,
            21 => TypeTag::Array16,
            22 => TypeTag::Array24,
            23 => TypeTag::Mixed8,
            24 => TypeTag::Mixed16,
            25 => TypeTag::Mixed24,
            26 => TypeTag::StrRef8,
            27 => TypeTag::StrRef16,
            28 => TypeTag::StrRef24,
            29 => TypeTag::MapRef8,
            30 => TypeTag::MapRef16,
            31 => TypeTag::MapRef24,
            _ => return None,
        })
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}
