//! Text payload strategies for format v1.
//!
//! A v1 payload is opaque text as far as the pipeline is concerned; turning
//! value trees into that text and back is delegated to a strategy chosen at
//! codec construction:
//! - [`AceFormat`]: the `^`-token grammar used by the addon ecosystem, so
//!   v1 strings interoperate with existing tooling (the default)
//! - [`JsonFormat`]: plain JSON documents

mod ace;

pub use ace::AceFormat;

use serde_json::Value;

use crate::error::{DecodeError, EncodeError};

/// Converts value trees to v1 text payloads and back.
///
/// Implementations are injected into [`WaCodec`](crate::WaCodec) at
/// construction and are shared across clones, so they must be `Send + Sync`.
/// Failures surface as [`EncodeError::Serialize`] and
/// [`DecodeError::Deserialize`].
pub trait TextFormat: Send + Sync {
    /// Renders a value tree as a v1 text payload.
    fn serialize(&self, value: &Value) -> Result<String, EncodeError>;

    /// Parses a v1 text payload back into a value tree.
    fn deserialize(&self, text: &str) -> Result<Value, DecodeError>;
}

/// JSON text strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormat;

impl TextFormat for JsonFormat {
    fn serialize(&self, value: &Value) -> Result<String, EncodeError> {
        serde_json::to_string(value).map_err(|err| EncodeError::Serialize(err.to_string()))
    }

    fn deserialize(&self, text: &str) -> Result<Value, DecodeError> {
        serde_json::from_str(text).map_err(|err| DecodeError::Deserialize(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_json_round_trip() {
        let value = json!({"name": "aura", "ids": [1, 2, 3], "scale": 1.5});
        let text = JsonFormat.serialize(&value).unwrap();
        assert_eq!(JsonFormat.deserialize(&text).unwrap(), value);
    }

    #[test]
    fn test_json_parse_failure_is_a_strategy_error() {
        let result = JsonFormat.deserialize("{not json");
        assert!(matches!(result, Err(DecodeError::Deserialize(_))));
    }
}
