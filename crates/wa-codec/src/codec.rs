//! WA-string pipeline: format dispatch, compression framing, and the sync
//! and async execution surfaces.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::compress;
use crate::error::{DecodeError, EncodeError};
use crate::format::{FormatVersion, TaggedPayload};
use crate::limits::{DEFAULT_COMPRESSION, DEFAULT_MAX_DECOMPRESSED};
use crate::serial;
use crate::text::{AceFormat, TextFormat};
use crate::transcode;

/// Configuration fixed at codec construction.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Format used by encode calls that do not name one.
    pub default_version: FormatVersion,
    /// Decompression ceiling for decode calls that do not pass one; `None`
    /// disables the ceiling and is only safe for trusted input.
    pub default_max_decompressed: Option<usize>,
    /// Deflate level, 0 to 9.
    pub compression: u32,
}

impl CodecConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            default_version: FormatVersion::BinarySerialization,
            default_max_decompressed: Some(DEFAULT_MAX_DECOMPRESSED),
            compression: DEFAULT_COMPRESSION,
        }
    }
}

/// A decoded payload, tagged by the format that carried it.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Format v1 carries opaque text.
    Text(String),
    /// Format v2 carries a value tree.
    Value(Value),
}

impl Payload {
    /// Format that produced this payload.
    pub fn version(&self) -> FormatVersion {
        match self {
            Payload::Text(_) => FormatVersion::Deflate,
            Payload::Value(_) => FormatVersion::BinarySerialization,
        }
    }
}

/// The WA-string codec.
///
/// Cheap to clone; clones share the text strategy. The async methods run
/// the same pipeline on the tokio blocking pool and must be called within a
/// tokio runtime.
#[derive(Clone)]
pub struct WaCodec {
    config: CodecConfig,
    text: Arc<dyn TextFormat>,
}

impl Default for WaCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for WaCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaCodec")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl WaCodec {
    /// Codec with the default configuration and the AceSerializer strategy.
    pub fn new() -> Self {
        Self::with_config(CodecConfig::new())
    }

    /// Codec with an explicit configuration and the AceSerializer strategy.
    pub fn with_config(config: CodecConfig) -> Self {
        Self {
            config,
            text: Arc::new(AceFormat),
        }
    }

    /// Replaces the v1 text strategy.
    pub fn with_text_format<F: TextFormat + 'static>(mut self, format: F) -> Self {
        self.text = Arc::new(format);
        self
    }

    // =========================================================================
    // ENCODING
    // =========================================================================

    /// Encodes a value tree as a WA-string, defaulting to the configured
    /// format version.
    pub fn encode(
        &self,
        value: &Value,
        version: Option<FormatVersion>,
    ) -> Result<String, EncodeError> {
        match version.unwrap_or(self.config.default_version) {
            FormatVersion::Deflate => {
                let text = self.text.serialize(value)?;
                self.encode_text(&text)
            }
            FormatVersion::BinarySerialization => {
                let stream = serial::serialize(value)?;
                let compressed = compress::deflate(&stream, self.config.compression)?;
                trace!(
                    stream = stream.len(),
                    compressed = compressed.len(),
                    "encoded binary payload"
                );
                Ok(transcode::encode_with_prefix(
                    &compressed,
                    FormatVersion::BinarySerialization.marker(),
                ))
            }
        }
    }

    /// Encodes a raw text payload as a v1 WA-string, bypassing the text
    /// strategy.
    pub fn encode_text(&self, payload: &str) -> Result<String, EncodeError> {
        let compressed = compress::deflate(payload.as_bytes(), self.config.compression)?;
        trace!(
            text = payload.len(),
            compressed = compressed.len(),
            "encoded text payload"
        );
        Ok(transcode::encode_with_prefix(
            &compressed,
            FormatVersion::Deflate.marker(),
        ))
    }

    // =========================================================================
    // DECODING
    // =========================================================================

    /// Decodes a WA-string to its format's natural payload, under the
    /// configured decompression ceiling.
    pub fn decode(&self, src: &str) -> Result<Payload, DecodeError> {
        self.decode_bounded(src, self.config.default_max_decompressed)
    }

    /// Decodes with an explicit decompression ceiling; `None` disables it.
    ///
    /// The format marker is checked before any payload byte is touched, so
    /// unrecognized input fails without allocating.
    pub fn decode_bounded(
        &self,
        src: &str,
        max_size: Option<usize>,
    ) -> Result<Payload, DecodeError> {
        let tagged = TaggedPayload::parse(src)?;
        let decoded = transcode::decode(tagged.payload)?;
        let inflated = compress::inflate(&decoded, max_size)?;
        trace!(
            version = ?tagged.version,
            transcoded = decoded.len(),
            inflated = inflated.len(),
            "decoded payload"
        );
        match tagged.version {
            FormatVersion::Deflate => Ok(Payload::Text(text_from_bytes(inflated))),
            FormatVersion::BinarySerialization => {
                Ok(Payload::Value(serial::deserialize_first(&inflated)?))
            }
        }
    }

    /// Decodes a WA-string all the way to a value tree; v1 payloads go
    /// through the text strategy.
    pub fn decode_value(&self, src: &str) -> Result<Value, DecodeError> {
        self.decode_value_bounded(src, self.config.default_max_decompressed)
    }

    /// [`decode_value`](Self::decode_value) with an explicit ceiling.
    pub fn decode_value_bounded(
        &self,
        src: &str,
        max_size: Option<usize>,
    ) -> Result<Value, DecodeError> {
        match self.decode_bounded(src, max_size)? {
            Payload::Text(text) => self.text.deserialize(&text),
            Payload::Value(value) => Ok(value),
        }
    }

    // =========================================================================
    // ASYNC SURFACES
    // =========================================================================

    /// Async form of [`encode`](Self::encode); runs on the blocking pool.
    pub async fn encode_async(
        &self,
        value: Value,
        version: Option<FormatVersion>,
    ) -> Result<String, EncodeError> {
        let codec = self.clone();
        run_blocking(move || codec.encode(&value, version), EncodeError::Dispatch).await
    }

    /// Async form of [`encode_text`](Self::encode_text).
    pub async fn encode_text_async(&self, payload: String) -> Result<String, EncodeError> {
        let codec = self.clone();
        run_blocking(move || codec.encode_text(&payload), EncodeError::Dispatch).await
    }

    /// Async form of [`decode`](Self::decode).
    pub async fn decode_async(&self, src: String) -> Result<Payload, DecodeError> {
        self.decode_bounded_async(src, self.config.default_max_decompressed)
            .await
    }

    /// Async form of [`decode_bounded`](Self::decode_bounded).
    pub async fn decode_bounded_async(
        &self,
        src: String,
        max_size: Option<usize>,
    ) -> Result<Payload, DecodeError> {
        let codec = self.clone();
        run_blocking(
            move || codec.decode_bounded(&src, max_size),
            DecodeError::Dispatch,
        )
        .await
    }

    /// Async form of [`decode_value`](Self::decode_value).
    pub async fn decode_value_async(&self, src: String) -> Result<Value, DecodeError> {
        self.decode_value_bounded_async(src, self.config.default_max_decompressed)
            .await
    }

    /// Async form of [`decode_value_bounded`](Self::decode_value_bounded).
    pub async fn decode_value_bounded_async(
        &self,
        src: String,
        max_size: Option<usize>,
    ) -> Result<Value, DecodeError> {
        let codec = self.clone();
        run_blocking(
            move || codec.decode_value_bounded(&src, max_size),
            DecodeError::Dispatch,
        )
        .await
    }
}

/// Runs `work` on the blocking pool; a pool failure maps through `dispatch`
/// so cancellation and panics stay distinguishable from codec errors.
async fn run_blocking<T, E, F>(work: F, dispatch: fn(String) -> E) -> Result<T, E>
where
    T: Send + 'static,
    E: Send + 'static,
    F: FnOnce() -> Result<T, E> + Send + 'static,
{
    debug!("dispatching codec work to the blocking pool");
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result,
        Err(err) => Err(dispatch(format!("blocking task failed: {err}"))),
    }
}

/// Payload bytes are produced by Lua writers and are not guaranteed to be
/// UTF-8; invalid sequences are replaced rather than rejected.
fn text_from_bytes(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    }
}

/// Encodes a value tree with a default codec.
pub fn encode(value: &Value) -> Result<String, EncodeError> {
    WaCodec::new().encode(value, None)
}

/// Decodes a WA-string with a default codec.
pub fn decode(src: &str) -> Result<Payload, DecodeError> {
    WaCodec::new().decode(src)
}

/// Decodes a WA-string to a value tree with a default codec.
pub fn decode_value(src: &str) -> Result<Value, DecodeError> {
    WaCodec::new().decode_value(src)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;
    use crate::format::detect_version;
    use crate::text::JsonFormat;

    #[test]
    fn test_binary_round_trip_under_explicit_ceiling() {
        let codec = WaCodec::new();
        let value = json!({"a": 1, "b": [true, null, "x"]});
        let encoded = codec
            .encode(&value, Some(FormatVersion::BinarySerialization))
            .unwrap();
        assert!(encoded.starts_with("!WA:2!"));

        match codec.decode_bounded(&encoded, Some(1_000_000)).unwrap() {
            Payload::Value(decoded) => assert_eq!(decoded, value),
            other => panic!("expected a value payload, got {other:?}"),
        }
    }

    #[test]
    fn test_text_round_trip() {
        let codec = WaCodec::new();
        let encoded = codec.encode_text("hello world").unwrap();
        assert!(encoded.starts_with('!'));
        assert!(!encoded.starts_with("!WA:"));
        assert_ne!(encoded, "hello world");

        assert_eq!(
            codec.decode(&encoded).unwrap(),
            Payload::Text("hello world".to_owned())
        );
    }

    #[test]
    fn test_both_versions_round_trip_to_the_same_tree() {
        let codec = WaCodec::new();
        let value = json!({
            "name": "test aura",
            "ids": [1, 2, 3],
            "enabled": true,
            "scale": 1.5,
            "note": null,
        });
        for version in [FormatVersion::Deflate, FormatVersion::BinarySerialization] {
            let encoded = codec.encode(&value, Some(version)).unwrap();
            assert_eq!(detect_version(&encoded), Some(version));
            assert_eq!(codec.decode_value(&encoded).unwrap(), value, "{version:?}");
        }
    }

    #[test]
    fn test_dispatch_routes_by_marker() {
        let codec = WaCodec::new();
        let value = json!(["routing"]);

        let v1 = codec.encode(&value, Some(FormatVersion::Deflate)).unwrap();
        let payload = codec.decode(&v1).unwrap();
        assert_eq!(payload.version(), FormatVersion::Deflate);
        assert!(matches!(payload, Payload::Text(_)));

        let v2 = codec
            .encode(&value, Some(FormatVersion::BinarySerialization))
            .unwrap();
        let payload = codec.decode(&v2).unwrap();
        assert_eq!(payload.version(), FormatVersion::BinarySerialization);
        assert!(matches!(payload, Payload::Value(_)));
    }

    #[test]
    fn test_default_version_is_binary() {
        let encoded = WaCodec::new().encode(&json!([1]), None).unwrap();
        assert!(encoded.starts_with("!WA:2!"));
    }

    #[test]
    fn test_v1_text_payload_is_ace_by_default() {
        let codec = WaCodec::new();
        let encoded = codec
            .encode(&json!({"a": 1}), Some(FormatVersion::Deflate))
            .unwrap();
        match codec.decode(&encoded).unwrap() {
            Payload::Text(text) => assert_eq!(text, "^1^T^Sa^N1^t^^"),
            other => panic!("expected a text payload, got {other:?}"),
        }
    }

    #[test]
    fn test_json_strategy_swaps_in() {
        let codec = WaCodec::new().with_text_format(JsonFormat);
        let value = json!({"a": [1, 2], "b": "x"});
        let encoded = codec.encode(&value, Some(FormatVersion::Deflate)).unwrap();
        match codec.decode(&encoded).unwrap() {
            Payload::Text(text) => assert!(text.starts_with('{')),
            other => panic!("expected a text payload, got {other:?}"),
        }
        assert_eq!(codec.decode_value(&encoded).unwrap(), value);
    }

    #[test]
    fn test_malformed_input_classified_before_any_work() {
        for src in ["", "not-a-valid-wa-string", "xx!yy", "WA:2!abcd"] {
            let err = WaCodec::new().decode(src).unwrap_err();
            assert_eq!(err, DecodeError::UnknownFormat, "src {src:?}");
            assert_eq!(err.kind(), ErrorKind::MalformedInput);
        }

        let err = WaCodec::new().decode("!WA:9!abcd").unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedFormat { version: 9 });
        assert_eq!(err.kind(), ErrorKind::MalformedInput);
    }

    #[test]
    fn test_corrupt_payloads_classified() {
        // out-of-alphabet symbol
        let err = WaCodec::new().decode("!????").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CorruptData);

        // valid symbols, broken deflate stream
        let err = WaCodec::new().decode("!abcd").unwrap_err();
        assert!(matches!(err, DecodeError::Inflate(_)));
        assert_eq!(err.kind(), ErrorKind::CorruptData);
    }

    #[test]
    fn test_ceiling_boundary() {
        let codec = WaCodec::new();
        let payload = "x".repeat(50_000);
        let encoded = codec.encode_text(&payload).unwrap();

        let err = codec.decode_bounded(&encoded, Some(49_999)).unwrap_err();
        assert_eq!(err, DecodeError::DecompressedTooLarge { max: 49_999 });
        assert_eq!(err.kind(), ErrorKind::DecompressedTooLarge);

        // exactly at the ceiling succeeds
        assert_eq!(
            codec.decode_bounded(&encoded, Some(50_000)).unwrap(),
            Payload::Text(payload.clone())
        );
        assert_eq!(
            codec.decode_bounded(&encoded, None).unwrap(),
            Payload::Text(payload)
        );
    }

    #[test]
    fn test_configured_ceiling_applies_to_plain_decode() {
        let codec = WaCodec::with_config(CodecConfig {
            default_max_decompressed: Some(1024),
            ..CodecConfig::new()
        });
        let encoded = codec.encode_text(&"y".repeat(4096)).unwrap();
        assert_eq!(
            codec.decode(&encoded).unwrap_err(),
            DecodeError::DecompressedTooLarge { max: 1024 }
        );
    }

    #[test]
    fn test_trailing_whitespace_tolerated() {
        let codec = WaCodec::new();
        let encoded = codec.encode(&json!([1, 2]), None).unwrap();
        let pasted = format!("{encoded}  \n");
        assert_eq!(codec.decode_value(&pasted).unwrap(), json!([1, 2]));
    }

    #[test]
    fn test_strategy_failure_classified() {
        let codec = WaCodec::new();
        // valid v1 transport around a payload that is not Ace data
        let encoded = codec.encode_text("definitely not ace").unwrap();
        let err = codec.decode_value(&encoded).unwrap_err();
        assert!(matches!(err, DecodeError::Deserialize(_)));
        assert_eq!(err.kind(), ErrorKind::SerializationFailure);
    }

    #[tokio::test]
    async fn test_async_matches_sync() {
        let codec = WaCodec::new();
        let value = json!({"name": "aura", "ids": [1, 2, 3]});

        let sync_encoded = codec.encode(&value, None).unwrap();
        let async_encoded = codec.encode_async(value.clone(), None).await.unwrap();
        assert_eq!(sync_encoded, async_encoded);

        let sync_decoded = codec.decode_value(&sync_encoded).unwrap();
        let async_decoded = codec.decode_value_async(sync_encoded.clone()).await.unwrap();
        assert_eq!(sync_decoded, async_decoded);
        assert_eq!(sync_decoded, value);

        // errors classify identically through the async surface
        let err = codec.decode_async("nope".to_owned()).await.unwrap_err();
        assert_eq!(err, DecodeError::UnknownFormat);
    }

    #[tokio::test]
    async fn test_async_text_round_trip() {
        let codec = WaCodec::new();
        let encoded = codec.encode_text_async("hello async".to_owned()).await.unwrap();
        assert_eq!(
            codec.decode_async(encoded).await.unwrap(),
            Payload::Text("hello async".to_owned())
        );
    }

    #[tokio::test]
    async fn test_async_bounded_ceiling() {
        let codec = WaCodec::new();
        let encoded = codec.encode_text(&"z".repeat(10_000)).unwrap();
        let err = codec
            .decode_bounded_async(encoded, Some(512))
            .await
            .unwrap_err();
        assert_eq!(err, DecodeError::DecompressedTooLarge { max: 512 });
    }

    #[test]
    fn test_free_functions_use_defaults() {
        let value = json!({"free": [1, 2]});
        let encoded = encode(&value).unwrap();
        assert!(encoded.starts_with("!WA:2!"));
        assert_eq!(decode_value(&encoded).unwrap(), value);
        assert!(matches!(decode(&encoded).unwrap(), Payload::Value(_)));
    }
}
