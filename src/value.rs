//! The parameter value codec boundary.
//!
//! Values travel through the mapping as opaque bytes plus an optional type
//! tag. The only thing the mapping ever asks of a codec is whether those
//! bytes decode; what they decode *to* stays on the codec's side.
use std::fmt;

use serde::Deserialize;
use thiserror::Error;

/// Encoded bytes plus the type tag they were written with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
pub struct EncodedValue {
    pub bytes: Vec<u8>,
    #[serde(default)]
    pub type_tag: Option<String>,
}

impl EncodedValue {
    pub fn new(bytes: impl Into<Vec<u8>>, type_tag: Option<&str>) -> Self {
        Self {
            bytes: bytes.into(),
            type_tag: type_tag.map(str::to_string),
        }
    }
    /// Encodes a JSON document the way [`JsonCodec`] expects it.
    pub fn json(value: &serde_json::Value) -> Self {
        let type_tag = match value {
            serde_json::Value::Object(map) => map
                .get("type")
                .and_then(|t| t.as_str())
                .map(str::to_string),
            _ => None,
        };
        Self {
            bytes: value.to_string().into_bytes(),
            type_tag,
        }
    }
    pub(crate) fn from_columns(bytes: Option<Vec<u8>>, type_tag: Option<String>) -> Option<Self> {
        bytes.map(|bytes| Self { bytes, type_tag })
    }
}

impl fmt::Display for EncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.bytes))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("not a valid document: {0}")]
    Malformed(String),
    #[error("type tag '{tagged}' does not match the encoded type '{encoded}'")]
    TypeMismatch { tagged: String, encoded: String },
}

pub trait ValueCodec: Send + Sync {
    fn decode(&self, value: &EncodedValue) -> Result<serde_json::Value, CodecError>;
}

/// Values are JSON documents; structured values carry their type under a
/// `"type"` key which must agree with the type tag when both are given.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn decode(&self, value: &EncodedValue) -> Result<serde_json::Value, CodecError> {
        let decoded: serde_json::Value = serde_json::from_slice(&value.bytes)
            .map_err(|e| CodecError::Malformed(e.to_string()))?;
        if let (Some(tagged), Some(encoded)) = (
            value.type_tag.as_deref(),
            decoded.get("type").and_then(|t| t.as_str()),
        ) {
            if tagged != encoded {
                return Err(CodecError::TypeMismatch {
                    tagged: tagged.to_string(),
                    encoded: encoded.to_string(),
                });
            }
        }
        Ok(decoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_codec_accepts_scalars_and_tagged_maps() {
        let codec = JsonCodec;
        assert_eq!(codec.decode(&EncodedValue::json(&json!(2.5))), Ok(json!(2.5)));
        let map = json!({"type": "map", "data": [["a", 1.0]]});
        assert!(codec.decode(&EncodedValue::json(&map)).is_ok());
    }

    #[test]
    fn json_codec_rejects_garbage_and_mismatched_tags() {
        let codec = JsonCodec;
        let garbage = EncodedValue::new(b"{not json".to_vec(), None);
        assert!(matches!(codec.decode(&garbage), Err(CodecError::Malformed(_))));
        let mismatched = EncodedValue::new(br#"{"type": "map", "data": []}"#.to_vec(), Some("time_series"));
        assert!(matches!(
            codec.decode(&mismatched),
            Err(CodecError::TypeMismatch { .. })
        ));
    }
}
