//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A "codec" (coder/decoder) converts between Rust types and raw bytes.
//! The client and relay only ever see the [`Codec`] trait, so the
//! document format can be swapped without touching either of them.
//!
//! [`JsonCodec`] is the format every relaychat peer speaks today.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `decode` takes `DeserializeOwned` so the result never borrows from the
/// receive buffer, which is dropped right after dispatch.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are not valid for
    /// this format, or don't match the expected type's structure.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// JSON codec using `serde_json`.
///
/// Zero-sized: it carries no configuration, so copies are free.
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}

#[cfg(all(test, feature = "json"))]
mod tests {
    use super::*;
    use crate::MessageEnvelope;

    #[test]
    fn test_json_codec_encodes_wire_field_names() {
        let env = MessageEnvelope::new("alice", "hi");
        let bytes = JsonCodec.encode(&env).unwrap();
        let json = String::from_utf8(bytes).unwrap();
        assert!(json.contains(r#""user":{"name":"alice"}"#));
        assert!(json.contains(r#""text_len":2"#));
        assert!(json.contains(r#""info":0"#));
    }

    #[test]
    fn test_json_codec_decodes_opaque_document() {
        let doc: serde_json::Value =
            JsonCodec.decode(br#"{"anything": [1, 2, 3]}"#).unwrap();
        assert_eq!(doc["anything"][2], 3);
    }

    #[test]
    fn test_decode_garbage_returns_decode_error() {
        let result: Result<serde_json::Value, _> =
            JsonCodec.decode(b"not json {{{");
        assert!(matches!(result.unwrap_err(), ProtocolError::Decode(_)));
    }

    #[test]
    fn test_decode_empty_input_returns_error() {
        let result: Result<MessageEnvelope, _> = JsonCodec.decode(b"");
        assert!(result.is_err());
    }
}
