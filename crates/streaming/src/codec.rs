//! Payload marshalling.
//!
//! Keys, values, entries and arrays of either travel as opaque payload
//! bytes. A codec only has to be symmetric: every node in a cluster must use
//! the same one.

use bytes::Bytes;
use corelib::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Symmetric serializer for message payloads.
pub trait PayloadCodec: Send + Sync + 'static {
    /// Codec name, for logs.
    fn name() -> &'static str;

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes>;

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T>;
}

/// Compact binary codec (default).
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl PayloadCodec for BincodeCodec {
    fn name() -> &'static str {
        "bincode"
    }

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
        bincode::serialize(value)
            .map(Bytes::from)
            .map_err(|e| Error::marshalling("unable to encode payload with bincode", e))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        bincode::deserialize(bytes)
            .map_err(|e| Error::marshalling("unable to decode payload with bincode", e))
    }
}

/// Human-readable JSON codec, handy when sniffing traffic.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl PayloadCodec for JsonCodec {
    fn name() -> &'static str {
        "json"
    }

    fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes> {
        serde_json::to_vec(value)
            .map(Bytes::from)
            .map_err(|e| Error::marshalling("unable to encode payload as JSON", e))
    }

    fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::marshalling("unable to decode JSON payload", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::ErrorKind;

    fn entries_survive<C: PayloadCodec>() {
        let entries = vec![("a".to_string(), 1u64), ("b".to_string(), 2u64)];
        let bytes = C::encode(&entries).unwrap();
        let decoded: Vec<(String, u64)> = C::decode(&bytes).unwrap();
        assert_eq!(decoded, entries, "codec {}", C::name());
    }

    #[test]
    fn test_codecs_preserve_entries() {
        entries_survive::<BincodeCodec>();
        entries_survive::<JsonCodec>();
    }

    #[test]
    fn test_decode_garbage_is_marshalling_failure() {
        let err = BincodeCodec::decode::<String>(&[0xff]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Marshalling);

        let err = JsonCodec::decode::<String>(b"{not json").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Marshalling);
    }

    #[test]
    fn test_missing_value_round_trips() {
        let bytes = BincodeCodec::encode(&Option::<String>::None).unwrap();
        assert_eq!(BincodeCodec::decode::<Option<String>>(&bytes).unwrap(), None);
    }
}
