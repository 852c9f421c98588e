//! Base64 helpers for carrying raw file bytes inside JSON bodies.
//!
//! Use as `#[serde(default, with = "crate::b64::optional")]` on an
//! `Option<Vec<u8>>` field: `Some` encodes as a standard base64 string and a
//! missing or `null` field decodes as `None`.

use base64::{engine::general_purpose::STANDARD, Engine};

pub fn encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn decode(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    STANDARD.decode(input)
}

pub mod optional {
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match value {
            Some(bytes) => serializer.serialize_str(&super::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Option::<String>::deserialize(deserializer)? {
            Some(encoded) => super::decode(&encoded).map(Some).map_err(D::Error::custom),
            None => Ok(None),
        }
    }
}
