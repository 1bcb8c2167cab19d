//! Object codec: typed values to opaque record payloads and back.
//!
//! Payloads are JSON. New optional fields must carry `#[serde(default)]` so
//! that records written by older builds keep decoding.

use serde::de::DeserializeOwned;
use serde::Serialize;

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

pub fn decode<T: DeserializeOwned>(payload: &[u8]) -> Result<T, serde_json::Error> {
    serde_json::from_slice(payload)
}
