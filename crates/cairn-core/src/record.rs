//! Record codec
//!
//! Every value stored in a named store is one buffer:
//!
//! ```text
//! +----------------+------------------------+------------------------+
//! | N: u64 (BE)    | N bytes of UTF-8 JSON  | attachment (remaining) |
//! +----------------+------------------------+------------------------+
//! 0                8                        8+N                      len
//! ```
//!
//! The attachment has no framing of its own: it is whatever follows the
//! JSON text. A record without an attachment is exactly `8 + N` bytes long,
//! so an empty attachment and no attachment encode identically.

use crate::error::{CairnError, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Width of the length header in bytes
pub const HEADER_LEN: usize = 8;

/// A decoded record: a JSON value plus an optional opaque attachment
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub value: Value,
    pub attachment: Option<Vec<u8>>,
}

impl Record {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            attachment: None,
        }
    }

    /// Build a record with an attachment. An empty attachment is stored as none.
    pub fn with_attachment(value: Value, attachment: impl Into<Vec<u8>>) -> Self {
        let attachment = attachment.into();
        Self {
            value,
            attachment: (!attachment.is_empty()).then_some(attachment),
        }
    }

    /// Build a record from any serde-serializable value
    pub fn from_serialize<T: Serialize + ?Sized>(
        value: &T,
        attachment: Option<&[u8]>,
    ) -> Result<Self> {
        let value =
            serde_json::to_value(value).map_err(|e| CairnError::Serialization(e.to_string()))?;
        Ok(match attachment {
            Some(bytes) => Self::with_attachment(value, bytes),
            None => Self::new(value),
        })
    }

    /// Deserialize the JSON value into a concrete type
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| CairnError::CorruptRecord(e.to_string()))
    }

    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        encode(&self.value, self.attachment.as_deref())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        decode(bytes)
    }
}

/// Encode a value and optional attachment into one record buffer
pub fn encode(value: &Value, attachment: Option<&[u8]>) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(value).map_err(|e| CairnError::Serialization(e.to_string()))?;
    let attachment = attachment.unwrap_or_default();

    let mut buf = Vec::with_capacity(HEADER_LEN + json.len() + attachment.len());
    buf.extend_from_slice(&(json.len() as u64).to_be_bytes());
    buf.extend_from_slice(&json);
    buf.extend_from_slice(attachment);
    Ok(buf)
}

/// Decode a record buffer produced by [`encode`]
pub fn decode(bytes: &[u8]) -> Result<Record> {
    let (json, rest) = split(bytes)?;
    let value: Value =
        serde_json::from_slice(json).map_err(|e| CairnError::CorruptRecord(e.to_string()))?;

    Ok(Record {
        value,
        attachment: (!rest.is_empty()).then(|| rest.to_vec()),
    })
}

/// Split a record buffer into its JSON slice and attachment slice without parsing
pub fn split(bytes: &[u8]) -> Result<(&[u8], &[u8])> {
    if bytes.len() < HEADER_LEN {
        return Err(CairnError::CorruptRecord(format!(
            "record is {} bytes, shorter than the {}-byte header",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let mut header = [0u8; HEADER_LEN];
    header.copy_from_slice(&bytes[..HEADER_LEN]);
    let json_len = u64::from_be_bytes(header);

    let body = &bytes[HEADER_LEN..];
    let json_len = usize::try_from(json_len)
        .ok()
        .filter(|len| *len <= body.len())
        .ok_or_else(|| {
            CairnError::CorruptRecord(format!(
                "header length {} exceeds {} available bytes",
                json_len,
                body.len()
            ))
        })?;

    Ok(body.split_at(json_len))
}
