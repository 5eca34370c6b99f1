//! Wire protocol between participants and the server.
//!
//! Participants send one JSON object per operation. The server answers every applied
//! operation, and every new connection, with the whole document as a JSON array of
//! strings.

use serde::{Deserialize, Deserializer};

use crate::error::DecodeError;

/// An operation as it arrives on the wire.
///
/// Absent or `null` fields take their zero value, so `{"type":"delete"}` deletes at 0.
/// Only syntax errors and wrongly typed fields make a message malformed.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct OperationMessage {
    #[serde(rename = "type", default, deserialize_with = "null_as_default")]
    pub op_type: String,
    /// Client-side timestamp, carried but never interpreted.
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub position: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub value: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A decoded operation ready to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Insert { position: i64, value: String },
    Delete { position: i64 },
    /// Any other `type`; dropped without touching the document.
    Unknown(String),
}

impl OperationMessage {
    /// Parses one raw inbound message.
    pub fn decode(raw: &[u8]) -> Result<Self, DecodeError> {
        let text = std::str::from_utf8(raw)?;
        Ok(serde_json::from_str(text)?)
    }

    pub fn into_operation(self) -> Operation {
        match self.op_type.as_str() {
            "insert" => Operation::Insert {
                position: self.position,
                value: self.value,
            },
            "delete" => Operation::Delete {
                position: self.position,
            },
            _ => Operation::Unknown(self.op_type),
        }
    }
}

/// Encodes a document snapshot for transmission.
pub fn encode_document(values: &[String]) -> Result<String, serde_json::Error> {
    serde_json::to_string(values)
}
