// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Wire envelope codec.
//!
//! Every frame exchanged over the socket is a JSON object of the form
//! `{"type": "<KIND>", "data": {...}}`. The envelope is kept untyped here;
//! [`crate::event::Event`] gives inbound envelopes their typed shape.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{Error, Result};

/// A single `{type, data}` wire unit.
///
/// Envelopes are immutable once constructed. `data` is always a JSON object;
/// a missing or `null` data field decodes as an empty object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEnvelope")]
pub struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    data: Value,
}

/// Unvalidated wire shape, checked in `TryFrom`.
#[derive(Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl TryFrom<RawEnvelope> for Envelope {
    type Error = Error;

    fn try_from(raw: RawEnvelope) -> Result<Self> {
        Envelope::new(raw.kind, raw.data)
    }
}

impl Envelope {
    /// Creates an envelope, rejecting an empty type or non-object data.
    pub fn new(kind: impl Into<String>, data: Value) -> Result<Self> {
        let kind = kind.into();
        if kind.trim().is_empty() {
            return Err(Error::Decode {
                kind: "envelope".to_string(),
                reason: "empty type".to_string(),
            });
        }

        let data = match data {
            Value::Null => Value::Object(Map::new()),
            Value::Object(_) => data,
            other => {
                return Err(Error::Decode {
                    kind,
                    reason: format!("data must be an object, got {}", json_type_name(&other)),
                })
            }
        };

        Ok(Envelope { kind, data })
    }

    /// Builds the outbound chat message an operator sends for a betting code.
    pub fn chat(code_id: &str, user_id: &str, message: &str, admin_id: &str) -> Self {
        Envelope {
            kind: "CHAT_MESSAGE".to_string(),
            data: json!({
                "codeId": code_id,
                "userId": user_id,
                "message": message,
                "adminId": admin_id,
            }),
        }
    }

    /// The envelope type, e.g. `CODE_VERIFIED`.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The envelope payload (always a JSON object).
    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Serializes the envelope to a JSON text frame.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decodes a JSON text frame.
    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
