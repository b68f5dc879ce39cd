// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed inbound events.
//!
//! Each known envelope type has a payload schema that is validated when the
//! envelope is decoded. Types without a schema decode to [`Event::Other`] so
//! new server-side events never break older clients.

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::{Error, Result};

/// The kind of an event, i.e. the envelope `type` field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    NewBettingCode,
    CodeVerified,
    ChatMessage,
    UserTyping,
    SystemError,
    Error,
    /// Any type this client has no schema for.
    Other(String),
}

impl EventKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::NewBettingCode => "NEW_BETTING_CODE",
            EventKind::CodeVerified => "CODE_VERIFIED",
            EventKind::ChatMessage => "CHAT_MESSAGE",
            EventKind::UserTyping => "USER_TYPING",
            EventKind::SystemError => "SYSTEM_ERROR",
            EventKind::Error => "ERROR",
            EventKind::Other(kind) => kind,
        }
    }
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s {
            "NEW_BETTING_CODE" => EventKind::NewBettingCode,
            "CODE_VERIFIED" => EventKind::CodeVerified,
            "CHAT_MESSAGE" => EventKind::ChatMessage,
            "USER_TYPING" => EventKind::UserTyping,
            "SYSTEM_ERROR" => EventKind::SystemError,
            "ERROR" => EventKind::Error,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier of a backend record. The backend sends numeric ids, the admin
/// UI sends them back as strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordId {
    Num(i64),
    Text(String),
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Num(n) => write!(f, "{n}"),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

/// A user submitted a new betting code for verification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewBettingCode {
    pub id: RecordId,
    pub user_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookmaker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odds: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stake: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub potential_winnings: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A betting code received a verification outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeVerified {
    pub code_id: RecordId,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winnings: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A chat message in a code's conversation.
///
/// Both the backend's snake_case and the admin UI's camelCase field names
/// are accepted.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default, alias = "codeId", skip_serializing_if = "Option::is_none")]
    pub code_id: Option<RecordId>,
    #[serde(default, alias = "userId", skip_serializing_if = "Option::is_none")]
    pub user_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    #[serde(default, alias = "userName", skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "adminId", skip_serializing_if = "Option::is_none")]
    pub admin_id: Option<RecordId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ChatMessage {
    /// The message body, whichever field carried it.
    pub fn body(&self) -> Option<&str> {
        self.message.as_deref().or(self.text.as_deref())
    }
}

/// A user started or stopped typing in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserTyping {
    #[serde(alias = "userId")]
    pub user_id: RecordId,
    #[serde(default, alias = "codeId", skip_serializing_if = "Option::is_none")]
    pub code_id: Option<RecordId>,
    #[serde(default = "default_is_typing", alias = "isTyping")]
    pub is_typing: bool,
}

fn default_is_typing() -> bool {
    true
}

/// A server-side error pushed to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// A decoded inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    NewBettingCode(NewBettingCode),
    CodeVerified(CodeVerified),
    ChatMessage(ChatMessage),
    UserTyping(UserTyping),
    SystemError(SystemError),
    Error(SystemError),
    /// An event type without a schema; the raw data is kept as-is.
    Other { kind: String, data: Value },
}

impl Event {
    /// Decodes an envelope, validating its payload against the kind's schema.
    pub fn decode(envelope: &Envelope) -> Result<Self> {
        let event = match EventKind::from(envelope.kind()) {
            EventKind::NewBettingCode => Event::NewBettingCode(payload(envelope)?),
            EventKind::CodeVerified => Event::CodeVerified(payload(envelope)?),
            EventKind::ChatMessage => Event::ChatMessage(payload(envelope)?),
            EventKind::UserTyping => Event::UserTyping(payload(envelope)?),
            EventKind::SystemError => Event::SystemError(payload(envelope)?),
            EventKind::Error => Event::Error(payload(envelope)?),
            EventKind::Other(kind) => Event::Other {
                kind,
                data: envelope.data().clone(),
            },
        };
        Ok(event)
    }

    /// Decodes a raw text frame in one step.
    pub fn from_json(frame: &str) -> Result<Self> {
        Self::decode(&Envelope::from_json(frame)?)
    }

    /// The kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Event::NewBettingCode(_) => EventKind::NewBettingCode,
            Event::CodeVerified(_) => EventKind::CodeVerified,
            Event::ChatMessage(_) => EventKind::ChatMessage,
            Event::UserTyping(_) => EventKind::UserTyping,
            Event::SystemError(_) => EventKind::SystemError,
            Event::Error(_) => EventKind::Error,
            Event::Other { kind, .. } => EventKind::Other(kind.clone()),
        }
    }

    /// Re-encodes the event as an envelope.
    pub fn to_envelope(&self) -> Result<Envelope> {
        let data = match self {
            Event::NewBettingCode(p) => serde_json::to_value(p)?,
            Event::CodeVerified(p) => serde_json::to_value(p)?,
            Event::ChatMessage(p) => serde_json::to_value(p)?,
            Event::UserTyping(p) => serde_json::to_value(p)?,
            Event::SystemError(p) | Event::Error(p) => serde_json::to_value(p)?,
            Event::Other { data, .. } => data.clone(),
        };
        Envelope::new(self.kind().as_str(), data)
    }

    /// The operator-facing notice for this event, if it warrants one.
    ///
    /// Chat messages sent by `operator` themselves (echoes) produce no notice.
    pub fn notice(&self, operator: &str) -> Option<Notice> {
        match self {
            Event::NewBettingCode(code) => Some(Notice::info(format!(
                "New betting code from {}",
                code.user_name
            ))),
            Event::CodeVerified(v) => Some(Notice::success(format!(
                "Code {} verified as {}",
                v.code_id, v.status
            ))),
            Event::ChatMessage(chat) if chat.sender.as_deref() != Some(operator) => {
                let from = chat.user_name.as_deref().unwrap_or("unknown");
                Some(Notice::info(format!("New message from user: {from}")))
            }
            Event::SystemError(err) => Some(Notice::error(err.message.clone())),
            _ => None,
        }
    }
}

fn payload<T: DeserializeOwned>(envelope: &Envelope) -> Result<T> {
    serde_json::from_value(envelope.data().clone()).map_err(|e| Error::Decode {
        kind: envelope.kind().to_string(),
        reason: e.to_string(),
    })
}

/// Severity of an operator notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Success,
    Error,
}

/// A short user-visible notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub fn info(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Info,
            text: text.into(),
        }
    }

    pub fn success(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Notice {
            level: NoticeLevel::Error,
            text: text.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Info => "info",
            NoticeLevel::Success => "ok",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.text)
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
