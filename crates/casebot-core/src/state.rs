//! UI-agnostic conversation state types
//!
//! These are shared between front ends (terminal UI, browser shells, tests)
//! and don't depend on any specific UI framework.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Who produced a message. Fixed when the message is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Transient status of an assistant message that has no content yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Thinking,
}

/// Sequence number attached to every placeholder so a late answer can be
/// matched against the placeholder it was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A single entry in the transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Set on placeholders only; cleared together with `status`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    /// The content is an error notice standing in for an answer.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            status: None,
            request_id: None,
            is_error: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(content.into()),
            status: None,
            request_id: None,
            is_error: false,
        }
    }

    /// An assistant message announcing a failure in place of an answer
    pub fn error_notice(content: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::assistant(content)
        }
    }

    /// The pending assistant entry shown while a query is in flight
    pub fn thinking(request_id: RequestId) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            status: Some(Status::Thinking),
            request_id: Some(request_id),
            is_error: false,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_thinking(&self) -> bool {
        self.status == Some(Status::Thinking)
    }

    pub fn content_str(&self) -> &str {
        self.content.as_deref().unwrap_or_default()
    }
}
