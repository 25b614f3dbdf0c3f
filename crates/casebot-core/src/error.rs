//! Error types for the query and clipboard boundaries

use std::time::Duration;
use thiserror::Error;

/// Why a query produced no answer. Every variant is recoverable: the
/// conversation turns it into a visible notice instead of an answer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// Network unreachable, connection reset, request could not be sent
    #[error("transport failure: {0}")]
    Transport(String),
    /// The backend answered with a non-success status
    #[error("backend returned status {status}: {body}")]
    Status { status: u16, body: String },
    /// The body was not JSON or had no string `answer` field
    #[error("malformed response: {0}")]
    Malformed(String),
    /// No answer within the configured wait
    #[error("no answer after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl QueryError {
    /// Text shown in the transcript in place of the missing answer
    pub fn notice(&self) -> String {
        let reason = match self {
            QueryError::Transport(_) => "the answering service could not be reached".to_string(),
            QueryError::Status { status, .. } => {
                format!("the answering service returned an error (HTTP {status})")
            }
            QueryError::Malformed(_) => "the answering service sent an unreadable reply".to_string(),
            QueryError::Timeout(after) => {
                format!("the answering service did not respond within {}s", after.as_secs())
            }
        };
        format!("⚠️ Sorry, I couldn't get an answer: {reason}. Please try again.")
    }
}

impl From<reqwest::Error> for QueryError {
    fn from(err: reqwest::Error) -> Self {
        // Connect timeouts land in Transport; the overall wait is enforced by run_query.
        if err.is_decode() {
            QueryError::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            QueryError::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            QueryError::Transport(err.to_string())
        }
    }
}

/// Clipboard operation errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClipboardError {
    /// OSC 52 write failed
    #[error("OSC 52 clipboard failed: {0}")]
    Osc52(String),
    /// System clipboard unavailable or permission denied
    #[error("system clipboard failed: {0}")]
    System(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_notice_is_non_empty_and_marked() {
        let errors = [
            QueryError::Transport("refused".into()),
            QueryError::Status {
                status: 500,
                body: "boom".into(),
            },
            QueryError::Malformed("missing answer".into()),
            QueryError::Timeout(Duration::from_secs(60)),
        ];
        for err in errors {
            let notice = err.notice();
            assert!(notice.starts_with("⚠️"), "{notice}");
            assert!(notice.contains("couldn't get an answer"));
        }
    }

    #[test]
    fn test_status_notice_mentions_code() {
        let err = QueryError::Status {
            status: 502,
            body: String::new(),
        };
        assert!(err.notice().contains("HTTP 502"));
    }
}
