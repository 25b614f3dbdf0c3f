//! The query boundary: what the conversation sends out and what comes back.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::QueryError;
use crate::state::{Message, RequestId, Role};

/// One prior turn handed to the backend for multi-turn context
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryTurn {
    pub role: Role,
    pub content: String,
}

/// Body of a query. `question` is the newest user text; `history` holds the
/// settled turns before it, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

impl QueryRequest {
    /// Build a request from the transcript as it stood before `question` was
    /// appended. Placeholders and error notices carry no context and are skipped.
    pub fn from_transcript(question: &str, transcript: &[Message]) -> Self {
        let history = transcript
            .iter()
            .filter(|msg| !msg.is_thinking() && !msg.is_error)
            .filter_map(|msg| {
                msg.content.as_ref().map(|content| HistoryTurn {
                    role: msg.role(),
                    content: content.clone(),
                })
            })
            .collect();

        Self {
            question: question.to_string(),
            history,
        }
    }
}

/// A query issued by the conversation, waiting to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingQuery {
    pub id: RequestId,
    pub request: QueryRequest,
}

/// The outcome of a query, addressed to the placeholder it was issued for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub id: RequestId,
    pub outcome: Result<String, QueryError>,
}

/// Anything that can turn a question into an answer
pub trait QueryBackend: Send + Sync {
    fn query(
        &self,
        request: &QueryRequest,
    ) -> impl Future<Output = Result<String, QueryError>> + Send;
}

impl<B: QueryBackend> QueryBackend for Arc<B> {
    fn query(
        &self,
        request: &QueryRequest,
    ) -> impl Future<Output = Result<String, QueryError>> + Send {
        (**self).query(request)
    }
}

/// Send a pending query and wait at most `wait` for the answer.
///
/// Never fails: every error, including the timeout, comes back inside the
/// resolution so the placeholder can always be settled.
pub async fn run_query<B: QueryBackend>(backend: &B, pending: PendingQuery, wait: Duration) -> Resolution {
    let PendingQuery { id, request } = pending;
    debug!(request = %id, turns = request.history.len(), "query started");

    let outcome = match tokio::time::timeout(wait, backend.query(&request)).await {
        Ok(result) => result,
        Err(_) => Err(QueryError::Timeout(wait)),
    };

    if let Err(err) = &outcome {
        warn!(request = %id, error = %err, "query failed");
    }

    Resolution { id, outcome }
}
