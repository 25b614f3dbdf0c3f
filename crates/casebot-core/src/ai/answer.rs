use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use super::backend::{QueryBackend, QueryRequest};
use crate::error::QueryError;

/// Longest slice of an error body kept for logs and errors
const ERROR_BODY_LIMIT: usize = 200;

#[derive(Deserialize)]
struct AnswerResponse {
    answer: String,
}

/// JSON-over-HTTP client for the answering service
#[derive(Clone)]
pub struct AnswerClient {
    client: Client,
    endpoint: String,
}

impl AnswerClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<String, QueryError> {
        debug!(endpoint = %self.endpoint, turns = request.history.len(), "posting query");

        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(ERROR_BODY_LIMIT).collect();
            warn!(status = status.as_u16(), body = %body, "answering service rejected query");
            return Err(QueryError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        parse_answer(&body)
    }
}

impl QueryBackend for AnswerClient {
    async fn query(&self, request: &QueryRequest) -> Result<String, QueryError> {
        AnswerClient::query(self, request).await
    }
}

fn parse_answer(body: &str) -> Result<String, QueryError> {
    serde_json::from_str::<AnswerResponse>(body)
        .map(|response| response.answer)
        .map_err(|e| QueryError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::HistoryTurn;
    use crate::state::Role;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(question: &str) -> QueryRequest {
        QueryRequest {
            question: question.to_string(),
            history: vec![HistoryTurn {
                role: Role::Assistant,
                content: "How can I help?".to_string(),
            }],
        }
    }

    #[test]
    fn test_parse_answer_requires_string_answer() {
        assert_eq!(parse_answer(r#"{"answer":"hi"}"#), Ok("hi".to_string()));
        assert!(matches!(parse_answer(r#"{"reply":"hi"}"#), Err(QueryError::Malformed(_))));
        assert!(matches!(parse_answer(r#"{"answer":null}"#), Err(QueryError::Malformed(_))));
        assert!(matches!(parse_answer("<html>"), Err(QueryError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_query_posts_question_and_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .and(body_json(serde_json::json!({
                "question": "hello",
                "history": [{"role": "assistant", "content": "How can I help?"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"answer": "hi"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = AnswerClient::new(&format!("{}/query", server.uri()));
        let answer = client.query(&request("hello")).await.expect("answer");
        assert_eq!(answer, "hi");
    }

    #[tokio::test]
    async fn test_query_maps_server_error_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&server)
            .await;

        let client = AnswerClient::new(&format!("{}/query", server.uri()));
        let err = client.query(&request("x")).await.unwrap_err();
        assert_eq!(
            err,
            QueryError::Status {
                status: 500,
                body: "internal error".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_query_maps_missing_answer_to_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"detail": "?"})))
            .mount(&server)
            .await;

        let client = AnswerClient::new(&server.uri());
        let err = client.query(&request("x")).await.unwrap_err();
        assert!(matches!(err, QueryError::Malformed(_)), "{err:?}");
    }

    #[tokio::test]
    async fn test_query_unreachable_is_transport_error() {
        // Bind then drop so the port is very likely closed.
        let addr = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };
        let client = AnswerClient::new(&format!("http://{addr}/query"));
        let err = client.query(&request("x")).await.unwrap_err();
        assert!(matches!(err, QueryError::Transport(_)), "{err:?}");
    }
}
