pub mod answer;
pub mod backend;

pub use answer::AnswerClient;
pub use backend::{run_query, HistoryTurn, PendingQuery, QueryBackend, QueryRequest, Resolution};
