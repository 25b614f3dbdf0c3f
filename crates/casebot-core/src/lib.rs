pub mod ai;
pub mod clipboard;
pub mod config;
pub mod conversation;
pub mod error;
pub mod render;
pub mod state;

// Re-export main types for convenience
pub use ai::{run_query, AnswerClient, HistoryTurn, PendingQuery, QueryBackend, QueryRequest, Resolution};
pub use clipboard::{
    ArboardClipboard, ClipboardSink, CopyAction, CopyOutcome, Fallback, Osc52, SystemClipboard,
};
pub use config::Config;
pub use conversation::{Conversation, SubscriptionId};
pub use error::{ClipboardError, QueryError};
pub use render::{render, ContentNode, FencedCode, Link};
pub use state::{Message, RequestId, Role, Status};
