//! The conversation controller.
//!
//! Owns the ordered transcript and is the only thing that mutates it. Two
//! mutations exist: [`Conversation::submit`] appends a user message plus a
//! thinking placeholder, and [`Conversation::resolve`] replaces that
//! placeholder with the answer (or an error notice). Observers registered with
//! [`Conversation::subscribe`] run synchronously after every mutation.

use std::time::Duration;
use tracing::{debug, info};

use crate::ai::{run_query, PendingQuery, QueryBackend, QueryRequest, Resolution};
use crate::state::{Message, RequestId};

/// Shown in place of a placeholder that a newer question replaced
pub const SUPERSEDED_NOTICE: &str = "⚠️ This question was replaced by a newer one before it was answered.";

type Observer = Box<dyn FnMut(&[Message]) + Send>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

pub struct Conversation {
    messages: Vec<Message>,
    next_request: u64,
    observers: Vec<(SubscriptionId, Observer)>,
    next_subscription: u64,
}

impl Conversation {
    /// Start a conversation seeded with the assistant's greeting
    pub fn new(greeting: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::assistant(greeting)],
            next_request: 1,
            observers: Vec::new(),
            next_subscription: 0,
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Id of the trailing placeholder, if a query is in flight
    pub fn pending_request(&self) -> Option<RequestId> {
        self.messages
            .last()
            .filter(|msg| msg.is_thinking())
            .and_then(|msg| msg.request_id)
    }

    pub fn is_pending(&self) -> bool {
        self.pending_request().is_some()
    }

    /// Register a change hook. It runs after every mutation with the new transcript.
    pub fn subscribe<F>(&mut self, on_change: F) -> SubscriptionId
    where
        F: FnMut(&[Message]) + Send + 'static,
    {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.observers.push((id, Box::new(on_change)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(existing, _)| *existing != id);
        self.observers.len() != before
    }

    /// Optimistically append the user's text and a thinking placeholder.
    ///
    /// The caller is expected to have trimmed and checked `text`. The returned
    /// query carries the placeholder's id; hand it to [`run_query`] and feed the
    /// resolution back through [`Conversation::resolve`].
    pub fn submit(&mut self, text: &str) -> PendingQuery {
        self.supersede_pending();

        let request = QueryRequest::from_transcript(text, &self.messages);
        let id = RequestId(self.next_request);
        self.next_request += 1;

        self.messages.push(Message::user(text));
        self.messages.push(Message::thinking(id));
        info!(request = %id, turns = request.history.len(), "question submitted");

        self.notify();
        PendingQuery { id, request }
    }

    /// Settle the trailing placeholder if `resolution` was issued for it.
    ///
    /// Returns `false` (and leaves the transcript untouched) for resolutions
    /// addressed to a placeholder that is no longer the pending one.
    pub fn resolve(&mut self, resolution: Resolution) -> bool {
        let Resolution { id, outcome } = resolution;

        let Some(last) = self
            .messages
            .last_mut()
            .filter(|msg| msg.is_thinking() && msg.request_id == Some(id))
        else {
            debug!(request = %id, "ignoring stale resolution");
            return false;
        };

        *last = match outcome {
            Ok(answer) => {
                info!(request = %id, chars = answer.chars().count(), "answer received");
                Message::assistant(answer)
            }
            Err(err) => {
                info!(request = %id, error = %err, "question resolved with error notice");
                Message::error_notice(err.notice())
            }
        };

        self.notify();
        true
    }

    /// Submit `text`, wait for the backend, and apply the answer.
    ///
    /// Holds the conversation for the whole round trip, so interactive front
    /// ends should call `submit`/`run_query`/`resolve` separately instead.
    pub async fn ask<B: QueryBackend>(&mut self, backend: &B, text: &str, wait: Duration) -> bool {
        let pending = self.submit(text);
        let resolution = run_query(backend, pending, wait).await;
        self.resolve(resolution)
    }

    /// Settle any placeholder still waiting so at most one exists after the next append.
    fn supersede_pending(&mut self) {
        for msg in self.messages.iter_mut().filter(|msg| msg.is_thinking()) {
            info!(request = ?msg.request_id, "superseding unanswered question");
            *msg = Message::error_notice(SUPERSEDED_NOTICE);
        }
    }

    fn notify(&mut self) {
        for (_, observer) in &mut self.observers {
            observer(&self.messages);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::QueryError;
    use crate::state::Role;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn thinking_count(conv: &Conversation) -> usize {
        conv.messages().iter().filter(|m| m.is_thinking()).count()
    }

    fn ok(id: RequestId, answer: &str) -> Resolution {
        Resolution {
            id,
            outcome: Ok(answer.to_string()),
        }
    }

    #[test]
    fn test_new_has_single_greeting() {
        let conv = Conversation::new("hi there");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].role(), Role::Assistant);
        assert_eq!(conv.messages()[0].content_str(), "hi there");
        assert!(!conv.is_pending());
    }

    #[test]
    fn test_submit_appends_user_and_placeholder() {
        let mut conv = Conversation::new("seed");
        let pending = conv.submit("hello");

        assert_eq!(conv.len(), 3);
        assert_eq!(conv.messages()[1], Message::user("hello"));
        assert_eq!(conv.messages()[2], Message::thinking(pending.id));
        assert_eq!(conv.pending_request(), Some(pending.id));
        assert_eq!(pending.request.question, "hello");
        assert_eq!(pending.request.history.len(), 1);
    }

    #[test]
    fn test_resolve_replaces_placeholder_in_place() {
        let mut conv = Conversation::new("seed");
        let pending = conv.submit("hello");
        assert!(conv.resolve(ok(pending.id, "hi")));

        assert_eq!(
            conv.messages(),
            &[Message::assistant("seed"), Message::user("hello"), Message::assistant("hi")]
        );
        assert!(!conv.is_pending());
    }

    #[test]
    fn test_failed_resolution_becomes_error_notice() {
        let mut conv = Conversation::new("seed");
        let pending = conv.submit("x");
        conv.resolve(Resolution {
            id: pending.id,
            outcome: Err(QueryError::Transport("connection refused".into())),
        });

        let last = conv.messages().last().unwrap();
        assert_eq!(last.role(), Role::Assistant);
        assert!(last.is_error);
        assert!(!last.is_thinking());
        assert!(!last.content_str().is_empty());
    }

    #[test]
    fn test_late_answer_cannot_overwrite_newer_placeholder() {
        let mut conv = Conversation::new("seed");
        let first = conv.submit("one");
        let second = conv.submit("two");

        assert_eq!(thinking_count(&conv), 1);
        assert_eq!(conv.messages()[2].content_str(), SUPERSEDED_NOTICE);

        assert!(!conv.resolve(ok(first.id, "answer to one")));
        assert_eq!(conv.pending_request(), Some(second.id));

        assert!(conv.resolve(ok(second.id, "answer to two")));
        assert_eq!(conv.messages().last().unwrap().content_str(), "answer to two");
    }

    #[test]
    fn test_second_resolution_is_ignored() {
        let mut conv = Conversation::new("seed");
        let pending = conv.submit("q");
        assert!(conv.resolve(ok(pending.id, "a")));
        assert!(!conv.resolve(ok(pending.id, "b")));
        assert_eq!(conv.messages().last().unwrap().content_str(), "a");
    }

    #[test]
    fn test_history_carries_prior_turns() {
        let mut conv = Conversation::new("seed");
        let first = conv.submit("one");
        conv.resolve(ok(first.id, "first answer"));
        let second = conv.submit("two");

        let contents: Vec<&str> = second
            .request
            .history
            .iter()
            .map(|t| t.content.as_str())
            .collect();
        assert_eq!(contents, vec!["seed", "one", "first answer"]);
    }

    #[test]
    fn test_observers_fire_on_every_mutation() {
        let mut conv = Conversation::new("seed");
        let calls = Arc::new(AtomicUsize::new(0));
        let lengths = Arc::new(std::sync::Mutex::new(Vec::new()));

        let counter = Arc::clone(&calls);
        let seen = Arc::clone(&lengths);
        let id = conv.subscribe(move |messages| {
            counter.fetch_add(1, Ordering::SeqCst);
            seen.lock().unwrap().push(messages.len());
        });

        let pending = conv.submit("q");
        conv.resolve(ok(pending.id, "a"));
        conv.resolve(ok(pending.id, "stale"));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(*lengths.lock().unwrap(), vec![3, 3]);

        assert!(conv.unsubscribe(id));
        conv.submit("again");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Submit(String),
        ResolveCurrent(bool),
        ResolveStale,
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            "[a-z ]{1,12}".prop_map(Op::Submit),
            any::<bool>().prop_map(Op::ResolveCurrent),
            Just(Op::ResolveStale),
        ]
    }

    proptest! {
        #[test]
        fn prop_placeholder_invariants_hold(ops in prop::collection::vec(arb_op(), 1..40)) {
            let mut conv = Conversation::new("seed");
            let mut issued: Vec<RequestId> = Vec::new();

            for op in ops {
                let roles_before: Vec<Role> = conv.messages().iter().map(|m| m.role()).collect();
                let len_before = conv.len();

                match op {
                    Op::Submit(text) => {
                        let pending = conv.submit(&text);
                        issued.push(pending.id);
                        prop_assert_eq!(conv.len(), len_before + 2);
                        prop_assert_eq!(thinking_count(&conv), 1);
                        prop_assert!(conv.messages().last().unwrap().is_thinking());
                    }
                    Op::ResolveCurrent(success) => {
                        if let Some(id) = conv.pending_request() {
                            let outcome = if success {
                                Ok("answer".to_string())
                            } else {
                                Err(QueryError::Malformed("bad".into()))
                            };
                            let resolved = conv.resolve(Resolution { id, outcome });
                            prop_assert!(resolved);
                            prop_assert_eq!(conv.len(), len_before);
                            prop_assert_eq!(thinking_count(&conv), 0);
                        }
                    }
                    Op::ResolveStale => {
                        let current = conv.pending_request();
                        let snapshot = conv.messages().to_vec();
                        for id in issued.iter().copied().filter(|id| Some(*id) != current) {
                            prop_assert!(!conv.resolve(ok(id, "late")));
                        }
                        prop_assert_eq!(conv.messages(), snapshot.as_slice());
                    }
                }

                prop_assert!(thinking_count(&conv) <= 1);
                let roles_after: Vec<Role> = conv.messages().iter().map(|m| m.role()).collect();
                prop_assert_eq!(&roles_after[..roles_before.len()], roles_before.as_slice());
            }
        }
    }
}
