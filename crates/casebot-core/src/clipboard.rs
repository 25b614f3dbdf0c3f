//! Clipboard boundary for the copy action on fenced code blocks.
//!
//! Provides clipboard access with two transports:
//! 1. System clipboard via the `arboard` crate
//! 2. OSC 52 - terminal clipboard escape sequence (works over SSH), used only
//!    when the system clipboard is unavailable

use std::io::{Stderr, Write};
use tracing::{debug, warn};

use crate::error::ClipboardError;

/// Destination for copied text
pub trait ClipboardSink {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError>;
}

/// The platform clipboard through `arboard`.
///
/// The handle is opened on first use and kept for the life of the sink: on
/// X11 and Wayland the contents are served by the process that set them and
/// vanish once the handle is dropped.
#[derive(Default)]
pub struct ArboardClipboard {
    handle: Option<arboard::Clipboard>,
}

impl ClipboardSink for ArboardClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        let handle = match &mut self.handle {
            Some(handle) => handle,
            None => {
                let opened = arboard::Clipboard::new()
                    .map_err(|e| ClipboardError::System(e.to_string()))?;
                self.handle.insert(opened)
            }
        };

        handle
            .set_text(text)
            .map_err(|e| ClipboardError::System(e.to_string()))
    }
}

/// OSC 52 escape sequence written to the terminal's stream; the terminal
/// intercepts it and places the payload on the system clipboard.
pub struct Osc52<W: Write> {
    out: W,
}

impl<W: Write> Osc52<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ClipboardSink for Osc52<W> {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        use base64::Engine;

        let encoded = base64::engine::general_purpose::STANDARD.encode(text);

        // ESC ] 52 ; c ; <base64-data> ESC \   ('c' = system clipboard)
        // One write so a concurrent redraw cannot split the sequence
        let sequence = format!("\x1b]52;c;{encoded}\x1b\\");
        self.out
            .write_all(sequence.as_bytes())
            .map_err(|e| ClipboardError::Osc52(e.to_string()))?;
        self.out.flush().map_err(|e| ClipboardError::Osc52(e.to_string()))?;

        Ok(())
    }
}

/// Try `primary`, and `fallback` only if it fails
pub struct Fallback<P, F> {
    pub primary: P,
    pub fallback: F,
}

impl<P: ClipboardSink, F: ClipboardSink> ClipboardSink for Fallback<P, F> {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        match self.primary.set_text(text) {
            Ok(()) => Ok(()),
            Err(err) => {
                debug!(error = %err, "primary clipboard failed, trying fallback");
                self.fallback.set_text(text)
            }
        }
    }
}

/// The platform clipboard, with OSC 52 on stderr (the terminal UI's stream)
/// when no system clipboard is reachable, e.g. over SSH.
pub struct SystemClipboard(Fallback<ArboardClipboard, Osc52<Stderr>>);

impl SystemClipboard {
    pub fn new() -> Self {
        Self(Fallback {
            primary: ArboardClipboard::default(),
            fallback: Osc52::new(std::io::stderr()),
        })
    }
}

impl Default for SystemClipboard {
    fn default() -> Self {
        Self::new()
    }
}

impl ClipboardSink for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
        self.0.set_text(text)
    }
}

/// The "copy full block text" action attached to a fenced code block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyAction {
    text: String,
}

/// Result of a copy, suitable for a transient notice
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied { chars: usize },
    Failed(String),
}

impl CopyOutcome {
    pub fn notice(&self) -> String {
        match self {
            CopyOutcome::Copied { chars } => format!("Copied {chars} characters"),
            CopyOutcome::Failed(reason) => format!("Copy failed: {reason}"),
        }
    }
}

impl CopyAction {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Place the block text on `sink`. Failures are logged and reported, never raised.
    pub fn perform<S: ClipboardSink + ?Sized>(&self, sink: &mut S) -> CopyOutcome {
        match sink.set_text(&self.text) {
            Ok(()) => {
                debug!(chars = self.text.chars().count(), "code block copied");
                CopyOutcome::Copied {
                    chars: self.text.chars().count(),
                }
            }
            Err(err) => {
                warn!(error = %err, "clipboard write failed");
                CopyOutcome::Failed(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recording(Vec<String>);

    impl ClipboardSink for Recording {
        fn set_text(&mut self, text: &str) -> Result<(), ClipboardError> {
            self.0.push(text.to_string());
            Ok(())
        }
    }

    struct Denied;

    impl ClipboardSink for Denied {
        fn set_text(&mut self, _text: &str) -> Result<(), ClipboardError> {
            Err(ClipboardError::System("permission denied".into()))
        }
    }

    #[test]
    fn test_fallback_only_used_when_primary_fails() {
        let mut sink = Fallback {
            primary: Recording::default(),
            fallback: Recording::default(),
        };
        CopyAction::new("a").perform(&mut sink);
        assert_eq!(sink.primary.0, vec!["a".to_string()]);
        assert!(sink.fallback.0.is_empty());

        let mut sink = Fallback {
            primary: Denied,
            fallback: Recording::default(),
        };
        let outcome = CopyAction::new("b").perform(&mut sink);
        assert_eq!(outcome, CopyOutcome::Copied { chars: 1 });
        assert_eq!(sink.fallback.0, vec!["b".to_string()]);
    }

    #[test]
    fn test_both_transports_failing_is_reported() {
        let mut sink = Fallback {
            primary: Denied,
            fallback: Denied,
        };
        let outcome = CopyAction::new("c").perform(&mut sink);
        assert!(matches!(outcome, CopyOutcome::Failed(_)));
    }

    #[test]
    fn test_osc52_sequence() {
        let mut sink = Osc52::new(Vec::new());
        sink.set_text("hi").unwrap();
        assert_eq!(sink.into_inner(), b"\x1b]52;c;aGk=\x1b\\".to_vec());
    }

    #[test]
    fn test_perform_writes_exact_text() {
        let mut sink = Recording::default();
        let outcome = CopyAction::new("let x = 1;").perform(&mut sink);
        assert_eq!(outcome, CopyOutcome::Copied { chars: 10 });
        assert_eq!(sink.0, vec!["let x = 1;".to_string()]);
    }

    #[test]
    fn test_permission_failure_is_reported_not_raised() {
        let outcome = CopyAction::new("x").perform(&mut Denied);
        assert_eq!(
            outcome,
            CopyOutcome::Failed("system clipboard failed: permission denied".into())
        );
        assert!(outcome.notice().starts_with("Copy failed"));
    }
}
