use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use casebot_core::{Config, Conversation, CopyAction, Message, PendingQuery};

use crate::transcript::{Transcript, TranscriptOptions};

/// How long a status notice (copy result, refused submit) stays in the footer
pub const NOTICE_TTL: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub text: String,
    pub expires_at: Instant,
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub conversation: Conversation,

    // Composer
    pub input: String,
    pub input_cursor: usize,

    // Transcript viewport (inner size minus borders, written by the ui each frame)
    pub scroll: u16,
    pub chat_height: u16,
    pub chat_width: u16,
    pub total_lines: u16,
    /// Set by the conversation's change hook; cleared by manual scrolling
    pub follow_tail: Arc<AtomicBool>,

    // Animation state
    pub animation_frame: u8,

    /// Drawn messages, kept between frames
    pub transcript: Transcript,
    /// Transcript-wide index of the code block `y` copies
    pub selected_block: Option<usize>,
    pub notice: Option<Notice>,

    pub endpoint: String,
    pub highlight_theme: String,
    pub request_timeout: Duration,

    // Work for the event loop to spawn
    outgoing_queries: Vec<PendingQuery>,
    outgoing_copies: Vec<CopyAction>,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let mut conversation = Conversation::new(config.seed_message().content_str());

        // Keep the newest message in view whenever the transcript changes
        let follow_tail = Arc::new(AtomicBool::new(true));
        let hook_flag = Arc::clone(&follow_tail);
        conversation.subscribe(move |_| hook_flag.store(true, Ordering::Relaxed));

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            conversation,
            input: String::new(),
            input_cursor: 0,
            scroll: 0,
            chat_height: 0,
            chat_width: 0,
            total_lines: 0,
            follow_tail,
            animation_frame: 0,
            transcript: Transcript::default(),
            selected_block: None,
            notice: None,
            endpoint: config.endpoint().to_string(),
            highlight_theme: config.highlight_theme().to_string(),
            request_timeout: config.request_timeout(),
            outgoing_queries: Vec::new(),
            outgoing_copies: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn is_thinking(&self) -> bool {
        self.conversation.is_pending()
    }

    /// Submit the composer text. Refused while a query is pending or the text is blank.
    pub fn submit_input(&mut self) -> bool {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            return false;
        }
        if self.conversation.is_pending() {
            self.set_notice("Still waiting for the previous answer");
            return false;
        }

        self.input.clear();
        self.input_cursor = 0;
        self.animation_frame = 0;
        let pending = self.conversation.submit(&text);
        self.outgoing_queries.push(pending);
        true
    }

    pub fn take_outgoing_queries(&mut self) -> Vec<PendingQuery> {
        std::mem::take(&mut self.outgoing_queries)
    }

    pub fn take_outgoing_copies(&mut self) -> Vec<CopyAction> {
        std::mem::take(&mut self.outgoing_copies)
    }

    /// Redraw whatever changed since the last frame and keep the selection in range
    pub fn refresh_transcript(&mut self) {
        self.transcript.refresh(
            self.conversation.messages(),
            &TranscriptOptions {
                theme: &self.highlight_theme,
                selected_block: self.selected_block,
                animation_frame: self.animation_frame,
            },
        );
        let clamped = match self.transcript.block_count() {
            0 => None,
            count => self.selected_block.map(|i| i.min(count - 1)),
        };
        if clamped != self.selected_block {
            self.selected_block = clamped;
            self.refresh_transcript();
        }
    }

    /// Code blocks of every settled assistant answer
    pub fn block_count(&mut self) -> usize {
        self.refresh_transcript();
        self.transcript.block_count()
    }

    pub fn select_next_block(&mut self) {
        let count = self.block_count();
        if count == 0 {
            self.selected_block = None;
            return;
        }
        self.selected_block = Some(match self.selected_block {
            Some(i) if i + 1 < count => i + 1,
            Some(_) => 0,
            None => count - 1,
        });
    }

    pub fn select_prev_block(&mut self) {
        let count = self.block_count();
        if count == 0 {
            self.selected_block = None;
            return;
        }
        self.selected_block = Some(match self.selected_block {
            Some(0) => count - 1,
            Some(i) => (i - 1).min(count - 1),
            None => count - 1,
        });
    }

    /// Queue a copy of the selected block (or the newest one if none is selected)
    pub fn copy_selected_block(&mut self) {
        let Some(last) = self.block_count().checked_sub(1) else {
            self.set_notice("No code block to copy");
            return;
        };
        let index = self.selected_block.unwrap_or(last).min(last);
        self.selected_block = Some(index);
        if let Some(block) = self.transcript.code_block(index) {
            self.outgoing_copies.push(block.copy_action());
        }
    }

    pub fn set_notice(&mut self, text: impl Into<String>) {
        self.notice = Some(Notice {
            text: text.into(),
            expires_at: Instant::now() + NOTICE_TTL,
        });
    }

    pub fn tick_animation(&mut self) {
        if self.is_thinking() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
        if self.notice.as_ref().is_some_and(|n| n.expires_at <= Instant::now()) {
            self.notice = None;
        }
    }

    /// Ticks only need a redraw while something on screen is animating or expiring
    pub fn needs_tick_redraw(&self) -> bool {
        self.is_thinking() || self.notice.is_some()
    }

    fn max_scroll(&self) -> u16 {
        self.total_lines.saturating_sub(self.chat_height)
    }

    pub fn is_following(&self) -> bool {
        self.follow_tail.load(Ordering::Relaxed)
    }

    /// Called by the ui once the transcript height is known
    pub fn settle_scroll(&mut self) {
        if self.is_following() {
            self.scroll = self.max_scroll();
        } else {
            self.scroll = self.scroll.min(self.max_scroll());
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.follow_tail.store(false, Ordering::Relaxed);
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll());
        // Reaching the bottom re-pins the view
        if self.scroll >= self.max_scroll() {
            self.follow_tail.store(true, Ordering::Relaxed);
        }
    }

    pub fn scroll_to_top(&mut self) {
        self.follow_tail.store(false, Ordering::Relaxed);
        self.scroll = 0;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail.store(true, Ordering::Relaxed);
        self.scroll = self.max_scroll();
    }

    pub fn page_size(&self) -> u16 {
        self.chat_height.saturating_sub(1).max(1)
    }
}
