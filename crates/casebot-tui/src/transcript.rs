//! Turn conversation messages into styled terminal lines.
//!
//! Assistant answers go through the markdown renderer and are drawn from the
//! resulting node tree; user text is shown verbatim. Drawn messages are kept
//! between frames and only redrawn when they change.

use casebot_core::render::highlight::{highlight, theme_background, HighlightedSpan};
use casebot_core::render::{plain_text, render, HeadingLevel, Table};
use casebot_core::{ContentNode, FencedCode, Message, Role};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};

const CODE_FG: Color = Color::White;
const CODE_BG: Color = Color::Black;

pub struct TranscriptOptions<'a> {
    pub theme: &'a str,
    pub selected_block: Option<usize>,
    pub animation_frame: u8,
}

struct DrawnMessage {
    message: Message,
    /// Transcript-wide index of this message's first code block
    first_block: usize,
    /// Selected block, relative to `first_block`, when this was drawn
    selected: Option<usize>,
    lines: Vec<Line<'static>>,
    blocks: Vec<FencedCode>,
}

impl DrawnMessage {
    fn selection_in(&self, selected_block: Option<usize>) -> Option<usize> {
        selected_block
            .and_then(|i| i.checked_sub(self.first_block))
            .filter(|i| *i < self.blocks.len())
    }
}

#[derive(Default)]
pub struct Transcript {
    theme: String,
    drawn: Vec<DrawnMessage>,
}

impl Transcript {
    /// Bring the drawn lines up to date with `messages`
    pub fn refresh(&mut self, messages: &[Message], options: &TranscriptOptions) {
        if self.theme != options.theme {
            self.drawn.clear();
            self.theme = options.theme.to_string();
        }
        self.drawn.truncate(messages.len());

        let mut next_block = 0;
        for (i, message) in messages.iter().enumerate() {
            let reusable = self.drawn.get(i).is_some_and(|drawn| {
                !message.is_thinking()
                    && drawn.message == *message
                    && drawn.first_block == next_block
                    && drawn.selected == drawn.selection_in(options.selected_block)
            });
            if !reusable {
                let drawn = draw_message(message, next_block, options);
                if i < self.drawn.len() {
                    self.drawn[i] = drawn;
                } else {
                    self.drawn.push(drawn);
                }
            }
            next_block += self.drawn[i].blocks.len();
        }
    }

    /// Every drawn line, borrowed for one frame
    pub fn text(&self) -> Text<'_> {
        let lines: Vec<Line<'_>> = self
            .drawn
            .iter()
            .flat_map(|drawn| drawn.lines.iter())
            .map(|line| {
                let spans: Vec<Span<'_>> = line
                    .spans
                    .iter()
                    .map(|span| Span::styled(span.content.as_ref(), span.style))
                    .collect();
                Line::from(spans).style(line.style)
            })
            .collect();
        Text::from(lines)
    }

    /// Fenced blocks of settled answers, in transcript order
    pub fn code_block(&self, index: usize) -> Option<&FencedCode> {
        self.drawn.iter().flat_map(|drawn| drawn.blocks.iter()).nth(index)
    }

    pub fn block_count(&self) -> usize {
        self.drawn.iter().map(|drawn| drawn.blocks.len()).sum()
    }
}

fn draw_message(message: &Message, first_block: usize, options: &TranscriptOptions) -> DrawnMessage {
    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut blocks = Vec::new();

    match message.role() {
        Role::User => {
            lines.push(Line::from(Span::styled(
                "You:",
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )));
            for line in message.content_str().lines() {
                lines.push(Line::from(line.to_string()));
            }
        }
        Role::Assistant => {
            lines.push(Line::from(Span::styled(
                "AI:",
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            )));
            if message.is_thinking() {
                // Animated ellipsis: cycles through ".", "..", "..."
                let dots = ".".repeat(options.animation_frame as usize % 3 + 1);
                lines.push(Line::from(Span::styled(
                    format!("Thinking{dots}"),
                    Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
                )));
            } else if message.is_error {
                for line in message.content_str().lines() {
                    lines.push(Line::from(Span::styled(
                        line.to_string(),
                        Style::default().fg(Color::Red),
                    )));
                }
            } else {
                let nodes = render(message.content_str());
                let mut writer = LineWriter::new(options, first_block);
                writer.blocks(&nodes);
                blocks = std::mem::take(&mut writer.drawn_blocks);
                lines.extend(writer.finish());
            }
        }
    }
    lines.push(Line::default());

    let mut drawn = DrawnMessage {
        message: message.clone(),
        first_block,
        selected: None,
        lines,
        blocks,
    };
    drawn.selected = drawn.selection_in(options.selected_block);
    drawn
}

struct LineWriter<'a> {
    lines: Vec<Line<'static>>,
    current: Vec<Span<'static>>,
    /// Indentation and quote bars for the lines being written
    prefixes: Vec<String>,
    /// List marker replacing the innermost prefix on the item's first line
    marker: Option<String>,
    theme: &'a str,
    selected_block: Option<usize>,
    next_block: usize,
    drawn_blocks: Vec<FencedCode>,
}

impl<'a> LineWriter<'a> {
    fn new(options: &TranscriptOptions<'a>, first_block: usize) -> Self {
        Self {
            lines: Vec::new(),
            current: Vec::new(),
            prefixes: Vec::new(),
            marker: None,
            theme: options.theme,
            selected_block: options.selected_block,
            next_block: first_block,
            drawn_blocks: Vec::new(),
        }
    }

    fn finish(mut self) -> Vec<Line<'static>> {
        self.flush();
        self.lines
    }

    fn prefix_span(&mut self) -> Option<Span<'static>> {
        if self.prefixes.is_empty() {
            return None;
        }
        let prefix = match self.marker.take() {
            Some(marker) => {
                let outer = &self.prefixes[..self.prefixes.len() - 1];
                format!("{}{marker}", outer.concat())
            }
            None => self.prefixes.concat(),
        };
        Some(Span::styled(prefix, Style::default().fg(Color::DarkGray)))
    }

    fn push_line(&mut self, spans: Vec<Span<'static>>) {
        let mut line = Vec::with_capacity(spans.len() + 1);
        line.extend(self.prefix_span());
        line.extend(spans);
        self.lines.push(Line::from(line));
    }

    /// End the current line if it has content
    fn flush(&mut self) {
        if !self.current.is_empty() {
            let spans = std::mem::take(&mut self.current);
            self.push_line(spans);
        }
    }

    fn is_block(node: &ContentNode) -> bool {
        matches!(
            node,
            ContentNode::Paragraph(_)
                | ContentNode::Heading { .. }
                | ContentNode::List { .. }
                | ContentNode::ListItem { .. }
                | ContentNode::CodeBlock(_)
                | ContentNode::BlockQuote(_)
                | ContentNode::Table(_)
                | ContentNode::Rule
        ) || matches!(node, ContentNode::InlineCode(code) if code.contains('\n'))
    }

    /// Top-level flow: blocks are separated by a blank line, inline runs share a line
    fn blocks(&mut self, nodes: &[ContentNode]) {
        let mut previous_was_block = false;
        for (i, node) in nodes.iter().enumerate() {
            let is_block = Self::is_block(node);
            if is_block && i > 0 {
                self.flush();
                if self.prefixes.is_empty() {
                    self.lines.push(Line::default());
                }
            } else if !is_block && previous_was_block && self.prefixes.is_empty() {
                self.lines.push(Line::default());
            }
            self.node(node, Style::default());
            previous_was_block = is_block;
        }
    }

    /// Nested flow inside list items and quotes: no blank separators
    fn nested(&mut self, nodes: &[ContentNode]) {
        for node in nodes {
            if Self::is_block(node) {
                self.flush();
            }
            self.node(node, Style::default());
        }
    }

    fn inline(&mut self, nodes: &[ContentNode], style: Style) {
        for node in nodes {
            self.node(node, style);
        }
    }

    fn node(&mut self, node: &ContentNode, style: Style) {
        match node {
            ContentNode::Paragraph(children) => {
                self.inline(children, style);
                self.flush();
            }
            ContentNode::Heading { level, children } => {
                let heading = match level {
                    HeadingLevel::One => style
                        .fg(Color::Magenta)
                        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED),
                    HeadingLevel::Two => style.fg(Color::Magenta).add_modifier(Modifier::BOLD),
                };
                self.inline(children, heading);
                self.flush();
            }
            ContentNode::Strong(children) => self.inline(children, style.add_modifier(Modifier::BOLD)),
            ContentNode::Emphasis(children) => {
                self.inline(children, style.add_modifier(Modifier::ITALIC))
            }
            ContentNode::Strikethrough(children) => {
                self.inline(children, style.add_modifier(Modifier::CROSSED_OUT))
            }
            ContentNode::List { start, items } => {
                self.flush();
                let mut number = start.unwrap_or(1);
                for item in items {
                    let marker = match start {
                        Some(_) => format!("{number}. "),
                        None => "• ".to_string(),
                    };
                    number += 1;
                    self.list_item(item, marker);
                }
            }
            ContentNode::ListItem { .. } => self.list_item(node, "• ".to_string()),
            ContentNode::Link(link) => {
                let link_style = style.fg(Color::Blue).add_modifier(Modifier::UNDERLINED);
                self.inline(&link.children, link_style);
                if plain_text(&link.children).trim() != link.href {
                    self.current.push(Span::styled(
                        format!(" <{}>", link.href),
                        Style::default().fg(Color::DarkGray),
                    ));
                }
            }
            ContentNode::InlineCode(code) if code.contains('\n') => {
                self.flush();
                let code_style = Style::default().fg(CODE_FG).bg(CODE_BG);
                for line in code.trim_end_matches('\n').lines() {
                    self.push_line(vec![Span::styled(line.to_string(), code_style)]);
                }
            }
            ContentNode::InlineCode(code) => {
                self.current.push(Span::styled(
                    code.clone(),
                    Style::default().fg(CODE_FG).bg(CODE_BG),
                ));
            }
            ContentNode::CodeBlock(code) => {
                self.flush();
                self.code_block(code);
            }
            ContentNode::BlockQuote(children) => {
                self.flush();
                self.prefixes.push("│ ".to_string());
                self.nested(children);
                self.flush();
                self.prefixes.pop();
            }
            ContentNode::Table(table) => {
                self.flush();
                self.table(table);
            }
            ContentNode::Rule => {
                self.flush();
                self.push_line(vec![Span::styled(
                    "─".repeat(40),
                    Style::default().fg(Color::DarkGray),
                )]);
            }
            ContentNode::LineBreak => {
                let spans = std::mem::take(&mut self.current);
                self.push_line(spans);
            }
            ContentNode::Text(text) => self.current.push(Span::styled(text.clone(), style)),
        }
    }

    fn list_item(&mut self, item: &ContentNode, marker: String) {
        let ContentNode::ListItem { checked, children } = item else {
            self.node(item, Style::default());
            return;
        };
        let marker = match checked {
            Some(true) => format!("{marker}[x] "),
            Some(false) => format!("{marker}[ ] "),
            None => marker,
        };
        self.flush();
        self.prefixes.push(" ".repeat(marker.chars().count()));
        self.marker = Some(marker);
        self.nested(children);
        self.flush();
        // An empty item still shows its marker
        if self.marker.is_some() {
            self.push_line(Vec::new());
        }
        self.prefixes.pop();
    }

    fn code_block(&mut self, code: &FencedCode) {
        let index = self.next_block;
        self.next_block += 1;
        self.drawn_blocks.push(code.clone());
        let selected = self.selected_block == Some(index);

        let header_style = if selected {
            Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let hint = if selected { "[y] Copy" } else { "Copy" };
        self.push_line(vec![Span::styled(
            format!("─ {} ─ {} ", code.language, hint),
            header_style,
        )]);

        let bg = theme_background(self.theme)
            .map(|(r, g, b)| Color::Rgb(r, g, b))
            .unwrap_or(CODE_BG);
        match highlight(code, self.theme) {
            Some(highlighted) => {
                for spans in highlighted {
                    let spans = spans.into_iter().map(|span| styled_span(span, bg)).collect();
                    self.push_line(spans);
                }
            }
            None => {
                let plain = Style::default().fg(CODE_FG).bg(CODE_BG);
                for line in code.text.lines() {
                    self.push_line(vec![Span::styled(line.to_string(), plain)]);
                }
            }
        }
    }

    fn table(&mut self, table: &Table) {
        let columns = table
            .rows
            .iter()
            .map(Vec::len)
            .chain(std::iter::once(table.header.len()))
            .max()
            .unwrap_or(0);
        let text = |cells: &[Vec<ContentNode>], col: usize| {
            cells.get(col).map(|cell| plain_text(cell)).unwrap_or_default()
        };
        let widths: Vec<usize> = (0..columns)
            .map(|col| {
                std::iter::once(&table.header)
                    .chain(table.rows.iter())
                    .map(|row| text(row, col).chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let row_spans = |cells: &[Vec<ContentNode>], style: Style| -> Vec<Span<'static>> {
            let mut spans = Vec::new();
            for (col, width) in widths.iter().enumerate() {
                if col > 0 {
                    spans.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
                }
                let cell = text(cells, col);
                let pad = width.saturating_sub(cell.chars().count());
                spans.push(Span::styled(format!("{cell}{}", " ".repeat(pad)), style));
            }
            spans
        };

        if !table.header.is_empty() {
            let header = row_spans(&table.header, Style::default().add_modifier(Modifier::BOLD));
            self.push_line(header);
            let rule = widths
                .iter()
                .map(|w| "─".repeat(*w))
                .collect::<Vec<_>>()
                .join("─┼─");
            self.push_line(vec![Span::styled(rule, Style::default().fg(Color::DarkGray))]);
        }
        for row in &table.rows {
            let spans = row_spans(row, Style::default());
            self.push_line(spans);
        }
    }
}

fn styled_span(span: HighlightedSpan, bg: Color) -> Span<'static> {
    let (r, g, b) = span.fg;
    let mut style = Style::default().fg(Color::Rgb(r, g, b)).bg(bg);
    if span.bold {
        style = style.add_modifier(Modifier::BOLD);
    }
    if span.italic {
        style = style.add_modifier(Modifier::ITALIC);
    }
    if span.underline {
        style = style.add_modifier(Modifier::UNDERLINED);
    }
    Span::styled(span.text, style)
}

#[cfg(test)]
mod tests {
    use super::*;
    use casebot_core::render::highlight::DEFAULT_THEME;
    use casebot_core::RequestId;

    fn options() -> TranscriptOptions<'static> {
        TranscriptOptions {
            theme: DEFAULT_THEME,
            selected_block: None,
            animation_frame: 0,
        }
    }

    fn text_of(lines: &[Line]) -> Vec<String> {
        lines
            .iter()
            .map(|line| line.spans.iter().map(|s| s.content.as_ref()).collect())
            .collect()
    }

    fn build(messages: &[Message], options: &TranscriptOptions) -> Transcript {
        let mut transcript = Transcript::default();
        transcript.refresh(messages, options);
        transcript
    }

    fn draw_lines(markdown: &str) -> Vec<Line<'static>> {
        let mut writer = LineWriter::new(&options(), 0);
        writer.blocks(&render(markdown));
        writer.finish()
    }

    fn draw(markdown: &str) -> Vec<String> {
        text_of(&draw_lines(markdown))
    }

    #[test]
    fn test_roles_and_thinking_indicator() {
        let messages = vec![
            Message::assistant("Hello"),
            Message::user("hi there"),
            Message::thinking(RequestId(1)),
        ];
        let transcript = build(
            &messages,
            &TranscriptOptions {
                animation_frame: 2,
                ..options()
            },
        );
        assert_eq!(
            text_of(&transcript.text().lines),
            vec!["AI:", "Hello", "", "You:", "hi there", "", "AI:", "Thinking...", ""]
        );
    }

    #[test]
    fn test_error_notice_is_red() {
        let transcript = build(&[Message::error_notice("⚠️ failed")], &options());
        let text = transcript.text();
        let line = &text.lines[1];
        assert_eq!(line.spans[0].style.fg, Some(Color::Red));
    }

    #[test]
    fn test_user_text_is_not_markdown() {
        let transcript = build(&[Message::user("**not bold**")], &options());
        assert_eq!(text_of(&transcript.text().lines)[1], "**not bold**");
    }

    #[test]
    fn test_paragraphs_are_separated() {
        assert_eq!(draw("one\n\ntwo"), vec!["one", "", "two"]);
    }

    #[test]
    fn test_soft_break_starts_new_line() {
        assert_eq!(draw("line one\nline two"), vec!["line one", "line two"]);
    }

    #[test]
    fn test_list_markers() {
        assert_eq!(draw("- a\n- b"), vec!["• a", "• b"]);
        assert_eq!(draw("3. x\n4. y"), vec!["3. x", "4. y"]);
        assert_eq!(draw("- [x] done\n- [ ] todo"), vec!["• [x] done", "• [ ] todo"]);
    }

    #[test]
    fn test_nested_list_is_indented() {
        assert_eq!(draw("- a\n  - b"), vec!["• a", "  • b"]);
    }

    #[test]
    fn test_blockquote_has_bar() {
        assert_eq!(draw("> quoted"), vec!["│ quoted"]);
    }

    #[test]
    fn test_link_shows_target() {
        assert_eq!(draw("[case](https://x.test/1)"), vec!["case <https://x.test/1>"]);
        assert_eq!(draw("<https://x.test/1>"), vec!["https://x.test/1"]);
    }

    #[test]
    fn test_strong_heading_stays_inline() {
        assert_eq!(draw("### Note"), vec!["Note"]);
        let lines = draw_lines("### Note");
        assert!(lines[0].spans[0].style.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_consecutive_strong_headings_keep_their_lines() {
        assert_eq!(draw("### Facts\n### Holding"), vec!["Facts", "Holding"]);
    }

    #[test]
    fn test_code_block_header_and_body() {
        let lines = draw("```js\nconsole.log(1)\n```");
        assert_eq!(lines, vec!["─ js ─ Copy ", "console.log(1)"]);
    }

    #[test]
    fn test_selected_code_block_header() {
        let messages = vec![
            Message::assistant("```js\na()\n```"),
            Message::assistant("```py\nb()\n```"),
        ];
        let transcript = build(
            &messages,
            &TranscriptOptions {
                selected_block: Some(1),
                ..options()
            },
        );
        assert_eq!(transcript.block_count(), 2);
        assert_eq!(transcript.code_block(1).map(|b| b.text.as_str()), Some("b()"));
        let text = text_of(&transcript.text().lines);
        assert!(text.contains(&"─ js ─ Copy ".to_string()));
        assert!(text.contains(&"─ py ─ [y] Copy ".to_string()));
    }

    #[test]
    fn test_unknown_language_is_plain_monospace() {
        let lines = draw_lines("```klingon\nqapla'\n```");
        assert_eq!(lines[1].spans[0].style.bg, Some(CODE_BG));
    }

    #[test]
    fn test_table_columns_are_aligned() {
        assert_eq!(
            draw("| a | bb |\n|---|---|\n| ccc | d |"),
            vec!["a   │ bb", "────┼───", "ccc │ d "]
        );
    }

    #[test]
    fn test_refresh_redraws_only_changed_messages() {
        let mut transcript = Transcript::default();
        let mut messages = vec![Message::assistant("```js\na()\n```"), Message::user("q")];
        transcript.refresh(&messages, &options());
        let first = transcript.drawn[0].lines.as_ptr();

        messages.push(Message::thinking(RequestId(1)));
        transcript.refresh(&messages, &options());
        assert_eq!(transcript.drawn[0].lines.as_ptr(), first);

        messages[2] = Message::assistant("```py\nb()\n```");
        transcript.refresh(&messages, &options());
        assert_eq!(transcript.drawn[0].lines.as_ptr(), first);
        assert_eq!(transcript.block_count(), 2);
        assert_eq!(text_of(&transcript.text().lines)[8], "─ py ─ Copy ");
    }

    #[test]
    fn test_selection_change_redraws_affected_messages() {
        let mut transcript = Transcript::default();
        let messages = vec![
            Message::assistant("```js\na()\n```"),
            Message::assistant("```py\nb()\n```"),
        ];
        transcript.refresh(&messages, &options());
        transcript.refresh(
            &messages,
            &TranscriptOptions {
                selected_block: Some(0),
                ..options()
            },
        );
        let text = text_of(&transcript.text().lines);
        assert!(text.contains(&"─ js ─ [y] Copy ".to_string()));
        assert!(text.contains(&"─ py ─ Copy ".to_string()));
    }
}
