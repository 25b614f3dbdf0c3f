//! Markdown to display nodes.
//!
//! [`render`] parses an assistant message with pulldown-cmark and folds the
//! event stream into a tree of [`ContentNode`]s. The output is plain data: no
//! state, no I/O, and the same input always yields the same tree. Front ends
//! walk the tree with one exhaustive match per node kind.

pub mod highlight;
pub mod html;

use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel as MdHeadingLevel, Options, Parser, Tag};

use crate::clipboard::CopyAction;

/// Anchors always open in a new browsing context
pub const LINK_TARGET: &str = "_blank";
/// No referrer leaks and no `window.opener` for the target page
pub const LINK_REL: &str = "noopener noreferrer";

/// Block heading levels. Deeper markdown headings are down-leveled to
/// [`ContentNode::Strong`] to keep the transcript dense.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeadingLevel {
    One,
    Two,
}

impl HeadingLevel {
    pub fn as_u8(self) -> u8 {
        match self {
            HeadingLevel::One => 1,
            HeadingLevel::Two => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentNode {
    Paragraph(Vec<ContentNode>),
    Heading {
        level: HeadingLevel,
        children: Vec<ContentNode>,
    },
    Strong(Vec<ContentNode>),
    Emphasis(Vec<ContentNode>),
    Strikethrough(Vec<ContentNode>),
    /// `start` is `Some` for ordered lists. Children are `ListItem`s.
    List {
        start: Option<u64>,
        items: Vec<ContentNode>,
    },
    ListItem {
        /// Task list checkbox state, if the item has one
        checked: Option<bool>,
        children: Vec<ContentNode>,
    },
    Link(Link),
    InlineCode(String),
    CodeBlock(FencedCode),
    BlockQuote(Vec<ContentNode>),
    Table(Table),
    Rule,
    LineBreak,
    Text(String),
}

/// A hyperlink. The target and rel attributes are fixed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub href: String,
    pub children: Vec<ContentNode>,
    target: &'static str,
    rel: &'static str,
}

impl Link {
    pub fn new(href: impl Into<String>, children: Vec<ContentNode>) -> Self {
        Self {
            href: href.into(),
            children,
            target: LINK_TARGET,
            rel: LINK_REL,
        }
    }

    pub fn target(&self) -> &'static str {
        self.target
    }

    pub fn rel(&self) -> &'static str {
        self.rel
    }
}

/// A language-tagged code block, ready to highlight and copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedCode {
    pub language: String,
    /// Block body with the fence's trailing newline removed
    pub text: String,
    /// Resolved highlighting syntax; `None` means plain monospace
    pub syntax: Option<String>,
}

impl FencedCode {
    pub fn new(language: impl Into<String>, raw: &str) -> Self {
        let language = language.into();
        let syntax = highlight::resolve_syntax(&language).map(|s| s.name.clone());
        Self {
            text: trim_fence_newline(raw).to_string(),
            language,
            syntax,
        }
    }

    pub fn copy_action(&self) -> CopyAction {
        CopyAction::new(self.text.clone())
    }
}

pub type TableCell = Vec<ContentNode>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub header: Vec<TableCell>,
    pub rows: Vec<Vec<TableCell>>,
}

/// Remove exactly one trailing newline, the one the fence convention adds.
pub fn trim_fence_newline(raw: &str) -> &str {
    raw.strip_suffix('\n').unwrap_or(raw)
}

/// Language annotation of a fence info string: the leading word characters
/// of its first word. `"rust ignore"` gives `rust`, `"{.py}"` gives nothing.
pub fn fence_language(info: &str) -> Option<String> {
    let word = info.split_whitespace().next()?;
    let language: String = word
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    (!language.is_empty()).then_some(language)
}

/// Render markdown into display nodes.
pub fn render(markdown: &str) -> Vec<ContentNode> {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TASKLISTS);

    let mut builder = TreeBuilder::new();
    for event in Parser::new_ext(markdown, options) {
        builder.process_event(event);
    }
    builder.finish()
}

/// Every code block in document order, including ones nested in lists and quotes
pub fn code_blocks(nodes: &[ContentNode]) -> Vec<&FencedCode> {
    let mut out = Vec::new();
    collect_code_blocks(nodes, &mut out);
    out
}

fn collect_code_blocks<'a>(nodes: &'a [ContentNode], out: &mut Vec<&'a FencedCode>) {
    for node in nodes {
        match node {
            ContentNode::CodeBlock(code) => out.push(code),
            ContentNode::Link(link) => collect_code_blocks(&link.children, out),
            ContentNode::Table(table) => {
                for cell in table.header.iter().chain(table.rows.iter().flatten()) {
                    collect_code_blocks(cell, out);
                }
            }
            other => collect_code_blocks(other.children(), out),
        }
    }
}

/// Flatten nodes to text, one line per block
pub fn plain_text(nodes: &[ContentNode]) -> String {
    let mut out = String::new();
    push_plain(nodes, &mut out);
    out.trim_end().to_string()
}

fn push_plain(nodes: &[ContentNode], out: &mut String) {
    for node in nodes {
        match node {
            ContentNode::Text(text) | ContentNode::InlineCode(text) => out.push_str(text),
            ContentNode::LineBreak => out.push('\n'),
            ContentNode::Rule => out.push_str("---\n"),
            ContentNode::CodeBlock(code) => {
                out.push_str(&code.text);
                out.push('\n');
            }
            ContentNode::Link(link) => push_plain(&link.children, out),
            ContentNode::Table(table) => {
                for row in std::iter::once(&table.header).chain(table.rows.iter()) {
                    let cells: Vec<String> = row.iter().map(|cell| plain_text(cell)).collect();
                    out.push_str(&cells.join(" | "));
                    out.push('\n');
                }
            }
            ContentNode::Strong(children)
            | ContentNode::Emphasis(children)
            | ContentNode::Strikethrough(children) => push_plain(children, out),
            ContentNode::Paragraph(children)
            | ContentNode::Heading { children, .. }
            | ContentNode::BlockQuote(children)
            | ContentNode::ListItem { children, .. } => {
                push_plain(children, out);
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            ContentNode::List { items, .. } => push_plain(items, out),
        }
    }
}

impl ContentNode {
    /// Whether the node flows within a line rather than standing as a block
    pub fn is_inline(&self) -> bool {
        matches!(
            self,
            ContentNode::Strong(_)
                | ContentNode::Emphasis(_)
                | ContentNode::Strikethrough(_)
                | ContentNode::Link(_)
                | ContentNode::InlineCode(_)
                | ContentNode::LineBreak
                | ContentNode::Text(_)
        )
    }

    /// Nested nodes of container kinds; leaves, links and tables return an empty slice.
    pub fn children(&self) -> &[ContentNode] {
        match self {
            ContentNode::Paragraph(children)
            | ContentNode::Strong(children)
            | ContentNode::Emphasis(children)
            | ContentNode::Strikethrough(children)
            | ContentNode::BlockQuote(children)
            | ContentNode::Heading { children, .. }
            | ContentNode::ListItem { children, .. } => children,
            ContentNode::List { items, .. } => items,
            ContentNode::Link(_)
            | ContentNode::Table(_)
            | ContentNode::InlineCode(_)
            | ContentNode::CodeBlock(_)
            | ContentNode::Rule
            | ContentNode::LineBreak
            | ContentNode::Text(_) => &[],
        }
    }
}

/// Open container while folding the event stream
enum Frame {
    Root,
    Paragraph,
    Heading(HeadingLevel),
    /// Level 3+ heading, emitted as `Strong` on a line of its own
    MinorHeading,
    Strong,
    Emphasis,
    Strikethrough,
    BlockQuote,
    List(Option<u64>),
    Item(Option<bool>),
    Link(String),
    Code { language: Option<String>, text: String },
    Table(Table),
    TableHead(Vec<TableCell>),
    TableRow(Vec<TableCell>),
    TableCell,
    /// Tags with no node of their own; children fold into the parent
    Passthrough,
}

struct Open {
    frame: Frame,
    children: Vec<ContentNode>,
}

struct TreeBuilder {
    stack: Vec<Open>,
    /// Depth of the container holding the last down-leveled heading; the
    /// next inline content at that depth starts on a new line
    line_after_heading: Option<usize>,
}

impl TreeBuilder {
    fn new() -> Self {
        Self {
            stack: vec![Open {
                frame: Frame::Root,
                children: Vec::new(),
            }],
            line_after_heading: None,
        }
    }

    fn process_event(&mut self, event: Event) {
        match event {
            Event::Start(tag) => self.open(tag),
            Event::End(_) => self.close(),
            Event::Text(text) => self.push_text(&text),
            Event::Code(code) => self.push_node(ContentNode::InlineCode(code.to_string())),
            Event::InlineMath(math) | Event::DisplayMath(math) => {
                self.push_node(ContentNode::InlineCode(math.to_string()));
            }
            // Raw HTML is shown, never interpreted
            Event::Html(html) | Event::InlineHtml(html) => self.push_text(&html),
            Event::FootnoteReference(label) => self.push_text(&format!("[^{}]", &*label)),
            // The transcript preserves the author's line breaks
            Event::SoftBreak | Event::HardBreak => self.push_node(ContentNode::LineBreak),
            Event::Rule => self.push_node(ContentNode::Rule),
            Event::TaskListMarker(checked) => self.mark_task(checked),
        }
    }

    fn open(&mut self, tag: Tag) {
        let frame = match tag {
            Tag::Paragraph | Tag::HtmlBlock => Frame::Paragraph,
            Tag::Heading { level, .. } => match level {
                MdHeadingLevel::H1 => Frame::Heading(HeadingLevel::One),
                MdHeadingLevel::H2 => Frame::Heading(HeadingLevel::Two),
                _ => Frame::MinorHeading,
            },
            Tag::Strong => Frame::Strong,
            Tag::Emphasis => Frame::Emphasis,
            Tag::Strikethrough => Frame::Strikethrough,
            Tag::BlockQuote(_) => Frame::BlockQuote,
            Tag::List(start) => Frame::List(start),
            Tag::Item => Frame::Item(None),
            Tag::Link { dest_url, .. } | Tag::Image { dest_url, .. } => Frame::Link(dest_url.to_string()),
            Tag::CodeBlock(kind) => Frame::Code {
                language: match kind {
                    CodeBlockKind::Fenced(info) => fence_language(&info),
                    CodeBlockKind::Indented => None,
                },
                text: String::new(),
            },
            Tag::Table(_) => Frame::Table(Table::default()),
            Tag::TableHead => Frame::TableHead(Vec::new()),
            Tag::TableRow => Frame::TableRow(Vec::new()),
            Tag::TableCell => Frame::TableCell,
            _ => Frame::Passthrough,
        };
        self.stack.push(Open {
            frame,
            children: Vec::new(),
        });
    }

    fn close(&mut self) {
        // A stray end event must not pop the root
        if self.stack.len() <= 1 {
            return;
        }
        let Some(Open { frame, children }) = self.stack.pop() else {
            return;
        };

        match frame {
            Frame::Root => self.extend(children),
            Frame::Paragraph => self.push_node(ContentNode::Paragraph(children)),
            Frame::Heading(level) => self.push_node(ContentNode::Heading { level, children }),
            Frame::MinorHeading => {
                self.push_node(ContentNode::Strong(children));
                self.line_after_heading = Some(self.stack.len());
            }
            Frame::Strong => self.push_node(ContentNode::Strong(children)),
            Frame::Emphasis => self.push_node(ContentNode::Emphasis(children)),
            Frame::Strikethrough => self.push_node(ContentNode::Strikethrough(children)),
            Frame::BlockQuote => self.push_node(ContentNode::BlockQuote(children)),
            Frame::List(start) => self.push_node(ContentNode::List { start, items: children }),
            Frame::Item(checked) => self.push_node(ContentNode::ListItem { checked, children }),
            Frame::Link(href) => self.push_node(ContentNode::Link(Link::new(href, children))),
            Frame::Code { language, text } => match language {
                Some(language) => self.push_node(ContentNode::CodeBlock(FencedCode::new(language, &text))),
                None => self.push_node(ContentNode::InlineCode(text)),
            },
            Frame::Table(table) => self.push_node(ContentNode::Table(table)),
            Frame::TableHead(cells) => match self.top_frame() {
                Frame::Table(table) => table.header = cells,
                _ => self.extend(cells.into_iter().flatten().collect()),
            },
            Frame::TableRow(cells) => match self.top_frame() {
                Frame::Table(table) => table.rows.push(cells),
                _ => self.extend(cells.into_iter().flatten().collect()),
            },
            Frame::TableCell => match self.top_frame() {
                Frame::TableHead(cells) | Frame::TableRow(cells) => cells.push(children),
                _ => self.extend(children),
            },
            Frame::Passthrough => self.extend(children),
        }
    }

    /// Fold every still-open frame into its parent and return the root's nodes.
    fn finish(mut self) -> Vec<ContentNode> {
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack.pop().map(|root| root.children).unwrap_or_default()
    }

    fn top(&mut self) -> &mut Open {
        // The root frame is never popped before `finish`.
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    fn top_frame(&mut self) -> &mut Frame {
        &mut self.top().frame
    }

    fn push_node(&mut self, node: ContentNode) {
        self.break_after_heading(node.is_inline());
        self.top().children.push(node);
    }

    fn break_after_heading(&mut self, next_is_inline: bool) {
        let Some(depth) = self.line_after_heading else {
            return;
        };
        if self.stack.len() == depth {
            if next_is_inline {
                self.top().children.push(ContentNode::LineBreak);
            }
            self.line_after_heading = None;
        } else if self.stack.len() < depth {
            self.line_after_heading = None;
        }
    }

    fn extend(&mut self, nodes: Vec<ContentNode>) {
        for node in nodes {
            match node {
                ContentNode::Text(text) => self.push_text(&text),
                other => self.push_node(other),
            }
        }
    }

    fn push_text(&mut self, text: &str) {
        if !matches!(self.top().frame, Frame::Code { .. }) {
            self.break_after_heading(true);
        }
        let top = self.top();
        if let Frame::Code { text: body, .. } = &mut top.frame {
            body.push_str(text);
            return;
        }
        // Adjacent text runs merge so equal inputs give equal trees
        if let Some(ContentNode::Text(previous)) = top.children.last_mut() {
            previous.push_str(text);
        } else {
            top.children.push(ContentNode::Text(text.to_string()));
        }
    }

    fn mark_task(&mut self, checked: bool) {
        if let Some(open) = self
            .stack
            .iter_mut()
            .rev()
            .find(|open| matches!(open.frame, Frame::Item(_)))
        {
            open.frame = Frame::Item(Some(checked));
        }
    }
}
