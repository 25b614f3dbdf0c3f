//! Syntax selection and highlighting for fenced code blocks (syntect).

use once_cell::sync::Lazy;
use syntect::easy::HighlightLines;
use syntect::highlighting::{FontStyle, Style as SynStyle, Theme, ThemeSet};
use syntect::parsing::{SyntaxReference, SyntaxSet};
use syntect::util::LinesWithEndings;

use super::FencedCode;

/// Dark theme close to the transcript's black code background
pub const DEFAULT_THEME: &str = "base16-ocean.dark";

static SYNTAXES: Lazy<SyntaxSet> = Lazy::new(SyntaxSet::load_defaults_newlines);
static THEMES: Lazy<ThemeSet> = Lazy::new(ThemeSet::load_defaults);

/// One styled run of a highlighted line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HighlightedSpan {
    pub text: String,
    pub fg: (u8, u8, u8),
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

pub type HighlightedLine = Vec<HighlightedSpan>;

/// Map common fence labels onto names the bundled syntaxes know.
fn normalize_language(language: &str) -> String {
    let lower = language.trim().to_ascii_lowercase();
    let alias = match lower.as_str() {
        "sh" | "bash" | "zsh" | "shell" | "console" => "bash",
        "js" | "javascript" | "mjs" | "cjs" | "jsx" => "js",
        // No bundled TypeScript grammar; JavaScript is the closest match
        "ts" | "typescript" | "tsx" => "js",
        "py" | "python" | "py3" => "py",
        "rs" | "rust" => "rs",
        "yml" | "yaml" => "yaml",
        "cpp" | "cxx" | "cc" | "hpp" => "cpp",
        "cs" | "csharp" => "cs",
        "golang" | "go" => "go",
        "rb" | "ruby" => "rb",
        "md" | "markdown" => "md",
        other => other,
    };
    alias.to_string()
}

/// Find a highlighting syntax for a fence label, or `None` for plain text.
pub fn resolve_syntax(language: &str) -> Option<&'static SyntaxReference> {
    let syntaxes: &'static SyntaxSet = &SYNTAXES;
    let token = normalize_language(language);
    if token.is_empty() {
        return None;
    }
    syntaxes
        .find_syntax_by_token(&token)
        .or_else(|| syntaxes.find_syntax_by_extension(&token))
        .or_else(|| syntaxes.find_syntax_by_name(language))
}

fn theme(name: &str) -> Option<&'static Theme> {
    let themes: &'static ThemeSet = &THEMES;
    themes
        .themes
        .get(name)
        .or_else(|| themes.themes.get(DEFAULT_THEME))
}

/// Background color of a theme, for painting the block behind highlighted text
pub fn theme_background(theme_name: &str) -> Option<(u8, u8, u8)> {
    theme(theme_name)
        .and_then(|t| t.settings.background)
        .map(|c| (c.r, c.g, c.b))
}

/// Names of all bundled themes, sorted
pub fn theme_names() -> Vec<&'static str> {
    let themes: &'static ThemeSet = &THEMES;
    let mut names: Vec<&'static str> = themes.themes.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

fn span_from_syn((style, text): (SynStyle, &str)) -> HighlightedSpan {
    let fg = style.foreground;
    HighlightedSpan {
        text: text.strip_suffix('\n').unwrap_or(text).to_string(),
        fg: (fg.r, fg.g, fg.b),
        bold: style.font_style.contains(FontStyle::BOLD),
        italic: style.font_style.contains(FontStyle::ITALIC),
        underline: style.font_style.contains(FontStyle::UNDERLINE),
    }
}

/// Highlight a fenced block line by line.
///
/// Returns `None` when the block has no known syntax, the theme is missing,
/// or the highlighter chokes on a line; callers then draw plain monospace.
pub fn highlight(code: &FencedCode, theme_name: &str) -> Option<Vec<HighlightedLine>> {
    let syntaxes: &'static SyntaxSet = &SYNTAXES;
    let syntax = code
        .syntax
        .as_deref()
        .and_then(|name| syntaxes.find_syntax_by_name(name))?;
    let mut highlighter = HighlightLines::new(syntax, theme(theme_name)?);

    let mut lines = Vec::new();
    for line in LinesWithEndings::from(&code.text) {
        let ranges = highlighter.highlight_line(line, syntaxes).ok()?;
        lines.push(ranges.into_iter().map(span_from_syn).collect());
    }
    Some(lines)
}
