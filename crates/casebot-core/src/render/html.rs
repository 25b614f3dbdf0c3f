//! Serialize display nodes to HTML for browser-hosted front ends.
//!
//! All text and attribute values are escaped. Anchors always carry the node's
//! fixed target and rel, and scripting URL schemes are replaced with `#`.

use super::{ContentNode, FencedCode, Link, Table};

pub fn to_html(nodes: &[ContentNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        write_node(node, &mut out);
    }
    out
}

pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn safe_href(href: &str) -> &str {
    let scheme: String = href
        .trim_start()
        .chars()
        .take_while(|c| *c != ':' && *c != '/' && *c != '?' && *c != '#')
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .collect::<String>()
        .to_ascii_lowercase();
    let has_scheme = href.contains(':') && !scheme.is_empty();
    match (has_scheme, scheme.as_str()) {
        (true, "javascript" | "vbscript" | "data") => "#",
        _ => href,
    }
}

fn write_children(children: &[ContentNode], out: &mut String) {
    for child in children {
        write_node(child, out);
    }
}

fn wrap(tag: &str, children: &[ContentNode], out: &mut String) {
    out.push('<');
    out.push_str(tag);
    out.push('>');
    write_children(children, out);
    out.push_str("</");
    out.push_str(tag);
    out.push('>');
}

fn write_node(node: &ContentNode, out: &mut String) {
    match node {
        ContentNode::Paragraph(children) => wrap("p", children, out),
        ContentNode::Heading { level, children } => wrap(&format!("h{}", level.as_u8()), children, out),
        ContentNode::Strong(children) => wrap("strong", children, out),
        ContentNode::Emphasis(children) => wrap("em", children, out),
        ContentNode::Strikethrough(children) => wrap("del", children, out),
        ContentNode::BlockQuote(children) => wrap("blockquote", children, out),
        ContentNode::List { start: None, items } => wrap("ul", items, out),
        ContentNode::List { start: Some(start), items } => {
            if *start == 1 {
                out.push_str("<ol>");
            } else {
                out.push_str(&format!("<ol start=\"{start}\">"));
            }
            write_children(items, out);
            out.push_str("</ol>");
        }
        ContentNode::ListItem { checked, children } => {
            out.push_str("<li>");
            match checked {
                Some(true) => out.push_str("<input type=\"checkbox\" disabled checked> "),
                Some(false) => out.push_str("<input type=\"checkbox\" disabled> "),
                None => {}
            }
            write_children(children, out);
            out.push_str("</li>");
        }
        ContentNode::Link(link) => write_link(link, out),
        ContentNode::InlineCode(code) => {
            out.push_str("<code>");
            out.push_str(&escape(code));
            out.push_str("</code>");
        }
        ContentNode::CodeBlock(code) => write_code_block(code, out),
        ContentNode::Table(table) => write_table(table, out),
        ContentNode::Rule => out.push_str("<hr>"),
        ContentNode::LineBreak => out.push_str("<br>"),
        ContentNode::Text(text) => out.push_str(&escape(text)),
    }
}

fn write_link(link: &Link, out: &mut String) {
    out.push_str(&format!(
        "<a href=\"{}\" target=\"{}\" rel=\"{}\">",
        escape(safe_href(&link.href)),
        link.target(),
        link.rel()
    ));
    write_children(&link.children, out);
    out.push_str("</a>");
}

fn write_code_block(code: &FencedCode, out: &mut String) {
    let language = escape(&code.language);
    out.push_str(&format!(
        "<div class=\"code-block\" data-language=\"{language}\">\
         <button type=\"button\" class=\"copy\" data-copy=\"{}\">Copy</button>\
         <pre><code class=\"language-{language}\">{}</code></pre></div>",
        escape(&code.text),
        escape(&code.text)
    ));
}

fn write_table(table: &Table, out: &mut String) {
    out.push_str("<table>");
    if !table.header.is_empty() {
        out.push_str("<thead><tr>");
        for cell in &table.header {
            wrap("th", cell, out);
        }
        out.push_str("</tr></thead>");
    }
    out.push_str("<tbody>");
    for row in &table.rows {
        out.push_str("<tr>");
        for cell in row {
            wrap("td", cell, out);
        }
        out.push_str("</tr>");
    }
    out.push_str("</tbody></table>");
}
