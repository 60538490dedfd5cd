//! Hand-written DOM to Markdown renderer.
//!
//! Used when the primary converter produces empty output or output that
//! still looks like HTML. Covers the structural subset that matters for
//! grabbed pages: headings, paragraphs, lists, links, images, emphasis and
//! code. Unknown elements recurse into their children without emitting
//! markup.

use crate::markdown::MarkdownRenderer;
use crate::Result;
use dom_query::{Document, NodeRef, Selection};

#[derive(Debug, Default)]
pub struct FallbackRenderer;

impl MarkdownRenderer for FallbackRenderer {
    fn render(&self, html: &str) -> Result<String> {
        let doc = Document::from(html);
        let mut out = String::new();
        if let Some(body) = doc.select("body").nodes().first() {
            for child in body.children() {
                walk(&child, &mut out, 0);
            }
        }
        Ok(out)
    }
}

fn node_tag(node: &NodeRef) -> Option<String> {
    node.node_name().map(|n| n.to_ascii_lowercase())
}

fn walk(node: &NodeRef, out: &mut String, list_level: usize) {
    if node.is_text() {
        let text = node.text();
        if !text.trim().is_empty() {
            out.push_str(&text);
        }
        return;
    }

    if !node.is_element() {
        return;
    }

    let tag = node_tag(node).unwrap_or_default();
    match tag.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = tag[1..].parse::<usize>().unwrap_or(1);
            out.push('\n');
            out.push_str(&"#".repeat(level));
            out.push(' ');
            walk_children(node, out, list_level);
            out.push_str("\n\n");
        }
        "p" => {
            out.push('\n');
            walk_children(node, out, list_level);
            out.push_str("\n\n");
        }
        "br" => out.push('\n'),
        "ul" => {
            for li in list_items(node) {
                out.push_str(&"  ".repeat(list_level));
                out.push_str("- ");
                walk_children(&li, out, list_level + 1);
                out.push('\n');
            }
            out.push('\n');
        }
        "ol" => {
            for (idx, li) in list_items(node).into_iter().enumerate() {
                out.push_str(&"  ".repeat(list_level));
                out.push_str(&format!("{}. ", idx + 1));
                walk_children(&li, out, list_level + 1);
                out.push('\n');
            }
            out.push('\n');
        }
        "a" => {
            let href = Selection::from(node.clone())
                .attr("href")
                .map(|v| v.to_string())
                .unwrap_or_default();
            // anchor text goes through an isolated buffer, never recovered
            // from positions in the shared output buffer
            let mut label = String::new();
            walk_children(node, &mut label, list_level);
            let label = label.trim();
            let text = if label.is_empty() { href.as_str() } else { label };
            out.push_str(&format!("[{}]({})", text, href));
        }
        "img" => {
            let sel = Selection::from(node.clone());
            let src = sel.attr("src").map(|v| v.to_string()).unwrap_or_default();
            let alt = sel.attr("alt").map(|v| v.to_string()).unwrap_or_default();
            out.push_str(&format!("![{}]({})", alt, src));
        }
        "strong" | "b" => {
            out.push_str("**");
            walk_children(node, out, list_level);
            out.push_str("**");
        }
        "em" | "i" => {
            out.push('*');
            walk_children(node, out, list_level);
            out.push('*');
        }
        "pre" => {
            out.push_str("\n```\n");
            out.push_str(node.text().trim_end());
            out.push_str("\n```\n\n");
        }
        "code" => {
            out.push('`');
            out.push_str(&node.text());
            out.push('`');
        }
        _ => walk_children(node, out, list_level),
    }
}

fn walk_children(node: &NodeRef, out: &mut String, list_level: usize) {
    for child in node.children() {
        walk(&child, out, list_level);
    }
}

fn list_items<'a>(node: &NodeRef<'a>) -> Vec<NodeRef<'a>> {
    node.children()
        .into_iter()
        .filter(|c| c.is_element() && node_tag(c).as_deref() == Some("li"))
        .collect()
}
