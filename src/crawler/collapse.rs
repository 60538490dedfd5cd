//! Duplicate image collapsing
//!
//! Pages frequently carry the same image twice: once as a bare `<img>` and
//! once wrapped in an anchor (a lightbox or "view full size" pattern). Two
//! passes deal with this. The DOM pass removes extra occurrences per source
//! before conversion, preferring the bare form. The markdown pass catches
//! adjacent duplicates that survive conversion or are introduced by it, and
//! runs to a fixed point.

use dom_query::{Document, Selection};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Removes repeated occurrences of the same image source from the page.
///
/// When an occurrence is an anchor directly wrapping a single image, the
/// whole anchor is the removal unit. The occurrence kept is the first bare
/// one in document order, or the first overall when all are wrapped.
pub fn collapse_duplicate_images(doc: &Document) {
    struct Occurrence<'a> {
        linked: bool,
        container: Selection<'a>,
    }

    let mut groups: HashMap<String, Vec<Occurrence>> = HashMap::new();

    for img in doc.select("img").iter() {
        let src = match img.attr("src") {
            Some(v) if !v.is_empty() => v.to_string(),
            _ => continue,
        };

        let parent = img.parent();
        let parent_is_anchor = parent
            .nodes()
            .first()
            .and_then(|node| node.node_name())
            .map(|name| name.to_ascii_lowercase() == "a")
            .unwrap_or(false);
        let linked = parent_is_anchor
            && parent.children().length() == 1
            && parent.text().trim().is_empty();

        let container = if linked { parent } else { img };
        groups
            .entry(src)
            .or_default()
            .push(Occurrence { linked, container });
    }

    for occurrences in groups.values() {
        if occurrences.len() < 2 {
            continue;
        }
        let keep = occurrences
            .iter()
            .position(|o| !o.linked)
            .unwrap_or(0);
        for (i, occurrence) in occurrences.iter().enumerate() {
            if i != keep {
                occurrence.container.remove();
            }
        }
    }
}

// one alternation, linked form first so it wins at the shared `[` prefix;
// group 1/2 = linked src/href, group 3 = plain src
fn image_ref_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[!\[[^\]\n]*\]\(([^)\s]+)\)\]\(([^)\s]+)\)|!\[[^\]\n]*\]\(([^)\s]+)\)")
            .unwrap()
    })
}

/// Merges adjacent markdown references to the same image source.
///
/// Two references are adjacent when only whitespace separates them. When a
/// plain reference and a linked one collide, the plain form is kept. Merging
/// can create new adjacencies, so the pass repeats until nothing changes.
pub fn collapse_markdown_duplicates(markdown: &str) -> String {
    let mut current = markdown.to_string();
    loop {
        let next = collapse_once(&current);
        if next == current {
            return current;
        }
        current = next;
    }
}

fn collapse_once(text: &str) -> String {
    let pattern = image_ref_pattern();
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0usize;
    // last emitted reference: its start offset in `out`, source, linked flag
    let mut last: Option<(usize, String, bool)> = None;

    for caps in pattern.captures_iter(text) {
        let whole = match caps.get(0) {
            Some(m) => m,
            None => continue,
        };
        let linked = caps.get(1).is_some();
        let src = caps
            .get(1)
            .or_else(|| caps.get(3))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();

        let gap = &text[cursor..whole.start()];
        if let Some((last_start, last_src, last_linked)) = &last {
            if gap.trim().is_empty() && *last_src == src {
                if *last_linked && !linked {
                    // plain beats linked: replace the emitted reference
                    out.truncate(*last_start);
                    out.push_str(whole.as_str());
                    last = Some((*last_start, src, linked));
                }
                cursor = whole.end();
                continue;
            }
        }

        out.push_str(gap);
        let start = out.len();
        out.push_str(whole.as_str());
        last = Some((start, src, linked));
        cursor = whole.end();
    }

    out.push_str(&text[cursor..]);
    out
}
