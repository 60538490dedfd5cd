//! HTML to Markdown conversion
//!
//! Two interchangeable renderers sit behind the [`MarkdownRenderer`] trait:
//! the primary renderer delegates to `htmd`, and a hand-written fallback
//! walks the DOM itself. A validation predicate on the primary output decides
//! which result is kept — if the primary renderer returns nothing usable or
//! its output still looks like HTML, the fallback runs instead.

mod fallback;

pub use fallback::FallbackRenderer;

use crate::{GrabError, Result};
use regex::Regex;
use std::sync::OnceLock;

/// An HTML fragment to Markdown text capability.
pub trait MarkdownRenderer {
    fn render(&self, html: &str) -> Result<String>;
}

/// Primary renderer backed by the `htmd` crate.
#[derive(Debug, Default)]
pub struct HtmdRenderer;

impl MarkdownRenderer for HtmdRenderer {
    fn render(&self, html: &str) -> Result<String> {
        htmd::convert(html).map_err(|e| GrabError::Markdown(e.to_string()))
    }
}

fn html_tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"</?[a-zA-Z]").unwrap())
}

/// True when converter output is unusable: empty/whitespace, or it still
/// contains an HTML tag pattern (`</tag>` or `<tag`).
pub fn needs_fallback(markdown: &str) -> bool {
    markdown.trim().is_empty() || html_tag_pattern().is_match(markdown)
}

/// Converts an HTML fragment to Markdown, falling back to the hand-written
/// renderer when the primary output fails validation.
///
/// Returns the markdown and whether the fallback was used.
pub fn convert_page(html: &str) -> (String, bool) {
    let primary = HtmdRenderer.render(html).unwrap_or_default();
    if !needs_fallback(&primary) {
        return (tidy(&primary), false);
    }

    let markdown = FallbackRenderer
        .render(html)
        .unwrap_or_default();
    (tidy(&markdown), true)
}

/// Trims the output and collapses runs of three or more newlines to one
/// blank line.
pub fn tidy(markdown: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let blank_runs = RE.get_or_init(|| Regex::new(r"\n{3,}").unwrap());
    blank_runs.replace_all(markdown.trim(), "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_needs_fallback_on_empty() {
        assert!(needs_fallback(""));
        assert!(needs_fallback("   \n\t "));
    }

    #[test]
    fn test_needs_fallback_on_residual_html() {
        assert!(needs_fallback("some text <div class=\"x\">"));
        assert!(needs_fallback("closing only </p> here"));
    }

    #[test]
    fn test_clean_markdown_passes_validation() {
        assert!(!needs_fallback("# Title\n\nA [link](page.md) and **bold**."));
        // a bare less-than not followed by a letter is fine
        assert!(!needs_fallback("1 < 2 and 3 > 2"));
    }

    #[test]
    fn test_convert_page_uses_primary() {
        let (md, used_fallback) = convert_page("<h1>Hello</h1><p>World</p>");
        assert!(!used_fallback);
        assert!(md.contains("Hello"));
        assert!(md.contains("World"));
        assert!(!md.contains('<'));
    }

    #[test]
    fn test_convert_page_falls_back_on_empty_output() {
        // nothing for the primary renderer to emit, so the fallback runs
        let (md, used_fallback) = convert_page("");
        assert!(used_fallback);
        assert_eq!(md, "");

        let (md, used_fallback) = convert_page("<div>   </div>");
        assert!(used_fallback);
        assert_eq!(md, "");
    }

    #[test]
    fn test_tidy_collapses_blank_runs() {
        assert_eq!(tidy("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(tidy("\n\na\n\n"), "a");
    }

    #[test]
    fn test_tidy_exact_boundary() {
        // one blank line survives untouched; three newlines is the first
        // run that collapses
        assert_eq!(tidy("a\n\nb"), "a\n\nb");
        assert_eq!(tidy("a\n\n\nb"), "a\n\nb");
    }
}
