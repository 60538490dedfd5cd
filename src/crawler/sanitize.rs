//! Page sanitization
//!
//! Runs once per fetched page, before any other page-local pass. Scripts and
//! stylesheets are removed outright; inline event handlers and `javascript:`
//! URLs lose only the offending attribute, never the element or its text.

use dom_query::Document;

/// Strips active content from a parsed page.
pub fn sanitize_document(doc: &Document) {
    doc.select("script, style").remove();

    for element in doc.select("*").iter() {
        let attrs: Vec<String> = element
            .nodes()
            .first()
            .map(|node| {
                node.attrs()
                    .iter()
                    .map(|attr| attr.name.local.to_string())
                    .collect()
            })
            .unwrap_or_default();

        for name in &attrs {
            if name.to_ascii_lowercase().starts_with("on") {
                element.remove_attr(name);
            }
        }

        for name in ["href", "src"] {
            if let Some(value) = element.attr(name) {
                if value
                    .trim_start()
                    .to_ascii_lowercase()
                    .starts_with("javascript:")
                {
                    element.remove_attr(name);
                }
            }
        }
    }
}
