//! Link rewriting and scope filtering
//!
//! Runs after media resolution on the same page. Every anchor is classified:
//! image links are redirected at their saved local copy, in-scope page links
//! feed the frontier and are rewritten to local markdown filenames, and
//! out-of-scope links are removed together with their label.

use crate::config::CrawlConfig;
use crate::crawler::CrawlRun;
use crate::output::page_file_name;
use dom_query::Document;
use url::Url;

/// The normalized URL prefix that bounds a crawl.
///
/// Built from the configured base URL when one is set, otherwise from the
/// seed's site root. Comparison is case-insensitive and treats the prefix
/// itself (with or without a trailing slash) as in scope.
#[derive(Debug, Clone)]
pub struct ScopePrefix {
    prefix: String,
}

impl ScopePrefix {
    pub fn from_config(config: &CrawlConfig, seed: &Url) -> Self {
        let base = config.base_url.trim();
        let raw = if base.is_empty() || base == "/" {
            let mut root = seed.clone();
            root.set_path("/");
            root.set_query(None);
            root.set_fragment(None);
            root.to_string()
        } else {
            base.to_string()
        };

        let mut prefix = raw.to_lowercase();
        if !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self { prefix }
    }

    pub fn contains(&self, url: &Url) -> bool {
        let s = url.as_str().to_lowercase();
        s.starts_with(&self.prefix) || s == self.prefix.trim_end_matches('/')
    }
}

/// Rewrites every anchor on the page and feeds the frontier.
///
/// Anchors pointing at already-saved images get the local image path.
/// In-scope page links are admitted to the frontier while the page budget
/// allows and are rewritten to the local `.md` filename regardless. All
/// other absolute links outside the scope are removed entirely.
pub(crate) fn rewrite_links(
    doc: &Document,
    page_url: &Url,
    scope: &ScopePrefix,
    run: &mut CrawlRun,
    max_pages: usize,
) {
    for anchor in doc.select("a[href]").iter() {
        let href = match anchor.attr("href") {
            Some(v) => v.to_string(),
            None => continue,
        };
        let trimmed = href.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        if trimmed.len() >= 5 && trimmed.as_bytes()[..5].eq_ignore_ascii_case(b"data:") {
            // a data-URI anchor either points at an image we saved, or at
            // active content that has no local counterpart
            match run.image_map.get(trimmed) {
                Some(rel) => {
                    anchor.set_attr("href", rel);
                }
                None => anchor.remove(),
            }
            continue;
        }

        let mut abs = match page_url.join(trimmed) {
            Ok(u) => u,
            Err(_) => continue,
        };
        abs.set_fragment(None);

        if let Some(rel) = run.image_map.get(abs.as_str()) {
            anchor.set_attr("href", rel);
            continue;
        }

        if !scope.contains(&abs) {
            anchor.remove();
            continue;
        }

        if !run.is_visited(&abs) && run.visited.len() < max_pages {
            run.mark_visited(&abs);
            run.frontier.push_back(abs.clone());
        }
        anchor.set_attr("href", &page_file_name(&abs));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_with_base(base: &str) -> CrawlConfig {
        CrawlConfig {
            start_url: "https://example.com/docs/intro".to_string(),
            base_url: base.to_string(),
            ..CrawlConfig::default()
        }
    }

    fn seed() -> Url {
        Url::parse("https://example.com/docs/intro").unwrap()
    }

    #[test]
    fn test_scope_defaults_to_site_root() {
        let scope = ScopePrefix::from_config(&config_with_base(""), &seed());
        assert!(scope.contains(&Url::parse("https://example.com/anything").unwrap()));
        assert!(!scope.contains(&Url::parse("https://other.com/").unwrap()));
    }

    #[test]
    fn test_scope_from_base_url() {
        let scope =
            ScopePrefix::from_config(&config_with_base("https://example.com/docs"), &seed());
        assert!(scope.contains(&Url::parse("https://example.com/docs/page").unwrap()));
        assert!(scope.contains(&Url::parse("https://example.com/docs").unwrap()));
        assert!(scope.contains(&Url::parse("https://example.com/docs/").unwrap()));
        assert!(!scope.contains(&Url::parse("https://example.com/blog/page").unwrap()));
    }

    #[test]
    fn test_scope_comparison_is_case_insensitive() {
        let scope =
            ScopePrefix::from_config(&config_with_base("https://Example.com/Docs"), &seed());
        assert!(scope.contains(&Url::parse("https://example.com/docs/Page").unwrap()));
    }

    #[test]
    fn test_in_scope_link_rewritten_and_enqueued() {
        let doc = Document::from(r#"<a href="/docs/setup">Setup</a>"#);
        let scope = ScopePrefix::from_config(&config_with_base(""), &seed());
        let mut run = CrawlRun::new(&seed());
        rewrite_links(&doc, &seed(), &scope, &mut run, 100);

        let html = doc.select("body").inner_html().to_string();
        assert!(html.contains(r#"href="docs-setup.md""#));
        assert_eq!(run.frontier.len(), 2); // seed plus the new page
    }

    #[test]
    fn test_out_of_scope_link_removed() {
        let doc = Document::from(r#"<p>see <a href="https://other.com/x">here</a> ok</p>"#);
        let scope = ScopePrefix::from_config(&config_with_base(""), &seed());
        let mut run = CrawlRun::new(&seed());
        rewrite_links(&doc, &seed(), &scope, &mut run, 100);

        let html = doc.select("body").inner_html().to_string();
        assert!(!html.contains("other.com"));
        assert!(!html.contains("here"));
        assert!(html.contains("see"));
        assert_eq!(run.frontier.len(), 1);
    }

    #[test]
    fn test_page_budget_stops_enqueueing_but_still_rewrites() {
        let doc = Document::from(r#"<a href="/a">A</a><a href="/b">B</a>"#);
        let scope = ScopePrefix::from_config(&config_with_base(""), &seed());
        let mut run = CrawlRun::new(&seed());
        rewrite_links(&doc, &seed(), &scope, &mut run, 2);

        // only one link fit under the budget, both were rewritten
        assert_eq!(run.visited.len(), 2);
        let html = doc.select("body").inner_html().to_string();
        assert!(html.contains(r#"href="a.md""#));
        assert!(html.contains(r#"href="b.md""#));
    }

    #[test]
    fn test_fragment_and_empty_links_skipped() {
        let doc = Document::from(r##"<a href="#top">top</a><a href="  ">blank</a>"##);
        let scope = ScopePrefix::from_config(&config_with_base(""), &seed());
        let mut run = CrawlRun::new(&seed());
        rewrite_links(&doc, &seed(), &scope, &mut run, 100);

        let html = doc.select("body").inner_html().to_string();
        assert!(html.contains(r##"href="#top""##));
        assert_eq!(run.frontier.len(), 1);
    }

    #[test]
    fn test_image_link_rewritten_to_saved_copy() {
        let doc = Document::from(r#"<a href="/pics/hero.png">full size</a>"#);
        let scope = ScopePrefix::from_config(&config_with_base(""), &seed());
        let mut run = CrawlRun::new(&seed());
        run.image_map.insert(
            "https://example.com/pics/hero.png".to_string(),
            "images/intro-hero.png".to_string(),
        );
        rewrite_links(&doc, &seed(), &scope, &mut run, 100);

        let html = doc.select("body").inner_html().to_string();
        assert!(html.contains(r#"href="images/intro-hero.png""#));
        // image links do not enter the frontier
        assert_eq!(run.frontier.len(), 1);
    }

    #[test]
    fn test_data_uri_anchor_without_saved_copy_removed() {
        let doc = Document::from(r#"<a href="data:text/html,<b>x</b>">inline</a>"#);
        let scope = ScopePrefix::from_config(&config_with_base(""), &seed());
        let mut run = CrawlRun::new(&seed());
        rewrite_links(&doc, &seed(), &scope, &mut run, 100);

        let html = doc.select("body").inner_html().to_string();
        assert!(!html.contains("inline"));
    }

    #[test]
    fn test_already_visited_link_not_requeued() {
        let doc = Document::from(r#"<a href="/docs/intro">self</a>"#);
        let scope = ScopePrefix::from_config(&config_with_base(""), &seed());
        let mut run = CrawlRun::new(&seed());
        rewrite_links(&doc, &seed(), &scope, &mut run, 100);

        assert_eq!(run.frontier.len(), 1);
        let html = doc.select("body").inner_html().to_string();
        assert!(html.contains(r#"href="docs-intro.md""#));
    }
}
