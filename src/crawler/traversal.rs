//! Breadth-first crawl traversal
//!
//! [`Traversal`] drives a whole run: it owns the HTTP client, the progress
//! broadcaster handle, and the cancellation token, and walks the frontier
//! breadth-first until it drains, the page budget fills, or cancellation
//! fires. Per-run state lives in [`CrawlRun`], created fresh for every
//! invocation so no visited set or dedup map ever leaks between runs.
//!
//! Page processing is split into synchronous DOM passes and asynchronous
//! downloads; a parsed document is never held across an await point.

use crate::config::{self, CrawlConfig};
use crate::crawler::{
    build_http_client, collapse_duplicate_images, collapse_markdown_duplicates, fetch_page,
    links, media, sanitize_document, FetchOutcome, ScopePrefix,
};
use crate::markdown;
use crate::output::{page_file_name, page_slug, unique_path};
use crate::progress::ProgressBroadcaster;
use crate::Result;
use dom_query::Document;
use reqwest::Client;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Mutable state for one crawl invocation.
///
/// Visited URLs are compared case-insensitively. The frontier holds admitted
/// but unprocessed pages; every URL in it is already in the visited set, so
/// `visited.len()` is the page count the budget is checked against.
#[derive(Debug)]
pub struct CrawlRun {
    pub visited: HashSet<String>,
    pub frontier: VecDeque<Url>,
    /// absolute image URL (or full data URI) to saved relative path
    pub image_map: HashMap<String, String>,
    /// per-slug sequence counters for generated image names
    pub image_counters: HashMap<String, usize>,
    pub log: Vec<String>,
}

impl CrawlRun {
    pub fn new(seed: &Url) -> Self {
        let mut visited = HashSet::new();
        visited.insert(seed.as_str().to_lowercase());
        let mut frontier = VecDeque::new();
        frontier.push_back(seed.clone());
        Self {
            visited,
            frontier,
            image_map: HashMap::new(),
            image_counters: HashMap::new(),
            log: Vec::new(),
        }
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(&url.as_str().to_lowercase())
    }

    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_lowercase())
    }

    pub fn next_image_index(&mut self, slug: &str) -> usize {
        let counter = self.image_counters.entry(slug.to_string()).or_insert(0);
        *counter += 1;
        *counter
    }

    /// Records one progress line: run log, live subscribers, and tracing.
    pub fn note(&mut self, progress: &ProgressBroadcaster, line: String) {
        tracing::info!("{}", line);
        progress.broadcast(&line);
        self.log.push(line);
    }
}

/// Terminal outcome of a run, carrying the full progress log.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    pub success: bool,
    pub message: String,
    /// Set in discovery mode only
    pub pages_found: Option<usize>,
    pub log: Vec<String>,
}

/// One configured crawl, ready to run.
pub struct Traversal {
    config: CrawlConfig,
    client: Client,
    progress: Arc<ProgressBroadcaster>,
    cancel: CancellationToken,
}

impl Traversal {
    pub fn new(
        config: CrawlConfig,
        progress: Arc<ProgressBroadcaster>,
        cancel: CancellationToken,
    ) -> Result<Self> {
        config::validate(&config)?;
        let client = build_http_client(&config.user_agent)?;
        Ok(Self {
            config,
            client,
            progress,
            cancel,
        })
    }

    /// Runs the crawl to completion, dispatching on the configured mode.
    pub async fn run(&self) -> CrawlResult {
        if self.config.discover_only {
            self.discover().await
        } else {
            self.grab().await
        }
    }

    fn cancelled_result(&self, run: &mut CrawlRun) -> CrawlResult {
        run.note(&self.progress, "Operation cancelled".to_string());
        CrawlResult {
            success: false,
            message: "Cancelled".to_string(),
            pages_found: None,
            log: std::mem::take(&mut run.log),
        }
    }

    async fn grab(&self) -> CrawlResult {
        let seed = match Url::parse(&self.config.start_url) {
            Ok(u) => u,
            Err(e) => {
                return CrawlResult {
                    success: false,
                    message: format!("Invalid start URL: {}", e),
                    pages_found: None,
                    log: Vec::new(),
                }
            }
        };
        let scope = ScopePrefix::from_config(&self.config, &seed);
        let folder = PathBuf::from(&self.config.markdown_folder);

        if let Err(e) = tokio::fs::create_dir_all(folder.join("images")).await {
            return CrawlResult {
                success: false,
                message: format!("Failed to create output folder: {}", e),
                pages_found: None,
                log: Vec::new(),
            };
        }

        let mut run = CrawlRun::new(&seed);

        while let Some(url) = run.frontier.pop_front() {
            if self.cancel.is_cancelled() {
                return self.cancelled_result(&mut run);
            }

            run.note(&self.progress, format!("Visiting: {}", url));

            match fetch_page(&self.client, url.as_str(), &self.cancel).await {
                FetchOutcome::Success { body, .. } => {
                    if let Err(e) = self
                        .process_page(&mut run, &url, &seed, &scope, &folder, &body)
                        .await
                    {
                        run.note(&self.progress, format!("Error visiting {}: {}", url, e));
                    }
                }
                FetchOutcome::HttpError { status } => {
                    run.note(&self.progress, format!("Failed to get {}: {}", url, status));
                }
                FetchOutcome::NetworkError { error } => {
                    run.note(&self.progress, format!("Error visiting {}: {}", url, error));
                }
                FetchOutcome::Cancelled => return self.cancelled_result(&mut run),
            }
        }

        let pages = run.visited.len();
        run.note(
            &self.progress,
            format!("Crawl complete: {} pages visited", pages),
        );
        CrawlResult {
            success: true,
            message: format!("Grabbed {} pages into {}", pages, folder.display()),
            pages_found: None,
            log: run.log,
        }
    }

    /// Runs one fetched page through the full pipeline and writes its
    /// markdown file. Errors here are page-local.
    async fn process_page(
        &self,
        run: &mut CrawlRun,
        url: &Url,
        seed: &Url,
        scope: &ScopePrefix,
        folder: &Path,
        body: &str,
    ) -> Result<()> {
        let slug = page_slug(url);

        // phase 1 (sync): sanitize, collect image references
        let (sanitized, image_refs) = prepare_page(body);

        // phase 2 (async): download and relocate media
        let ctx = media::MediaContext {
            client: &self.client,
            progress: self.progress.as_ref(),
            page_url: url,
            seed_scheme: seed.scheme(),
            slug: &slug,
            output_root: folder,
        };
        let resolved = media::resolve_images(&ctx, run, &image_refs).await;

        // phase 3 (sync): rewrite, collapse, filter
        let page_html = finalize_page(&sanitized, &resolved, url, scope, run, self.config.max_pages);

        let (converted, used_fallback) = markdown::convert_page(&page_html);
        if used_fallback {
            run.note(
                &self.progress,
                "Primary markdown output invalid or empty. Using fallback converter".to_string(),
            );
        }
        let final_markdown = collapse_markdown_duplicates(&converted);

        let path = unique_path(&folder.join(page_file_name(url)));
        tokio::fs::write(&path, final_markdown).await?;
        run.note(
            &self.progress,
            format!("Saved page: {} -> {}", url, path.display()),
        );
        Ok(())
    }

    /// Counts reachable in-scope pages without writing anything.
    pub async fn discover(&self) -> CrawlResult {
        let seed = match Url::parse(&self.config.start_url) {
            Ok(u) => u,
            Err(e) => {
                return CrawlResult {
                    success: false,
                    message: format!("Invalid start URL: {}", e),
                    pages_found: None,
                    log: Vec::new(),
                }
            }
        };
        let scope = ScopePrefix::from_config(&self.config, &seed);
        let mut run = CrawlRun::new(&seed);
        run.note(
            &self.progress,
            format!("Pages found: {}", run.visited.len()),
        );

        while let Some(url) = run.frontier.pop_front() {
            if self.cancel.is_cancelled() {
                return self.cancelled_result(&mut run);
            }

            run.note(&self.progress, format!("Visiting: {}", url));

            match fetch_page(&self.client, url.as_str(), &self.cancel).await {
                FetchOutcome::Success { body, .. } => {
                    for link in extract_in_scope_links(&body, &url, &scope) {
                        if !run.is_visited(&link) && run.visited.len() < self.config.crawl_limit {
                            run.mark_visited(&link);
                            run.frontier.push_back(link);
                            run.note(
                                &self.progress,
                                format!("Pages found: {}", run.visited.len()),
                            );
                        }
                    }
                }
                FetchOutcome::HttpError { status } => {
                    run.note(&self.progress, format!("Failed to get {}: {}", url, status));
                }
                FetchOutcome::NetworkError { error } => {
                    run.note(&self.progress, format!("Error visiting {}: {}", url, error));
                }
                FetchOutcome::Cancelled => return self.cancelled_result(&mut run),
            }
        }

        let pages = run.visited.len();
        run.note(
            &self.progress,
            format!("Discovery complete: {} pages found", pages),
        );
        CrawlResult {
            success: true,
            message: format!("Discovery complete: {} pages found", pages),
            pages_found: Some(pages),
            log: run.log,
        }
    }
}

/// Sync phase 1: parse, sanitize, and collect image references. Returns the
/// sanitized document re-serialized so the async phase holds only strings.
fn prepare_page(body: &str) -> (String, Vec<media::ImageRef>) {
    let doc = Document::from(body);
    sanitize_document(&doc);
    let refs = media::collect_image_refs(&doc);
    (doc.html().to_string(), refs)
}

/// Sync phase 3: apply media rewrites, collapse duplicates, and filter
/// links on the sanitized page. Returns the body HTML ready for conversion.
fn finalize_page(
    sanitized: &str,
    resolved: &HashMap<String, String>,
    page_url: &Url,
    scope: &ScopePrefix,
    run: &mut CrawlRun,
    max_pages: usize,
) -> String {
    let doc = Document::from(sanitized);
    media::apply_image_rewrites(&doc, resolved);
    collapse_duplicate_images(&doc);
    links::rewrite_links(&doc, page_url, scope, run, max_pages);
    doc.select("body").inner_html().to_string()
}

/// Resolves and scope-filters every anchor on a page, for discovery mode.
fn extract_in_scope_links(body: &str, page_url: &Url, scope: &ScopePrefix) -> Vec<Url> {
    let doc = Document::from(body);
    let mut links = Vec::new();
    for anchor in doc.select("a[href]").iter() {
        let href = match anchor.attr("href") {
            Some(v) => v.to_string(),
            None => continue,
        };
        let trimmed = href.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut abs = match page_url.join(trimmed) {
            Ok(u) => u,
            Err(_) => continue,
        };
        abs.set_fragment(None);
        if (abs.scheme() == "http" || abs.scheme() == "https") && scope.contains(&abs) {
            links.push(abs);
        }
    }
    links
}
