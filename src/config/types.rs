use serde::{Deserialize, Serialize};

/// Configuration for one crawl run.
///
/// A config is immutable once a run starts. The same shape serves both the
/// full grab mode and the page-counting discovery mode; `discover_only`
/// selects between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Absolute seed URL the crawl starts from
    pub start_url: String,

    /// Maximum number of unique pages visited in full-grab mode
    pub max_pages: usize,

    /// Folder the markdown files (and an `images/` subfolder) are written to
    pub markdown_folder: String,

    /// Scope prefix: links equal to or nested under this URL are in scope.
    /// Empty or "/" falls back to the seed's site root.
    pub base_url: String,

    /// User-Agent header sent with every request
    pub user_agent: String,

    /// Advisory flag; external images are currently fetched either way
    pub allow_external_images: bool,

    /// Maximum number of pages counted in discovery mode
    pub crawl_limit: usize,

    /// Count reachable pages only; write nothing, fetch no images
    pub discover_only: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            start_url: String::new(),
            max_pages: 100,
            markdown_folder: "grabbed".to_string(),
            base_url: String::new(),
            user_agent: "MarkGrabBot/1.0".to_string(),
            allow_external_images: false,
            crawl_limit: 500,
            discover_only: false,
        }
    }
}

/// Persisted default settings, loaded from a TOML file.
///
/// A request that omits a field gets the value from here.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GrabSettings {
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    #[serde(rename = "markdown-folder")]
    pub markdown_folder: String,

    #[serde(rename = "base-url")]
    pub base_url: String,

    #[serde(rename = "max-pages")]
    pub max_pages: usize,

    #[serde(rename = "crawl-limit")]
    pub crawl_limit: usize,

    #[serde(rename = "allow-external-images")]
    pub allow_external_images: bool,
}

impl Default for GrabSettings {
    fn default() -> Self {
        Self {
            user_agent: "MarkGrabBot/1.0".to_string(),
            markdown_folder: "grabbed".to_string(),
            base_url: String::new(),
            max_pages: 100,
            crawl_limit: 500,
            allow_external_images: false,
        }
    }
}

impl GrabSettings {
    /// Builds a run config for `start_url` from these defaults.
    pub fn to_config(&self, start_url: &str) -> CrawlConfig {
        CrawlConfig {
            start_url: start_url.to_string(),
            max_pages: self.max_pages,
            markdown_folder: self.markdown_folder.clone(),
            base_url: self.base_url.clone(),
            user_agent: self.user_agent.clone(),
            allow_external_images: self.allow_external_images,
            crawl_limit: self.crawl_limit,
            discover_only: false,
        }
    }
}
