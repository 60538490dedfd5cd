use crate::config::types::CrawlConfig;
use crate::ConfigError;
use url::Url;

/// Validates a crawl configuration before any run state is created.
///
/// Rejections here are request-rejections: the caller gets a descriptive
/// message and no crawl work happens.
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    let seed = Url::parse(&config.start_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid start URL '{}': {}", config.start_url, e)))?;

    if seed.scheme() != "http" && seed.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "Start URL must be http or https, got '{}'",
            seed.scheme()
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.crawl_limit < 1 {
        return Err(ConfigError::Validation(format!(
            "crawl_limit must be >= 1, got {}",
            config.crawl_limit
        )));
    }

    if config.markdown_folder.trim().is_empty() {
        return Err(ConfigError::Validation(
            "markdown_folder cannot be empty".to_string(),
        ));
    }

    // base_url is either empty / "/" (site-root fallback) or an absolute URL
    let base = config.base_url.trim();
    if !base.is_empty() && base != "/" {
        let parsed = Url::parse(base)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base URL '{}': {}", base, e)))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Base URL must be http or https, got '{}'",
                parsed.scheme()
            )));
        }
    }

    Ok(())
}
