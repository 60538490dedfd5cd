//! Markgrab: a site-to-markdown grabber
//!
//! This crate crawls same-scope pages from a seed URL, relocates embedded
//! images next to the output, rewrites hyperlinks to the locally materialized
//! content, and converts each sanitized page into a Markdown file on disk.
//! Jobs run one at a time behind a single-flight gate, with live progress
//! fan-out to any number of subscribers.

pub mod config;
pub mod crawler;
pub mod jobs;
pub mod markdown;
pub mod output;
pub mod progress;

use thiserror::Error;

/// Main error type for markgrab operations
#[derive(Debug, Error)]
pub enum GrabError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Markdown conversion error: {0}")]
    Markdown(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

/// Result type alias for markgrab operations
pub type Result<T> = std::result::Result<T, GrabError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{CrawlConfig, GrabSettings};
pub use crawler::{CrawlResult, Traversal};
pub use jobs::{JobQueue, JobState};
pub use progress::ProgressBroadcaster;
