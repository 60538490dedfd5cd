//! Configuration module for markgrab
//!
//! This module holds the per-run crawl configuration, the TOML-backed default
//! settings, and request validation.
//!
//! # Example
//!
//! ```no_run
//! use markgrab::config::load_settings;
//! use std::path::Path;
//!
//! let settings = load_settings(Path::new("markgrab.toml")).unwrap();
//! println!("Default user agent: {}", settings.user_agent);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CrawlConfig, GrabSettings};

// Re-export parser and validation functions
pub use parser::load_settings;
pub use validation::validate;
