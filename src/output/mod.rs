//! Output path handling
//!
//! Page and image filenames are derived from URLs and metadata; collisions on
//! disk are resolved with numeric suffixes.

mod naming;

pub use naming::{
    extension_for_mime, page_file_name, page_slug, sanitize_file_name, unique_path,
};
