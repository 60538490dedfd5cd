use std::path::{Path, PathBuf};
use url::Url;

/// Maximum length of a derived file name stem
const MAX_NAME_LEN: usize = 80;

/// Derives a flat slug from a page URL's path.
///
/// The path is trimmed of slashes, an empty path becomes "index", and every
/// character outside `[a-zA-Z0-9-_]` is replaced with `-`, so nested paths
/// flatten into a single file name segment.
pub fn page_slug(url: &Url) -> String {
    let path = url.path().trim_matches('/');
    if path.is_empty() {
        return "index".to_string();
    }
    path.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Markdown file name generated for a page URL.
pub fn page_file_name(url: &Url) -> String {
    format!("{}.md", page_slug(url))
}

/// Sanitizes a candidate file name fragment.
///
/// Filesystem-hostile characters are replaced with `-`, whitespace runs are
/// collapsed to single hyphens, hyphen runs are squeezed, and the result is
/// trimmed and capped in length.
pub fn sanitize_file_name(name: &str) -> String {
    if name.is_empty() {
        return String::new();
    }

    const INVALID: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

    let mut out = String::with_capacity(name.len());
    let mut last_hyphen = false;
    for c in name.chars() {
        let replaced = if INVALID.contains(&c) || c.is_control() || c.is_whitespace() {
            '-'
        } else {
            c
        };
        if replaced == '-' {
            if !last_hyphen {
                out.push('-');
            }
            last_hyphen = true;
        } else {
            out.push(replaced);
            last_hyphen = false;
        }
    }

    let mut out = out.trim_matches('-').to_string();
    if out.len() > MAX_NAME_LEN {
        // cap on a char boundary
        let mut end = MAX_NAME_LEN;
        while !out.is_char_boundary(end) {
            end -= 1;
        }
        out.truncate(end);
        out = out.trim_matches('-').to_string();
    }
    out
}

/// Returns a path that does not exist yet, appending `-1`, `-2`, ... before
/// the extension until the name is free.
pub fn unique_path(candidate: &Path) -> PathBuf {
    if !candidate.exists() {
        return candidate.to_path_buf();
    }

    let dir = candidate.parent().unwrap_or_else(|| Path::new("."));
    let stem = candidate
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let ext = candidate
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut i = 1;
    loop {
        let next = dir.join(format!("{}-{}{}", stem, i, ext));
        if !next.exists() {
            return next;
        }
        i += 1;
    }
}

/// Maps an image MIME type to a file extension.
///
/// Unknown types return `None`; callers fall back to `.bin`.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    match mime.trim().to_ascii_lowercase().as_str() {
        "image/png" => Some(".png"),
        "image/jpeg" | "image/jpg" => Some(".jpg"),
        "image/gif" => Some(".gif"),
        "image/webp" => Some(".webp"),
        "image/svg+xml" => Some(".svg"),
        "image/x-icon" | "image/vnd.microsoft.icon" => Some(".ico"),
        _ => None,
    }
}
