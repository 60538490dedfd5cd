//! Media resolution
//!
//! Every image on a sanitized page is examined through three sources: the
//! primary `src`, the lazy-load `data-src`, and the `srcset` candidate list.
//! Data URIs are decoded and saved; network URLs are fetched once per run
//! (the dedup map is keyed by the absolute URL) and written under
//! `images/` with a page-slug-prefixed, sanitized filename. Failures are
//! image-local: they are logged and leave the attribute unrewritten.

use crate::crawler::CrawlRun;
use crate::output::{extension_for_mime, sanitize_file_name, unique_path};
use crate::progress::ProgressBroadcaster;
use base64::Engine;
use dom_query::Document;
use percent_encoding::percent_decode_str;
use reqwest::header::{ACCEPT, CONTENT_TYPE, REFERER};
use reqwest::Client;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use url::Url;

/// Image URL sources collected from one `<img>` element.
#[derive(Debug, Clone, Default)]
pub(crate) struct ImageRef {
    pub src: Option<String>,
    pub data_src: Option<String>,
    pub srcset: Option<String>,
    pub alt: String,
    pub title: String,
}

/// Everything the resolver needs besides the run state.
pub(crate) struct MediaContext<'a> {
    pub client: &'a Client,
    pub progress: &'a ProgressBroadcaster,
    pub page_url: &'a Url,
    pub seed_scheme: &'a str,
    pub slug: &'a str,
    pub output_root: &'a Path,
}

/// Collects image references from a parsed page.
pub(crate) fn collect_image_refs(doc: &Document) -> Vec<ImageRef> {
    let mut refs = Vec::new();
    for img in doc.select("img").iter() {
        let attr = |name: &str| img.attr(name).map(|v| v.to_string()).filter(|v| !v.is_empty());
        refs.push(ImageRef {
            src: attr("src"),
            data_src: attr("data-src"),
            srcset: attr("srcset"),
            alt: img.attr("alt").map(|v| v.trim().to_string()).unwrap_or_default(),
            title: img.attr("title").map(|v| v.trim().to_string()).unwrap_or_default(),
        });
    }
    refs
}

/// Resolves every collected image reference.
///
/// Returns a map from the original attribute value (or srcset candidate URL)
/// to the saved relative path; references that failed are absent.
pub(crate) async fn resolve_images(
    ctx: &MediaContext<'_>,
    run: &mut CrawlRun,
    images: &[ImageRef],
) -> HashMap<String, String> {
    let mut resolved = HashMap::new();

    for image in images {
        let mut candidates: Vec<&str> = Vec::new();
        if let Some(src) = &image.src {
            candidates.push(src);
        }
        if let Some(data_src) = &image.data_src {
            candidates.push(data_src);
        }
        let srcset_entries = image
            .srcset
            .as_deref()
            .map(split_srcset)
            .unwrap_or_default();
        let mut all: Vec<String> = candidates.into_iter().map(str::to_string).collect();
        all.extend(srcset_entries.into_iter().map(|(url, _)| url));

        for candidate in all {
            if resolved.contains_key(&candidate) {
                continue;
            }
            if let Some(rel) = resolve_one(ctx, run, &candidate, &image.alt, &image.title).await {
                resolved.insert(candidate, rel);
            }
        }
    }

    resolved
}

/// Rewrites image attributes in place from the resolved map.
///
/// If the primary `src` was empty but a lazy or candidate reference resolved,
/// that result is promoted into `src`.
pub(crate) fn apply_image_rewrites(doc: &Document, resolved: &HashMap<String, String>) {
    for img in doc.select("img").iter() {
        if let Some(src) = img.attr("src").map(|v| v.to_string()) {
            if let Some(new) = resolved.get(&src) {
                img.set_attr("src", new);
            }
        }

        if let Some(data_src) = img.attr("data-src").map(|v| v.to_string()) {
            if let Some(new) = resolved.get(&data_src) {
                img.set_attr("data-src", new);
                let src_empty = img.attr("src").map(|v| v.is_empty()).unwrap_or(true);
                if src_empty {
                    img.set_attr("src", new);
                }
            }
        }

        if let Some(srcset) = img.attr("srcset").map(|v| v.to_string()) {
            let mut rewritten = Vec::new();
            for (url, descriptor) in split_srcset(&srcset) {
                if let Some(new) = resolved.get(&url) {
                    match &descriptor {
                        Some(d) => rewritten.push(format!("{} {}", new, d)),
                        None => rewritten.push(new.clone()),
                    }
                }
            }
            if !rewritten.is_empty() {
                let src_empty = img.attr("src").map(|v| v.is_empty()).unwrap_or(true);
                if src_empty {
                    let first = rewritten[0]
                        .split_whitespace()
                        .next()
                        .unwrap_or_default()
                        .to_string();
                    img.set_attr("src", &first);
                }
                img.set_attr("srcset", &rewritten.join(", "));
            }
        }
    }
}

/// Splits a srcset attribute into (url, optional descriptor) pairs.
pub(crate) fn split_srcset(srcset: &str) -> Vec<(String, Option<String>)> {
    srcset
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.split_once(char::is_whitespace) {
            Some((url, descriptor)) => (url.to_string(), Some(descriptor.trim().to_string())),
            None => (part.to_string(), None),
        })
        .collect()
}

/// Resolves one candidate URL to a saved relative path.
async fn resolve_one(
    ctx: &MediaContext<'_>,
    run: &mut CrawlRun,
    raw: &str,
    alt: &str,
    title: &str,
) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.len() >= 5 && trimmed.as_bytes()[..5].eq_ignore_ascii_case(b"data:") {
        return save_data_uri(ctx, run, trimmed).await;
    }

    // complete protocol-relative URLs with the seed's scheme
    let completed;
    let candidate = if trimmed.starts_with("//") {
        completed = format!("{}:{}", ctx.seed_scheme, trimmed);
        completed.as_str()
    } else {
        trimmed
    };

    let img_url = match ctx.page_url.join(candidate) {
        Ok(u) => u,
        Err(_) => {
            run.note(ctx.progress, format!("Invalid image URL: {}", raw));
            return None;
        }
    };
    if img_url.scheme() != "http" && img_url.scheme() != "https" {
        run.note(ctx.progress, format!("Invalid image URL: {}", raw));
        return None;
    }

    let key = img_url.to_string();
    if let Some(rel) = run.image_map.get(&key) {
        return Some(rel.clone());
    }

    let response = match ctx
        .client
        .get(img_url.clone())
        .header(REFERER, ctx.page_url.as_str())
        .header(ACCEPT, "*/*")
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            run.note(
                ctx.progress,
                format!("Failed to download image {}: {}", img_url, e),
            );
            return None;
        }
    };

    if !response.status().is_success() {
        run.note(
            ctx.progress,
            format!("Failed to download image {}: {}", img_url, response.status()),
        );
        return None;
    }

    let content_ext = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.split(';').next().unwrap_or("").trim().to_string())
        .as_deref()
        .and_then(extension_for_mime);

    let bytes = match response.bytes().await {
        Ok(b) => b,
        Err(e) => {
            run.note(
                ctx.progress,
                format!("Failed to download image {}: {}", img_url, e),
            );
            return None;
        }
    };

    let file_name = derive_image_name(&img_url, content_ext, alt, title, ctx.slug, run);

    match write_image(ctx.output_root, &file_name, &bytes).await {
        Ok((rel, path)) => {
            run.image_map.insert(key, rel.clone());
            run.note(
                ctx.progress,
                format!("Saved image: {} -> {}", img_url, path.display()),
            );
            Some(rel)
        }
        Err(e) => {
            run.note(
                ctx.progress,
                format!("Failed to save image {}: {}", img_url, e),
            );
            None
        }
    }
}

/// Decodes and saves a data-URI image.
async fn save_data_uri(
    ctx: &MediaContext<'_>,
    run: &mut CrawlRun,
    uri: &str,
) -> Option<String> {
    if let Some(rel) = run.image_map.get(uri) {
        return Some(rel.clone());
    }

    let comma = match uri.find(',') {
        Some(i) => i,
        None => {
            run.note(ctx.progress, "Failed to save data-uri image: missing payload".to_string());
            return None;
        }
    };

    let meta = &uri[5..comma];
    let is_base64 = meta.to_ascii_lowercase().ends_with(";base64");
    let mime = meta.split(';').next().unwrap_or("");
    let ext = extension_for_mime(mime).unwrap_or(".bin");

    let payload = &uri[comma + 1..];
    let bytes = if is_base64 {
        let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
        match base64::engine::general_purpose::STANDARD.decode(compact) {
            Ok(b) => b,
            Err(e) => {
                run.note(ctx.progress, format!("Failed to save data-uri image: {}", e));
                return None;
            }
        }
    } else {
        percent_decode_str(payload).collect()
    };

    let index = run.next_image_index(ctx.slug);
    let file_name = sanitize_file_name(&format!("{}-image-{}{}", ctx.slug, index, ext));

    match write_image(ctx.output_root, &file_name, &bytes).await {
        Ok((rel, path)) => {
            run.image_map.insert(uri.to_string(), rel.clone());
            run.note(
                ctx.progress,
                format!("Saved data-uri image -> {}", path.display()),
            );
            Some(rel)
        }
        Err(e) => {
            run.note(ctx.progress, format!("Failed to save data-uri image: {}", e));
            None
        }
    }
}

/// Writes image bytes under `images/`, resolving name collisions, and
/// returns the output-relative path plus the full path.
async fn write_image(
    output_root: &Path,
    file_name: &str,
    bytes: &[u8],
) -> std::io::Result<(String, PathBuf)> {
    let path = unique_path(&output_root.join("images").join(file_name));
    tokio::fs::write(&path, bytes).await?;
    let rel = format!(
        "images/{}",
        path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default()
    );
    Ok((rel, path))
}

/// Derives a filename for a downloaded image.
///
/// Priority: the URL's path segment, then a `file`/`name`/`filename` query
/// parameter, then alt/title text, then a page-scoped sequence counter. The
/// result is always prefixed with the page slug and carries the
/// content-type extension when the URL's extension is missing or mismatched.
fn derive_image_name(
    img_url: &Url,
    content_ext: Option<&'static str>,
    alt: &str,
    title: &str,
    slug: &str,
    run: &mut CrawlRun,
) -> String {
    let mut raw_name = img_url
        .path_segments()
        .and_then(|segments| segments.last().map(str::to_string))
        .map(|s| percent_decode_str(&s).decode_utf8_lossy().to_string())
        .unwrap_or_default();

    if raw_name.is_empty() {
        for (k, v) in img_url.query_pairs() {
            let k = k.to_ascii_lowercase();
            if k.contains("file") || k.contains("name") {
                raw_name = v.to_string();
                break;
            }
        }
    }

    let hint = {
        let h = if !alt.is_empty() { alt } else { title };
        sanitize_file_name(h)
    };

    if raw_name.is_empty() {
        return if !hint.is_empty() {
            format!("{}-{}{}", slug, hint, content_ext.unwrap_or(".bin"))
        } else {
            let index = run.next_image_index(slug);
            format!("{}-image-{}{}", slug, index, content_ext.unwrap_or(".bin"))
        };
    }

    let (stem, url_ext) = match raw_name.rfind('.') {
        Some(i) if i > 0 => (raw_name[..i].to_string(), raw_name[i..].to_string()),
        _ => (raw_name.clone(), String::new()),
    };

    // prefer the content-type extension over a missing or mismatched one
    let final_ext = if url_ext.is_empty() {
        content_ext.unwrap_or(".bin").to_string()
    } else if let Some(ext) = content_ext {
        if url_ext.eq_ignore_ascii_case(ext) {
            url_ext
        } else {
            ext.to_string()
        }
    } else {
        url_ext
    };

    let stem = sanitize_file_name(&stem);
    if stem.is_empty() {
        if !hint.is_empty() {
            return format!("{}-{}{}", slug, hint, final_ext);
        }
        let index = run.next_image_index(slug);
        return format!("{}-image-{}{}", slug, index, final_ext);
    }

    // prepend the page slug for context, avoiding duplication
    let lowered = stem.to_ascii_lowercase();
    let slug_lower = slug.to_ascii_lowercase();
    if lowered == slug_lower || lowered.starts_with(&format!("{}-", slug_lower)) {
        format!("{}{}", stem, final_ext)
    } else {
        format!("{}-{}{}", slug, stem, final_ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_run() -> CrawlRun {
        CrawlRun::new(&Url::parse("https://example.com/").unwrap())
    }

    #[test]
    fn test_split_srcset() {
        let parts = split_srcset("a.png 1x, b.png 2x , c.png");
        assert_eq!(
            parts,
            vec![
                ("a.png".to_string(), Some("1x".to_string())),
                ("b.png".to_string(), Some("2x".to_string())),
                ("c.png".to_string(), None),
            ]
        );
    }

    #[test]
    fn test_derive_name_from_url_path() {
        let mut run = test_run();
        let url = Url::parse("https://cdn.example.com/media/hero.png").unwrap();
        let name = derive_image_name(&url, Some(".png"), "", "", "about", &mut run);
        assert_eq!(name, "about-hero.png");
    }

    #[test]
    fn test_derive_name_content_type_overrides_mismatch() {
        let mut run = test_run();
        let url = Url::parse("https://cdn.example.com/media/hero.jpeg").unwrap();
        let name = derive_image_name(&url, Some(".png"), "", "", "about", &mut run);
        assert_eq!(name, "about-hero.png");
    }

    #[test]
    fn test_derive_name_from_query_param() {
        let mut run = test_run();
        let url = Url::parse("https://example.com/fetch?file=logo.gif").unwrap();
        let name = derive_image_name(&url, None, "", "", "index", &mut run);
        assert_eq!(name, "index-logo.gif");
    }

    #[test]
    fn test_derive_name_from_alt_text() {
        let mut run = test_run();
        let url = Url::parse("https://example.com/").unwrap();
        let name = derive_image_name(&url, Some(".jpg"), "Team photo", "", "staff", &mut run);
        assert_eq!(name, "staff-Team-photo.jpg");
    }

    #[test]
    fn test_derive_name_falls_back_to_counter() {
        let mut run = test_run();
        let url = Url::parse("https://example.com/").unwrap();
        let first = derive_image_name(&url, None, "", "", "index", &mut run);
        let second = derive_image_name(&url, None, "", "", "index", &mut run);
        assert_eq!(first, "index-image-1.bin");
        assert_eq!(second, "index-image-2.bin");
    }

    #[test]
    fn test_derive_name_avoids_double_slug_prefix() {
        let mut run = test_run();
        let url = Url::parse("https://example.com/about-banner.png").unwrap();
        let name = derive_image_name(&url, Some(".png"), "", "", "about", &mut run);
        assert_eq!(name, "about-banner.png");
    }

    #[test]
    fn test_collect_image_refs() {
        let doc = Document::from(
            r#"<img src="a.png" alt=" Hero "><img data-src="b.png" srcset="c.png 1x">"#,
        );
        let refs = collect_image_refs(&doc);
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].src.as_deref(), Some("a.png"));
        assert_eq!(refs[0].alt, "Hero");
        assert_eq!(refs[1].src, None);
        assert_eq!(refs[1].data_src.as_deref(), Some("b.png"));
        assert_eq!(refs[1].srcset.as_deref(), Some("c.png 1x"));
    }

    #[test]
    fn test_apply_rewrites_and_promotion() {
        let doc = Document::from(
            r#"<img src="a.png"><img data-src="b.png" srcset="c.png 1x, d.png 2x">"#,
        );
        let mut resolved = HashMap::new();
        resolved.insert("a.png".to_string(), "images/p-a.png".to_string());
        resolved.insert("b.png".to_string(), "images/p-b.png".to_string());
        resolved.insert("c.png".to_string(), "images/p-c.png".to_string());
        apply_image_rewrites(&doc, &resolved);

        let html = doc.select("body").inner_html().to_string();
        assert!(html.contains(r#"src="images/p-a.png""#));
        // lazy result promoted into the empty src
        assert!(html.contains(r#"src="images/p-b.png""#));
        assert!(html.contains(r#"data-src="images/p-b.png""#));
        // unresolved srcset entries are dropped, resolved ones kept
        assert!(html.contains(r#"srcset="images/p-c.png 1x""#));
        assert!(!html.contains("d.png 2x"));
    }

    #[test]
    fn test_failed_resolution_leaves_attribute() {
        let doc = Document::from(r#"<img src="broken.png">"#);
        apply_image_rewrites(&doc, &HashMap::new());
        let html = doc.select("body").inner_html().to_string();
        assert!(html.contains(r#"src="broken.png""#));
    }
}
