//! Candidate extraction: `<img>` elements → image candidates → resolved URLs.
//!
//! Extraction is split in two so that neither half needs the other's state:
//!
//! 1. [`extract`] / [`parse_image_elements`] turn markup into an
//!    order-preserving list of [`ImageCandidate`]s. Nothing is filtered here.
//! 2. [`resolve_candidate`] applies the URL-shape filter to one candidate and
//!    either returns a [`ResolvedImageUrl`] or drops it. The pipeline calls it
//!    per candidate, before any network work.
//!
//! The filter rules, in order:
//!
//! 1. absent or empty `src` → drop
//! 2. `src` contains an excluded substring (`svg`, `1x1` by default) → drop
//! 3. `//host/path` → `https://host/path`
//! 4. anything not starting with `http://` or `https://` → drop
//!
//! Drops are expected and frequent (inline SVG, data URIs, relative paths)
//! so they are logged at `trace` level only.

use crate::config::CaptionConfig;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, trace};

/// A markup element that may reference an image.
///
/// Implemented for `scraper` elements and for [`ImageCandidate`] itself so the
/// extractor works with any parser that can answer attribute lookups.
pub trait ElementRecord {
    /// Value of the attribute `name`, or `None` when absent.
    fn attr(&self, name: &str) -> Option<&str>;
}

impl ElementRecord for ElementRef<'_> {
    fn attr(&self, name: &str) -> Option<&str> {
        self.value().attr(name)
    }
}

/// The raw `src` of one `<img>` element.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageCandidate {
    pub src: Option<String>,
}

impl ImageCandidate {
    pub fn new(src: impl Into<String>) -> Self {
        Self {
            src: Some(src.into()),
        }
    }

    /// A candidate whose element carried no `src` attribute.
    pub fn missing() -> Self {
        Self { src: None }
    }
}

impl ElementRecord for ImageCandidate {
    fn attr(&self, name: &str) -> Option<&str> {
        match name {
            "src" => self.src.as_deref(),
            _ => None,
        }
    }
}

/// An absolute `http://` or `https://` image URL.
///
/// The only constructor is [`resolve_candidate`], so holding one proves the
/// URL-shape filter has already accepted it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ResolvedImageUrl(String);

impl ResolvedImageUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for ResolvedImageUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ResolvedImageUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// `true` when `s` is an absolute HTTP(S) URL by prefix.
pub fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Collect the `src` of every element, preserving order.
pub fn extract<E: ElementRecord>(elements: impl IntoIterator<Item = E>) -> Vec<ImageCandidate> {
    elements
        .into_iter()
        .map(|el| ImageCandidate {
            src: el.attr("src").map(str::to_string),
        })
        .collect()
}

/// Parse an HTML document and return one candidate per `<img>` element, in
/// document order.
///
/// `scraper::Html` is not `Send`; keeping the parse inside this synchronous
/// function means async callers never hold it across an `.await`.
pub fn parse_image_elements(html: &str) -> Vec<ImageCandidate> {
    let document = Html::parse_document(html);
    let img_sel = match Selector::parse("img") {
        Ok(sel) => sel,
        Err(_) => return Vec::new(),
    };
    let candidates = extract(document.select(&img_sel));
    debug!("Found {} <img> elements", candidates.len());
    candidates
}

/// Apply the URL-shape filter to one candidate.
///
/// Returns `None` for a drop; drops are never errors.
pub fn resolve_candidate(
    candidate: &ImageCandidate,
    config: &CaptionConfig,
) -> Option<ResolvedImageUrl> {
    let src = match candidate.src.as_deref() {
        Some(s) if !s.is_empty() => s,
        _ => {
            trace!("Dropping candidate without src");
            return None;
        }
    };

    if config.is_excluded(src) {
        trace!("Dropping excluded candidate: {}", src);
        return None;
    }

    if let Some(rest) = src.strip_prefix("//") {
        return Some(ResolvedImageUrl(format!("https://{rest}")));
    }

    if is_http_url(src) {
        Some(ResolvedImageUrl(src.to_string()))
    } else {
        trace!("Dropping non-HTTP candidate: {}", src);
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(src: &str) -> Option<String> {
        resolve_candidate(&ImageCandidate::new(src), &CaptionConfig::default())
            .map(ResolvedImageUrl::into_string)
    }

    #[test]
    fn absent_and_empty_src_are_dropped() {
        let config = CaptionConfig::default();
        assert!(resolve_candidate(&ImageCandidate::missing(), &config).is_none());
        assert!(resolve_candidate(&ImageCandidate::new(""), &config).is_none());
    }

    #[test]
    fn protocol_relative_becomes_https() {
        assert_eq!(
            resolve("//cdn.a.test/photo.jpg").as_deref(),
            Some("https://cdn.a.test/photo.jpg")
        );
    }

    #[test]
    fn absolute_urls_pass_through() {
        assert_eq!(
            resolve("http://a.test/x.jpg").as_deref(),
            Some("http://a.test/x.jpg")
        );
        assert_eq!(
            resolve("https://a.test/x.jpg").as_deref(),
            Some("https://a.test/x.jpg")
        );
    }

    #[test]
    fn excluded_substrings_drop_before_rewrite() {
        assert_eq!(resolve("//a.test/icon.svg"), None);
        assert_eq!(resolve("https://a.test/track_1x1.gif"), None);
        // "svg" anywhere in the URL counts, not just the extension.
        assert_eq!(resolve("https://a.test/svgs/photo.png"), None);
    }

    #[test]
    fn non_http_sources_are_dropped() {
        assert_eq!(resolve("data:image/png;base64,iVBORw0KGgo="), None);
        assert_eq!(resolve("/static/photo.jpg"), None);
        assert_eq!(resolve("photo.jpg"), None);
        assert_eq!(resolve("ftp://a.test/photo.jpg"), None);
        assert_eq!(resolve("HTTPS://a.test/photo.jpg"), None);
    }

    #[test]
    fn custom_exclusions_replace_defaults() {
        let config = CaptionConfig::builder()
            .excluded_substrings(["thumb"])
            .build()
            .unwrap();
        let svg = ImageCandidate::new("https://a.test/diagram.svg");
        let thumb = ImageCandidate::new("https://a.test/thumb/photo.jpg");
        assert!(resolve_candidate(&svg, &config).is_some());
        assert!(resolve_candidate(&thumb, &config).is_none());
    }

    #[test]
    fn parse_keeps_document_order_and_missing_src() {
        let html = r#"<html><body>
            <img src="https://a.test/1.jpg">
            <p><img alt="no source"></p>
            <img src="//a.test/2.png">
            <img src="">
        </body></html>"#;
        let candidates = parse_image_elements(html);
        assert_eq!(
            candidates,
            vec![
                ImageCandidate::new("https://a.test/1.jpg"),
                ImageCandidate::missing(),
                ImageCandidate::new("//a.test/2.png"),
                ImageCandidate::new(""),
            ]
        );
    }

    #[test]
    fn parse_without_images_is_empty() {
        assert!(parse_image_elements("<html><body><p>text</p></body></html>").is_empty());
    }

    #[test]
    fn extract_works_on_candidates() {
        let input = vec![ImageCandidate::new("a"), ImageCandidate::missing()];
        assert_eq!(extract(input.clone()), input);
    }
}
