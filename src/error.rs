//! Error types for the edgequake-page2captions library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Page2CaptionsError`]: **Fatal**: the run cannot proceed at all
//!   (bad page URL, the page itself could not be fetched, provider not
//!   configured). Returned as `Err(Page2CaptionsError)` from the top-level
//!   `caption_*` functions.
//!
//! * [`ItemError`]: **Non-fatal**: a single image failed (fetch error,
//!   undecodable bytes, model error) but every other candidate is still
//!   attempted. Surfaced as an [`crate::output::ItemWarning`] tagged with the
//!   offending URL.
//!
//! [`FetchError`] and [`CaptionError`] are the failure types of the two
//! pluggable collaborators ([`crate::pipeline::fetch::HttpFetcher`] and
//! [`crate::pipeline::llm::Captioner`]); the pipeline wraps them into
//! [`ItemError`] together with the URL being processed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-page2captions library.
///
/// Per-image failures use [`ItemError`] and never surface here.
#[derive(Debug, Error)]
pub enum Page2CaptionsError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The page address is not an absolute HTTP/HTTPS URL.
    #[error("Invalid input '{input}': not a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The page could not be fetched (network error or non-2xx status).
    #[error("Failed to fetch page '{url}': {reason}\nCheck the URL and your internet connection.")]
    PageFetchFailed { url: String, reason: String },

    /// The page fetch exceeded the configured timeout.
    #[error("Page fetch timed out after {secs}s for '{url}'\nIncrease --page-timeout.")]
    PageFetchTimeout { url: String, secs: u64 },

    // ── LLM errors ────────────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the captions file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Failure reported by an [`crate::pipeline::fetch::HttpFetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum FetchError {
    /// The request did not complete within the timeout.
    #[error("request timed out after {secs}s")]
    Timeout { secs: u64 },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// Connection, TLS, or body-read failure.
    #[error("network error: {0}")]
    Network(String),
}

/// Failure reported by a [`crate::pipeline::llm::Captioner`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{detail}")]
pub struct CaptionError {
    pub detail: String,
}

impl CaptionError {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: detail.into(),
        }
    }
}

/// A non-fatal error for a single image candidate.
///
/// The run continues with the next candidate; the error is rendered into an
/// [`crate::output::ItemWarning`] for the caller.
#[derive(Debug, Clone, Error, Serialize, Deserialize)]
pub enum ItemError {
    /// Fetching the image bytes failed.
    #[error("Error processing image {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },

    /// The bytes are not a decodable image.
    #[error("Error processing image {url}: cannot decode image: {detail}")]
    Decode { url: String, detail: String },

    /// The captioner failed for this image.
    #[error("Error processing image {url}: captioning failed: {source}")]
    Caption {
        url: String,
        #[source]
        source: CaptionError,
    },
}

impl ItemError {
    /// The URL of the candidate that failed.
    pub fn url(&self) -> &str {
        match self {
            ItemError::Fetch { url, .. }
            | ItemError::Decode { url, .. }
            | ItemError::Caption { url, .. } => url,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_fetch_timeout_display() {
        let e = Page2CaptionsError::PageFetchTimeout {
            url: "https://a.test/".into(),
            secs: 10,
        };
        let msg = e.to_string();
        assert!(msg.contains("10s"), "got: {msg}");
        assert!(msg.contains("https://a.test/"));
    }

    #[test]
    fn item_error_display_names_url() {
        let e = ItemError::Fetch {
            url: "https://a.test/x.jpg".into(),
            source: FetchError::Status { status: 404 },
        };
        let msg = e.to_string();
        assert!(msg.contains("https://a.test/x.jpg"));
        assert!(msg.contains("HTTP 404"));
    }

    #[test]
    fn item_error_url_accessor() {
        let e = ItemError::Caption {
            url: "https://a.test/y.png".into(),
            source: CaptionError::new("model overloaded"),
        };
        assert_eq!(e.url(), "https://a.test/y.png");
        assert!(e.to_string().contains("model overloaded"));
    }

    #[test]
    fn fetch_timeout_display() {
        let e = FetchError::Timeout { secs: 10 };
        assert_eq!(e.to_string(), "request timed out after 10s");
    }
}
