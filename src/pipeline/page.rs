//! Page acquisition: validate the page URL and fetch its HTML.
//!
//! Unlike image fetches, a page fetch failure is fatal: without markup there
//! are no candidates, so the error aborts the run and is returned to the
//! caller as [`Page2CaptionsError`].

use crate::error::{FetchError, Page2CaptionsError};
use crate::extract::is_http_url;
use crate::pipeline::fetch::{fetch_ok, HttpFetcher};
use std::time::Duration;
use tracing::info;

/// Fetch the page at `url` and return its body as text.
///
/// The body is decoded as UTF-8 with replacement characters for invalid
/// sequences; `<img src>` values are ASCII in practice and survive either way.
pub async fn fetch_page(
    fetcher: &dyn HttpFetcher,
    url: &str,
    timeout_secs: u64,
) -> Result<String, Page2CaptionsError> {
    if !is_http_url(url) {
        return Err(Page2CaptionsError::InvalidInput {
            input: url.to_string(),
        });
    }

    info!("Fetching page: {}", url);
    let body = fetch_ok(fetcher, url, Duration::from_secs(timeout_secs))
        .await
        .map_err(|e| match e {
            FetchError::Timeout { .. } => Page2CaptionsError::PageFetchTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            },
            other => Page2CaptionsError::PageFetchFailed {
                url: url.to_string(),
                reason: other.to_string(),
            },
        })?;

    info!("Fetched page: {} bytes", body.len());
    Ok(String::from_utf8_lossy(&body).into_owned())
}
