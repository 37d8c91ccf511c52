//! HTTP fetching behind a small capability trait.
//!
//! Both the page request and every image request go through
//! [`HttpFetcher::get`]. The production implementation is [`ReqwestFetcher`];
//! tests plug in in-memory fetchers so the pipeline can be exercised without
//! a network.
//!
//! The fetcher reports the raw status and leaves the "non-2xx is a failure"
//! policy to the caller ([`fetch_ok`]), so a fake fetcher only has to hand
//! back what a server would.

use crate::config::CaptionConfig;
use crate::error::{FetchError, Page2CaptionsError};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Status and body of a completed HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Capability to perform a bounded HTTP GET.
///
/// Implementations must honour `timeout` for the whole request including the
/// body, returning [`FetchError::Timeout`] when it elapses.
pub trait HttpFetcher: Send + Sync {
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<HttpResponse, FetchError>>;
}

/// GET `url` and fail on any non-2xx status.
pub async fn fetch_ok(
    fetcher: &dyn HttpFetcher,
    url: &str,
    timeout: Duration,
) -> Result<Vec<u8>, FetchError> {
    let response = fetcher.get(url, timeout).await?;
    if !response.is_success() {
        return Err(FetchError::Status {
            status: response.status,
        });
    }
    debug!("Fetched {} bytes from {}", response.body.len(), url);
    Ok(response.body)
}

/// [`HttpFetcher`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    client: reqwest::Client,
}

impl ReqwestFetcher {
    /// Build a client sending `user_agent` on every request.
    pub fn new(user_agent: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an already configured client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl HttpFetcher for ReqwestFetcher {
    fn get<'a>(
        &'a self,
        url: &'a str,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<HttpResponse, FetchError>> {
        Box::pin(async move {
            let map_err = |e: reqwest::Error| {
                if e.is_timeout() {
                    FetchError::Timeout {
                        secs: timeout.as_secs(),
                    }
                } else {
                    FetchError::Network(e.to_string())
                }
            };

            let response = self
                .client
                .get(url)
                .timeout(timeout)
                .send()
                .await
                .map_err(map_err)?;
            let status = response.status().as_u16();
            let body = response.bytes().await.map_err(map_err)?;

            Ok(HttpResponse {
                status,
                body: body.to_vec(),
            })
        })
    }
}

/// Resolve the fetcher for a run: the injected one, else a [`ReqwestFetcher`]
/// sending `config.user_agent`.
pub fn resolve_fetcher(config: &CaptionConfig) -> Result<Arc<dyn HttpFetcher>, Page2CaptionsError> {
    if let Some(ref fetcher) = config.fetcher {
        return Ok(Arc::clone(fetcher));
    }
    let fetcher = ReqwestFetcher::new(&config.user_agent)
        .map_err(|e| Page2CaptionsError::Internal(format!("HTTP client: {e}")))?;
    Ok(Arc::new(fetcher))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedFetcher(HttpResponse);

    impl HttpFetcher for FixedFetcher {
        fn get<'a>(
            &'a self,
            _url: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<HttpResponse, FetchError>> {
            let response = self.0.clone();
            Box::pin(async move { Ok(response) })
        }
    }

    #[tokio::test]
    async fn fetch_ok_passes_2xx_body() {
        let fetcher = FixedFetcher(HttpResponse::ok(b"abc".to_vec()));
        let body = fetch_ok(&fetcher, "https://a.test/", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(body, b"abc");
    }

    #[tokio::test]
    async fn fetch_ok_rejects_non_2xx() {
        let fetcher = FixedFetcher(HttpResponse {
            status: 503,
            body: vec![],
        });
        let err = fetch_ok(&fetcher, "https://a.test/", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, FetchError::Status { status: 503 });
    }

    #[test]
    fn success_range() {
        assert!(HttpResponse::ok(vec![]).is_success());
        assert!(HttpResponse { status: 204, body: vec![] }.is_success());
        assert!(!HttpResponse { status: 301, body: vec![] }.is_success());
        assert!(!HttpResponse { status: 404, body: vec![] }.is_success());
    }

    #[test]
    fn reqwest_fetcher_builds() {
        assert!(ReqwestFetcher::new("test-agent/1.0").is_ok());
    }
}
