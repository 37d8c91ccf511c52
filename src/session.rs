//! Caller-owned session state for interactive front-ends.
//!
//! A front-end typically lets a user caption several pages in a row and
//! offers the last result for download. [`CaptionSession`] holds everything
//! that outlives one run: the resolved fetcher and captioner (built once,
//! reused by every run) and the last report with its "processed" flag.
//!
//! ```rust,no_run
//! use edgequake_page2captions::{CaptionConfig, CaptionSession};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut session = CaptionSession::new(CaptionConfig::default())?;
//! session.run("https://example.com").await?;
//! if let Some(artifact) = session.download() {
//!     std::fs::write(artifact.file_name, artifact.data)?;
//! }
//! # Ok(())
//! # }
//! ```

use crate::caption::caption_candidates;
use crate::config::CaptionConfig;
use crate::error::Page2CaptionsError;
use crate::extract::parse_image_elements;
use crate::output::{PageOutcome, PipelineReport, ReportArtifact};
use crate::pipeline::fetch::{resolve_fetcher, HttpFetcher};
use crate::pipeline::llm::{resolve_captioner, Captioner};
use crate::pipeline::page::fetch_page;
use std::sync::Arc;
use tracing::info;

/// Memoised collaborators plus the result of the most recent run.
pub struct CaptionSession {
    config: CaptionConfig,
    fetcher: Arc<dyn HttpFetcher>,
    captioner: Arc<dyn Captioner>,
    processed: bool,
    last_report: Option<PipelineReport>,
}

impl CaptionSession {
    /// Resolve the fetcher and captioner once for the session's lifetime.
    pub fn new(config: CaptionConfig) -> Result<Self, Page2CaptionsError> {
        let fetcher = resolve_fetcher(&config)?;
        let captioner = resolve_captioner(&config)?;
        Ok(Self::with_collaborators(config, fetcher, captioner))
    }

    /// Build a session around collaborators the caller already owns.
    pub fn with_collaborators(
        config: CaptionConfig,
        fetcher: Arc<dyn HttpFetcher>,
        captioner: Arc<dyn Captioner>,
    ) -> Self {
        Self {
            config,
            fetcher,
            captioner,
            processed: false,
            last_report: None,
        }
    }

    pub fn config(&self) -> &CaptionConfig {
        &self.config
    }

    /// Caption the page at `url` with the session's collaborators.
    ///
    /// A captioned page replaces the previous report and marks the session
    /// processed. A page without images, or a fatal error, leaves the previous
    /// result in place.
    pub async fn run(&mut self, url: &str) -> Result<PageOutcome, Page2CaptionsError> {
        let html = fetch_page(self.fetcher.as_ref(), url, self.config.page_timeout_secs).await?;
        self.run_html(&html).await
    }

    /// Like [`CaptionSession::run`] for markup the caller already has.
    pub async fn run_html(&mut self, html: &str) -> Result<PageOutcome, Page2CaptionsError> {
        let candidates = parse_image_elements(html);
        if candidates.is_empty() {
            info!("No images found; keeping previous session result");
            return Ok(PageOutcome::NoImagesFound);
        }

        let report = caption_candidates(
            &candidates,
            self.fetcher.as_ref(),
            self.captioner.as_ref(),
            &self.config,
        )
        .await;

        self.processed = true;
        self.last_report = Some(report.clone());
        Ok(PageOutcome::Captioned(report))
    }

    /// `true` once any run in this session has produced a report.
    pub fn is_processed(&self) -> bool {
        self.processed
    }

    pub fn last_report(&self) -> Option<&PipelineReport> {
        self.last_report.as_ref()
    }

    /// Text of the last report, if any.
    pub fn captions(&self) -> Option<String> {
        self.last_report.as_ref().map(PipelineReport::text)
    }

    /// The last report as `captions.txt`, available only after processing.
    pub fn download(&self) -> Option<ReportArtifact> {
        if !self.processed {
            return None;
        }
        self.last_report
            .as_ref()
            .map(PipelineReport::artifact)
            .filter(|artifact| !artifact.data.is_empty())
    }

    /// Forget the last result; collaborators are kept.
    pub fn reset(&mut self) {
        self.processed = false;
        self.last_report = None;
    }
}
