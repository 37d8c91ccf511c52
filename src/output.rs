//! Output types: caption records, per-item warnings, and the run report.

use crate::error::ItemError;
use serde::{Deserialize, Serialize};

/// Report text when a run produced no captions.
pub const NO_IMAGES_MESSAGE: &str = "No suitable images were processed.";

/// File name of the downloadable report.
pub const REPORT_FILE_NAME: &str = "captions.txt";

/// MIME type of the downloadable report.
pub const REPORT_MIME_TYPE: &str = "text/plain";

/// One captioned image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionRecord {
    /// Resolved image URL.
    pub url: String,
    /// Cleaned caption text.
    pub caption: String,
}

impl CaptionRecord {
    /// `"{url}: {caption}\n\n"`, the record's form in the report text.
    pub fn render(&self) -> String {
        format!("{}: {}\n\n", self.url, self.caption)
    }
}

/// A per-image failure surfaced to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemWarning {
    /// 0-based index of the candidate in the run.
    pub index: usize,
    /// Resolved URL of the failed image.
    pub url: String,
    /// Human-readable description of the failure.
    pub message: String,
}

impl ItemWarning {
    pub fn from_error(index: usize, error: &ItemError) -> Self {
        Self {
            index,
            url: error.url().to_string(),
            message: error.to_string(),
        }
    }
}

/// The aggregated result of one pipeline run.
///
/// Built by the pipeline and handed over as an immutable value; fields are
/// read through accessors.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    records: Vec<CaptionRecord>,
    warnings: Vec<ItemWarning>,
    total_candidates: usize,
    dropped_count: usize,
    skipped_count: usize,
    cancelled: bool,
    duration_ms: u64,
}

impl PipelineReport {
    /// Records in candidate order.
    pub fn records(&self) -> &[CaptionRecord] {
        &self.records
    }

    /// Per-image failures in candidate order.
    pub fn warnings(&self) -> &[ItemWarning] {
        &self.warnings
    }

    /// Number of captions produced.
    pub fn processed_count(&self) -> usize {
        self.records.len()
    }

    /// Number of candidates that failed to fetch, decode, or caption.
    pub fn failed_count(&self) -> usize {
        self.warnings.len()
    }

    /// Number of candidates the URL-shape filter dropped.
    pub fn dropped_count(&self) -> usize {
        self.dropped_count
    }

    /// Number of images below the pixel-area floor.
    pub fn skipped_count(&self) -> usize {
        self.skipped_count
    }

    /// Number of candidates handed to the run.
    pub fn total_candidates(&self) -> usize {
        self.total_candidates
    }

    /// `true` if the caller cancelled the run before every candidate was visited.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// The report text: every rendered record, or [`NO_IMAGES_MESSAGE`] when
    /// none were produced.
    pub fn text(&self) -> String {
        if self.records.is_empty() {
            return NO_IMAGES_MESSAGE.to_string();
        }
        self.records.iter().map(CaptionRecord::render).collect()
    }

    /// The report as a downloadable `captions.txt`.
    pub fn artifact(&self) -> ReportArtifact {
        ReportArtifact::new(self.text())
    }
}

/// Accumulates a [`PipelineReport`]; the pipeline is its only writer.
#[derive(Debug, Default)]
pub(crate) struct ReportBuilder {
    records: Vec<CaptionRecord>,
    warnings: Vec<ItemWarning>,
    total_candidates: usize,
    dropped_count: usize,
    skipped_count: usize,
    cancelled: bool,
}

impl ReportBuilder {
    pub(crate) fn new(total_candidates: usize) -> Self {
        Self {
            total_candidates,
            ..Self::default()
        }
    }

    pub(crate) fn push_record(&mut self, record: CaptionRecord) {
        self.records.push(record);
    }

    pub(crate) fn push_warning(&mut self, warning: ItemWarning) {
        self.warnings.push(warning);
    }

    pub(crate) fn count_dropped(&mut self) {
        self.dropped_count += 1;
    }

    pub(crate) fn count_skipped(&mut self) {
        self.skipped_count += 1;
    }

    pub(crate) fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    pub(crate) fn processed_count(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn finish(self, duration_ms: u64) -> PipelineReport {
        PipelineReport {
            records: self.records,
            warnings: self.warnings,
            total_candidates: self.total_candidates,
            dropped_count: self.dropped_count,
            skipped_count: self.skipped_count,
            cancelled: self.cancelled,
            duration_ms,
        }
    }
}

/// Result of captioning a page.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", content = "report", rename_all = "snake_case")]
pub enum PageOutcome {
    /// The page parsed but contains no `<img>` elements. Not an error.
    NoImagesFound,
    /// The pipeline ran over the page's images.
    Captioned(PipelineReport),
}

impl PageOutcome {
    pub fn report(&self) -> Option<&PipelineReport> {
        match self {
            PageOutcome::NoImagesFound => None,
            PageOutcome::Captioned(report) => Some(report),
        }
    }

    pub fn into_report(self) -> Option<PipelineReport> {
        match self {
            PageOutcome::NoImagesFound => None,
            PageOutcome::Captioned(report) => Some(report),
        }
    }
}

/// The downloadable form of a report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportArtifact {
    pub file_name: &'static str,
    pub mime_type: &'static str,
    pub data: String,
}

impl ReportArtifact {
    pub fn new(data: String) -> Self {
        Self {
            file_name: REPORT_FILE_NAME,
            mime_type: REPORT_MIME_TYPE,
            data,
        }
    }
}
