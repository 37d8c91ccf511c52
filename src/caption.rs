//! Eager captioning entry points and the per-candidate pipeline.
//!
//! Every entry point funnels into [`caption_candidates`], which walks the
//! candidates in order and runs each one through the same sequence:
//!
//! ```text
//! candidate ──▶ URL filter ──▶ fetch ──▶ decode ──▶ area floor ──▶ RGB/fit ──▶ caption ──▶ record
//!               (drop)         (warn)    (warn)     (skip)                     (warn)
//! ```
//!
//! A drop or skip is silent; a warning carries the URL. None of them stop the
//! run or touch records already accumulated. The aggregator is the only
//! writer of the report and consumes outcomes strictly in candidate order.

use crate::config::CaptionConfig;
use crate::error::{CaptionError, ItemError, Page2CaptionsError};
use crate::extract::{parse_image_elements, resolve_candidate, ImageCandidate};
use crate::output::{CaptionRecord, ItemWarning, PageOutcome, PipelineReport, ReportBuilder};
use crate::pipeline::decode::{decode_blocking, normalise_blocking};
use crate::pipeline::fetch::{fetch_ok, resolve_fetcher, HttpFetcher};
use crate::pipeline::llm::{resolve_captioner, Captioner};
use crate::pipeline::page::fetch_page;
use crate::pipeline::postprocess::clean_caption;
use crate::progress::fraction;
use futures::stream::{self, Stream, StreamExt};
use std::path::Path;
use std::pin::pin;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// What happened to one candidate.
#[derive(Debug)]
pub(crate) enum ItemOutcome {
    /// Rejected by the URL-shape filter.
    Dropped,
    /// Decoded fine but below the pixel-area floor.
    Skipped,
    /// Fetch, decode, or caption failed.
    Failed(ItemError),
    /// Captioned.
    Captioned(CaptionRecord),
    /// The run was cancelled before this candidate started.
    Cancelled,
}

/// Caption every image on the page at `url`.
///
/// This is the primary entry point for the library.
///
/// # Returns
/// * `Ok(PageOutcome::NoImagesFound)`: the page has no `<img>` elements
/// * `Ok(PageOutcome::Captioned(report))`: the pipeline ran, even if no
///   image produced a caption (the report text is then the sentinel message)
///
/// # Errors
/// Only fatal errors: an invalid page URL, a failed page fetch, or no
/// captioning provider available.
pub async fn caption_page(
    url: impl AsRef<str>,
    config: &CaptionConfig,
) -> Result<PageOutcome, Page2CaptionsError> {
    let url = url.as_ref();
    info!("Starting captioning run: {}", url);

    let fetcher = resolve_fetcher(config)?;
    let html = fetch_page(fetcher.as_ref(), url, config.page_timeout_secs).await?;
    let candidates = parse_image_elements(&html);
    if candidates.is_empty() {
        info!("No images found on {}", url);
        return Ok(PageOutcome::NoImagesFound);
    }

    let captioner = resolve_captioner(config)?;
    let report =
        caption_candidates(&candidates, fetcher.as_ref(), captioner.as_ref(), config).await;
    Ok(PageOutcome::Captioned(report))
}

/// Caption every image referenced by `html`, which the caller already has.
pub async fn caption_html(
    html: &str,
    config: &CaptionConfig,
) -> Result<PageOutcome, Page2CaptionsError> {
    let candidates = parse_image_elements(html);
    if candidates.is_empty() {
        return Ok(PageOutcome::NoImagesFound);
    }

    let fetcher = resolve_fetcher(config)?;
    let captioner = resolve_captioner(config)?;
    let report =
        caption_candidates(&candidates, fetcher.as_ref(), captioner.as_ref(), config).await;
    Ok(PageOutcome::Captioned(report))
}

/// Caption the page at `url` and write the report to `output_path`.
///
/// Uses atomic write (temp file + rename) so a reader never sees a partial
/// file. When the page has no images nothing is written.
pub async fn caption_page_to_file(
    url: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &CaptionConfig,
) -> Result<PageOutcome, Page2CaptionsError> {
    let outcome = caption_page(url, config).await?;
    if let Some(report) = outcome.report() {
        write_report(report, output_path.as_ref()).await?;
    }
    Ok(outcome)
}

/// Synchronous wrapper around [`caption_page`].
///
/// Creates a temporary tokio runtime internally.
pub fn caption_page_sync(
    url: impl AsRef<str>,
    config: &CaptionConfig,
) -> Result<PageOutcome, Page2CaptionsError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Page2CaptionsError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(caption_page(url, config))
}

/// Run the captioning pipeline over `candidates`.
///
/// Never fails: every per-candidate error becomes a warning in the report.
/// Records appear in candidate order whatever `config.concurrency` is.
pub async fn caption_candidates(
    candidates: &[ImageCandidate],
    fetcher: &dyn HttpFetcher,
    captioner: &dyn Captioner,
    config: &CaptionConfig,
) -> PipelineReport {
    let start = Instant::now();
    let total = candidates.len();
    info!(
        "Captioning {} candidates (concurrency {})",
        total, config.concurrency
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_run_start(total);
    }

    let mut report = ReportBuilder::new(total);
    let mut outcomes = pin!(outcome_stream(candidates, fetcher, captioner, config));

    while let Some((index, outcome)) = outcomes.next().await {
        match outcome {
            ItemOutcome::Cancelled => {
                info!("Run cancelled after {} of {} candidates", index, total);
                report.mark_cancelled();
                break;
            }
            ItemOutcome::Dropped => report.count_dropped(),
            ItemOutcome::Skipped => report.count_skipped(),
            ItemOutcome::Failed(err) => {
                warn!("{}", err);
                let warning = ItemWarning::from_error(index, &err);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_item_warning(index, total, warning.url.clone(), warning.message.clone());
                }
                report.push_warning(warning);
            }
            ItemOutcome::Captioned(record) => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_item_captioned(index, total, &record.url, &record.caption);
                }
                report.push_record(record);
            }
        }

        if let Some(ref cb) = config.progress_callback {
            cb.on_progress(fraction(index, total), index, total);
        }
    }

    let processed = report.processed_count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_run_complete(total, processed);
    }

    let report = report.finish(start.elapsed().as_millis() as u64);
    info!(
        "Captioning complete: {} captioned, {} failed, {} skipped, {} dropped in {}ms",
        processed,
        report.failed_count(),
        report.skipped_count(),
        report.dropped_count(),
        report.duration_ms()
    );
    report
}

/// Outcomes for `candidates` in candidate order, with up to
/// `config.concurrency` candidates in flight.
pub(crate) fn outcome_stream<'a>(
    candidates: &'a [ImageCandidate],
    fetcher: &'a dyn HttpFetcher,
    captioner: &'a dyn Captioner,
    config: &'a CaptionConfig,
) -> impl Stream<Item = (usize, ItemOutcome)> + Send + 'a {
    stream::iter(candidates.iter().enumerate())
        .map(move |(index, candidate)| async move {
            if config.is_cancelled() {
                return (index, ItemOutcome::Cancelled);
            }
            let outcome = process_candidate(candidate, fetcher, captioner, config).await;
            (index, outcome)
        })
        .buffered(config.concurrency.max(1))
}

/// Run one candidate through filter → fetch → decode → floor → RGB and
/// downscale → caption.
pub(crate) async fn process_candidate(
    candidate: &ImageCandidate,
    fetcher: &dyn HttpFetcher,
    captioner: &dyn Captioner,
    config: &CaptionConfig,
) -> ItemOutcome {
    let Some(resolved) = resolve_candidate(candidate, config) else {
        return ItemOutcome::Dropped;
    };
    let url = resolved.into_string();

    let bytes = match fetch_ok(fetcher, &url, Duration::from_secs(config.image_timeout_secs)).await
    {
        Ok(bytes) => bytes,
        Err(source) => return ItemOutcome::Failed(ItemError::Fetch { url, source }),
    };

    let decoded = match decode_blocking(bytes).await {
        Ok(decoded) => decoded,
        Err(detail) => return ItemOutcome::Failed(ItemError::Decode { url, detail }),
    };

    if !decoded.meets_area_floor(config.min_pixel_area) {
        debug!(
            "Skipping {}: {}x{} is below {} pixels",
            url,
            decoded.width(),
            decoded.height(),
            config.min_pixel_area
        );
        return ItemOutcome::Skipped;
    }

    let rgb = match normalise_blocking(decoded, config.max_image_edge).await {
        Ok(rgb) => rgb,
        Err(detail) => return ItemOutcome::Failed(ItemError::Decode { url, detail }),
    };
    let caption_timeout = Duration::from_secs(config.caption_timeout_secs);
    let raw = match tokio::time::timeout(caption_timeout, captioner.caption(&rgb)).await {
        Ok(Ok(raw)) => raw,
        Ok(Err(source)) => return ItemOutcome::Failed(ItemError::Caption { url, source }),
        Err(_) => {
            let source = CaptionError::new(format!(
                "captioner timed out after {}s",
                config.caption_timeout_secs
            ));
            return ItemOutcome::Failed(ItemError::Caption { url, source });
        }
    };

    let caption = clean_caption(&raw);
    if caption.is_empty() {
        let source = CaptionError::new("empty caption");
        return ItemOutcome::Failed(ItemError::Caption { url, source });
    }

    debug!("Captioned {}: {}", url, caption);
    ItemOutcome::Captioned(CaptionRecord { url, caption })
}

/// Atomically write the report text to `path`.
pub(crate) async fn write_report(
    report: &PipelineReport,
    path: &Path,
) -> Result<(), Page2CaptionsError> {
    let write_err = |source| Page2CaptionsError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, report.text())
        .await
        .map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;

    info!("Wrote captions to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;
    use crate::output::NO_IMAGES_MESSAGE;
    use crate::pipeline::fetch::HttpResponse;
    use futures::future::BoxFuture;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(RgbImage::new(width, height))
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[derive(Default)]
    struct MapFetcher {
        routes: HashMap<String, Result<HttpResponse, FetchError>>,
        requested: Mutex<Vec<String>>,
    }

    impl MapFetcher {
        fn route(mut self, url: &str, result: Result<HttpResponse, FetchError>) -> Self {
            self.routes.insert(url.to_string(), result);
            self
        }
    }

    impl HttpFetcher for MapFetcher {
        fn get<'a>(
            &'a self,
            url: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<HttpResponse, FetchError>> {
            self.requested.lock().unwrap().push(url.to_string());
            let result = self
                .routes
                .get(url)
                .cloned()
                .unwrap_or(Ok(HttpResponse { status: 404, body: vec![] }));
            Box::pin(async move { result })
        }
    }

    struct SizeCaptioner;

    impl Captioner for SizeCaptioner {
        fn caption<'a>(&'a self, image: &'a RgbImage) -> BoxFuture<'a, Result<String, CaptionError>> {
            let (w, h) = image.dimensions();
            Box::pin(async move { Ok(format!("{w}x{h} square")) })
        }
    }

    #[tokio::test]
    async fn dropped_candidates_never_reach_fetch() {
        let fetcher = MapFetcher::default();
        let candidates = vec![
            ImageCandidate::missing(),
            ImageCandidate::new(""),
            ImageCandidate::new("//a.test/icon.svg"),
            ImageCandidate::new("/relative.png"),
        ];
        let report = caption_candidates(
            &candidates,
            &fetcher,
            &SizeCaptioner,
            &CaptionConfig::default(),
        )
        .await;

        assert!(fetcher.requested.lock().unwrap().is_empty());
        assert_eq!(report.dropped_count(), 4);
        assert_eq!(report.failed_count(), 0);
        assert_eq!(report.text(), NO_IMAGES_MESSAGE);
    }

    #[tokio::test]
    async fn protocol_relative_is_fetched_over_https() {
        let fetcher =
            MapFetcher::default().route("https://a.test/p.png", Ok(HttpResponse::ok(png(30, 30))));
        let report = caption_candidates(
            &[ImageCandidate::new("//a.test/p.png")],
            &fetcher,
            &SizeCaptioner,
            &CaptionConfig::default(),
        )
        .await;

        assert_eq!(
            *fetcher.requested.lock().unwrap(),
            vec!["https://a.test/p.png"]
        );
        assert_eq!(report.text(), "https://a.test/p.png: 30x30 square\n\n");
    }

    #[tokio::test]
    async fn small_images_are_skipped_without_warning() {
        let fetcher = MapFetcher::default()
            .route("https://a.test/tiny.png", Ok(HttpResponse::ok(png(19, 20))))
            .route("https://a.test/ok.png", Ok(HttpResponse::ok(png(20, 20))));
        let candidates = vec![
            ImageCandidate::new("https://a.test/tiny.png"),
            ImageCandidate::new("https://a.test/ok.png"),
        ];
        let report = caption_candidates(
            &candidates,
            &fetcher,
            &SizeCaptioner,
            &CaptionConfig::default(),
        )
        .await;

        assert_eq!(report.skipped_count(), 1);
        assert_eq!(report.failed_count(), 0);
        assert_eq!(report.processed_count(), 1);
        assert_eq!(report.records()[0].url, "https://a.test/ok.png");
    }

    #[tokio::test]
    async fn decode_failure_is_a_warning() {
        let fetcher = MapFetcher::default().route(
            "https://a.test/fake.jpg",
            Ok(HttpResponse::ok(b"<html>404</html>".to_vec())),
        );
        let report = caption_candidates(
            &[ImageCandidate::new("https://a.test/fake.jpg")],
            &fetcher,
            &SizeCaptioner,
            &CaptionConfig::default(),
        )
        .await;

        assert_eq!(report.failed_count(), 1);
        assert_eq!(report.warnings()[0].url, "https://a.test/fake.jpg");
        assert!(report.warnings()[0].message.contains("decode"));
    }

    #[tokio::test]
    async fn empty_caption_is_a_warning() {
        struct BlankCaptioner;
        impl Captioner for BlankCaptioner {
            fn caption<'a>(
                &'a self,
                _image: &'a RgbImage,
            ) -> BoxFuture<'a, Result<String, CaptionError>> {
                Box::pin(async { Ok("  \n ".to_string()) })
            }
        }

        let fetcher =
            MapFetcher::default().route("https://a.test/a.png", Ok(HttpResponse::ok(png(30, 30))));
        let report = caption_candidates(
            &[ImageCandidate::new("https://a.test/a.png")],
            &fetcher,
            &BlankCaptioner,
            &CaptionConfig::default(),
        )
        .await;

        assert_eq!(report.processed_count(), 0);
        assert!(report.warnings()[0].message.contains("empty caption"));
    }

    #[tokio::test]
    async fn write_report_creates_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("captions.txt");
        let report = ReportBuilder::new(0).finish(0);

        write_report(&report, &path).await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), NO_IMAGES_MESSAGE);
        assert!(!path.with_extension("txt.tmp").exists());
    }
}
