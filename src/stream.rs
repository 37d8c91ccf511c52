//! Streaming captioning API: emit records and warnings as candidates finish.
//!
//! Unlike the eager [`crate::caption::caption_candidates`], which returns only
//! after every candidate has been visited, [`caption_stream`] yields each
//! caption record or per-image warning as soon as it is ready. Items arrive
//! in candidate order even with `concurrency > 1`. Dropped and undersized
//! candidates yield nothing.

use crate::caption::{process_candidate, ItemOutcome};
use crate::config::CaptionConfig;
use crate::error::Page2CaptionsError;
use crate::extract::{parse_image_elements, ImageCandidate};
use crate::output::{CaptionRecord, ItemWarning};
use crate::pipeline::fetch::{resolve_fetcher, HttpFetcher};
use crate::pipeline::llm::{resolve_captioner, Captioner};
use crate::pipeline::page::fetch_page;
use crate::progress::fraction;
use futures::future;
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{info, warn};

/// A boxed stream of caption records and per-image warnings.
pub type CaptionStream = Pin<Box<dyn Stream<Item = Result<CaptionRecord, ItemWarning>> + Send>>;

/// Caption `candidates`, streaming results in candidate order.
///
/// The config's progress callback receives the same events, in the same
/// order, as with [`crate::caption::caption_candidates`]: run start, one
/// captioned/warning event plus a progress fraction per visited candidate,
/// and run completion once the stream is exhausted.
///
/// The stream ends early, without an error item, once the config's cancel
/// token fires.
pub fn caption_stream(
    candidates: Vec<ImageCandidate>,
    fetcher: Arc<dyn HttpFetcher>,
    captioner: Arc<dyn Captioner>,
    config: &CaptionConfig,
) -> CaptionStream {
    let total = candidates.len();
    let concurrency = config.concurrency.max(1);
    let callback = config.progress_callback.clone();
    let processed = Arc::new(AtomicUsize::new(0));
    let config = Arc::new(config.clone());

    let start_cb = callback.clone();
    let start = stream::once(async move {
        if let Some(cb) = start_cb {
            cb.on_run_start(total);
        }
        None::<Result<CaptionRecord, ItemWarning>>
    });

    let item_cb = callback.clone();
    let item_processed = Arc::clone(&processed);
    let items = stream::iter(candidates.into_iter().enumerate())
        .map(move |(index, candidate)| {
            let fetcher = Arc::clone(&fetcher);
            let captioner = Arc::clone(&captioner);
            let cfg = Arc::clone(&config);
            async move {
                if cfg.is_cancelled() {
                    return (index, ItemOutcome::Cancelled);
                }
                let outcome =
                    process_candidate(&candidate, fetcher.as_ref(), captioner.as_ref(), &cfg).await;
                (index, outcome)
            }
        })
        .buffered(concurrency)
        .take_while(|(_, outcome)| {
            let keep_going = !matches!(outcome, ItemOutcome::Cancelled);
            if !keep_going {
                info!("Caption stream cancelled");
            }
            future::ready(keep_going)
        })
        .map(move |(index, outcome)| {
            let item = match outcome {
                ItemOutcome::Captioned(record) => {
                    item_processed.fetch_add(1, Ordering::SeqCst);
                    if let Some(ref cb) = item_cb {
                        cb.on_item_captioned(index, total, &record.url, &record.caption);
                    }
                    Some(Ok(record))
                }
                ItemOutcome::Failed(err) => {
                    warn!("{}", err);
                    let warning = ItemWarning::from_error(index, &err);
                    if let Some(ref cb) = item_cb {
                        cb.on_item_warning(index, total, warning.url.clone(), warning.message.clone());
                    }
                    Some(Err(warning))
                }
                ItemOutcome::Dropped | ItemOutcome::Skipped | ItemOutcome::Cancelled => None,
            };
            if let Some(ref cb) = item_cb {
                cb.on_progress(fraction(index, total), index, total);
            }
            item
        });

    let finish = stream::once(async move {
        if let Some(cb) = callback {
            cb.on_run_complete(total, processed.load(Ordering::SeqCst));
        }
        None::<Result<CaptionRecord, ItemWarning>>
    });

    Box::pin(start.chain(items).chain(finish).filter_map(future::ready))
}

/// Fetch the page at `url` and stream captions for its images.
///
/// # Returns
/// - `Ok(CaptionStream)`: possibly empty when the page has no images
/// - `Err(Page2CaptionsError)`: fatal error (bad URL, page fetch failed,
///   no provider configured)
///
/// # Example
/// ```rust,no_run
/// use edgequake_page2captions::{caption_page_stream, CaptionConfig};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CaptionConfig::default();
/// let mut stream = caption_page_stream("https://example.com", &config).await?;
/// while let Some(item) = stream.next().await {
///     match item {
///         Ok(record) => print!("{}", record.render()),
///         Err(warning) => eprintln!("{}", warning.message),
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub async fn caption_page_stream(
    url: impl AsRef<str>,
    config: &CaptionConfig,
) -> Result<CaptionStream, Page2CaptionsError> {
    let url = url.as_ref();
    info!("Starting streaming captioning run: {}", url);

    let fetcher = resolve_fetcher(config)?;
    let html = fetch_page(fetcher.as_ref(), url, config.page_timeout_secs).await?;
    let candidates = parse_image_elements(&html);
    if candidates.is_empty() {
        info!("No images found on {}", url);
        return Ok(Box::pin(stream::empty::<Result<CaptionRecord, ItemWarning>>()));
    }

    let captioner = resolve_captioner(config)?;
    Ok(caption_stream(candidates, fetcher, captioner, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CaptionError, FetchError};
    use crate::pipeline::fetch::HttpResponse;
    use crate::progress::CancelToken;
    use futures::future::BoxFuture;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;
    use std::time::Duration;

    struct PngFetcher;

    impl HttpFetcher for PngFetcher {
        fn get<'a>(
            &'a self,
            url: &'a str,
            _timeout: Duration,
        ) -> BoxFuture<'a, Result<HttpResponse, FetchError>> {
            let result = if url.contains("broken") {
                Err(FetchError::Network("connection reset".into()))
            } else {
                let mut buf = Vec::new();
                DynamicImage::ImageRgb8(RgbImage::new(40, 40))
                    .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
                    .unwrap();
                Ok(HttpResponse::ok(buf))
            };
            Box::pin(async move { result })
        }
    }

    struct EchoCaptioner;

    impl Captioner for EchoCaptioner {
        fn caption<'a>(
            &'a self,
            _image: &'a RgbImage,
        ) -> BoxFuture<'a, Result<String, CaptionError>> {
            Box::pin(async { Ok("a black square".to_string()) })
        }
    }

    fn candidates() -> Vec<ImageCandidate> {
        vec![
            ImageCandidate::new("https://a.test/1.png"),
            ImageCandidate::new("data:image/png;base64,AAAA"),
            ImageCandidate::new("https://a.test/broken.png"),
            ImageCandidate::new("https://a.test/3.png"),
        ]
    }

    #[tokio::test]
    async fn yields_records_and_warnings_in_order() {
        let items: Vec<_> = caption_stream(
            candidates(),
            Arc::new(PngFetcher),
            Arc::new(EchoCaptioner),
            &CaptionConfig::default(),
        )
        .collect()
        .await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().url, "https://a.test/1.png");
        let warning = items[1].as_ref().unwrap_err();
        assert_eq!(warning.index, 2);
        assert_eq!(warning.url, "https://a.test/broken.png");
        assert_eq!(items[2].as_ref().unwrap().url, "https://a.test/3.png");
    }

    #[tokio::test]
    async fn cancelled_stream_is_empty() {
        let token = CancelToken::new();
        token.cancel();
        let config = CaptionConfig::builder().cancel_token(token).build().unwrap();
        let items: Vec<_> = caption_stream(
            candidates(),
            Arc::new(PngFetcher),
            Arc::new(EchoCaptioner),
            &config,
        )
        .collect()
        .await;
        assert!(items.is_empty());
    }
}
