//! # edgequake-page2captions
//!
//! Caption every meaningful image on a web page using Vision Language Models
//! (VLMs).
//!
//! ## Why this crate?
//!
//! Alt text is often missing, stale, or a file name. This crate fetches a
//! page, finds its `<img>` elements, downloads each usable image and asks a
//! VLM for a short description, producing one `URL: caption` line per image.
//! Icons, SVGs, tracking pixels and tiny images are filtered out before any
//! model call is made.
//!
//! ## Pipeline Overview
//!
//! ```text
//! page URL
//!  │
//!  ├─ 1. Page     fetch HTML (the only fatal step)
//!  ├─ 2. Extract  collect <img> src attributes in document order
//!  ├─ 3. Filter   drop empty / svg / 1x1 / non-http, upgrade //host → https
//!  ├─ 4. Fetch    download each image with a timeout
//!  ├─ 5. Decode   sniff format, decode (spawn_blocking), skip < 400 px area
//!  ├─ 6. Caption  RGB → PNG → base64 → gpt-4.1-nano / claude / gemini / …
//!  ├─ 7. Polish   strip labels, quotes, and whitespace
//!  └─ 8. Output   "URL: caption\n\n" records, or a sentinel when empty
//! ```
//!
//! Steps 3–7 fail per image: a broken image becomes a warning and the run
//! continues with the next one.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_page2captions::{caption_page, CaptionConfig, PageOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = CaptionConfig::default();
//!     match caption_page("https://example.com", &config).await? {
//!         PageOutcome::NoImagesFound => eprintln!("no images on page"),
//!         PageOutcome::Captioned(report) => {
//!             print!("{}", report.text());
//!             for w in report.warnings() {
//!                 eprintln!("{}", w.message);
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `page2captions` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-page2captions = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod caption;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod session;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use caption::{caption_candidates, caption_html, caption_page, caption_page_sync, caption_page_to_file};
pub use config::{CaptionConfig, CaptionConfigBuilder};
pub use error::{CaptionError, FetchError, ItemError, Page2CaptionsError};
pub use extract::{ElementRecord, ImageCandidate, ResolvedImageUrl};
pub use output::{
    CaptionRecord, ItemWarning, PageOutcome, PipelineReport, ReportArtifact, NO_IMAGES_MESSAGE,
};
pub use pipeline::fetch::{HttpFetcher, HttpResponse, ReqwestFetcher};
pub use pipeline::llm::{Captioner, VisionCaptioner};
pub use progress::{CancelToken, CaptionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use session::CaptionSession;
pub use stream::{caption_page_stream, caption_stream, CaptionStream};
