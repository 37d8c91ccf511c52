//! Configuration types for page captioning.
//!
//! All run behaviour is controlled through [`CaptionConfig`], built via its
//! [`CaptionConfigBuilder`]. The heuristic thresholds the pipeline applies
//! (pixel-area floor, excluded URL substrings, timeouts, caption length) are
//! named fields with documented defaults rather than literals buried in the
//! pipeline.

use crate::error::Page2CaptionsError;
use crate::pipeline::fetch::HttpFetcher;
use crate::pipeline::llm::Captioner;
use crate::progress::{CancelToken, ProgressCallback};
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Default pixel-area floor; anything smaller is treated as an icon or spacer.
pub const DEFAULT_MIN_PIXEL_AREA: u64 = 400;

/// Default per-image fetch timeout in seconds.
pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 10;

/// Default page fetch timeout in seconds.
pub const DEFAULT_PAGE_TIMEOUT_SECS: u64 = 10;

/// Default token budget for a single caption.
pub const DEFAULT_MAX_CAPTION_TOKENS: usize = 16;

/// Default longest-edge cap, in pixels, for images sent to the captioner.
pub const DEFAULT_MAX_IMAGE_EDGE: u32 = 1024;

/// Substrings that exclude a `src` outright: vector images and tracking pixels.
pub const DEFAULT_EXCLUDED_SUBSTRINGS: &[&str] = &["svg", "1x1"];

/// `User-Agent` sent with page and image requests.
pub const DEFAULT_USER_AGENT: &str = concat!("edgequake-page2captions/", env!("CARGO_PKG_VERSION"));

/// Configuration for a captioning run.
///
/// Built via [`CaptionConfig::builder()`] or using
/// [`CaptionConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_page2captions::CaptionConfig;
///
/// let config = CaptionConfig::builder()
///     .min_pixel_area(1024)
///     .image_timeout_secs(5)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct CaptionConfig {
    /// Minimum `width * height` of a decoded image. Default: 400.
    ///
    /// Images below the floor are skipped silently: they are almost always
    /// icons, spacers, or tracking pixels that carry nothing worth describing.
    pub min_pixel_area: u64,

    /// `src` substrings that drop a candidate before any fetch.
    /// Default: `["svg", "1x1"]`. Matching is case-sensitive.
    pub excluded_substrings: Vec<String>,

    /// Per-image fetch timeout in seconds. Default: 10.
    pub image_timeout_secs: u64,

    /// Page fetch timeout in seconds. Default: 10.
    pub page_timeout_secs: u64,

    /// Longest edge, in pixels, of the image handed to the captioner.
    /// Default: 1024.
    ///
    /// Larger images are downscaled (aspect ratio kept) after RGB
    /// normalisation. Full-size web photos otherwise exceed provider
    /// per-image payload limits.
    pub max_image_edge: u32,

    /// Upper bound on one captioner call in seconds. Default: 60.
    pub caption_timeout_secs: u64,

    /// Number of candidates worked on at once. Default: 1 (strictly sequential).
    ///
    /// Values above 1 overlap fetch, decode and caption work for neighbouring
    /// candidates. Records are still emitted in candidate order, so the
    /// report text is the same as a sequential run with the same outcomes.
    pub concurrency: usize,

    /// LLM model identifier, e.g. "gpt-4.1-nano".
    /// If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, the provider is auto-detected.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed captioner. Takes precedence over every provider field.
    pub captioner: Option<Arc<dyn Captioner>>,

    /// Pre-constructed HTTP fetcher used for the page and every image.
    /// If None, a `reqwest`-backed fetcher is built.
    pub fetcher: Option<Arc<dyn HttpFetcher>>,

    /// Sampling temperature for the caption completion. Default: 0.1.
    pub temperature: f32,

    /// Maximum tokens the model may generate per caption. Default: 16.
    ///
    /// A one-line caption rarely needs more; a tight budget keeps every
    /// record on a single `url: caption` line and the per-image cost flat.
    pub max_caption_tokens: usize,

    /// Retry attempts on a failed captioner call. Default: 0.
    ///
    /// Image fetches are never retried; a transient failure is a skip for
    /// the run. Caption retries are opt-in for flaky hosted providers.
    pub caption_retries: u32,

    /// Initial retry delay in milliseconds (exponential backoff). Default: 500.
    pub retry_backoff_ms: u64,

    /// Custom captioning prompt. If None, uses built-in default.
    pub system_prompt: Option<String>,

    /// `User-Agent` header for page and image requests.
    pub user_agent: String,

    /// Receives per-candidate progress and warning events.
    pub progress_callback: Option<ProgressCallback>,

    /// Checked before each candidate; once cancelled the run stops early.
    pub cancel_token: Option<CancelToken>,
}

impl Default for CaptionConfig {
    fn default() -> Self {
        Self {
            min_pixel_area: DEFAULT_MIN_PIXEL_AREA,
            excluded_substrings: DEFAULT_EXCLUDED_SUBSTRINGS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            image_timeout_secs: DEFAULT_IMAGE_TIMEOUT_SECS,
            page_timeout_secs: DEFAULT_PAGE_TIMEOUT_SECS,
            max_image_edge: DEFAULT_MAX_IMAGE_EDGE,
            caption_timeout_secs: 60,
            concurrency: 1,
            model: None,
            provider_name: None,
            provider: None,
            captioner: None,
            fetcher: None,
            temperature: 0.1,
            max_caption_tokens: DEFAULT_MAX_CAPTION_TOKENS,
            caption_retries: 0,
            retry_backoff_ms: 500,
            system_prompt: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            progress_callback: None,
            cancel_token: None,
        }
    }
}

impl fmt::Debug for CaptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptionConfig")
            .field("min_pixel_area", &self.min_pixel_area)
            .field("excluded_substrings", &self.excluded_substrings)
            .field("image_timeout_secs", &self.image_timeout_secs)
            .field("page_timeout_secs", &self.page_timeout_secs)
            .field("max_image_edge", &self.max_image_edge)
            .field("caption_timeout_secs", &self.caption_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("captioner", &self.captioner.as_ref().map(|_| "<dyn Captioner>"))
            .field("fetcher", &self.fetcher.as_ref().map(|_| "<dyn HttpFetcher>"))
            .field("temperature", &self.temperature)
            .field("max_caption_tokens", &self.max_caption_tokens)
            .field("caption_retries", &self.caption_retries)
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl CaptionConfig {
    /// Create a new builder for `CaptionConfig`.
    pub fn builder() -> CaptionConfigBuilder {
        CaptionConfigBuilder {
            config: Self::default(),
        }
    }

    /// `true` when the candidate source contains any excluded substring.
    pub fn is_excluded(&self, src: &str) -> bool {
        self.excluded_substrings
            .iter()
            .any(|needle| !needle.is_empty() && src.contains(needle.as_str()))
    }

    /// `true` once the caller's cancel token has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }
}

/// Builder for [`CaptionConfig`].
pub struct CaptionConfigBuilder {
    config: CaptionConfig,
}

impl fmt::Debug for CaptionConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptionConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl CaptionConfigBuilder {
    pub fn min_pixel_area(mut self, area: u64) -> Self {
        self.config.min_pixel_area = area;
        self
    }

    pub fn excluded_substrings<I, S>(mut self, substrings: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.excluded_substrings = substrings.into_iter().map(Into::into).collect();
        self
    }

    pub fn image_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_timeout_secs = secs;
        self
    }

    pub fn page_timeout_secs(mut self, secs: u64) -> Self {
        self.config.page_timeout_secs = secs;
        self
    }

    pub fn max_image_edge(mut self, px: u32) -> Self {
        self.config.max_image_edge = px.max(100);
        self
    }

    pub fn caption_timeout_secs(mut self, secs: u64) -> Self {
        self.config.caption_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn captioner(mut self, captioner: Arc<dyn Captioner>) -> Self {
        self.config.captioner = Some(captioner);
        self
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn HttpFetcher>) -> Self {
        self.config.fetcher = Some(fetcher);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_caption_tokens(mut self, n: usize) -> Self {
        self.config.max_caption_tokens = n;
        self
    }

    pub fn caption_retries(mut self, n: u32) -> Self {
        self.config.caption_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.config.cancel_token = Some(token);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CaptionConfig, Page2CaptionsError> {
        let c = &self.config;
        if c.image_timeout_secs == 0 || c.page_timeout_secs == 0 {
            return Err(Page2CaptionsError::InvalidConfig(
                "Fetch timeouts must be ≥ 1s".into(),
            ));
        }
        if c.caption_timeout_secs == 0 {
            return Err(Page2CaptionsError::InvalidConfig(
                "Caption timeout must be ≥ 1s".into(),
            ));
        }
        if c.max_caption_tokens == 0 {
            return Err(Page2CaptionsError::InvalidConfig(
                "max_caption_tokens must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Page2CaptionsError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_policy() {
        let c = CaptionConfig::default();
        assert_eq!(c.min_pixel_area, 400);
        assert_eq!(c.image_timeout_secs, 10);
        assert_eq!(c.page_timeout_secs, 10);
        assert_eq!(c.max_caption_tokens, 16);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.caption_retries, 0);
        assert_eq!(c.max_image_edge, 1024);
        assert_eq!(c.excluded_substrings, vec!["svg", "1x1"]);
    }

    #[test]
    fn is_excluded_matches_substrings() {
        let c = CaptionConfig::default();
        assert!(c.is_excluded("https://a.test/logo.svg"));
        assert!(c.is_excluded("https://a.test/pixel_1x1.gif"));
        assert!(!c.is_excluded("https://a.test/photo.jpg"));
        // Case-sensitive, like the substring check it models.
        assert!(!c.is_excluded("https://a.test/LOGO.SVG"));
    }

    #[test]
    fn empty_excluded_substring_is_ignored() {
        let c = CaptionConfig::builder()
            .excluded_substrings([""])
            .build()
            .unwrap();
        assert!(!c.is_excluded("https://a.test/photo.jpg"));
    }

    #[test]
    fn builder_rejects_zero_timeout() {
        let err = CaptionConfig::builder()
            .image_timeout_secs(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, Page2CaptionsError::InvalidConfig(_)));
    }

    #[test]
    fn builder_clamps_concurrency_and_temperature() {
        let c = CaptionConfig::builder()
            .concurrency(0)
            .temperature(9.0)
            .build()
            .unwrap();
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.temperature, 2.0);
    }

    #[test]
    fn builder_clamps_max_image_edge() {
        let c = CaptionConfig::builder().max_image_edge(10).build().unwrap();
        assert_eq!(c.max_image_edge, 100);
    }

    #[test]
    fn cancel_token_is_observed() {
        let token = CancelToken::new();
        let c = CaptionConfig::builder()
            .cancel_token(token.clone())
            .build()
            .unwrap();
        assert!(!c.is_cancelled());
        token.cancel();
        assert!(c.is_cancelled());
    }
}
