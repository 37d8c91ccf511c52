//! Captioning: the [`Captioner`] capability and its VLM-backed implementation.
//!
//! The pipeline only needs `image → caption`. [`Captioner`] is that seam:
//! [`VisionCaptioner`] fulfils it with any vision-capable `edgequake-llm`
//! provider, and tests or alternative backends (a local model, a cache)
//! implement it directly.
//!
//! Building a provider is the expensive part (client set-up, key lookup), so
//! [`resolve_captioner`] is meant to be called once per process and the
//! resulting `Arc<dyn Captioner>` shared by every run.
//!
//! ## Retry Strategy
//!
//! Retries are off by default (`caption_retries = 0`). When enabled, waits
//! follow `retry_backoff_ms * 2^attempt`: 500 ms → 1 s → 2 s.

use crate::config::CaptionConfig;
use crate::error::{CaptionError, Page2CaptionsError};
use crate::pipeline::encode::encode_blocking;
use crate::prompts::{CAPTION_REQUEST, DEFAULT_CAPTION_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use futures::future::BoxFuture;
use image::RgbImage;
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, Duration};
use tracing::{debug, warn};

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Capability to describe an RGB image in natural language.
pub trait Captioner: Send + Sync {
    fn caption<'a>(&'a self, image: &'a RgbImage) -> BoxFuture<'a, Result<String, CaptionError>>;
}

/// [`Captioner`] backed by a vision LLM.
pub struct VisionCaptioner {
    provider: Arc<dyn LLMProvider>,
    system_prompt: String,
    options: CompletionOptions,
    max_retries: u32,
    retry_backoff_ms: u64,
    max_image_edge: u32,
}

impl VisionCaptioner {
    /// Wrap `provider`, taking prompt, token budget and retry policy from `config`.
    pub fn new(provider: Arc<dyn LLMProvider>, config: &CaptionConfig) -> Self {
        Self {
            provider,
            system_prompt: config
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_CAPTION_PROMPT.to_string()),
            options: build_options(config),
            max_retries: config.caption_retries,
            retry_backoff_ms: config.retry_backoff_ms,
            max_image_edge: config.max_image_edge,
        }
    }

    /// Resolve a provider from `config` and the environment, then wrap it.
    pub fn from_config(config: &CaptionConfig) -> Result<Self, Page2CaptionsError> {
        let provider = resolve_provider(config)?;
        Ok(Self::new(provider, config))
    }

    async fn caption_once(&self, messages: &[ChatMessage]) -> Result<String, String> {
        self.provider
            .chat(messages, Some(&self.options))
            .await
            .map(|response| {
                debug!(
                    "Caption: {} input tokens, {} output tokens",
                    response.prompt_tokens, response.completion_tokens
                );
                response.content
            })
            .map_err(|e| format!("{}", e))
    }
}

impl Captioner for VisionCaptioner {
    fn caption<'a>(&'a self, image: &'a RgbImage) -> BoxFuture<'a, Result<String, CaptionError>> {
        Box::pin(async move {
            let start = Instant::now();
            // Within `max_image_edge` already when called from the pipeline.
            let image_data = encode_blocking(image.clone(), self.max_image_edge)
                .await
                .map_err(|e| CaptionError::new(format!("image encoding failed: {e}")))?;

            let messages = vec![
                ChatMessage::system(self.system_prompt.as_str()),
                ChatMessage::user_with_images(CAPTION_REQUEST, vec![image_data]),
            ];

            let mut last_err: Option<String> = None;

            for attempt in 0..=self.max_retries {
                if attempt > 0 {
                    let backoff = self.retry_backoff_ms * 2u64.pow(attempt - 1);
                    warn!(
                        "Caption retry {}/{} after {}ms",
                        attempt, self.max_retries, backoff
                    );
                    sleep(Duration::from_millis(backoff)).await;
                }

                match self.caption_once(&messages).await {
                    Ok(content) => {
                        debug!("Captioned in {:?}", start.elapsed());
                        return Ok(content);
                    }
                    Err(err_msg) => {
                        warn!("Caption attempt {} failed: {}", attempt + 1, err_msg);
                        last_err = Some(err_msg);
                    }
                }
            }

            Err(CaptionError::new(
                last_err.unwrap_or_else(|| "Unknown error".to_string()),
            ))
        })
    }
}

/// Resolve the captioner for a run, from most-specific to least-specific:
/// a pre-built captioner, then a VLM provider resolved by
/// [`resolve_provider`].
pub fn resolve_captioner(config: &CaptionConfig) -> Result<Arc<dyn Captioner>, Page2CaptionsError> {
    if let Some(ref captioner) = config.captioner {
        return Ok(Arc::clone(captioner));
    }
    Ok(Arc::new(VisionCaptioner::from_config(config)?))
}

/// Resolve the LLM provider.
///
/// 1. **Pre-built provider** (`config.provider`): used as-is.
/// 2. **Named provider + model** (`config.provider_name`): built through
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **`OPENAI_API_KEY` present**: OpenAI with the configured or default model.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &CaptionConfig) -> Result<Arc<dyn LLMProvider>, Page2CaptionsError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_vision_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_vision_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_vision_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| Page2CaptionsError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Instantiate a named provider with the given model.
fn create_vision_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, Page2CaptionsError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        Page2CaptionsError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Build `CompletionOptions` from the caption config.
fn build_options(config: &CaptionConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_caption_tokens),
        ..Default::default()
    }
}
