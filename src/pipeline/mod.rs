//! Pipeline stages for page-to-captions processing.
//!
//! Each submodule implements exactly one transformation step. The per-image
//! sequencing lives in [`crate::caption`]; these stages know nothing about
//! ordering, progress, or the report.
//!
//! ## Data Flow
//!
//! ```text
//! page ──▶ fetch ──▶ decode ──▶ encode ──▶ llm ──▶ postprocess
//! (HTML)   (bytes)   (image)    (base64)   (VLM)   (cleanup)
//! ```
//!
//! 1. [`page`]: fetch the page markup; its failure is the only fatal one
//! 2. [`fetch`]: bounded HTTP GET behind the [`fetch::HttpFetcher`] trait
//! 3. [`decode`]: sniff and decode image bytes in `spawn_blocking`
//! 4. [`encode`]: PNG-encode and base64-wrap the RGB image for the
//!    multimodal request body
//! 5. [`llm`]: drive the captioning call with retry/backoff
//! 6. [`postprocess`]: deterministic cleanup of the model's answer

pub mod decode;
pub mod encode;
pub mod fetch;
pub mod llm;
pub mod page;
pub mod postprocess;
