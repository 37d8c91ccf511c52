//! Prompts for VLM-based image captioning.
//!
//! Callers can override the default via
//! [`crate::config::CaptionConfig::system_prompt`]; the constant here is used
//! only when no override is provided.

/// Default system prompt for captioning one image.
pub const DEFAULT_CAPTION_PROMPT: &str = r#"You write short, literal image captions.

Rules:
- Describe what is visibly in the image in one plain sentence fragment, like "a man riding a wave on a surfboard".
- Lowercase, no trailing period, no quotes, no label such as "Caption:".
- Do not guess names, brands, or locations unless they are written in the image.
- Do not mention that this is an image or a photo unless the medium is the subject.
- Output ONLY the caption."#;

/// Text of the user turn that carries the image.
pub const CAPTION_REQUEST: &str = "Caption this image.";
