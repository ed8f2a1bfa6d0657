//! # Caption Module
//!
//! Best-effort captions, tags, short descriptions and bounding boxes from
//! an OpenAI-compatible chat endpoint (LM Studio by default).
//!
//! Curation never depends on it: every call returns a `Result`, and the
//! export phase turns failures into empty text.

mod lmstudio;
mod naming;
mod vlm_crop;

pub use lmstudio::LmStudioClient;
pub use naming::{render_name, slugify};
pub use vlm_crop::{vlm_crop, VlmCropReport};

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::CaptionError;

/// Endpoint settings and prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptionSettings {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    /// Value of `{prefix}` in the rename pattern
    pub prefix: String,
    /// Output stem template; empty disables renaming
    pub rename_pattern: String,
    /// Write `<stem>.txt` next to each captioned image
    pub save_captions: bool,
    /// Send the image itself instead of only its path
    pub vision_mode: bool,
    pub caption_prompt_pass: String,
    pub caption_prompt_rescued: String,
    pub tags_prompt: String,
}

impl Default for CaptionSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://127.0.0.1:1234/v1/chat/completions".to_string(),
            model: "gpt-4o-mini-gguf".to_string(),
            prefix: String::new(),
            rename_pattern: "{prefix}{index:05d}_{slug}".to_string(),
            save_captions: true,
            vision_mode: false,
            caption_prompt_pass: "Describe the image in 1-2 sentences for LoRA training: subject, \
                pose, style, lighting, setting. Avoid punctuation-heavy prose."
                .to_string(),
            caption_prompt_rescued: "Provide a concise 1-2 sentence caption suitable for training \
                on a cleaned/restored image. Focus on core visual content only."
                .to_string(),
            tags_prompt: "Return a comma-separated list of 8-15 short tags (no #) describing \
                subject, style, media, lighting, composition, mood."
                .to_string(),
        }
    }
}

/// Pixel box `[x1, y1, x2, y2]`
pub type BoundingBox = [i64; 4];

/// Narrow interface to a captioning service
pub trait CaptionClient: Send + Sync {
    /// Short 6-12 word description, used for renaming
    fn describe(&self, image: &Path) -> Result<String, CaptionError>;

    /// One or two sentence training caption
    fn caption(&self, image: &Path, prompt: &str) -> Result<String, CaptionError>;

    /// Comma-separated tags
    fn tags(&self, image: &Path, prompt: &str) -> Result<String, CaptionError>;

    /// Box around whatever the prompt asks for; `Ok(None)` when the service
    /// answered without one
    fn bounding_box(&self, image: &Path, prompt: &str) -> Result<Option<BoundingBox>, CaptionError>;
}

/// Client used when captioning is disabled
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCaptionClient;

impl CaptionClient for NullCaptionClient {
    fn describe(&self, _image: &Path) -> Result<String, CaptionError> {
        Err(CaptionError::Disabled)
    }

    fn caption(&self, _image: &Path, _prompt: &str) -> Result<String, CaptionError> {
        Err(CaptionError::Disabled)
    }

    fn tags(&self, _image: &Path, _prompt: &str) -> Result<String, CaptionError> {
        Err(CaptionError::Disabled)
    }

    fn bounding_box(&self, _image: &Path, _prompt: &str) -> Result<Option<BoundingBox>, CaptionError> {
        Err(CaptionError::Disabled)
    }
}

/// Client for the given settings: a live one when enabled, otherwise null
pub fn client_for(settings: &CaptionSettings) -> Box<dyn CaptionClient> {
    if settings.enabled {
        Box::new(LmStudioClient::new(settings))
    } else {
        Box::new(NullCaptionClient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_server() {
        let settings = CaptionSettings::default();
        assert!(!settings.enabled);
        assert!(settings.endpoint.starts_with("http://127.0.0.1:1234"));
        assert_eq!(settings.rename_pattern, "{prefix}{index:05d}_{slug}");
    }

    #[test]
    fn null_client_is_always_disabled() {
        let client = NullCaptionClient;
        assert!(matches!(
            client.describe(Path::new("a.jpg")),
            Err(CaptionError::Disabled)
        ));
        assert!(matches!(
            client.bounding_box(Path::new("a.jpg"), "face"),
            Err(CaptionError::Disabled)
        ));
    }

    #[test]
    fn partial_settings_keep_prompts() {
        let settings: CaptionSettings =
            serde_json::from_str(r#"{"enabled": true, "prefix": "ds_"}"#).unwrap();
        assert!(settings.enabled);
        assert_eq!(settings.prefix, "ds_");
        assert!(settings.tags_prompt.contains("tags"));
    }
}
