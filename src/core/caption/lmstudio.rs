//! Chat-completions client for LM Studio and other OpenAI-compatible servers.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use super::{BoundingBox, CaptionClient, CaptionSettings};
use crate::error::CaptionError;

const DESCRIBE_TIMEOUT: Duration = Duration::from_secs(30);
const CAPTION_TIMEOUT: Duration = Duration::from_secs(60);
const BBOX_TIMEOUT: Duration = Duration::from_secs(120);

const DESCRIBE_PROMPT: &str =
    "Give a concise 6-12 word description for this image filename. Avoid punctuation.";
const DESCRIBE_SYSTEM: &str = "You are a precise captioning assistant.";
const CAPTION_SYSTEM: &str = "You produce dataset-quality image captions.";
const TAGS_SYSTEM: &str = "You output concise comma-separated tags only.";
const BBOX_SYSTEM: &str =
    "You are a machine vision assistant. Respond ONLY with a single, valid JSON object.";

/// Blocking HTTP client; safe to share between workers
pub struct LmStudioClient {
    http: Client,
    endpoint: String,
    model: String,
    vision: bool,
}

impl LmStudioClient {
    pub fn new(settings: &CaptionSettings) -> Self {
        Self {
            http: Client::new(),
            endpoint: settings.endpoint.clone(),
            model: settings.model.clone(),
            vision: settings.vision_mode,
        }
    }

    fn complete(&self, body: &Value, timeout: Duration) -> Result<String, CaptionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .timeout(timeout)
            .json(body)
            .send()
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CaptionError::Request {
                endpoint: self.endpoint.clone(),
                reason: format!("HTTP {}", status),
            });
        }

        let data: Value = response.json().map_err(|e| self.transport_error(e))?;
        message_content(&data)
    }

    fn transport_error(&self, e: reqwest::Error) -> CaptionError {
        if e.is_timeout() {
            CaptionError::Timeout {
                endpoint: self.endpoint.clone(),
            }
        } else if e.is_decode() {
            CaptionError::MalformedResponse(e.to_string())
        } else {
            CaptionError::Request {
                endpoint: self.endpoint.clone(),
                reason: e.to_string(),
            }
        }
    }

    /// Path-only or vision request with the usual sampling settings
    fn text_request(&self, image: &Path, prompt: &str, system: &str, max_tokens: u32) -> Value {
        if self.vision {
            let mut content = vec![json!({"type": "text", "text": prompt})];
            match data_url(image) {
                Ok(url) => content.push(json!({"type": "image_url", "image_url": {"url": url}})),
                Err(e) => debug!("Sending caption request without image: {}", e),
            }
            json!({
                "model": self.model,
                "messages": [{"role": "user", "content": content}],
                "temperature": 0.2,
                "max_tokens": 128,
            })
        } else {
            chat_body(&self.model, system, &path_prompt(prompt, image), max_tokens)
        }
    }
}

impl CaptionClient for LmStudioClient {
    fn describe(&self, image: &Path) -> Result<String, CaptionError> {
        let body = chat_body(&self.model, DESCRIBE_SYSTEM, &path_prompt(DESCRIBE_PROMPT, image), 64);
        self.complete(&body, DESCRIBE_TIMEOUT)
    }

    fn caption(&self, image: &Path, prompt: &str) -> Result<String, CaptionError> {
        let body = self.text_request(image, prompt, CAPTION_SYSTEM, 128);
        self.complete(&body, CAPTION_TIMEOUT)
    }

    fn tags(&self, image: &Path, prompt: &str) -> Result<String, CaptionError> {
        let body = self.text_request(image, prompt, TAGS_SYSTEM, 64);
        self.complete(&body, CAPTION_TIMEOUT)
    }

    fn bounding_box(&self, image: &Path, prompt: &str) -> Result<Option<BoundingBox>, CaptionError> {
        let url = data_url(image)?;
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": BBOX_SYSTEM},
                {"role": "user", "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {"url": url}},
                ]},
            ],
            "temperature": 0.0,
            "max_tokens": 512,
        });
        let content = self.complete(&body, BBOX_TIMEOUT)?;
        parse_bbox(&content)
    }
}

fn chat_body(model: &str, system: &str, user: &str, max_tokens: u32) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": system},
            {"role": "user", "content": user},
        ],
        "temperature": 0.2,
        "max_tokens": max_tokens,
    })
}

fn path_prompt(prompt: &str, image: &Path) -> String {
    format!("{}\nImage path: {}", prompt, image.display())
}

fn data_url(image: &Path) -> Result<String, CaptionError> {
    let bytes = std::fs::read(image).map_err(|source| CaptionError::ImageUnreadable {
        path: image.to_path_buf(),
        source,
    })?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(bytes)))
}

fn message_content(data: &Value) -> Result<String, CaptionError> {
    data["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| {
            CaptionError::MalformedResponse("missing choices[0].message.content".to_string())
        })
}

/// Parse `{"bbox": [x1, y1, x2, y2]}`, optionally inside a ```json fence
pub(crate) fn parse_bbox(content: &str) -> Result<Option<BoundingBox>, CaptionError> {
    let mut text = content.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest.trim();
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest.trim();
    }

    let value: Value = serde_json::from_str(text)
        .map_err(|e| CaptionError::MalformedResponse(format!("bbox reply is not JSON: {}", e)))?;

    let Some(coords) = value.get("bbox").and_then(Value::as_array) else {
        return Ok(None);
    };
    if coords.len() != 4 {
        return Ok(None);
    }

    let mut bbox = [0i64; 4];
    for (slot, coord) in bbox.iter_mut().zip(coords) {
        match coord.as_f64() {
            Some(v) => *slot = v as i64,
            None => return Ok(None),
        }
    }
    Ok(Some(bbox))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_bbox_parses() {
        assert_eq!(parse_bbox(r#"{"bbox": [1, 2, 30, 40]}"#).unwrap(), Some([1, 2, 30, 40]));
    }

    #[test]
    fn fenced_bbox_parses() {
        let reply = "```json\n{\"bbox\": [10.7, 20, 110, 220]}\n```";
        assert_eq!(parse_bbox(reply).unwrap(), Some([10, 20, 110, 220]));
    }

    #[test]
    fn missing_or_short_bbox_is_none() {
        assert_eq!(parse_bbox(r#"{"box": [1, 2, 3, 4]}"#).unwrap(), None);
        assert_eq!(parse_bbox(r#"{"bbox": [1, 2, 3]}"#).unwrap(), None);
        assert_eq!(parse_bbox(r#"{"bbox": ["a", 2, 3, 4]}"#).unwrap(), None);
    }

    #[test]
    fn prose_reply_is_malformed() {
        assert!(matches!(
            parse_bbox("I think the face is on the left."),
            Err(CaptionError::MalformedResponse(_))
        ));
    }

    #[test]
    fn content_is_trimmed() {
        let data = json!({"choices": [{"message": {"content": "  a red car \n"}}]});
        assert_eq!(message_content(&data).unwrap(), "a red car");
        assert!(message_content(&json!({"choices": []})).is_err());
    }

    #[test]
    fn path_mode_body_carries_path() {
        let body = chat_body("m", CAPTION_SYSTEM, &path_prompt("Describe", Path::new("/raw/a.jpg")), 128);
        assert_eq!(body["model"], "m");
        assert_eq!(body["messages"][0]["role"], "system");
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .ends_with("Image path: /raw/a.jpg"));
    }

    #[test]
    fn unreachable_endpoint_is_request_error() {
        let settings = CaptionSettings {
            endpoint: "http://127.0.0.1:9/v1/chat/completions".to_string(),
            ..Default::default()
        };
        let client = LmStudioClient::new(&settings);
        let err = client.describe(Path::new("a.jpg")).unwrap_err();
        assert!(matches!(
            err,
            CaptionError::Request { .. } | CaptionError::Timeout { .. }
        ));
    }

    #[test]
    fn bbox_needs_readable_image() {
        let client = LmStudioClient::new(&CaptionSettings::default());
        assert!(matches!(
            client.bounding_box(Path::new("/nonexistent.jpg"), "face"),
            Err(CaptionError::ImageUnreadable { .. })
        ));
    }
}
