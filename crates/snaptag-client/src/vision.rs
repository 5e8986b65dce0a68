//! Vision API client.
//!
//! Sends a signed image URL to an OpenAI-compatible chat completions
//! endpoint and turns the free-form reply into detections with
//! [`parse_detections`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use snaptag_shared::constants::{APP_NAME, VISION_TIMEOUT_SECS};
use snaptag_shared::detection::{parse_detections, ParseSource, ParsedDetections};

use crate::config::VisionConfig;
use crate::error::{ClientError, Result};

const DETECTION_PROMPT: &str = "List the distinct physical objects visible in this image. \
Reply with only a JSON array. Each element must be an object with a short \"name\" \
and the approximate center of the object as \"x\" and \"y\", given as percentages \
(0-100) of the image width and height. Example: \
[{\"name\": \"coffee mug\", \"x\": 42, \"y\": 63}]";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text { text: &'a str },
    ImageUrl { image_url: ImageUrl<'a> },
}

#[derive(Debug, Serialize)]
struct ImageUrl<'a> {
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ReplyMessage>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Value,
}

/// Client for the configured vision model.
#[derive(Debug, Clone)]
pub struct VisionClient {
    http: reqwest::Client,
    config: VisionConfig,
}

impl VisionClient {
    pub fn new(config: VisionConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{APP_NAME}/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(VISION_TIMEOUT_SECS))
            .build()?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    /// Ask the model which objects are in the image at `image_url`.
    ///
    /// Transport and HTTP errors are returned; an unusable reply is not an
    /// error and yields heuristic or placeholder detections.
    pub async fn analyze(&self, image_url: &str) -> Result<ParsedDetections> {
        let body = ChatRequest {
            model: &self.config.model,
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: DETECTION_PROMPT,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl { url: image_url },
                    },
                ],
            }],
            max_tokens: 800,
        };

        let mut req = self.http.post(&self.config.api_url).json(&body);
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Vision(format!("{status}: {}", text.trim())));
        }

        let reply: ChatResponse = resp.json().await?;
        let text = extract_reply_text(&reply).unwrap_or_default();
        let parsed = parse_detections(&text);

        match parsed.source {
            ParseSource::Json => {
                debug!(count = parsed.detections.len(), "vision reply parsed");
            }
            ParseSource::Heuristic => {
                warn!(count = parsed.detections.len(), "vision reply was not JSON, used keyword fallback");
            }
            ParseSource::Placeholder => {
                warn!(reply_len = text.len(), "vision reply unusable, using placeholder object");
            }
        }

        Ok(parsed)
    }
}

/// Text of the first choice. Content may be a plain string or a list of
/// typed parts, whose text parts are concatenated.
fn extract_reply_text(reply: &ChatResponse) -> Option<String> {
    let content = &reply.choices.first()?.message.as_ref()?.content;
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let text: Vec<&str> = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
            if text.is_empty() {
                None
            } else {
                Some(text.join("\n"))
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(json: Value) -> ChatResponse {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn request_body_matches_chat_completions_shape() {
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![ChatMessage {
                role: "user",
                content: vec![
                    ContentPart::Text { text: "hi" },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "http://x/img.jpg",
                        },
                    },
                ],
            }],
            max_tokens: 10,
        };
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["content"][0]["type"], "text");
        assert_eq!(json["messages"][0]["content"][1]["type"], "image_url");
        assert_eq!(
            json["messages"][0]["content"][1]["image_url"]["url"],
            "http://x/img.jpg"
        );
    }

    #[test]
    fn string_content_is_returned() {
        let r = reply(serde_json::json!({
            "choices": [{ "message": { "content": "[{\"name\":\"cup\"}]" } }]
        }));
        assert_eq!(extract_reply_text(&r).as_deref(), Some("[{\"name\":\"cup\"}]"));
    }

    #[test]
    fn text_parts_are_joined() {
        let r = reply(serde_json::json!({
            "choices": [{ "message": { "content": [
                { "type": "text", "text": "- cup" },
                { "type": "text", "text": "- lamp" }
            ] } }]
        }));
        assert_eq!(extract_reply_text(&r).as_deref(), Some("- cup\n- lamp"));
    }

    #[test]
    fn empty_reply_yields_nothing() {
        assert!(extract_reply_text(&reply(serde_json::json!({ "choices": [] }))).is_none());
        assert!(extract_reply_text(&reply(serde_json::json!({}))).is_none());
        let r = reply(serde_json::json!({ "choices": [{ "message": { "content": null } }] }));
        assert!(extract_reply_text(&r).is_none());
    }

    #[test]
    fn missing_text_falls_back_to_placeholder() {
        let r = reply(serde_json::json!({ "choices": [] }));
        let parsed = parse_detections(&extract_reply_text(&r).unwrap_or_default());
        assert_eq!(parsed.source, ParseSource::Placeholder);
        assert_eq!(parsed.detections.len(), 1);
    }
}
