//! Optional frame classifier backed by a Gemini vision model.
//!
//! The model answers in free text that should contain a JSON object. Anything that
//! does not validate against [`FrameAnalysis`] is an error, and callers reject the
//! candidate on any error.

use crate::api::USER_AGENT;
use crate::config::Config;
use crate::error::VisionError;
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const PROMPT: &str = "Analyze this image and determine if it contains:\n\
1. Any humans or people (even partially visible)\n\
2. Any animals (including birds, fish, insects, etc.)\n\
3. Any inappropriate content for Islamic context\n\n\
Respond ONLY with a JSON object in this exact format:\n\
{\"has_humans\": true/false, \"has_animals\": true/false, \"is_appropriate\": true/false, \
\"description\": \"brief description of what you see\", \"category\": \"mosque/nature/sky/water/mountain/other\"}\n\n\
Be very strict: if you see ANY sign of humans or animals, mark it as true.";

/// The validated verdict. The three flags are required; nothing is defaulted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FrameAnalysis {
    pub has_humans: bool,
    pub has_animals: bool,
    pub is_appropriate: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
}

impl FrameAnalysis {
    pub fn is_acceptable(&self) -> bool {
        !self.has_humans && !self.has_animals && self.is_appropriate
    }
}

#[async_trait]
pub trait FrameClassifier: Send + Sync {
    async fn classify(&self, jpeg: &[u8]) -> Result<FrameAnalysis, VisionError>;
}

/// Pulls the JSON object out of a chat answer, tolerating markdown fences and prose around it.
pub fn parse_analysis(answer: &str) -> Result<FrameAnalysis, VisionError> {
    let text = answer.trim();
    let body = if let Some((_, rest)) = text.split_once("```json") {
        rest.split("```").next().unwrap_or(rest)
    } else if let Some((_, rest)) = text.split_once("```") {
        rest.split("```").next().unwrap_or(rest)
    } else {
        text
    };

    let body = body.trim();
    let object = match (body.find('{'), body.rfind('}')) {
        (Some(start), Some(end)) if end > start => &body[start..=end],
        _ => return Err(VisionError::Malformed("no JSON object in answer".to_string())),
    };

    serde_json::from_str::<FrameAnalysis>(object).map_err(|e| VisionError::Malformed(e.to_string()))
}

fn extract_output_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error") {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("Vision error message: {}", msg));
        }
        if let Some(status) = err.get("status").and_then(|v| v.as_str()) {
            logw(format!("Vision error status: {}", status));
        }
        return None;
    }

    let candidates = root.get("candidates")?.as_array()?;
    for candidate in candidates {
        let parts = candidate
            .get("content")
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.as_array());
        if let Some(parts) = parts {
            let text: String = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

pub struct GeminiVision {
    pub client: reqwest::Client,
    api_key: String,
    base: String,
    model: String,
    timeout: Duration,
}

impl GeminiVision {
    pub fn new(cfg: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build reqwest client")?;
        Ok(Self {
            client,
            api_key: cfg.gemini_key.clone(),
            base: cfg.vision_base.trim_end_matches('/').to_string(),
            model: cfg.vision_model.clone(),
            timeout: Duration::from_secs(cfg.timeouts.vision),
        })
    }
}

#[async_trait]
impl FrameClassifier for GeminiVision {
    async fn classify(&self, jpeg: &[u8]) -> Result<FrameAnalysis, VisionError> {
        if self.api_key.is_empty() {
            return Err(VisionError::MissingKey);
        }

        let body = json!({
            "contents": [{
                "parts": [
                    {"text": PROMPT},
                    {"inline_data": {"mime_type": "image/jpeg", "data": STANDARD.encode(jpeg)}}
                ]
            }]
        });

        let url = format!("{}/models/{}:generateContent", self.base, self.model);
        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| VisionError::Http(e.to_string()))?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            let snippet = raw.chars().take(400).collect::<String>();
            logw(format!("Vision HTTP {} body: {}", status.as_u16(), snippet));
            return Err(VisionError::Http(format!("HTTP {}", status.as_u16())));
        }

        let answer = extract_output_text(&raw).ok_or(VisionError::NoText)?;
        parse_analysis(&answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_fenced_json() {
        let answer = "```json\n{\"has_humans\": false, \"has_animals\": false, \"is_appropriate\": true, \"category\": \"sky\"}\n```";
        let analysis = parse_analysis(answer).unwrap();
        assert!(analysis.is_acceptable());
        assert_eq!(analysis.category, "sky");
    }

    #[test]
    fn test_parse_bare_fence_and_prose() {
        let answer = "Sure! Here it is:\n```\n{\"has_humans\": true, \"has_animals\": false, \"is_appropriate\": true}\n```";
        let analysis = parse_analysis(answer).unwrap();
        assert!(analysis.has_humans);
        assert!(!analysis.is_acceptable());
    }

    #[test]
    fn test_refusal_is_malformed() {
        let err = parse_analysis("I'm sorry, I can't help with that.").unwrap_err();
        assert!(matches!(err, VisionError::Malformed(_)));
    }

    #[test]
    fn test_missing_flag_is_malformed() {
        let err = parse_analysis("{\"has_humans\": false, \"is_appropriate\": true}").unwrap_err();
        assert!(matches!(err, VisionError::Malformed(_)));
    }

    #[test]
    fn test_wrong_type_is_malformed() {
        let err = parse_analysis("{\"has_humans\": \"no\", \"has_animals\": false, \"is_appropriate\": true}")
            .unwrap_err();
        assert!(matches!(err, VisionError::Malformed(_)));
    }

    #[test]
    fn test_extract_output_text_joins_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]}}]}"#;
        assert_eq!(extract_output_text(raw).as_deref(), Some("{\"a\":1}"));
        assert!(extract_output_text(r#"{"error":{"message":"quota","status":"RESOURCE_EXHAUSTED"}}"#).is_none());
    }

    #[tokio::test]
    async fn test_classify_against_mock() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/gemini-1.5-flash:generateContent"))
            .and(query_param("key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "```json\n{\"has_humans\": false, \"has_animals\": false, \"is_appropriate\": true}\n```"}]}}]
            })))
            .mount(&server)
            .await;

        let cfg = Config {
            gemini_key: "k".to_string(),
            vision_base: server.uri(),
            ..Config::default()
        };
        let vision = GeminiVision::new(&cfg).unwrap();
        let analysis = vision.classify(b"\xff\xd8\xff").await.unwrap();
        assert!(analysis.is_acceptable());
    }

    #[tokio::test]
    async fn test_classify_without_key() {
        let vision = GeminiVision::new(&Config::default()).unwrap();
        assert!(matches!(vision.classify(b"x").await, Err(VisionError::MissingKey)));
    }
}
