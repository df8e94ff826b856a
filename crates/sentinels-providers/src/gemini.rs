//! Google Gemini API provider.
//!
//! Calls the Gemini `generateContent` endpoint. Auth via the `x-goog-api-key` header.

use async_trait::async_trait;
use sentinels_core::{
    context::{Completion, CompletionMetadata, Context},
    error::SentinelError,
    traits::Provider,
};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini API provider.
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    /// Create from config values; `timeout` bounds each request.
    pub fn from_config(
        api_key: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self, SentinelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SentinelError::Provider(format!("gemini http client: {e}")))?;
        Ok(Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            model,
        })
    }

    /// Point at a different API root (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Serialize, Deserialize)]
struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    total_token_count: u64,
}

fn build_request(context: &Context) -> GeminiRequest {
    let (system, api_messages) = context.to_api_messages();

    let system_instruction = if system.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: system }],
        })
    };

    let contents = api_messages
        .into_iter()
        .map(|m| {
            let role = if m.role == "assistant" {
                "model"
            } else {
                "user"
            };
            GeminiContent {
                role: Some(role.to_string()),
                parts: vec![GeminiPart { text: m.content }],
            }
        })
        .collect();

    let generation_config = GenerationConfig {
        temperature: context.temperature,
        max_output_tokens: context.max_output_tokens,
        response_mime_type: context
            .json_output
            .then(|| "application/json".to_string()),
    };
    let generation_config = if generation_config.temperature.is_none()
        && generation_config.max_output_tokens.is_none()
        && generation_config.response_mime_type.is_none()
    {
        None
    } else {
        Some(generation_config)
    };

    GeminiRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

/// Join every text part of the first candidate.
fn extract_text(resp: &GeminiResponse) -> Option<String> {
    let content = resp
        .candidates
        .as_ref()
        .and_then(|c| c.first())
        .and_then(|c| c.content.as_ref())?;
    let text: String = content.parts.iter().map(|p| p.text.as_str()).collect();
    if text.trim().is_empty() {
        None
    } else {
        Some(text)
    }
}

#[async_trait]
impl Provider for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, context: &Context) -> Result<Completion, SentinelError> {
        if self.api_key.is_empty() {
            return Err(SentinelError::Provider("gemini: no API key configured".into()));
        }

        let effective_model = context.model.as_deref().unwrap_or(&self.model);
        let start = Instant::now();
        let body = build_request(context);

        let url = format!(
            "{}/models/{effective_model}:generateContent",
            self.base_url.trim_end_matches('/'),
        );
        debug!("gemini: POST models/{effective_model}:generateContent");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SentinelError::Provider(format!("gemini request failed: {}", e.without_url()))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(SentinelError::Provider(format!(
                "gemini returned {status}: {text}"
            )));
        }

        let parsed: GeminiResponse = resp.json().await.map_err(|e| {
            SentinelError::Provider(format!("gemini: failed to parse response: {e}"))
        })?;

        let text = extract_text(&parsed)
            .ok_or_else(|| SentinelError::Provider("gemini returned no candidates".into()))?;

        let tokens = parsed.usage_metadata.as_ref().map(|u| u.total_token_count);
        let elapsed_ms = start.elapsed().as_millis() as u64;

        Ok(Completion {
            text,
            metadata: CompletionMetadata {
                provider_used: "gemini".to_string(),
                tokens_used: tokens,
                processing_time_ms: elapsed_ms,
                model: Some(effective_model.to_string()),
            },
        })
    }

    async fn is_available(&self) -> bool {
        if self.api_key.is_empty() {
            warn!("gemini: no API key configured");
            return false;
        }
        let url = format!("{}/models", self.base_url.trim_end_matches('/'));
        match self
            .client
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                warn!("gemini not available: {}", e.without_url());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinels_core::context::ContextEntry;

    fn provider(key: &str) -> GeminiProvider {
        GeminiProvider::from_config(
            key.into(),
            "gemini-2.0-flash".into(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_gemini_provider_name() {
        let p = provider("AIza-test");
        assert_eq!(p.name(), "gemini");
    }

    #[test]
    fn test_request_carries_system_and_generation_config() {
        let ctx = Context::new("Be helpful.", "Hello")
            .with_temperature(0.4)
            .with_max_output_tokens(1024);
        let json = serde_json::to_value(build_request(&ctx)).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "Be helpful.");
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(json["contents"][0]["parts"][0]["text"], "Hello");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
        let temp = json["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temp - 0.4).abs() < 1e-6);
        assert!(json["generationConfig"].get("responseMimeType").is_none());
    }

    #[test]
    fn test_request_without_options_omits_generation_config() {
        let ctx = Context::new("", "Hello");
        let json = serde_json::to_value(build_request(&ctx)).unwrap();
        assert!(json.get("systemInstruction").is_none());
        assert!(json.get("generationConfig").is_none());
    }

    #[test]
    fn test_json_mode_sets_mime_type() {
        let ctx = Context::new("Extract.", "page text").json();
        let json = serde_json::to_value(build_request(&ctx)).unwrap();
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
    }

    #[test]
    fn test_history_roles_map_to_model() {
        let ctx = Context::new("s", "How?").with_history(vec![
            ContextEntry::user("Hi"),
            ContextEntry::assistant("Hello!"),
        ]);
        let req = build_request(&ctx);
        let roles: Vec<_> = req
            .contents
            .iter()
            .map(|c| c.role.clone().unwrap())
            .collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[test]
    fn test_response_parsing_joins_parts() {
        let json = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Hi "},{"text":"there!"}]}}],"usageMetadata":{"totalTokenCount":25}}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert_eq!(extract_text(&resp), Some("Hi there!".into()));
        assert_eq!(
            resp.usage_metadata.as_ref().map(|u| u.total_token_count),
            Some(25)
        );
    }

    #[test]
    fn test_blocked_response_has_no_text() {
        let json = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let resp: GeminiResponse = serde_json::from_str(json).unwrap();
        assert!(extract_text(&resp).is_none());
    }

    #[tokio::test]
    async fn test_complete_without_key_fails_fast() {
        let p = provider("");
        let err = p.complete(&Context::new("s", "m")).await.unwrap_err();
        assert!(matches!(err, SentinelError::Provider(_)));
        assert!(!p.is_available().await);
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let p = provider("AIzaSECRETKEY").with_base_url("http://127.0.0.1:1");
        let err = p.complete(&Context::new("s", "m")).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("gemini request failed"), "{msg}");
        assert!(!msg.contains("AIzaSECRETKEY"), "{msg}");
        assert!(!msg.contains("127.0.0.1"), "{msg}");
        assert!(!p.is_available().await);
    }
}
