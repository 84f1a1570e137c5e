//! LLM parsing and vision service clients.
//!
//! The pipeline talks to two external services through the traits below:
//! [`ParserClient`] for text completion (fallback parsing and best-effort
//! categorization) and [`VisionClient`] for image capture (direct
//! structured extraction and plain OCR). Both report every call failure,
//! timeout, or malformed response as a typed [`Error`] — never a panic —
//! and never retry on their own.
//!
//! [`HttpLlmClient`] is the production implementation, speaking the
//! Ollama, Claude, and OpenAI wire formats. Tests substitute mock
//! implementations of the traits.

use crate::config::{LlmConfig, LlmProvider};
use crate::error::{Error, Result};
use async_trait::async_trait;
use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde_json::json;
use std::time::Duration;

/// Text completion interface for the parsing/categorization service.
#[async_trait]
pub trait ParserClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Image extraction interface for the media capture boundary.
#[async_trait]
pub trait VisionClient: Send + Sync {
    /// Direct image-to-structured-data extraction. Returns the raw model
    /// reply, expected to contain a JSON object.
    async fn extract_structured(&self, image: &[u8], prompt: &str) -> Result<String>;

    /// Plain text extraction (OCR-style transcription).
    async fn extract_text(&self, image: &[u8]) -> Result<String>;
}

const OCR_PROMPT: &str =
    "Transcribe all visible text in this image. Return only the text, no commentary.";

/// HTTP-backed client for both service traits.
pub struct HttpLlmClient {
    model: String,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpLlmClient {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| config.provider.default_endpoint().to_string());
        let api_key = match config.provider {
            LlmProvider::Ollama => None,
            LlmProvider::Claude => config
                .api_key
                .clone()
                .or_else(|| std::env::var("ANTHROPIC_API_KEY").ok()),
            LlmProvider::OpenAI => config
                .api_key
                .clone()
                .or_else(|| std::env::var("OPENAI_API_KEY").ok()),
        };

        if matches!(config.provider, LlmProvider::Claude | LlmProvider::OpenAI) && api_key.is_none()
        {
            return Err(Error::Config(
                "llm.api_key (or provider env var) is required".to_string(),
            ));
        }

        let timeout_secs = config.timeout_secs.max(1);
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Llm(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            model: config.model.clone(),
            provider: config.provider,
            endpoint,
            api_key,
            http,
        })
    }

    fn claude_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.as_deref().unwrap_or_default())
                .map_err(|e| Error::Llm(format!("invalid claude api key header: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));
        Ok(headers)
    }

    fn openai_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!(
                "Bearer {}",
                self.api_key.as_deref().unwrap_or_default()
            ))
            .map_err(|e| Error::Llm(format!("invalid auth header: {e}")))?,
        );
        Ok(headers)
    }

    async fn post_json(
        &self,
        url: String,
        headers: Option<HeaderMap>,
        body: serde_json::Value,
        provider: &str,
    ) -> Result<serde_json::Value> {
        let mut req = self.http.post(url);
        if let Some(headers) = headers {
            req = req.headers(headers);
        }
        let resp = req
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Llm(format!("{provider} request failed: {e}")))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::Llm(format!("{provider} read body failed: {e}")))?;
        if !status.is_success() {
            return Err(Error::Llm(format!(
                "{provider} returned {}: {}",
                status.as_u16(),
                body
            )));
        }
        serde_json::from_str(&body)
            .map_err(|e| Error::Llm(format!("{provider} returned non-JSON body: {e}")))
    }

    async fn complete_with_content(&self, content: serde_json::Value) -> Result<String> {
        match self.provider {
            LlmProvider::Ollama => {
                let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
                let json = self.post_json(url, None, content, "ollama").await?;
                json.get("response")
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string)
                    .ok_or_else(|| {
                        Error::Llm("ollama response missing string field `response`".to_string())
                    })
            }
            LlmProvider::Claude => {
                let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));
                let json = self
                    .post_json(url, Some(self.claude_headers()?), content, "claude")
                    .await?;
                json.get("content")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|v| v.get("text"))
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string)
                    .ok_or_else(|| Error::Llm("claude response missing content[0].text".to_string()))
            }
            LlmProvider::OpenAI => {
                let url = format!(
                    "{}/v1/chat/completions",
                    self.endpoint.trim_end_matches('/')
                );
                let json = self
                    .post_json(url, Some(self.openai_headers()?), content, "openai")
                    .await?;
                json.get("choices")
                    .and_then(|v| v.as_array())
                    .and_then(|arr| arr.first())
                    .and_then(|v| v.get("message"))
                    .and_then(|v| v.get("content"))
                    .and_then(|v| v.as_str())
                    .map(ToString::to_string)
                    .ok_or_else(|| {
                        Error::Llm("openai response missing choices[0].message.content".to_string())
                    })
            }
        }
    }

    fn text_body(&self, prompt: &str) -> serde_json::Value {
        match self.provider {
            LlmProvider::Ollama => json!({
                "model": self.model,
                "prompt": prompt,
                "stream": false,
            }),
            LlmProvider::Claude => json!({
                "model": self.model,
                "max_tokens": 600,
                "temperature": 0,
                "messages": [{ "role": "user", "content": prompt }],
            }),
            LlmProvider::OpenAI => json!({
                "model": self.model,
                "temperature": 0,
                "messages": [{ "role": "user", "content": prompt }],
            }),
        }
    }

    fn image_body(&self, image: &[u8], prompt: &str) -> serde_json::Value {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        match self.provider {
            LlmProvider::Ollama => json!({
                "model": self.model,
                "prompt": prompt,
                "images": [encoded],
                "stream": false,
            }),
            LlmProvider::Claude => json!({
                "model": self.model,
                "max_tokens": 600,
                "temperature": 0,
                "messages": [{
                    "role": "user",
                    "content": [
                        {
                            "type": "image",
                            "source": {
                                "type": "base64",
                                "media_type": "image/jpeg",
                                "data": encoded,
                            },
                        },
                        { "type": "text", "text": prompt },
                    ],
                }],
            }),
            LlmProvider::OpenAI => json!({
                "model": self.model,
                "temperature": 0,
                "messages": [{
                    "role": "user",
                    "content": [
                        {
                            "type": "image_url",
                            "image_url": { "url": format!("data:image/jpeg;base64,{encoded}") },
                        },
                        { "type": "text", "text": prompt },
                    ],
                }],
            }),
        }
    }
}

#[async_trait]
impl ParserClient for HttpLlmClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.complete_with_content(self.text_body(prompt)).await
    }
}

#[async_trait]
impl VisionClient for HttpLlmClient {
    async fn extract_structured(&self, image: &[u8], prompt: &str) -> Result<String> {
        self.complete_with_content(self.image_body(image, prompt))
            .await
            .map_err(|e| Error::Vision(e.to_string()))
    }

    async fn extract_text(&self, image: &[u8]) -> Result<String> {
        self.complete_with_content(self.image_body(image, OCR_PROMPT))
            .await
            .map_err(|e| Error::Vision(e.to_string()))
    }
}

/// Extract the first top-level JSON object embedded in a model reply.
///
/// Models frequently wrap JSON in prose or code fences; downstream callers
/// only care about the object itself.
pub fn extract_json_object(raw: &str) -> Result<String> {
    let start = raw
        .find('{')
        .ok_or_else(|| Error::Llm("response did not contain a JSON object".to_string()))?;
    let end = raw
        .rfind('}')
        .ok_or_else(|| Error::Llm("response did not contain a JSON object".to_string()))?;
    if end <= start {
        return Err(Error::Llm("response JSON bounds are invalid".to_string()));
    }
    Ok(raw[start..=end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_object_from_fenced_reply() {
        let raw = "```json\n{\"action\":\"sale\",\"amount\":25000}\n```";
        let obj = extract_json_object(raw).unwrap();
        assert_eq!(obj, "{\"action\":\"sale\",\"amount\":25000}");
    }

    #[test]
    fn extract_json_object_rejects_plain_text() {
        assert!(extract_json_object("no json here").is_err());
    }

    #[test]
    fn http_client_requires_key_for_hosted_providers() {
        std::env::remove_var("ANTHROPIC_API_KEY");
        let config = LlmConfig {
            provider: LlmProvider::Claude,
            model: "claude-sonnet".to_string(),
            endpoint: None,
            api_key: None,
            timeout_secs: 5,
        };
        assert!(HttpLlmClient::new(&config).is_err());
    }

    #[test]
    fn http_client_builds_for_ollama_without_key() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            model: "llama3.2".to_string(),
            endpoint: None,
            api_key: None,
            timeout_secs: 5,
        };
        assert!(HttpLlmClient::new(&config).is_ok());
    }
}
