//! Completion API client
//!
//! One request per generation batch. Rate-limit responses (429/529) are
//! surfaced as their own error kind so callers can back off instead of
//! burning their retry budget.

use demoseed_common::{Error, RemoteError, Result};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error};

const MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

const DEFAULT_MAX_TOKENS: u32 = 4000;
const DEFAULT_TEMPERATURE: f32 = 0.7;

/// One completion request
#[derive(Debug, Clone)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: Option<&'a str>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(prompt: &'a str, model: &'a str) -> Self {
        CompletionRequest {
            prompt,
            model,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            system: None,
        }
    }
}

/// Completion API client
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("anthropic_api_key is not set".into()));
        }

        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        Ok(AnthropicClient { http, api_key })
    }

    /// Send one completion request and return the raw response body.
    pub async fn complete(&self, request: &CompletionRequest<'_>) -> Result<Value> {
        let mut payload = json!({
            "model": request.model,
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
            "messages": [{ "role": "user", "content": request.prompt }],
        });
        if let Some(system) = request.system {
            payload["system"] = Value::String(system.to_string());
        }

        debug!(model = request.model, "Sending completion request");

        let response = self
            .http
            .post(MESSAGES_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .map_err(|e| RemoteError::Network(e.to_string()))?;

        if status == 200 {
            return Ok(body);
        }

        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {status}"));
        error!(status, "Completion request failed: {message}");

        if status == 429 || status == 529 {
            Err(Error::Remote(RemoteError::RateLimited { status, message }))
        } else {
            Err(Error::Remote(RemoteError::Api {
                endpoint: MESSAGES_URL.to_string(),
                status,
                message,
            }))
        }
    }
}

/// The generated text is the first content element of the response body;
/// that text is what the record extractor consumes.
pub fn first_content_text(response: &Value) -> Result<&str> {
    response
        .pointer("/content/0/text")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            let body = response.to_string();
            Error::extraction("completion response carried no text content", &body)
        })
}
