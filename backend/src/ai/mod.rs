//! AI services for product enrichment and header mapping
//!
//! Both services sit behind traits so the pipeline can run with the real
//! Anthropic client, with test doubles, or with nothing at all.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use schedule_parser::ai::{AiClient, AiServices};
//!
//! let client = AiClient::from_env()?;
//! let services = AiServices::from_client(client);
//! ```

pub mod prompt;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::api::logs::log_warning;
use crate::config::AiConfig;
use crate::models::PartialProduct;

pub use crate::error::AiError;

// =============================================================================
// Service traits
// =============================================================================

/// Extracts product fields from a block of labeled product text.
#[async_trait]
pub trait ProductExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<PartialProduct, AiError>;
}

/// Proposes canonical field → raw header pairs for a header row.
#[async_trait]
pub trait HeaderMatcher: Send + Sync {
    async fn map_headers(&self, headers: &[String]) -> Result<HashMap<String, String>, AiError>;
}

/// The optional external services available to the pipeline.
#[derive(Clone, Default)]
pub struct AiServices {
    pub extractor: Option<Arc<dyn ProductExtractor>>,
    pub header_matcher: Option<Arc<dyn HeaderMatcher>>,
}

impl AiServices {
    /// Heuristics only.
    pub fn none() -> Self {
        Self::default()
    }

    /// Use one client for both services.
    pub fn from_client(client: AiClient) -> Self {
        let client = Arc::new(client);
        Self {
            extractor: Some(client.clone()),
            header_matcher: Some(client),
        }
    }

    /// Client from the environment, or heuristics only when no key is set.
    pub fn from_env_or_none() -> Self {
        match AiClient::from_env() {
            Ok(client) => Self::from_client(client),
            Err(e) => {
                log_warning(format!("AI services disabled: {}", e));
                Self::none()
            }
        }
    }
}

// =============================================================================
// Anthropic client
// =============================================================================

/// Anthropic API client
#[derive(Clone)]
pub struct AiClient {
    config: AiConfig,
    max_tokens: u32,
    http: reqwest::Client,
}

/// Anthropic API response structure
#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: String,
}

/// Anthropic API error response
#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Header mapping answer
#[derive(Debug, Deserialize)]
struct HeaderMappingResponse {
    #[serde(default)]
    mapping: HashMap<String, String>,
}

/// Default number of attempts per call
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay between retries in milliseconds
const RETRY_DELAY_MS: u64 = 1000;

const API_URL: &str = "https://api.anthropic.com/v1/messages";

impl AiClient {
    /// Create a new client from explicit settings
    pub fn new(config: AiConfig) -> Self {
        Self {
            config,
            max_tokens: 1024,
            http: reqwest::Client::new(),
        }
    }

    /// Create a client from `ANTHROPIC_API_KEY` and friends
    pub fn from_env() -> Result<Self, AiError> {
        Ok(Self::new(AiConfig::from_env()?))
    }

    /// Set the model to use
    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    /// Set max tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Ask for a JSON answer, retrying transient failures.
    async fn ask_json(&self, system: &str, user: String) -> Result<Value, AiError> {
        let mut last_error = None;

        for attempt in 1..=DEFAULT_MAX_RETRIES {
            match self.try_ask_json(system, &user).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    log_warning(format!(
                        "AI attempt {}/{} failed: {}",
                        attempt, DEFAULT_MAX_RETRIES, e
                    ));
                    last_error = Some(e);

                    if attempt < DEFAULT_MAX_RETRIES {
                        tokio::time::sleep(tokio::time::Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| AiError::ApiError("Unknown error".to_string())))
    }

    async fn try_ask_json(&self, system: &str, user: &str) -> Result<Value, AiError> {
        let text = self.call_api(system, user).await?;
        let json_str = extract_json(&text);
        serde_json::from_str(&json_str).map_err(|e| {
            AiError::InvalidJson(format!(
                "{}. Response was: {}",
                e,
                text.chars().take(500).collect::<String>()
            ))
        })
    }

    /// Call Anthropic API
    async fn call_api(&self, system: &str, user: &str) -> Result<String, AiError> {
        let request_body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": self.max_tokens,
            "temperature": 0.2,
            "system": system,
            "messages": [{ "role": "user", "content": user }]
        });

        let response = self
            .http
            .post(API_URL)
            .timeout(self.config.timeout)
            .header("Content-Type", "application/json")
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&request_body)
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        let body = response.text().await.map_err(request_error)?;

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<AnthropicError>(&body) {
                return Err(AiError::ApiError(error.error.message));
            }
            return Err(AiError::ApiError(format!("HTTP {}: {}", status, body)));
        }

        let response: AnthropicResponse =
            serde_json::from_str(&body).map_err(|e| AiError::InvalidJson(e.to_string()))?;

        let text = response
            .content
            .iter()
            .filter(|c| c.content_type == "text")
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("");

        if text.is_empty() {
            return Err(AiError::InvalidJson("Empty response".to_string()));
        }

        Ok(text)
    }
}

fn request_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout
    } else {
        AiError::RequestFailed(e.to_string())
    }
}

#[async_trait]
impl ProductExtractor for AiClient {
    async fn extract(&self, text: &str) -> Result<PartialProduct, AiError> {
        let value = self
            .ask_json(&prompt::extraction_system_prompt(), prompt::extraction_user_prompt(text))
            .await?;
        Ok(PartialProduct::from_json(&value))
    }
}

#[async_trait]
impl HeaderMatcher for AiClient {
    async fn map_headers(&self, headers: &[String]) -> Result<HashMap<String, String>, AiError> {
        let value = self
            .ask_json(
                &prompt::header_mapping_system_prompt(),
                prompt::header_mapping_user_prompt(headers),
            )
            .await?;
        let response: HeaderMappingResponse =
            serde_json::from_value(value).map_err(|e| AiError::InvalidJson(e.to_string()))?;
        Ok(response.mapping)
    }
}

/// Extract JSON from a response that may contain markdown code blocks
fn extract_json(text: &str) -> String {
    // Try to find JSON in code block
    if let Some(start) = text.find("```json") {
        let json_start = start + 7; // len of "```json"
        if let Some(end) = text[json_start..].find("```") {
            return text[json_start..json_start + end].trim().to_string();
        }
    }

    // Try to find JSON in generic code block
    if let Some(start) = text.find("```") {
        let after_start = start + 3;
        // Skip language identifier if present
        let content_start = text[after_start..]
            .find('\n')
            .map(|i| after_start + i + 1)
            .unwrap_or(after_start);

        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim().to_string();
        }
    }

    // Try to find raw JSON object
    if let Some(start) = text.find('{') {
        if let Some(end) = text.rfind('}') {
            if start < end {
                return text[start..=end].to_string();
            }
        }
    }

    text.to_string()
}
