//! OpenRouter Text Provider
//!
//! Adapter for the OpenRouter chat-completions API (OpenAI-compatible).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::ProviderSettings;
use crate::error::{Error, ProviderFault, Result};
use crate::media::{MediaKind, MediaRequest, MediaResult};

use super::{classify_status, transport_error, MediaProvider};

/// Default base URL for the OpenRouter API
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Default model route
const DEFAULT_MODEL: &str = "openrouter/auto";

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// API Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

// =============================================================================
// OpenRouterProvider
// =============================================================================

/// OpenRouter text generation provider
pub struct OpenRouterProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenRouterProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenRouterProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenRouterProvider {
    /// Creates a new OpenRouter provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: client_with_timeout(DEFAULT_TIMEOUT),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Applies configured overrides (model, base URL, timeout).
    pub fn configure(mut self, settings: &ProviderSettings) -> Self {
        if let Some(model) = &settings.model {
            self.model = model.clone();
        }
        if let Some(base_url) = &settings.base_url {
            self.base_url = base_url.clone();
        }
        self.client = client_with_timeout(Duration::from_secs(settings.timeout_secs));
        self
    }

    /// Sets a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the model route.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

/// Builds a reqwest client with the given timeout, falling back to the
/// default client when the builder is rejected by the TLS backend.
pub(crate) fn client_with_timeout(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

#[async_trait]
impl MediaProvider for OpenRouterProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    fn kinds(&self) -> Vec<MediaKind> {
        vec![MediaKind::Text]
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate_text(&self, request: &MediaRequest) -> Result<MediaResult> {
        let model = request
            .get_option::<String>("model")
            .unwrap_or_else(|| self.model.clone());

        debug!("requesting completion from OpenRouter with model '{}'", model);

        let body = ChatCompletionRequest {
            model: model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt.clone(),
            }],
        };

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(self.name(), e))?;

        if !status.is_success() {
            return Err(classify_status(self.name(), status, &body));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            Error::provider(
                self.name(),
                ProviderFault::Api,
                format!("failed to parse completion response: {}", e),
            )
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| {
                Error::provider(
                    self.name(),
                    ProviderFault::Api,
                    "completion response carried no content",
                )
            })?;

        Ok(MediaResult::text(self.name(), content)
            .with_metadata("model", parsed.model.unwrap_or(model)))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_and_kinds() {
        let provider = OpenRouterProvider::new("key");
        assert_eq!(provider.name(), "openrouter");
        assert!(provider.supports(MediaKind::Text));
        assert!(!provider.supports(MediaKind::Image));
    }

    #[test]
    fn test_availability() {
        assert!(OpenRouterProvider::new("key").is_available());
        assert!(!OpenRouterProvider::new("").is_available());
    }

    #[test]
    fn test_url_building() {
        let provider = OpenRouterProvider::new("key");
        assert_eq!(
            provider.completions_url(),
            "https://openrouter.ai/api/v1/chat/completions"
        );

        let provider = provider.with_base_url("https://proxy.example.com/v1");
        assert_eq!(
            provider.completions_url(),
            "https://proxy.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_configure_applies_settings() {
        let settings = ProviderSettings::with_api_key("key").with_model("deepseek/deepseek-r1");
        let provider = OpenRouterProvider::new("key").configure(&settings);
        assert_eq!(provider.model, "deepseek/deepseek-r1");
    }

    #[tokio::test]
    async fn test_rejects_non_text_kinds() {
        let provider = OpenRouterProvider::new("key");
        let request = MediaRequest::new(MediaKind::Image, "a fox").with_output("/tmp/fox.jpg");
        assert!(provider.generate_image(&request).await.is_err());
    }
}
