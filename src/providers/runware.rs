//! Runware Image Provider
//!
//! Adapter for the Runware image-inference REST API. A request posts a task
//! batch, the response carries hosted image URLs, and the artifact is
//! streamed down to the requested output path.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ProviderSettings;
use crate::error::{Error, ProviderFault, Result};
use crate::media::{MediaKind, MediaRequest, MediaResult};

use super::openrouter::client_with_timeout;
use super::{classify_status, download_to_path, transport_error, MediaProvider};

/// Default base URL for the Runware API
const DEFAULT_BASE_URL: &str = "https://api.runware.ai/v1";

/// Default image model
const DEFAULT_MODEL: &str = "runware:101@1";

/// Default output dimensions (vertical, short-form friendly).
/// Runware requires multiples of 64.
const DEFAULT_WIDTH: u32 = 576;
const DEFAULT_HEIGHT: u32 = 1024;

/// Default request timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// API Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageInferenceTask {
    task_type: &'static str,
    #[serde(rename = "taskUUID")]
    task_uuid: String,
    positive_prompt: String,
    model: String,
    width: u32,
    height: u32,
    number_results: u32,
}

#[derive(Debug, Deserialize)]
struct InferenceResponse {
    #[serde(default)]
    data: Vec<InferenceResult>,
    #[serde(default)]
    errors: Vec<InferenceError>,
}

#[derive(Debug, Deserialize)]
struct InferenceResult {
    #[serde(rename = "imageURL")]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct InferenceError {
    #[serde(default)]
    message: Option<String>,
}

// =============================================================================
// RunwareProvider
// =============================================================================

/// Runware image generation provider
pub struct RunwareProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for RunwareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunwareProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl RunwareProvider {
    /// Creates a new Runware provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: client_with_timeout(DEFAULT_TIMEOUT),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    /// Applies configured overrides (model, base URL, dimensions, timeout).
    pub fn configure(mut self, settings: &ProviderSettings) -> Self {
        if let Some(model) = &settings.model {
            self.model = model.clone();
        }
        if let Some(base_url) = &settings.base_url {
            self.base_url = base_url.clone();
        }
        if let Some(width) = settings.get_setting::<u32>("width") {
            self.width = width;
        }
        if let Some(height) = settings.get_setting::<u32>("height") {
            self.height = height;
        }
        self.client = client_with_timeout(Duration::from_secs(settings.timeout_secs));
        self
    }

    /// Sets a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the model ID.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn build_task(&self, request: &MediaRequest) -> ImageInferenceTask {
        ImageInferenceTask {
            task_type: "imageInference",
            task_uuid: ulid::Ulid::new().to_string(),
            positive_prompt: request.prompt.clone(),
            model: request
                .get_option::<String>("model")
                .unwrap_or_else(|| self.model.clone()),
            width: request.get_option::<u32>("width").unwrap_or(self.width),
            height: request.get_option::<u32>("height").unwrap_or(self.height),
            number_results: 1,
        }
    }
}

#[async_trait]
impl MediaProvider for RunwareProvider {
    fn name(&self) -> &str {
        "runware"
    }

    fn kinds(&self) -> Vec<MediaKind> {
        vec![MediaKind::Image]
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate_image(&self, request: &MediaRequest) -> Result<MediaResult> {
        let output_path = request
            .output_path
            .as_deref()
            .ok_or_else(|| Error::Validation("image generation requires an output path".into()))?;

        let task = self.build_task(request);
        debug!(
            "submitting image inference to Runware (model '{}', {}x{})",
            task.model, task.width, task.height
        );

        let response = self
            .client
            .post(&self.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&[&task])
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

        let parsed: InferenceResponse = serde_json::from_str(&body).map_err(|e| {
            Error::provider(
                self.name(),
                ProviderFault::Api,
                format!("failed to parse inference response: {}", e),
            )
        })?;

        if let Some(error) = parsed.errors.first() {
            return Err(Error::provider(
                self.name(),
                ProviderFault::Api,
                error
                    .message
                    .clone()
                    .unwrap_or_else(|| "inference reported an unspecified error".to_string()),
            ));
        }

        let image_url = parsed
            .data
            .into_iter()
            .find_map(|result| result.image_url)
            .ok_or_else(|| {
                Error::provider(
                    self.name(),
                    ProviderFault::Api,
                    "inference response carried no image URL",
                )
            })?;

        info!("downloading generated image to {}", output_path.display());
        download_to_path(&self.client, self.name(), &image_url, output_path).await?;

        Ok(MediaResult::file(MediaKind::Image, self.name(), output_path)
            .with_metadata("model", task.model)
            .with_metadata("image_url", image_url)
            .with_metadata("task_uuid", task.task_uuid))
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
        let provider = RunwareProvider::new("key");
        assert_eq!(provider.name(), "runware");
        assert!(provider.supports(MediaKind::Image));
        assert!(!provider.supports(MediaKind::Video));
    }

    #[test]
    fn test_availability() {
        assert!(RunwareProvider::new("key").is_available());
        assert!(!RunwareProvider::new("").is_available());
    }

    #[test]
    fn test_task_defaults_and_overrides() {
        let provider = RunwareProvider::new("key");
        let request = MediaRequest::new(MediaKind::Image, "a fox").with_output("/tmp/fox.jpg");
        let task = provider.build_task(&request);
        assert_eq!(task.width, DEFAULT_WIDTH);
        assert_eq!(task.height, DEFAULT_HEIGHT);
        assert_eq!(task.number_results, 1);

        let request = request.with_option("width", 1024).with_option("height", 1024);
        let task = provider.build_task(&request);
        assert_eq!(task.width, 1024);
        assert_eq!(task.height, 1024);
    }

    #[test]
    fn test_configure_applies_settings() {
        let settings = ProviderSettings::with_api_key("key")
            .with_model("runware:100@1")
            .with_setting("width", 704);
        let provider = RunwareProvider::new("key").configure(&settings);
        assert_eq!(provider.model, "runware:100@1");
        assert_eq!(provider.width, 704);
    }

    #[test]
    fn test_task_serialization_shape() {
        let provider = RunwareProvider::new("key");
        let request = MediaRequest::new(MediaKind::Image, "a fox").with_output("/tmp/fox.jpg");
        let json = serde_json::to_value(provider.build_task(&request)).unwrap();

        assert_eq!(json["taskType"], "imageInference");
        assert_eq!(json["positivePrompt"], "a fox");
        assert!(json["taskUUID"].is_string());
    }
}
