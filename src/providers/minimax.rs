//! MiniMax Video Provider
//!
//! Adapter for the MiniMax image-to-video generation API.
//! Uses the async submit + poll + download pattern: a generation task is
//! submitted with the seed image inlined as a data URL, polled until it
//! settles, and the finished file is streamed to the output path.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::ProviderSettings;
use crate::error::{Error, ProviderFault, Result};
use crate::media::{MediaKind, MediaRequest, MediaResult};

use super::openrouter::client_with_timeout;
use super::{classify_status, download_to_path, transport_error, MediaProvider};

/// Default base URL for the MiniMax API
const DEFAULT_BASE_URL: &str = "https://api.minimaxi.chat/v1";

/// Default image-to-video model
const DEFAULT_MODEL: &str = "I2V-01";

/// Delay between poll attempts
const POLL_INTERVAL: Duration = Duration::from_secs(15);

/// Overall deadline for a generation task
const MAX_POLL_DURATION: Duration = Duration::from_secs(600);

/// Default per-request HTTP timeout
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// =============================================================================
// API Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
struct SubmitTaskRequest {
    model: String,
    prompt: String,
    first_frame_image: String,
}

#[derive(Debug, Deserialize)]
struct SubmitTaskResponse {
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueryTaskResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    file_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RetrieveFileResponse {
    file: RetrievedFile,
}

#[derive(Debug, Deserialize)]
struct RetrievedFile {
    download_url: String,
}

/// Handle for a submitted generation task
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VideoJob {
    task_id: String,
    submitted_at: i64,
}

// =============================================================================
// MinimaxProvider
// =============================================================================

/// MiniMax video generation provider
pub struct MinimaxProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    poll_interval: Duration,
    max_poll_duration: Duration,
}

impl std::fmt::Debug for MinimaxProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinimaxProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl MinimaxProvider {
    /// Creates a new MiniMax provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: client_with_timeout(DEFAULT_TIMEOUT),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            poll_interval: POLL_INTERVAL,
            max_poll_duration: MAX_POLL_DURATION,
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
        if let Some(secs) = settings.get_setting::<u64>("poll_interval_secs") {
            self.poll_interval = Duration::from_secs(secs.max(1));
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

    fn submit_url(&self) -> String {
        format!("{}/video_generation", self.base_url)
    }

    fn query_url(&self, task_id: &str) -> String {
        format!("{}/query/video_generation?task_id={}", self.base_url, task_id)
    }

    fn retrieve_url(&self, file_id: &str) -> String {
        format!("{}/files/retrieve?file_id={}", self.base_url, file_id)
    }

    /// Inlines the seed image as a JPEG data URL.
    async fn encode_seed_image(&self, path: &std::path::Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            Error::Validation(format!(
                "cannot read seed image '{}': {}",
                path.display(),
                e
            ))
        })?;
        let encoded = base64::engine::general_purpose::STANDARD.encode(&bytes);
        Ok(format!("data:image/jpeg;base64,{}", encoded))
    }

    async fn submit(&self, payload: &SubmitTaskRequest) -> Result<VideoJob> {
        let response = self
            .client
            .post(self.submit_url())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(payload)
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

        let parsed: SubmitTaskResponse = serde_json::from_str(&body).map_err(|e| {
            Error::provider(
                self.name(),
                ProviderFault::Api,
                format!("failed to parse submit response: {}", e),
            )
        })?;

        let task_id = parsed
            .task_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::provider(
                    self.name(),
                    ProviderFault::Api,
                    "submit response carried no task id",
                )
            })?;

        info!("MiniMax video generation submitted: task_id={}", task_id);
        Ok(VideoJob {
            task_id,
            submitted_at: chrono::Utc::now().timestamp(),
        })
    }

    async fn query(&self, job: &VideoJob) -> Result<QueryTaskResponse> {
        let response = self
            .client
            .get(self.query_url(&job.task_id))
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        serde_json::from_str(&body).map_err(|e| {
            Error::provider(
                self.name(),
                ProviderFault::Api,
                format!("failed to parse poll response: {}", e),
            )
        })
    }

    /// Polls the task until it settles, then resolves the download URL.
    async fn poll_until_complete(&self, job: &VideoJob) -> Result<String> {
        let started = tokio::time::Instant::now();

        loop {
            tokio::time::sleep(self.poll_interval).await;

            if started.elapsed() > self.max_poll_duration {
                return Err(Error::provider(
                    self.name(),
                    ProviderFault::Timeout,
                    format!(
                        "video task {} did not settle within {:?}",
                        job.task_id, self.max_poll_duration
                    ),
                ));
            }

            let state = self.query(job).await?;
            let status = state.status.unwrap_or_else(|| "Unknown".to_string());
            debug!("MiniMax poll for task {}: status={}", job.task_id, status);

            if let Some(file_id) = state.file_id.filter(|id| !id.is_empty()) {
                return self.resolve_download_url(&file_id).await;
            }

            match status.to_ascii_lowercase().as_str() {
                "queueing" | "preparing" | "processing" => continue,
                "success" => {
                    // Success without a file id is a provider contract break.
                    return Err(Error::provider(
                        self.name(),
                        ProviderFault::Api,
                        format!("task {} succeeded but returned no file id", job.task_id),
                    ));
                }
                "fail" | "unknown" => {
                    return Err(Error::provider(
                        self.name(),
                        ProviderFault::Api,
                        format!("video generation task {} failed upstream", job.task_id),
                    ));
                }
                other => {
                    debug!("unrecognized MiniMax task status '{}', keeping polling", other);
                }
            }
        }
    }

    async fn resolve_download_url(&self, file_id: &str) -> Result<String> {
        let response = self
            .client
            .get(self.retrieve_url(file_id))
            .header("Authorization", format!("Bearer {}", self.api_key))
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

        let parsed: RetrieveFileResponse = serde_json::from_str(&body).map_err(|e| {
            Error::provider(
                self.name(),
                ProviderFault::Api,
                format!("failed to parse file retrieval response: {}", e),
            )
        })?;

        info!("video available at {}", parsed.file.download_url);
        Ok(parsed.file.download_url)
    }
}

#[async_trait]
impl MediaProvider for MinimaxProvider {
    fn name(&self) -> &str {
        "minimax"
    }

    fn kinds(&self) -> Vec<MediaKind> {
        vec![MediaKind::Video]
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn generate_video(&self, request: &MediaRequest) -> Result<MediaResult> {
        let output_path = request
            .output_path
            .as_deref()
            .ok_or_else(|| Error::Validation("video generation requires an output path".into()))?;
        let seed_image = request.input_image.as_deref().ok_or_else(|| {
            Error::Validation("video generation requires a seed image".into())
        })?;

        let payload = SubmitTaskRequest {
            model: request
                .get_option::<String>("model")
                .unwrap_or_else(|| self.model.clone()),
            prompt: request.prompt.clone(),
            first_frame_image: self.encode_seed_image(seed_image).await?,
        };

        let job = self.submit(&payload).await?;
        let download_url = self.poll_until_complete(&job).await?;

        info!("downloading generated video to {}", output_path.display());
        download_to_path(&self.client, self.name(), &download_url, output_path).await?;

        Ok(MediaResult::file(MediaKind::Video, self.name(), output_path)
            .with_metadata("model", payload.model)
            .with_metadata("task_id", job.task_id)
            .with_metadata("submitted_at", job.submitted_at))
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
        let provider = MinimaxProvider::new("key");
        assert_eq!(provider.name(), "minimax");
        assert!(provider.supports(MediaKind::Video));
        assert!(!provider.supports(MediaKind::Speech));
    }

    #[test]
    fn test_availability() {
        assert!(MinimaxProvider::new("key").is_available());
        assert!(!MinimaxProvider::new("").is_available());
    }

    #[test]
    fn test_url_building() {
        let provider = MinimaxProvider::new("key");
        assert_eq!(
            provider.submit_url(),
            "https://api.minimaxi.chat/v1/video_generation"
        );
        assert_eq!(
            provider.query_url("task-9"),
            "https://api.minimaxi.chat/v1/query/video_generation?task_id=task-9"
        );
        assert_eq!(
            provider.retrieve_url("file-3"),
            "https://api.minimaxi.chat/v1/files/retrieve?file_id=file-3"
        );

        let provider = provider.with_base_url("https://mock.local/v1");
        assert_eq!(provider.submit_url(), "https://mock.local/v1/video_generation");
    }

    #[tokio::test]
    async fn test_seed_image_is_required() {
        let provider = MinimaxProvider::new("key");
        let request = MediaRequest::new(MediaKind::Video, "a drifting nebula")
            .with_output("/tmp/nebula.mp4");

        let err = provider.generate_video(&request).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_seed_image_encoding() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("frame.jpg");
        tokio::fs::write(&image, b"\xff\xd8\xff").await.unwrap();

        let provider = MinimaxProvider::new("key");
        let data_url = provider.encode_seed_image(&image).await.unwrap();
        assert!(data_url.starts_with("data:image/jpeg;base64,"));
        assert!(data_url.len() > "data:image/jpeg;base64,".len());
    }
}
