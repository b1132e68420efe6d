//! Provider Adapters
//!
//! One adapter per (media kind × provider), all behind the `MediaProvider`
//! trait. Adding a provider for an existing kind means adding an adapter and
//! a factory entry; the dispatcher never learns provider specifics.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{Error, ProviderFault, Result};
use crate::media::{MediaKind, MediaRequest, MediaResult};

mod dispatcher;
mod elevenlabs;
mod minimax;
mod openrouter;
mod runware;

pub use dispatcher::MediaDispatcher;
pub use elevenlabs::ElevenLabsProvider;
pub use minimax::MinimaxProvider;
pub use openrouter::OpenRouterProvider;
pub use runware::RunwareProvider;

/// Maximum allowed artifact download size (500 MB) to prevent unbounded
/// memory/disk usage.
const MAX_DOWNLOAD_BYTES: u64 = 500 * 1024 * 1024;

// =============================================================================
// MediaProvider Trait
// =============================================================================

/// Trait for media generation providers.
///
/// Each adapter covers a fixed set of media kinds; unsupported kinds fall
/// through to a configuration error so misrouting is loud.
#[async_trait]
pub trait MediaProvider: Send + Sync {
    /// Returns the provider name
    fn name(&self) -> &str;

    /// Returns the media kinds this adapter produces
    fn kinds(&self) -> Vec<MediaKind>;

    /// Checks if the adapter covers a kind
    fn supports(&self, kind: MediaKind) -> bool {
        self.kinds().contains(&kind)
    }

    /// Checks if the adapter is configured correctly (credentials present)
    fn is_available(&self) -> bool;

    /// Generates text
    async fn generate_text(&self, _request: &MediaRequest) -> Result<MediaResult> {
        Err(self.unsupported(MediaKind::Text))
    }

    /// Generates an image
    async fn generate_image(&self, _request: &MediaRequest) -> Result<MediaResult> {
        Err(self.unsupported(MediaKind::Image))
    }

    /// Generates speech from text
    async fn generate_speech(&self, _request: &MediaRequest) -> Result<MediaResult> {
        Err(self.unsupported(MediaKind::Speech))
    }

    /// Generates video
    async fn generate_video(&self, _request: &MediaRequest) -> Result<MediaResult> {
        Err(self.unsupported(MediaKind::Video))
    }

    /// Error for a kind this adapter does not produce
    fn unsupported(&self, kind: MediaKind) -> Error {
        Error::Configuration(format!(
            "provider '{}' does not support {} generation",
            self.name(),
            kind
        ))
    }
}

// =============================================================================
// Shared HTTP Helpers
// =============================================================================

/// Maps an HTTP error status to the library error taxonomy.
pub(crate) fn classify_status(provider: &str, status: StatusCode, body: &str) -> Error {
    let detail = format!("{}: {}", status, truncate_body(body));
    match status.as_u16() {
        401 | 403 => Error::authentication(provider, detail),
        400 | 422 => {
            let fault = if looks_like_policy_rejection(body) {
                ProviderFault::ContentPolicy
            } else {
                ProviderFault::RejectedPrompt
            };
            Error::provider(provider, fault, detail)
        }
        408 => Error::provider(provider, ProviderFault::Timeout, detail),
        429 | 502 | 503 | 504 => Error::provider(provider, ProviderFault::Unavailable, detail),
        _ => Error::provider(provider, ProviderFault::Api, detail),
    }
}

/// Maps a transport-level reqwest failure to the library error taxonomy.
pub(crate) fn transport_error(provider: &str, err: reqwest::Error) -> Error {
    let fault = if err.is_timeout() {
        ProviderFault::Timeout
    } else {
        ProviderFault::Network
    };
    Error::provider(provider, fault, err.to_string())
}

fn looks_like_policy_rejection(body: &str) -> bool {
    let lowered = body.to_ascii_lowercase();
    lowered.contains("content_policy")
        || lowered.contains("content policy")
        || lowered.contains("moderation")
        || lowered.contains("safety")
}

/// Truncates an error body so upstream HTML pages don't flood logs.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(500).collect()
}

/// Validates that an artifact URL is a plain HTTP(S) URL.
pub(crate) fn validate_artifact_url(url: &str) -> Result<reqwest::Url> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Validation(format!("invalid artifact URL '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(Error::Validation(format!(
            "unsupported artifact URL scheme '{}'. Only http/https are allowed.",
            scheme
        ))),
    }
}

/// Streams a provider-hosted artifact to a local path.
///
/// Chunked to avoid holding large blobs in memory; a partially written file
/// is removed on failure so the dispatcher's no-partial-output guarantee
/// holds.
pub(crate) async fn download_to_path(
    client: &reqwest::Client,
    provider: &str,
    url: &str,
    path: &Path,
) -> Result<()> {
    let validated = validate_artifact_url(url)?;

    let response = client
        .get(validated)
        .send()
        .await
        .map_err(|e| transport_error(provider, e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(classify_status(provider, status, &body));
    }

    stream_to_path(response, provider, path).await
}

/// Streams an HTTP response body to a local path, enforcing the size cap and
/// removing the partial file on failure.
pub(crate) async fn stream_to_path(
    mut response: reqwest::Response,
    provider: &str,
    path: &Path,
) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if let Some(len) = response.content_length() {
        if len > MAX_DOWNLOAD_BYTES {
            return Err(Error::Validation(format!(
                "artifact is too large ({} bytes > {} bytes limit)",
                len, MAX_DOWNLOAD_BYTES
            )));
        }
    }

    let mut file = tokio::fs::File::create(path).await?;
    let mut total_bytes: u64 = 0;
    let write_result: Result<()> = async {
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(provider, e))?
        {
            total_bytes = total_bytes.saturating_add(chunk.len() as u64);
            if total_bytes > MAX_DOWNLOAD_BYTES {
                return Err(Error::Validation(format!(
                    "artifact exceeded max size limit ({} bytes)",
                    MAX_DOWNLOAD_BYTES
                )));
            }
            file.write_all(&chunk).await?;
        }
        file.flush().await?;
        Ok(())
    }
    .await;

    if let Err(e) = write_result {
        let _ = tokio::fs::remove_file(path).await;
        return Err(e);
    }

    info!(
        "downloaded {} artifact to {} ({} bytes)",
        provider,
        path.display(),
        total_bytes
    );
    Ok(())
}

// =============================================================================
// Mock Provider for Testing
// =============================================================================

/// Failure modes a mock provider can simulate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockFailure {
    /// Credentials rejected upstream.
    Authentication,
    /// Any classified provider fault.
    Fault(ProviderFault),
}

/// Mock provider for tests: writes a small placeholder artifact for file
/// kinds and echoes a canned response for text.
#[derive(Debug)]
pub struct MockProvider {
    name: String,
    kinds: Vec<MediaKind>,
    available: bool,
    text_response: String,
    failure: Option<MockFailure>,
    partial_write_on_failure: bool,
    calls: AtomicUsize,
}

impl MockProvider {
    /// Creates a mock provider covering every kind.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kinds: MediaKind::ALL.to_vec(),
            available: true,
            text_response: "mock response".to_string(),
            failure: None,
            partial_write_on_failure: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Restricts the covered kinds.
    pub fn with_kinds(mut self, kinds: Vec<MediaKind>) -> Self {
        self.kinds = kinds;
        self
    }

    /// Sets availability.
    pub fn with_available(mut self, available: bool) -> Self {
        self.available = available;
        self
    }

    /// Sets the canned text response.
    pub fn with_text_response(mut self, response: impl Into<String>) -> Self {
        self.text_response = response.into();
        self
    }

    /// Makes every call fail with the given mode.
    pub fn failing(mut self, failure: MockFailure) -> Self {
        self.failure = Some(failure);
        self
    }

    /// Makes failing file calls leave a half-written artifact behind, so
    /// dispatcher cleanup can be exercised.
    pub fn with_partial_write(mut self) -> Self {
        self.partial_write_on_failure = true;
        self
    }

    /// Number of generation calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn respond(&self, kind: MediaKind, request: &MediaRequest) -> Result<MediaResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(failure) = self.failure {
            if self.partial_write_on_failure {
                if let Some(path) = &request.output_path {
                    if let Some(parent) = path.parent() {
                        let _ = tokio::fs::create_dir_all(parent).await;
                    }
                    let _ = tokio::fs::write(path, b"partial").await;
                }
            }
            return Err(match failure {
                MockFailure::Authentication => {
                    Error::authentication(&self.name, "invalid API key")
                }
                MockFailure::Fault(fault) => {
                    Error::provider(&self.name, fault, "simulated failure")
                }
            });
        }

        if kind == MediaKind::Text {
            return Ok(MediaResult::text(&self.name, &self.text_response));
        }

        let path = request.output_path.as_ref().ok_or_else(|| {
            Error::Validation(format!("{} generation requires an output path", kind))
        })?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, format!("{} artifact for: {}", kind, request.prompt)).await?;
        Ok(MediaResult::file(kind, &self.name, path))
    }
}

#[async_trait]
impl MediaProvider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kinds(&self) -> Vec<MediaKind> {
        self.kinds.clone()
    }

    fn is_available(&self) -> bool {
        self.available
    }

    async fn generate_text(&self, request: &MediaRequest) -> Result<MediaResult> {
        if !self.supports(MediaKind::Text) {
            return Err(self.unsupported(MediaKind::Text));
        }
        self.respond(MediaKind::Text, request).await
    }

    async fn generate_image(&self, request: &MediaRequest) -> Result<MediaResult> {
        if !self.supports(MediaKind::Image) {
            return Err(self.unsupported(MediaKind::Image));
        }
        self.respond(MediaKind::Image, request).await
    }

    async fn generate_speech(&self, request: &MediaRequest) -> Result<MediaResult> {
        if !self.supports(MediaKind::Speech) {
            return Err(self.unsupported(MediaKind::Speech));
        }
        self.respond(MediaKind::Speech, request).await
    }

    async fn generate_video(&self, request: &MediaRequest) -> Result<MediaResult> {
        if !self.supports(MediaKind::Video) {
            return Err(self.unsupported(MediaKind::Video));
        }
        self.respond(MediaKind::Video, request).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_status() {
        let err = classify_status("runware", StatusCode::UNAUTHORIZED, "bad key");
        assert!(matches!(err, Error::Authentication { .. }));

        let err = classify_status("runware", StatusCode::BAD_REQUEST, "prompt too long");
        assert!(matches!(
            err,
            Error::Provider {
                fault: ProviderFault::RejectedPrompt,
                ..
            }
        ));

        let err = classify_status(
            "runware",
            StatusCode::BAD_REQUEST,
            r#"{"error":"blocked by content_policy"}"#,
        );
        assert!(matches!(
            err,
            Error::Provider {
                fault: ProviderFault::ContentPolicy,
                ..
            }
        ));

        let err = classify_status("runware", StatusCode::SERVICE_UNAVAILABLE, "down");
        assert!(err.is_transient());
    }

    #[test]
    fn test_validate_artifact_url() {
        assert!(validate_artifact_url("https://cdn.example.com/a.mp4").is_ok());
        assert!(validate_artifact_url("file:///etc/passwd").is_err());
        assert!(validate_artifact_url("not a url").is_err());
    }

    #[tokio::test]
    async fn test_mock_provider_text() {
        let provider = MockProvider::new("mock").with_text_response("hello");
        let request = MediaRequest::new(MediaKind::Text, "say hello");

        let result = provider.generate_text(&request).await.unwrap();
        assert_eq!(result.require_text().unwrap(), "hello");
        assert_eq!(provider.call_count(), 1);
    }

    #[tokio::test]
    async fn test_mock_provider_writes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.jpg");
        let provider = MockProvider::new("mock");
        let request = MediaRequest::new(MediaKind::Image, "a fox").with_output(&path);

        let result = provider.generate_image(&request).await.unwrap();
        assert_eq!(result.require_path().unwrap(), path);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_mock_provider_unsupported_kind() {
        let provider = MockProvider::new("mock").with_kinds(vec![MediaKind::Text]);
        let request = MediaRequest::new(MediaKind::Image, "a fox").with_output("/tmp/x.jpg");

        let result = provider.generate_image(&request).await;
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_mock_provider_failure_modes() {
        let provider = MockProvider::new("mock").failing(MockFailure::Authentication);
        let request = MediaRequest::new(MediaKind::Text, "hi");

        let err = provider.generate_text(&request).await.unwrap_err();
        assert!(matches!(err, Error::Authentication { .. }));
    }
}
