//! Media Request Dispatcher
//!
//! Routes a generic media request to the one provider configured for its
//! kind, wraps failures with provider identity, and enforces the artifact
//! guarantees: on success the output file exists and is non-empty, on
//! failure no partial file is left behind.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Error, ProviderFault, Result};
use crate::media::{MediaKind, MediaRequest, MediaResult};

use super::{
    ElevenLabsProvider, MediaProvider, MinimaxProvider, OpenRouterProvider, RunwareProvider,
};

/// Maximum attempts for transient provider faults
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff between attempts
const BASE_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Routes media requests to the configured provider per kind.
///
/// The registry is immutable after construction; provider credentials are
/// read-only configuration shared across all pipelines.
pub struct MediaDispatcher {
    adapters: HashMap<MediaKind, Arc<dyn MediaProvider>>,
    max_attempts: u32,
    base_retry_delay: Duration,
}

impl std::fmt::Debug for MediaDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDispatcher")
            .field("kinds", &self.adapters.keys().collect::<Vec<_>>())
            .field("max_attempts", &self.max_attempts)
            .field("base_retry_delay", &self.base_retry_delay)
            .finish()
    }
}

impl MediaDispatcher {
    /// Creates an empty dispatcher. Useful with [`register`](Self::register)
    /// for tests and custom setups.
    pub fn new() -> Self {
        Self {
            adapters: HashMap::new(),
            max_attempts: MAX_ATTEMPTS,
            base_retry_delay: BASE_RETRY_DELAY,
        }
    }

    /// Builds a dispatcher from configuration.
    ///
    /// Each media kind with an active provider entry gets exactly one
    /// adapter; unknown provider names fail loudly rather than at dispatch
    /// time.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut dispatcher = Self::new();

        for kind in MediaKind::ALL {
            let Some((name, settings)) = config.selection(kind).active() else {
                continue;
            };

            let api_key = settings.resolve_api_key(name).unwrap_or_default();
            let adapter: Arc<dyn MediaProvider> = match (kind, name) {
                (MediaKind::Text, "openrouter") => {
                    Arc::new(OpenRouterProvider::new(api_key).configure(&settings))
                }
                (MediaKind::Image, "runware") => {
                    Arc::new(RunwareProvider::new(api_key).configure(&settings))
                }
                (MediaKind::Speech, "elevenlabs") => {
                    Arc::new(ElevenLabsProvider::new(api_key).configure(&settings))
                }
                (MediaKind::Video, "minimax") => {
                    Arc::new(MinimaxProvider::new(api_key).configure(&settings))
                }
                (kind, name) => {
                    return Err(Error::Configuration(format!(
                        "unknown provider '{}' configured for {} generation",
                        name, kind
                    )));
                }
            };
            dispatcher.adapters.insert(kind, adapter);
        }

        Ok(dispatcher)
    }

    /// Registers (or replaces) the adapter for a kind.
    pub fn register(&mut self, kind: MediaKind, provider: Arc<dyn MediaProvider>) -> &mut Self {
        self.adapters.insert(kind, provider);
        self
    }

    /// Overrides the retry policy. Attempts below 1 are treated as 1.
    pub fn with_retry_policy(mut self, max_attempts: u32, base_delay: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.base_retry_delay = base_delay;
        self
    }

    /// Returns the adapter registered for a kind, if any.
    pub fn provider_for(&self, kind: MediaKind) -> Option<&Arc<dyn MediaProvider>> {
        self.adapters.get(&kind)
    }

    /// Convenience wrapper over [`dispatch`](Self::dispatch) mirroring the
    /// classic `ai_request(media, prompt, output_path)` call shape.
    pub async fn request(
        &self,
        kind: MediaKind,
        prompt: &str,
        output_path: Option<&Path>,
    ) -> Result<MediaResult> {
        let mut request = MediaRequest::new(kind, prompt);
        if let Some(path) = output_path {
            request = request.with_output(path);
        }
        self.dispatch(request).await
    }

    /// Dispatches a media request to the provider configured for its kind.
    ///
    /// Validation and provider resolution happen before any network call, so
    /// an unconfigured kind or malformed request never reaches the wire.
    pub async fn dispatch(&self, request: MediaRequest) -> Result<MediaResult> {
        request.validate().map_err(Error::Validation)?;

        let provider = self.adapters.get(&request.kind).ok_or_else(|| {
            Error::Configuration(format!(
                "no provider configured for {} generation",
                request.kind
            ))
        })?;

        if !provider.is_available() {
            return Err(Error::authentication(
                provider.name(),
                "provider credentials are missing",
            ));
        }

        debug!(
            "dispatching {} request to '{}'",
            request.kind,
            provider.name()
        );

        match self.invoke_with_retry(provider.as_ref(), &request).await {
            Ok(result) => {
                if request.kind.writes_file() {
                    self.verify_artifact(provider.name(), &request, &result)
                        .await?;
                }
                Ok(result)
            }
            Err(e) => {
                // No partial file may survive a failed dispatch.
                if let Some(path) = &request.output_path {
                    let _ = tokio::fs::remove_file(path).await;
                }
                Err(e)
            }
        }
    }

    /// Confirms the promised artifact actually exists and is non-empty.
    async fn verify_artifact(
        &self,
        provider: &str,
        request: &MediaRequest,
        result: &MediaResult,
    ) -> Result<()> {
        let path = result.require_path()?;
        let ok = match tokio::fs::metadata(path).await {
            Ok(meta) => meta.is_file() && meta.len() > 0,
            Err(_) => false,
        };
        if !ok {
            let _ = tokio::fs::remove_file(path).await;
            return Err(Error::provider(
                provider,
                ProviderFault::Api,
                format!(
                    "{} generation reported success but produced no artifact at {}",
                    request.kind,
                    path.display()
                ),
            ));
        }
        Ok(())
    }

    /// Invokes the adapter, retrying transient faults with exponential
    /// backoff. Semantic rejections are surfaced immediately.
    async fn invoke_with_retry(
        &self,
        provider: &dyn MediaProvider,
        request: &MediaRequest,
    ) -> Result<MediaResult> {
        let mut attempt = 0;
        loop {
            match self.invoke(provider, request).await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    attempt += 1;
                    if !e.is_transient() || attempt >= self.max_attempts {
                        return Err(e);
                    }
                    let delay = self.base_retry_delay * 2u32.pow(attempt - 1);
                    warn!(
                        "'{}' {} attempt {} failed, retrying in {:?}: {}",
                        provider.name(),
                        request.kind,
                        attempt,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn invoke(
        &self,
        provider: &dyn MediaProvider,
        request: &MediaRequest,
    ) -> Result<MediaResult> {
        match request.kind {
            MediaKind::Text => provider.generate_text(request).await,
            MediaKind::Image => provider.generate_image(request).await,
            MediaKind::Speech => provider.generate_speech(request).await,
            MediaKind::Video => provider.generate_video(request).await,
        }
    }
}

impl Default for MediaDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KindSelection, ProviderSettings};
    use crate::providers::{MockFailure, MockProvider};

    fn fast_retry() -> (u32, Duration) {
        (2, Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_unconfigured_kind_fails_without_network() {
        // Only a text provider is registered; the image mock would record
        // any call it receives.
        let text = Arc::new(MockProvider::new("text-mock"));
        let mut dispatcher = MediaDispatcher::new();
        dispatcher.register(MediaKind::Text, text.clone());

        let err = dispatcher
            .request(MediaKind::Image, "a fox", Some(Path::new("/tmp/fox.jpg")))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(text.call_count(), 0);
    }

    #[tokio::test]
    async fn test_validation_happens_before_resolution() {
        let provider = Arc::new(MockProvider::new("mock"));
        let mut dispatcher = MediaDispatcher::new();
        dispatcher.register(MediaKind::Text, provider.clone());

        let err = dispatcher
            .request(MediaKind::Text, "   ", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // File kinds need an output path.
        dispatcher.register(MediaKind::Image, provider.clone());
        let err = dispatcher
            .request(MediaKind::Image, "a fox", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(provider.call_count(), 0);
    }

    #[tokio::test]
    async fn test_successful_dispatch_leaves_nonempty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speech.mp3");

        let mut dispatcher = MediaDispatcher::new();
        dispatcher.register(MediaKind::Speech, Arc::new(MockProvider::new("mock")));

        let result = dispatcher
            .request(MediaKind::Speech, "hello world", Some(&path))
            .await
            .unwrap();

        assert_eq!(result.provider, "mock");
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[tokio::test]
    async fn test_failed_dispatch_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.jpg");

        let provider = MockProvider::new("mock")
            .failing(MockFailure::Fault(ProviderFault::Api))
            .with_partial_write();
        let mut dispatcher = MediaDispatcher::new();
        dispatcher.register(MediaKind::Image, Arc::new(provider));

        let err = dispatcher
            .request(MediaKind::Image, "a fox", Some(&path))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Provider { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_unavailable_provider_is_authentication_error() {
        let mut dispatcher = MediaDispatcher::new();
        dispatcher.register(
            MediaKind::Text,
            Arc::new(MockProvider::new("mock").with_available(false)),
        );

        let err = dispatcher
            .request(MediaKind::Text, "hello", None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Authentication { ref provider, .. } if provider == "mock"
        ));
    }

    #[tokio::test]
    async fn test_transient_faults_are_retried() {
        let (attempts, delay) = fast_retry();
        let provider = Arc::new(
            MockProvider::new("mock").failing(MockFailure::Fault(ProviderFault::Network)),
        );
        let mut dispatcher = MediaDispatcher::new().with_retry_policy(attempts, delay);
        dispatcher.register(MediaKind::Text, provider.clone());

        let err = dispatcher
            .request(MediaKind::Text, "hello", None)
            .await
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(provider.call_count(), attempts as usize);
    }

    #[tokio::test]
    async fn test_semantic_rejections_are_not_retried() {
        let (attempts, delay) = fast_retry();
        let provider = Arc::new(
            MockProvider::new("mock").failing(MockFailure::Fault(ProviderFault::RejectedPrompt)),
        );
        let mut dispatcher = MediaDispatcher::new().with_retry_policy(attempts, delay);
        dispatcher.register(MediaKind::Text, provider.clone());

        let err = dispatcher
            .request(MediaKind::Text, "hello", None)
            .await
            .unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(provider.call_count(), 1);
    }

    #[test]
    fn test_from_config_rejects_unknown_provider() {
        let mut config = Config::default();
        config.ai.image = KindSelection::default()
            .with_provider("nonexistent", ProviderSettings::with_api_key("k"));

        let err = MediaDispatcher::from_config(&config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_from_config_builds_known_providers() {
        let mut config = Config::default();
        config.ai.text = KindSelection::default()
            .with_provider("openrouter", ProviderSettings::with_api_key("or"));
        config.ai.image = KindSelection::default()
            .with_provider("runware", ProviderSettings::with_api_key("rw"));
        config.ai.speech = KindSelection::default().with_provider(
            "elevenlabs",
            ProviderSettings::with_api_key("el").with_setting("voice_id", "voice-1"),
        );
        config.ai.video = KindSelection::default()
            .with_provider("minimax", ProviderSettings::with_api_key("mm"));

        let dispatcher = MediaDispatcher::from_config(&config).unwrap();
        for kind in MediaKind::ALL {
            let provider = dispatcher.provider_for(kind).unwrap();
            assert!(provider.supports(kind));
            assert!(provider.is_available());
        }
    }
}
