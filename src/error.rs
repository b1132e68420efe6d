//! Error Definitions
//!
//! Defines error types used throughout the library.

use thiserror::Error;

/// Classifies what went wrong inside a provider call.
///
/// The dispatcher uses this to decide whether a failed request is worth
/// retrying; the orchestrator uses it to decide whether to abort or skip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProviderFault {
    /// The provider rejected the prompt as malformed.
    RejectedPrompt,
    /// The provider refused the request on content-policy grounds.
    ContentPolicy,
    /// The provider did not answer within the configured timeout.
    Timeout,
    /// Transport-level failure (DNS, TLS, connection reset).
    Network,
    /// The provider is overloaded or temporarily down (429/5xx).
    Unavailable,
    /// Any other provider-side error.
    Api,
}

impl ProviderFault {
    /// Faults worth retrying with backoff. Semantic rejections are not.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ProviderFault::Timeout | ProviderFault::Network | ProviderFault::Unavailable
        )
    }
}

impl std::fmt::Display for ProviderFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProviderFault::RejectedPrompt => "rejected prompt",
            ProviderFault::ContentPolicy => "content policy",
            ProviderFault::Timeout => "timeout",
            ProviderFault::Network => "network",
            ProviderFault::Unavailable => "unavailable",
            ProviderFault::Api => "api",
        };
        write!(f, "{}", name)
    }
}

/// Library error types
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    #[error("configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Provider Errors
    // =========================================================================
    #[error("authentication failed for provider '{provider}': {message}")]
    Authentication { provider: String, message: String },

    #[error("provider '{provider}' request failed ({fault}): {message}")]
    Provider {
        provider: String,
        fault: ProviderFault,
        message: String,
    },

    // =========================================================================
    // Pipeline Errors
    // =========================================================================
    #[error("validation error: {0}")]
    Validation(String),

    #[error("editing operation '{operation}' failed: {message}")]
    Editing { operation: String, message: String },

    #[error("stage '{stage}' failed: {source}")]
    Stage {
        stage: String,
        #[source]
        source: Box<Error>,
    },

    // =========================================================================
    // General Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Library result type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a provider error with a classified fault.
    pub fn provider(
        provider: impl Into<String>,
        fault: ProviderFault,
        message: impl Into<String>,
    ) -> Self {
        Error::Provider {
            provider: provider.into(),
            fault,
            message: message.into(),
        }
    }

    /// Creates an authentication error attributed to a provider.
    pub fn authentication(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Authentication {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates an editing error for a named operation.
    pub fn editing(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Editing {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Annotates this error with the pipeline stage it occurred in.
    ///
    /// The original error stays reachable through `source()`; nothing is
    /// swallowed or rewritten.
    pub fn at_stage(self, stage: impl Into<String>) -> Self {
        Error::Stage {
            stage: stage.into(),
            source: Box::new(self),
        }
    }

    /// Returns the pipeline stage this error was annotated with, if any.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Error::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Unwraps stage annotations down to the underlying cause.
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Stage { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns true when retrying the operation could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Provider { fault, .. } => fault.is_transient(),
            Error::Stage { source, .. } => source.is_transient(),
            _ => false,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_display() {
        let err = Error::provider("minimax", ProviderFault::Timeout, "no answer after 180s");
        let text = err.to_string();
        assert!(text.contains("minimax"));
        assert!(text.contains("timeout"));
    }

    #[test]
    fn test_authentication_attribution() {
        let err = Error::authentication("runware", "401 Unauthorized");
        assert!(matches!(
            err,
            Error::Authentication { ref provider, .. } if provider == "runware"
        ));
    }

    #[test]
    fn test_stage_annotation_preserves_cause() {
        let err = Error::provider("elevenlabs", ProviderFault::Api, "500")
            .at_stage("speech_generation");

        assert_eq!(err.stage(), Some("speech_generation"));
        assert!(matches!(
            err.root_cause(),
            Error::Provider { provider, .. } if provider == "elevenlabs"
        ));
        assert!(err.to_string().contains("speech_generation"));
    }

    #[test]
    fn test_transience() {
        assert!(Error::provider("p", ProviderFault::Network, "reset").is_transient());
        assert!(Error::provider("p", ProviderFault::Unavailable, "503").is_transient());
        assert!(!Error::provider("p", ProviderFault::RejectedPrompt, "bad").is_transient());
        assert!(!Error::Validation("empty prompt".to_string()).is_transient());

        // Transience survives stage annotation.
        let wrapped = Error::provider("p", ProviderFault::Timeout, "slow").at_stage("x");
        assert!(wrapped.is_transient());
    }
}
