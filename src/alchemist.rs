//! Orchestrator Façade
//!
//! Ties the pieces together: generate ideas through the text provider, turn
//! an idea into a content spec, and hand the spec to the matching content
//! creator. The content type is selected at construction by choosing the
//! creator implementation; adding a content type never touches this module.

use std::path::PathBuf;

use tracing::info;

use crate::config::Config;
use crate::content::{ContentCreator, Idea, ShortVideoCreator};
use crate::error::Result;
use crate::providers::MediaDispatcher;

/// Top-level entry point for content creation.
///
/// Generic over the content creator; construction wires the immutable
/// configuration into the dispatcher and the creator once, so no call reads
/// config or environment state afterwards.
#[derive(Debug)]
pub struct MediaAlchemist<C: ContentCreator> {
    config: Config,
    dispatcher: MediaDispatcher,
    creator: C,
}

impl MediaAlchemist<ShortVideoCreator> {
    /// Builds an orchestrator for the short-video content type.
    pub fn short_video(mut config: Config) -> Result<Self> {
        config.normalize();
        let dispatcher = MediaDispatcher::from_config(&config)?;
        let creator = ShortVideoCreator::new(&config);
        Ok(Self::with_creator(config, dispatcher, creator))
    }
}

impl<C: ContentCreator> MediaAlchemist<C> {
    /// Builds an orchestrator over an explicit creator and dispatcher.
    ///
    /// This is the seam for new content types and for tests that inject
    /// mock providers or editors.
    pub fn with_creator(config: Config, dispatcher: MediaDispatcher, creator: C) -> Self {
        Self {
            config,
            dispatcher,
            creator,
        }
    }

    /// The content-type tag this orchestrator produces.
    pub fn content_type(&self) -> &'static str {
        self.creator.content_type()
    }

    /// The immutable configuration this orchestrator was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The dispatcher routing media requests.
    pub fn dispatcher(&self) -> &MediaDispatcher {
        &self.dispatcher
    }

    /// Generates a batch of ideas for the content type.
    ///
    /// Returns exactly the configured number of ideas, each usable as input
    /// to [`initialize_content`](Self::initialize_content).
    pub async fn generate_ideas(&self) -> Result<Vec<Idea>> {
        info!("generating ideas for content type '{}'", self.content_type());
        self.creator.generate_ideas(&self.dispatcher).await
    }

    /// Turns an idea into an initialized content spec. No network I/O.
    pub fn initialize_content(&self, idea: Idea) -> Result<C::Content> {
        self.creator.initialize(idea)
    }

    /// Drives a content spec through its pipeline and returns the final
    /// artifact paths, one per target language.
    pub async fn create_content(&self, content: &mut C::Content) -> Result<Vec<PathBuf>> {
        self.creator.create(&self.dispatcher, content).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KindSelection, ProviderSettings};
    use crate::error::Error;

    #[test]
    fn test_short_video_constructor_validates_providers() {
        let mut config = Config::default();
        config.ai.text = KindSelection::default()
            .with_provider("no-such-provider", ProviderSettings::with_api_key("k"));

        let err = MediaAlchemist::short_video(config).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_short_video_constructor_with_defaults() {
        // No providers configured is a valid construction; dispatching is
        // where missing kinds are reported.
        let alchemist = MediaAlchemist::short_video(Config::default()).unwrap();
        assert_eq!(alchemist.content_type(), "short_video");
        assert!(alchemist
            .dispatcher()
            .provider_for(crate::media::MediaKind::Text)
            .is_none());
    }
}
