//! mediaichemy
//!
//! AI alchemy for short-form media: a unified multi-provider media-request
//! layer (text, image, speech, video) plus a content-creation pipeline that
//! stitches generated artifacts into finished videos with ffmpeg.
//!
//! The two central pieces:
//!
//! - [`MediaDispatcher`] — one call signature over heterogeneous provider
//!   APIs, with per-kind routing, classified errors, bounded retries, and
//!   artifact guarantees.
//! - [`MediaAlchemist`] — the orchestrator: `generate_ideas` →
//!   `initialize_content` → `create_content`, delegating to the content
//!   creator selected at construction.
//!
//! ```no_run
//! use mediaichemy::{Config, MediaAlchemist};
//!
//! # async fn run() -> mediaichemy::Result<()> {
//! let config = Config::load_or_default(&Config::default_path())?;
//! let alchemist = MediaAlchemist::short_video(config)?;
//!
//! let ideas = alchemist.generate_ideas().await?;
//! let mut content = alchemist.initialize_content(ideas[0].clone())?;
//! let finals = alchemist.create_content(&mut content).await?;
//! println!("created {} videos", finals.len());
//! content.purge()?;
//! # Ok(())
//! # }
//! ```

pub mod alchemist;
pub mod config;
pub mod content;
pub mod edit;
pub mod media;
pub mod providers;

mod error;


pub use alchemist::MediaAlchemist;
pub use config::Config;
pub use content::{ContentCreator, Idea, ShortVideo, ShortVideoCreator, Stage};
pub use error::{Error, ProviderFault, Result};
pub use media::{MediaKind, MediaRequest, MediaResult};
pub use providers::{MediaDispatcher, MediaProvider};
