//! # PMOPlayer
//!
//! Coordination of link, subtitle and skip-stamp retrieval for an episode
//! player.
//!
//! The player attaches a [`LinkGenerator`] (the component that knows how to
//! walk a catalog and extract playable links) to a [`GenerationCoordinator`]
//! and then only issues fire-and-forget requests: load this episode, load
//! the next one, warm the cache for the next one, fetch skip stamps. Results
//! come back through [`Observable`] slots the UI subscribes to.
//!
//! ## Features
//!
//! - **Cancellation**: a new load supersedes the previous one; the old task
//!   can no longer publish once the new one has started.
//! - **Streaming results**: links and subtitles are republished as
//!   deduplicated snapshots as soon as the generator emits them.
//! - **Preload**: cache warm-up of the next episode without touching the UI
//!   slots.
//! - **Skip stamps**: independent fetch of intro/outro/recap markers through
//!   a [`SkipStampProvider`].
//! - **Configuration**: `player.*` settings from `pmoconfig` (feature
//!   `pmoconfig`, enabled by default).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pmoplayer::{GenerationCoordinator, LinkGenerator, LoadingState, NoSkipStamps};
//!
//! # async fn demo(generator: Arc<dyn LinkGenerator>) {
//! let coordinator = GenerationCoordinator::new(Arc::new(NoSkipStamps));
//! coordinator.attach_generator(generator);
//!
//! let mut loading = coordinator.loading().subscribe();
//! coordinator.load_links(Some(2));
//!
//! while let Some(state) = loading.recv().await {
//!     if state.is_terminal() {
//!         println!("{state:?}: {} link(s)", coordinator.links().get().len());
//!         break;
//!     }
//! }
//! # }
//! ```

mod aggregator;
mod coordinator;
mod error;
mod generator;
mod model;
mod navigation;
mod observable;
mod settings;
pub mod skip;
mod slot;

#[cfg(feature = "pmoconfig")]
mod config_ext;

// Réexports publics
pub use coordinator::GenerationCoordinator;
pub use error::{GeneratorError, Result, SkipError};
pub use generator::{CandidateSink, DiscardSink, LinkGenerator};
pub use model::{
    EpisodeId, EpisodeMeta, ExtractorLink, ExtractorUri, GenerateParams, GenerationRequest,
    ItemMetadata, LinkCandidate, LinkSet, LinkType, LoadingState, PageContext, SkipStamp,
    SkipType, SubtitleCandidate, SubtitleOrigin, SubtitleSet, Target,
};
pub use observable::{Observable, Subscription};
pub use settings::CoordinatorSettings;
pub use skip::{NoSkipStamps, SkipStampProvider};

#[cfg(feature = "pmoconfig")]
pub use config_ext::PlayerConfigExt;
