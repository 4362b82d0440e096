//! The generator contract the coordinator drives.
//!
//! A generator knows how to walk a catalog of episodes and how to discover
//! links and subtitles for the item under its cursor. Link extraction,
//! caching and network access all live behind this trait.

use std::fmt::Debug;

use tokio_util::sync::CancellationToken;

use crate::Result;
use crate::model::{
    EpisodeId, GenerateParams, ItemMetadata, LinkCandidate, PageContext, SubtitleCandidate,
};

/// Receives candidates while a generation call is streaming.
///
/// Implementations must be cheap: generators call them inline between
/// extraction steps.
pub trait CandidateSink: Send + Sync {
    fn on_link(&self, link: LinkCandidate);

    fn on_subtitle(&self, subtitle: SubtitleCandidate);
}

/// Sink that drops everything, used for cache warm-up calls.
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl CandidateSink for DiscardSink {
    fn on_link(&self, _link: LinkCandidate) {}

    fn on_subtitle(&self, _subtitle: SubtitleCandidate) {}
}

/// Navigable source of links and subtitles.
///
/// # Cursor
///
/// The generator keeps a navigation cursor. The coordinator only moves it
/// from inside the generation task it is currently running, never
/// concurrently from two tasks.
///
/// # Cancellation
///
/// [`LinkGenerator::generate`] receives the task's cancellation token and
/// should stop emitting once it is cancelled. The coordinator also stops
/// polling the call when the token fires, but has no way to undo side
/// effects already performed.
///
/// # Thread Safety
///
/// All implementations must be `Send + Sync`: calls happen from Tokio
/// worker threads.
#[async_trait::async_trait]
pub trait LinkGenerator: Debug + Send + Sync {
    // ============= Navigation =============

    /// Moves the cursor to `index`.
    async fn navigate_to(&self, index: usize) -> Result<()>;

    /// Moves the cursor to the next item.
    async fn advance(&self) -> Result<()>;

    /// Moves the cursor to the previous item.
    async fn retreat(&self) -> Result<()>;

    fn has_next(&self) -> bool;

    fn has_previous(&self) -> bool;

    fn current_id(&self) -> Option<EpisodeId>;

    // ============= Queries =============

    /// Metadata of the item `offset` positions after the cursor.
    fn current_metadata(&self, offset: usize) -> Result<Option<ItemMetadata>>;

    fn all_metadata(&self) -> Result<Vec<ItemMetadata>>;

    /// Show-level context for skip detection, when the generator has one.
    fn page(&self) -> Option<PageContext> {
        None
    }

    /// Whether [`LinkGenerator::generate`] fills an internal cache that
    /// makes a later call for the same item faster.
    fn is_cache_capable(&self) -> bool {
        false
    }

    // ============= Generation =============

    /// Streams candidates for the target item into `sink`.
    ///
    /// Returns `Ok(true)` when at least one link was produced.
    async fn generate(
        &self,
        params: GenerateParams,
        sink: &dyn CandidateSink,
        cancel: CancellationToken,
    ) -> Result<bool>;
}
