//! Skip-stamp loading (intro, outro, recap markers).
//!
//! Stamp loading runs in its own slot and is never cancelled: neither a
//! new `load_stamps` call nor navigation stops a fetch in flight. When two
//! fetches overlap, the one finishing last wins, even if it was started
//! first.

use std::fmt::Debug;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::SkipError;
use crate::generator::LinkGenerator;
use crate::model::{EpisodeMeta, ItemMetadata, PageContext, SkipStamp};
use crate::observable::Observable;
use crate::slot::TaskGuard;

/// External skip-segment detection service.
#[async_trait::async_trait]
pub trait SkipStampProvider: Debug + Send + Sync {
    /// Fetches the skippable segments of `episode`.
    ///
    /// `duration_ms` is the playback duration measured by the player and
    /// `has_next` tells whether an ending may jump to a next episode.
    async fn fetch_stamps(
        &self,
        page: &PageContext,
        episode: &EpisodeMeta,
        duration_ms: u64,
        has_next: bool,
    ) -> std::result::Result<Vec<SkipStamp>, SkipError>;
}

/// Provider that never reports any segment.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSkipStamps;

#[async_trait::async_trait]
impl SkipStampProvider for NoSkipStamps {
    async fn fetch_stamps(
        &self,
        _page: &PageContext,
        _episode: &EpisodeMeta,
        _duration_ms: u64,
        _has_next: bool,
    ) -> std::result::Result<Vec<SkipStamp>, SkipError> {
        Ok(Vec::new())
    }
}

/// Body of one stamp-loading task.
pub(crate) async fn run_stamp_task(
    guard: TaskGuard,
    generator: Arc<dyn LinkGenerator>,
    provider: Arc<dyn SkipStampProvider>,
    stamps: Observable<Vec<SkipStamp>>,
    duration_ms: u64,
) {
    let meta = match generator.current_metadata(0) {
        Ok(meta) => meta,
        Err(err) => {
            warn!(error = %err, "Could not read current item for skip stamps");
            return;
        }
    };
    let page = generator.page();

    let (Some(page), Some(ItemMetadata::Episode(episode))) = (page, meta) else {
        debug!("No page or episode for the current item, skip stamps not loaded");
        return;
    };

    guard.publish_if_current(|| stamps.publish(Vec::new()));

    let has_next = generator.has_next();
    match provider
        .fetch_stamps(&page, &episode, duration_ms, has_next)
        .await
    {
        Ok(found) => {
            debug!(
                generation = guard.generation(),
                episode = episode.episode,
                count = found.len(),
                "Skip stamps loaded"
            );
            guard.publish_if_current(|| stamps.publish(found));
        }
        Err(err) => {
            warn!(episode = episode.episode, error = %err, "Skip stamp lookup failed");
        }
    }
}
