//! Accumulates streamed candidates and republishes deduplicated snapshots.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::debug;

use crate::generator::CandidateSink;
use crate::model::{LinkCandidate, LinkSet, SubtitleCandidate, SubtitleSet};
use crate::observable::Observable;
use crate::slot::TaskGuard;

/// Per-task accumulator behind an explicit load.
///
/// Every new candidate is inserted and the whole set is republished as a
/// fresh snapshot. Duplicates (by value) are dropped without a publish.
/// Publishes go through the task guard, so nothing reaches the slots once
/// the task has been superseded.
pub(crate) struct ResultAggregator {
    guard: TaskGuard,
    links_slot: Observable<LinkSet>,
    subtitles_slot: Observable<SubtitleSet>,
    links: Mutex<LinkSet>,
    subtitles: Mutex<SubtitleSet>,
    event_log: bool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ResultAggregator {
    /// Starts a fresh accumulation and clears both slots.
    pub(crate) fn begin(
        guard: TaskGuard,
        links_slot: Observable<LinkSet>,
        subtitles_slot: Observable<SubtitleSet>,
        event_log: bool,
    ) -> Self {
        guard.publish_if_current(|| {
            subtitles_slot.publish(SubtitleSet::new());
            links_slot.publish(LinkSet::new());
        });
        Self {
            guard,
            links_slot,
            subtitles_slot,
            links: Mutex::new(LinkSet::new()),
            subtitles: Mutex::new(SubtitleSet::new()),
            event_log,
        }
    }

    /// Final publish once the generator returned.
    ///
    /// Links are republished as accumulated. Subtitles are merged with
    /// whatever the slot currently holds, so tracks injected with
    /// [`add_subtitles`] while the task ran are kept.
    pub(crate) fn finish(&self) {
        let links = lock(&self.links).clone();
        let subtitles = lock(&self.subtitles).clone();
        self.guard.publish_if_current(|| {
            self.links_slot.publish_if_changed(links);
            self.subtitles_slot
                .update(|current| merged_if_grown(current, subtitles.iter()));
        });
    }

    pub(crate) fn link_count(&self) -> usize {
        lock(&self.links).len()
    }

    pub(crate) fn subtitle_count(&self) -> usize {
        lock(&self.subtitles).len()
    }
}

impl CandidateSink for ResultAggregator {
    fn on_link(&self, link: LinkCandidate) {
        let mut links = lock(&self.links);
        if self.event_log {
            debug!(generation = self.guard.generation(), name = link.name(), url = link.url(), "Link received");
        }
        if !links.insert(link) {
            return;
        }
        let snapshot = links.clone();
        // published while the set is locked so snapshots keep arrival order
        self.guard
            .publish_if_current(|| self.links_slot.publish(snapshot));
    }

    fn on_subtitle(&self, subtitle: SubtitleCandidate) {
        let mut subtitles = lock(&self.subtitles);
        if self.event_log {
            debug!(generation = self.guard.generation(), name = %subtitle.name, url = %subtitle.url, "Subtitle received");
        }
        if !subtitles.insert(subtitle) {
            return;
        }
        let snapshot = subtitles.clone();
        self.guard
            .publish_if_current(|| self.subtitles_slot.publish(snapshot));
    }
}

/// Merges externally supplied subtitles into the published set.
///
/// Nothing is published when every track is already present: a republish
/// makes the player re-evaluate its default track, which would override
/// a user who deliberately left subtitles off.
///
/// Returns whether a publish happened.
pub(crate) fn add_subtitles<I>(slot: &Observable<SubtitleSet>, incoming: I) -> bool
where
    I: IntoIterator<Item = SubtitleCandidate>,
{
    let incoming: Vec<SubtitleCandidate> = incoming.into_iter().collect();
    slot.update(|current| merged_if_grown(current, incoming.iter()))
}

fn merged_if_grown<'a, T, I>(current: &HashSet<T>, incoming: I) -> Option<HashSet<T>>
where
    T: Clone + Eq + Hash + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let mut merged = current.clone();
    let mut grown = false;
    for item in incoming {
        grown |= merged.insert(item.clone());
    }
    grown.then_some(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ExtractorLink;
    use crate::slot::TaskSlot;
    use tokio::sync::oneshot;

    fn link(n: u32) -> LinkCandidate {
        ExtractorLink::new("src", format!("src {n}"), format!("https://cdn/{n}.m3u8")).into()
    }

    fn sub(lang: &str) -> SubtitleCandidate {
        SubtitleCandidate::new(lang, format!("https://subs/{lang}.vtt"))
    }

    #[test]
    fn external_subtitles_are_deduplicated() {
        let slot = Observable::new(SubtitleSet::new());
        let mut events = slot.subscribe();
        assert_eq!(events.drain().len(), 1);

        assert!(add_subtitles(&slot, [sub("en"), sub("fr"), sub("en")]));
        assert_eq!(slot.get().len(), 2);

        // already wholly contained: no publish
        assert!(!add_subtitles(&slot, [sub("fr")]));
        assert!(!add_subtitles(&slot, Vec::new()));
        assert_eq!(events.drain().len(), 1);

        assert!(add_subtitles(&slot, [sub("de"), sub("en")]));
        assert_eq!(slot.get().len(), 3);
    }

    #[tokio::test]
    async fn duplicates_do_not_republish() {
        let links_slot = Observable::new(LinkSet::new());
        let subs_slot = Observable::new(SubtitleSet::new());
        let mut link_events = links_slot.subscribe();
        let mut sub_events = subs_slot.subscribe();
        let slot = TaskSlot::new("test", None);
        let (tx, rx) = oneshot::channel();

        let (ls, ss) = (links_slot.clone(), subs_slot.clone());
        slot.replace(move |guard| async move {
            let aggregator = ResultAggregator::begin(guard, ls, ss, true);
            aggregator.on_link(link(1));
            aggregator.on_link(link(1));
            aggregator.on_link(link(2));
            aggregator.on_subtitle(sub("en"));
            aggregator.on_subtitle(sub("en"));
            aggregator.finish();
            let _ = tx.send((aggregator.link_count(), aggregator.subtitle_count()));
        });

        assert_eq!(rx.await.unwrap(), (2, 1));
        let link_sizes: Vec<usize> = link_events.drain().iter().map(HashSet::len).collect();
        // initial value, reset, {1}, {1,2}; finish publishes nothing new
        assert_eq!(link_sizes, vec![0, 0, 1, 2]);
        let sub_sizes: Vec<usize> = sub_events.drain().iter().map(HashSet::len).collect();
        assert_eq!(sub_sizes, vec![0, 0, 1]);
    }

    #[tokio::test]
    async fn finish_keeps_externally_added_subtitles() {
        let links_slot = Observable::new(LinkSet::new());
        let subs_slot = Observable::new(SubtitleSet::new());
        let slot = TaskSlot::new("test", None);
        let (tx, rx) = oneshot::channel();

        let (ls, ss) = (links_slot.clone(), subs_slot.clone());
        slot.replace(move |guard| async move {
            let aggregator = ResultAggregator::begin(guard, ls, ss.clone(), false);
            aggregator.on_subtitle(sub("en"));
            aggregator.on_subtitle(sub("fr"));
            add_subtitles(&ss, [sub("local")]);
            aggregator.finish();
            let _ = tx.send(());
        });

        rx.await.unwrap();
        let names: HashSet<String> = subs_slot.get().into_iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 3);
        assert!(names.contains("local"));
    }

    #[tokio::test]
    async fn superseded_aggregator_stays_silent() {
        let links_slot = Observable::new(LinkSet::new());
        let subs_slot = Observable::new(SubtitleSet::new());
        let slot = TaskSlot::new("test", None);
        let (tx, rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel::<()>();

        let (ls, ss) = (links_slot.clone(), subs_slot.clone());
        slot.replace(move |guard| async move {
            let aggregator = ResultAggregator::begin(guard, ls, ss, false);
            let _ = release_rx.await;
            aggregator.on_link(link(9));
            aggregator.finish();
            let _ = tx.send(aggregator.link_count());
        });
        slot.replace(|_guard| async move {});
        release_tx.send(()).unwrap();

        assert_eq!(rx.await.unwrap(), 1);
        assert!(links_slot.get().is_empty());
    }
}
