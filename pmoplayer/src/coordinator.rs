//! The generation coordinator.
//!
//! [`GenerationCoordinator`] owns the attached generator and runs every
//! link generation on a background task. Explicit loads and preloads share
//! one cancellation slot: starting either cancels whatever ran there
//! before. Skip stamps use a second slot that is never cancelled.
//!
//! Consumers never get errors back from the coordinator. Failures of an
//! explicit load show up as [`LoadingState::Failure`] on [`loading`];
//! everything else is logged and turned into an absent result.
//!
//! No timeout is applied to generator calls: a generator that never
//! returns keeps its task alive until a newer task supersedes it.
//!
//! [`loading`]: GenerationCoordinator::loading

use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

use crate::Result;
use crate::aggregator::{self, ResultAggregator};
use crate::generator::{DiscardSink, LinkGenerator};
use crate::model::{
    EpisodeId, GenerationRequest, ItemMetadata, LinkSet, LoadingState, SkipStamp,
    SubtitleCandidate, SubtitleSet, Target,
};
use crate::navigation::{NavigationChain, NavigationStep};
use crate::observable::Observable;
use crate::settings::CoordinatorSettings;
use crate::skip::{self, SkipStampProvider};
use crate::slot::{TaskGuard, TaskSlot};

/// Slots an explicit load writes to.
#[derive(Clone)]
struct LoadSlots {
    links: Observable<LinkSet>,
    subtitles: Observable<SubtitleSet>,
    loading: Observable<LoadingState>,
}

/// Orchestrates link generation, warm-up and skip-stamp loading for one
/// player session.
///
/// All operations return immediately; work happens on Tokio tasks spawned
/// on the runtime that was current when the coordinator was built (or, if
/// there was none, the runtime current at each call).
pub struct GenerationCoordinator {
    generator: OnceCell<Arc<dyn LinkGenerator>>,
    skip_provider: Arc<dyn SkipStampProvider>,
    settings: CoordinatorSettings,
    primary: Arc<TaskSlot>,
    navigation: NavigationChain,
    stamp_slot: Arc<TaskSlot>,
    slots: LoadSlots,
    stamps: Observable<Vec<SkipStamp>>,
    subtitle_year: Observable<Option<i32>>,
}

impl GenerationCoordinator {
    pub fn new(skip_provider: Arc<dyn SkipStampProvider>) -> Self {
        Self::with_settings(skip_provider, CoordinatorSettings::default())
    }

    pub fn with_settings(
        skip_provider: Arc<dyn SkipStampProvider>,
        settings: CoordinatorSettings,
    ) -> Self {
        let runtime = Handle::try_current().ok();
        Self {
            generator: OnceCell::new(),
            skip_provider,
            settings,
            primary: TaskSlot::new("links", runtime.clone()),
            navigation: NavigationChain::default(),
            stamp_slot: TaskSlot::new("stamps", runtime),
            slots: LoadSlots {
                links: Observable::new(LinkSet::new()),
                subtitles: Observable::new(SubtitleSet::new()),
                loading: Observable::new(LoadingState::Idle),
            },
            stamps: Observable::new(Vec::new()),
            subtitle_year: Observable::new(None),
        }
    }

    /// Builds a coordinator with the `player.*` settings of the global
    /// PMOPlayer configuration.
    #[cfg(feature = "pmoconfig")]
    pub fn configured(skip_provider: Arc<dyn SkipStampProvider>) -> Self {
        use crate::config_ext::PlayerConfigExt;

        let settings = pmoconfig::get_config().player_settings();
        Self::with_settings(skip_provider, settings)
    }

    pub fn settings(&self) -> CoordinatorSettings {
        self.settings
    }

    // ============= Observable surfaces =============

    /// Deduplicated links of the last explicit load.
    pub fn links(&self) -> &Observable<LinkSet> {
        &self.slots.links
    }

    /// Deduplicated subtitles of the last explicit load plus injected ones.
    pub fn subtitles(&self) -> &Observable<SubtitleSet> {
        &self.slots.subtitles
    }

    pub fn loading(&self) -> &Observable<LoadingState> {
        &self.slots.loading
    }

    pub fn stamps(&self) -> &Observable<Vec<SkipStamp>> {
        &self.stamps
    }

    pub fn subtitle_year(&self) -> &Observable<Option<i32>> {
        &self.subtitle_year
    }

    // ============= Generator binding =============

    /// Binds `generator` unless one is already bound.
    ///
    /// Returns whether this call bound it. Later calls are ignored, the
    /// first generator stays in effect.
    pub fn attach_generator(&self, generator: Arc<dyn LinkGenerator>) -> bool {
        match self.generator.set(generator) {
            Ok(()) => {
                info!("Generator attached");
                true
            }
            Err(_) => {
                debug!("Generator already attached, ignoring");
                false
            }
        }
    }

    fn generator(&self) -> Option<Arc<dyn LinkGenerator>> {
        self.generator.get().cloned()
    }

    // ============= Explicit loads =============

    /// Loads links for the item at `index`, or the current item when `None`.
    pub fn load_links(&self, index: Option<usize>) {
        let target = index.map_or(Target::Current, Target::Index);
        self.submit(GenerationRequest::new(target));
    }

    /// Reloads the current item with explicit cache and casting flags.
    pub fn reload_links(&self, clear_cache: bool, is_casting: bool) {
        self.submit(
            GenerationRequest::new(Target::Current)
                .clear_cache(clear_cache)
                .casting(is_casting),
        );
    }

    /// Advances to the next item and loads it.
    ///
    /// Does nothing when there is no next item; returns whether a load
    /// was started.
    ///
    /// While an earlier request has not moved the cursor yet, the check is
    /// left to the task: it runs once that move is applied, and if there is
    /// no next item then, the item the cursor ends on is loaded.
    pub fn load_links_next(&self) -> bool {
        info!("Next episode requested");
        self.step(Target::Next, |generator| generator.has_next())
    }

    /// Steps back to the previous item and loads it.
    ///
    /// Same rules as [`load_links_next`](Self::load_links_next).
    pub fn load_links_prev(&self) -> bool {
        info!("Previous episode requested");
        self.step(Target::Previous, |generator| generator.has_previous())
    }

    fn step<F>(&self, target: Target, available: F) -> bool
    where
        F: FnOnce(&dyn LinkGenerator) -> bool,
    {
        let Some(generator) = self.generator() else {
            return false;
        };
        if !self.navigation.is_pending() && !available(generator.as_ref()) {
            debug!(request = ?target, "No item in that direction");
            return false;
        }
        self.submit(GenerationRequest::new(target));
        true
    }

    /// Warms the generator cache for the next item.
    ///
    /// Only runs when the generator is cache capable, a next item exists and
    /// `preload_next` is enabled. The next item is checked again by the task
    /// once pending cursor moves are applied. Cancels the task running in the
    /// shared slot, including an explicit load. Nothing is published and
    /// failures are ignored. Returns whether a warm-up was started.
    pub fn pre_load_next(&self) -> bool {
        if !self.settings.preload_next {
            debug!("Preload disabled by configuration");
            return false;
        }
        let Some(generator) = self.generator() else {
            return false;
        };
        let pending = self.navigation.is_pending();
        if !(generator.is_cache_capable() && (pending || generator.has_next())) {
            debug!(
                cache_capable = generator.is_cache_capable(),
                "Nothing to preload"
            );
            return false;
        }
        self.submit(GenerationRequest::new(Target::Lookahead(1)));
        true
    }

    /// Starts the generation task described by `request` in the shared slot.
    ///
    /// [`Target::Lookahead`] requests are warm-ups: their results are
    /// discarded and no loading state is published. Every other target is
    /// an explicit load.
    pub fn submit(&self, request: GenerationRequest) {
        let Some(generator) = self.generator() else {
            warn!(request = ?request.target, "No generator attached, load ignored");
            return;
        };

        self.navigation.with_next_step(|step| match request.target {
            Target::Lookahead(_) => {
                self.primary
                    .replace(move |guard| run_preload(guard, generator, request, step));
            }
            _ => {
                let slots = self.slots.clone();
                let event_log = self.settings.event_log;
                self.primary.replace(move |guard| {
                    run_load(guard, generator, request, step, slots, event_log)
                });
            }
        });
    }

    /// Whether a generation or warm-up task is still running.
    pub fn is_generating(&self) -> bool {
        self.primary.is_busy()
    }

    // ============= Subtitles =============

    /// Injects subtitles found outside link generation (e.g. local files).
    ///
    /// Publishes only if at least one track is new. Returns whether the
    /// subtitle slot changed.
    pub fn add_subtitles<I>(&self, subtitles: I) -> bool
    where
        I: IntoIterator<Item = SubtitleCandidate>,
    {
        aggregator::add_subtitles(&self.slots.subtitles, subtitles)
    }

    /// Sets the release year used to search online subtitles.
    pub fn set_subtitle_year(&self, year: Option<i32>) {
        self.subtitle_year.publish(year);
    }

    // ============= Skip stamps =============

    /// Fetches skip stamps for the current item.
    ///
    /// Runs alongside any stamp fetch still in flight; see [`crate::skip`]
    /// for the ordering consequences.
    pub fn load_stamps(&self, duration_ms: u64) {
        if !self.settings.skip_stamps {
            debug!("Skip stamps disabled by configuration");
            return;
        }
        let Some(generator) = self.generator() else {
            return;
        };
        let provider = self.skip_provider.clone();
        let stamps = self.stamps.clone();
        self.stamp_slot.spawn_alongside(move |guard| {
            skip::run_stamp_task(guard, generator, provider, stamps, duration_ms)
        });
    }

    // ============= Queries =============

    /// Whether the generator has a next item; `None` without a generator.
    pub fn has_next_episode(&self) -> Option<bool> {
        self.generator().map(|generator| generator.has_next())
    }

    pub fn current_id(&self) -> Option<EpisodeId> {
        self.generator()?.current_id()
    }

    pub fn current_meta(&self) -> Option<ItemMetadata> {
        self.query("current_meta", |generator| generator.current_metadata(0))
    }

    /// Metadata of the next item, `None` when there is none.
    pub fn next_meta(&self) -> Option<ItemMetadata> {
        self.next_meta_at(1)
    }

    pub fn next_meta_at(&self, offset: usize) -> Option<ItemMetadata> {
        self.query("next_meta", |generator| {
            if !generator.has_next() {
                return Ok(None);
            }
            generator.current_metadata(offset)
        })
    }

    pub fn all_meta(&self) -> Option<Vec<ItemMetadata>> {
        self.query("all_meta", |generator| generator.all_metadata().map(Some))
    }

    fn query<T, F>(&self, name: &'static str, f: F) -> Option<T>
    where
        F: FnOnce(&dyn LinkGenerator) -> Result<Option<T>>,
    {
        let generator = self.generator()?;
        match f(generator.as_ref()) {
            Ok(value) => value,
            Err(err) => {
                warn!(query = name, error = %err, "Generator query failed");
                None
            }
        }
    }
}

impl Drop for GenerationCoordinator {
    fn drop(&mut self) {
        self.primary.cancel();
    }
}

async fn run_load(
    guard: TaskGuard,
    generator: Arc<dyn LinkGenerator>,
    request: GenerationRequest,
    step: NavigationStep,
    slots: LoadSlots,
    event_log: bool,
) {
    let generation = guard.generation();
    info!(
        generation,
        request = ?request.target,
        clear_cache = request.clear_cache,
        is_casting = request.is_casting,
        "Loading links"
    );

    let aggregator = ResultAggregator::begin(
        guard.clone(),
        slots.links.clone(),
        slots.subtitles.clone(),
        event_log,
    );
    guard.publish_if_current(|| slots.loading.publish(LoadingState::Loading));

    // applied even when superseded meanwhile: later requests build on it
    let navigation = step.apply(generator.as_ref(), request.target).await;

    if guard.token().is_cancelled() {
        debug!(generation, "Load cancelled before generation");
        return;
    }

    let outcome = match navigation {
        Err(err) => Err(err),
        Ok(()) => tokio::select! {
            biased;
            _ = guard.token().cancelled() => {
                debug!(generation, links = aggregator.link_count(), "Load cancelled");
                return;
            }
            result = generator.generate(request.params(), &aggregator, guard.token().clone()) => result,
        },
    };

    let state = match &outcome {
        Ok(produced) => {
            info!(
                generation,
                links = aggregator.link_count(),
                subtitles = aggregator.subtitle_count(),
                produced,
                "Links loaded"
            );
            LoadingState::Success(*produced)
        }
        Err(err) => {
            warn!(generation, error = %err, "Link generation failed");
            LoadingState::Failure(err.to_string())
        }
    };

    if !guard.publish_if_current(|| slots.loading.publish(state)) {
        debug!(generation, "Superseded before completion, outcome dropped");
        return;
    }
    aggregator.finish();
}

async fn run_preload(
    guard: TaskGuard,
    generator: Arc<dyn LinkGenerator>,
    request: GenerationRequest,
    step: NavigationStep,
) {
    let generation = guard.generation();
    let params = request.params();

    step.apply(generator.as_ref(), request.target).await.ok();
    if guard.token().is_cancelled() {
        debug!(generation, "Preload cancelled");
        return;
    }
    if !generator.has_next() {
        debug!(generation, "No next item once settled, preload skipped");
        return;
    }
    debug!(generation, offset = params.offset, "Preloading links");

    let result = tokio::select! {
        biased;
        _ = guard.token().cancelled() => {
            debug!(generation, "Preload cancelled");
            return;
        }
        result = generator.generate(params, &DiscardSink, guard.token().clone()) => result,
    };

    match result {
        Ok(_) => debug!(generation, "Preload finished"),
        Err(err) => debug!(generation, error = %err, "Preload failed, ignored"),
    }
}
