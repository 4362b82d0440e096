// examples/scripted_playback.rs
//
// Démo du GenerationCoordinator avec un générateur en mémoire :
//   - chargement de l'épisode courant (liens et sous-titres en flux)
//   - préchargement de l'épisode suivant
//   - passage à l'épisode suivant
//   - chargement des skip stamps
//
// Build et run (depuis la racine du crate pmoplayer) :
//   RUST_LOG=pmoplayer=debug cargo run --example scripted_playback

use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use pmoplayer::{
    CandidateSink, CoordinatorSettings, EpisodeId, EpisodeMeta, ExtractorLink, GenerateParams,
    GenerationCoordinator, GeneratorError, ItemMetadata, LinkGenerator, LinkType, LoadingState,
    PageContext, SkipError, SkipStamp, SkipStampProvider, SkipType, SubtitleCandidate,
    Subscription,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Catalogue fixe de trois épisodes, deux sources par épisode
#[derive(Debug)]
struct DemoGenerator {
    episodes: Vec<EpisodeMeta>,
    cursor: Mutex<usize>,
}

impl DemoGenerator {
    fn new() -> Self {
        let episodes = (0..3)
            .map(|index| EpisodeMeta {
                id: 1000 + index as EpisodeId,
                index,
                name: Some(format!("Episode {}", index + 1)),
                episode: index as i32 + 1,
                season: Some(1),
                data: format!("/watch/demo/{}", index + 1),
                duration_ms: Some(1_440_000),
            })
            .collect();
        Self {
            episodes,
            cursor: Mutex::new(0),
        }
    }

    fn cursor(&self) -> usize {
        *self.cursor.lock().unwrap()
    }

    fn move_to(&self, index: usize) -> pmoplayer::Result<()> {
        if index >= self.episodes.len() {
            return Err(GeneratorError::NotFound(format!("episode index {index}")));
        }
        *self.cursor.lock().unwrap() = index;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LinkGenerator for DemoGenerator {
    async fn navigate_to(&self, index: usize) -> pmoplayer::Result<()> {
        self.move_to(index)
    }

    async fn advance(&self) -> pmoplayer::Result<()> {
        self.move_to(self.cursor() + 1)
    }

    async fn retreat(&self) -> pmoplayer::Result<()> {
        let cursor = self.cursor();
        if cursor == 0 {
            return Err(GeneratorError::Navigation("already at first episode".into()));
        }
        self.move_to(cursor - 1)
    }

    fn has_next(&self) -> bool {
        self.cursor() + 1 < self.episodes.len()
    }

    fn has_previous(&self) -> bool {
        self.cursor() > 0
    }

    fn current_id(&self) -> Option<EpisodeId> {
        self.episodes.get(self.cursor()).map(|episode| episode.id)
    }

    fn current_metadata(&self, offset: usize) -> pmoplayer::Result<Option<ItemMetadata>> {
        Ok(self
            .episodes
            .get(self.cursor() + offset)
            .cloned()
            .map(ItemMetadata::Episode))
    }

    fn all_metadata(&self) -> pmoplayer::Result<Vec<ItemMetadata>> {
        Ok(self.episodes.iter().cloned().map(ItemMetadata::Episode).collect())
    }

    fn page(&self) -> Option<PageContext> {
        Some(PageContext {
            name: "Demo Show".into(),
            url: "https://example.org/demo".into(),
            api_name: "Demo".into(),
            year: Some(2021),
            anilist_id: None,
            mal_id: None,
        })
    }

    fn is_cache_capable(&self) -> bool {
        true
    }

    async fn generate(
        &self,
        params: GenerateParams,
        sink: &dyn CandidateSink,
        cancel: CancellationToken,
    ) -> pmoplayer::Result<bool> {
        let index = self.cursor() + params.offset;
        let number = index + 1;
        for (source, quality) in [("alpha", 1080), ("beta", 720)] {
            // simule la latence de l'extraction
            tokio::select! {
                _ = cancel.cancelled() => return Ok(false),
                _ = tokio::time::sleep(Duration::from_millis(40)) => {}
            }
            sink.on_link(
                ExtractorLink::new(
                    source,
                    format!("{source} {quality}p"),
                    format!("https://{source}.example.org/{number}/{quality}.m3u8"),
                )
                .with_quality(quality)
                .with_type(LinkType::M3u8)
                .into(),
            );
        }
        sink.on_subtitle(
            SubtitleCandidate::new("English", format!("https://subs.example.org/{number}/en.vtt"))
                .with_language("en"),
        );
        Ok(true)
    }
}

#[derive(Debug)]
struct DemoSkips;

#[async_trait::async_trait]
impl SkipStampProvider for DemoSkips {
    async fn fetch_stamps(
        &self,
        _page: &PageContext,
        _episode: &EpisodeMeta,
        duration_ms: u64,
        has_next: bool,
    ) -> Result<Vec<SkipStamp>, SkipError> {
        tokio::time::sleep(Duration::from_millis(20)).await;
        Ok(vec![
            SkipStamp {
                kind: SkipType::Opening,
                start_ms: 30_000,
                end_ms: 120_000,
                skip_to_next: false,
            },
            SkipStamp {
                kind: SkipType::Ending,
                start_ms: duration_ms.saturating_sub(90_000),
                end_ms: duration_ms,
                skip_to_next: has_next,
            },
        ])
    }
}

async fn wait_for_load(loading: &mut Subscription<LoadingState>) -> anyhow::Result<LoadingState> {
    loop {
        match loading.recv().await {
            Some(state) if state.is_terminal() => return Ok(state),
            Some(_) => continue,
            None => anyhow::bail!("loading slot closed"),
        }
    }
}

fn print_snapshot(coordinator: &GenerationCoordinator) -> anyhow::Result<()> {
    let mut links: Vec<_> = coordinator.links().get().into_iter().collect();
    links.sort_by(|a, b| a.name().cmp(b.name()));
    println!("  links     = {}", serde_json::to_string_pretty(&links)?);
    let subtitles: Vec<_> = coordinator.subtitles().get().into_iter().collect();
    println!("  subtitles = {}", serde_json::to_string(&subtitles)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let coordinator =
        GenerationCoordinator::with_settings(Arc::new(DemoSkips), CoordinatorSettings::default());
    coordinator.attach_generator(Arc::new(DemoGenerator::new()));

    // 1. Épisode courant
    println!("Loading episode {:?}...", coordinator.current_id());
    let mut loading = coordinator.loading().subscribe();
    loading.drain();
    coordinator.load_links(None);
    println!("-> {:?}", wait_for_load(&mut loading).await?);
    print_snapshot(&coordinator)?;

    // 2. Préchargement de l'épisode suivant (les slots ne bougent pas)
    if coordinator.pre_load_next() {
        while coordinator.is_generating() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        println!("Next episode preloaded, links unchanged: {}", coordinator.links().get().len());
    }

    // 3. Épisode suivant
    if let Some(ItemMetadata::Episode(next)) = coordinator.next_meta() {
        println!("Moving to {:?}...", next.name);
    }
    loading.drain();
    coordinator.load_links_next();
    println!("-> {:?}", wait_for_load(&mut loading).await?);
    print_snapshot(&coordinator)?;

    // 4. Skip stamps de l'épisode courant
    let mut stamps = coordinator.stamps().subscribe();
    coordinator.load_stamps(1_440_000);
    while let Some(found) = stamps.recv().await {
        if !found.is_empty() {
            println!("stamps = {}", serde_json::to_string(&found)?);
            break;
        }
    }

    Ok(())
}
