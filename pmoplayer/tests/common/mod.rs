//! Générateur et fournisseur de skip stamps scriptés pour les tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pmoplayer::{
    CandidateSink, EpisodeId, EpisodeMeta, ExtractorLink, ExtractorUri, GenerateParams,
    GeneratorError, ItemMetadata, LinkCandidate, LinkGenerator, LoadingState, PageContext,
    SkipError, SkipStamp, SkipStampProvider, SkipType, SubtitleCandidate, Subscription,
};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Barrière ouverte une seule fois par le test
#[derive(Debug, Default)]
pub struct Gate {
    open: AtomicBool,
    notify: Notify,
}

impl Gate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub async fn wait(&self) {
        loop {
            let notified = self.notify.notified();
            if self.open.load(Ordering::SeqCst) {
                return;
            }
            notified.await;
        }
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Link(LinkCandidate),
    Subtitle(SubtitleCandidate),
    Wait(Arc<Gate>),
}

/// Déroulé d'un appel à `generate` pour un épisode donné
#[derive(Debug, Clone)]
pub struct Script {
    pub steps: Vec<Step>,
    pub outcome: Result<bool, String>,
}

impl Script {
    pub fn success(steps: Vec<Step>) -> Self {
        Self {
            steps,
            outcome: Ok(true),
        }
    }

    pub fn failure(steps: Vec<Step>, message: &str) -> Self {
        Self {
            steps,
            outcome: Err(message.to_string()),
        }
    }
}

/// Appel à `generate` tel que vu par le générateur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Call {
    pub index: usize,
    pub params: GenerateParams,
}

#[derive(Debug)]
pub struct ScriptedGenerator {
    items: Vec<ItemMetadata>,
    cursor: Mutex<usize>,
    scripts: Mutex<HashMap<usize, Script>>,
    calls: Mutex<Vec<Call>>,
    cache_capable: bool,
    page: Option<PageContext>,
    fail_queries: AtomicBool,
    navigation_gate: Mutex<Option<Arc<Gate>>>,
}

impl ScriptedGenerator {
    /// Catalogue de `count` épisodes, curseur sur le premier
    pub fn episodes(count: usize) -> Self {
        let items = (0..count)
            .map(|index| {
                ItemMetadata::Episode(EpisodeMeta {
                    id: 100 + index as EpisodeId,
                    index,
                    name: Some(format!("Episode {}", index + 1)),
                    episode: index as i32 + 1,
                    season: Some(1),
                    data: format!("data-{index}"),
                    duration_ms: None,
                })
            })
            .collect();
        Self::with_items(items)
    }

    /// Catalogue de fichiers externes (pas d'épisode)
    pub fn external(count: usize) -> Self {
        let items = (0..count)
            .map(|index| {
                ItemMetadata::External(ExtractorUri::new(
                    format!("file:///videos/{index}.mkv"),
                    format!("video {index}"),
                ))
            })
            .collect();
        Self::with_items(items)
    }

    fn with_items(items: Vec<ItemMetadata>) -> Self {
        Self {
            items,
            cursor: Mutex::new(0),
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            cache_capable: false,
            page: None,
            fail_queries: AtomicBool::new(false),
            navigation_gate: Mutex::new(None),
        }
    }

    pub fn cache_capable(mut self) -> Self {
        self.cache_capable = true;
        self
    }

    pub fn with_page(mut self) -> Self {
        self.page = Some(PageContext {
            name: "Frieren".to_string(),
            url: "https://example.org/frieren".to_string(),
            api_name: "Example".to_string(),
            year: Some(2023),
            anilist_id: Some(154587),
            mal_id: Some(52991),
        });
        self
    }

    pub fn script(self, index: usize, script: Script) -> Self {
        self.scripts.lock().unwrap().insert(index, script);
        self
    }

    pub fn at(self, index: usize) -> Self {
        *self.cursor.lock().unwrap() = index;
        self
    }

    pub fn fail_queries(&self) {
        self.fail_queries.store(true, Ordering::SeqCst);
    }

    /// Les déplacements du curseur attendent l'ouverture de `gate`
    pub fn hold_navigation(&self, gate: Arc<Gate>) {
        *self.navigation_gate.lock().unwrap() = Some(gate);
    }

    async fn navigation_delay(&self) {
        let gate = self.navigation_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.wait().await;
        }
    }

    pub fn cursor(&self) -> usize {
        *self.cursor.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn check_queries(&self) -> pmoplayer::Result<()> {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(GeneratorError::Failed("catalog unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LinkGenerator for ScriptedGenerator {
    async fn navigate_to(&self, index: usize) -> pmoplayer::Result<()> {
        self.navigation_delay().await;
        if index >= self.items.len() {
            return Err(GeneratorError::NotFound(index.to_string()));
        }
        *self.cursor.lock().unwrap() = index;
        Ok(())
    }

    async fn advance(&self) -> pmoplayer::Result<()> {
        self.navigation_delay().await;
        let mut cursor = self.cursor.lock().unwrap();
        if *cursor + 1 >= self.items.len() {
            return Err(GeneratorError::Navigation("no next item".to_string()));
        }
        *cursor += 1;
        Ok(())
    }

    async fn retreat(&self) -> pmoplayer::Result<()> {
        self.navigation_delay().await;
        let mut cursor = self.cursor.lock().unwrap();
        if *cursor == 0 {
            return Err(GeneratorError::Navigation("no previous item".to_string()));
        }
        *cursor -= 1;
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.cursor() + 1 < self.items.len()
    }

    fn has_previous(&self) -> bool {
        self.cursor() > 0
    }

    fn current_id(&self) -> Option<EpisodeId> {
        self.items
            .get(self.cursor())
            .and_then(ItemMetadata::as_episode)
            .map(|episode| episode.id)
    }

    fn current_metadata(&self, offset: usize) -> pmoplayer::Result<Option<ItemMetadata>> {
        self.check_queries()?;
        Ok(self.items.get(self.cursor() + offset).cloned())
    }

    fn all_metadata(&self) -> pmoplayer::Result<Vec<ItemMetadata>> {
        self.check_queries()?;
        Ok(self.items.clone())
    }

    fn page(&self) -> Option<PageContext> {
        self.page.clone()
    }

    fn is_cache_capable(&self) -> bool {
        self.cache_capable
    }

    async fn generate(
        &self,
        params: GenerateParams,
        sink: &dyn CandidateSink,
        cancel: CancellationToken,
    ) -> pmoplayer::Result<bool> {
        let index = self.cursor() + params.offset;
        self.calls.lock().unwrap().push(Call { index, params });
        let script = self.scripts.lock().unwrap().get(&index).cloned();
        let Some(script) = script else {
            return Ok(false);
        };

        for step in script.steps {
            match step {
                Step::Link(link) => sink.on_link(link),
                Step::Subtitle(subtitle) => sink.on_subtitle(subtitle),
                Step::Wait(gate) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Ok(false),
                        _ = gate.wait() => {}
                    }
                }
            }
        }
        script.outcome.map_err(GeneratorError::Failed)
    }
}

/// Réponse programmée pour une durée donnée
#[derive(Debug, Clone)]
pub struct SkipReply {
    pub delay: Duration,
    pub result: Result<Vec<SkipStamp>, String>,
}

/// Fournisseur de skip stamps dont les réponses dépendent de la durée demandée
#[derive(Debug, Default)]
pub struct ScriptedSkips {
    replies: Mutex<HashMap<u64, SkipReply>>,
    started: AtomicUsize,
    finished: AtomicUsize,
    last_has_next: Mutex<Option<bool>>,
}

impl ScriptedSkips {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, duration_ms: u64, delay: Duration, stamps: Vec<SkipStamp>) -> Self {
        self.replies.lock().unwrap().insert(
            duration_ms,
            SkipReply {
                delay,
                result: Ok(stamps),
            },
        );
        self
    }

    pub fn fail(self, duration_ms: u64, message: &str) -> Self {
        self.replies.lock().unwrap().insert(
            duration_ms,
            SkipReply {
                delay: Duration::ZERO,
                result: Err(message.to_string()),
            },
        );
        self
    }

    pub fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub fn last_has_next(&self) -> Option<bool> {
        *self.last_has_next.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl SkipStampProvider for ScriptedSkips {
    async fn fetch_stamps(
        &self,
        _page: &PageContext,
        _episode: &EpisodeMeta,
        duration_ms: u64,
        has_next: bool,
    ) -> Result<Vec<SkipStamp>, SkipError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        *self.last_has_next.lock().unwrap() = Some(has_next);
        let reply = self.replies.lock().unwrap().get(&duration_ms).cloned();
        let reply = reply.unwrap_or(SkipReply {
            delay: Duration::ZERO,
            result: Ok(Vec::new()),
        });

        if !reply.delay.is_zero() {
            tokio::time::sleep(reply.delay).await;
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
        reply.result.map_err(SkipError::Request)
    }
}

pub fn link(name: &str) -> LinkCandidate {
    ExtractorLink::new("test", name, format!("https://cdn.example.org/{name}.m3u8"))
        .with_quality(1080)
        .into()
}

pub fn subtitle(name: &str) -> SubtitleCandidate {
    SubtitleCandidate::new(name, format!("https://subs.example.org/{name}.vtt"))
}

pub fn stamp(kind: SkipType, start_ms: u64, end_ms: u64) -> SkipStamp {
    SkipStamp {
        kind,
        start_ms,
        end_ms,
        skip_to_next: false,
    }
}

/// Attend le prochain état terminal publié sur `loading`
pub async fn wait_terminal(loading: &mut Subscription<LoadingState>) -> LoadingState {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match loading.recv().await {
                Some(state) if state.is_terminal() => return state,
                Some(_) => continue,
                None => panic!("loading slot closed"),
            }
        }
    })
    .await
    .expect("no terminal loading state")
}

/// Attend que `condition` devienne vraie
pub async fn wait_until<F: Fn() -> bool>(condition: F) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition never met");
}

/// Supprime les répétitions consécutives d'une séquence de publications
pub fn dedup<T: PartialEq>(mut values: Vec<T>) -> Vec<T> {
    values.dedup();
    values
}
