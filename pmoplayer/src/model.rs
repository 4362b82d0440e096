//! Data types exchanged with generators, skip providers and the UI.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

/// Identifier of an episode as reported by the generator.
pub type EpisodeId = i32;

/// Snapshot type published on the link slot.
pub type LinkSet = HashSet<LinkCandidate>;

/// Snapshot type published on the subtitle slot.
pub type SubtitleSet = HashSet<SubtitleCandidate>;

/// Kind of stream an [`ExtractorLink`] points to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LinkType {
    #[default]
    Video,
    M3u8,
    Dash,
    Torrent,
    Magnet,
}

/// Playable reference produced by an extractor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractorLink {
    /// Extractor that found the link (e.g. "Vidstream")
    pub source: String,
    /// Display name, usually source plus quality
    pub name: String,
    pub url: String,
    pub referer: String,
    /// Vertical resolution, or a negative value when unknown
    pub quality: i32,
    pub link_type: LinkType,
    /// Extra HTTP headers required by the host
    pub headers: BTreeMap<String, String>,
}

impl ExtractorLink {
    pub fn new(source: impl Into<String>, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            url: url.into(),
            referer: String::new(),
            quality: -1,
            link_type: LinkType::default(),
            headers: BTreeMap::new(),
        }
    }

    pub fn with_quality(mut self, quality: i32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_type(mut self, link_type: LinkType) -> Self {
        self.link_type = link_type;
        self
    }

    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = referer.into();
        self
    }
}

/// URI-only reference, typically a downloaded or local file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtractorUri {
    pub uri: String,
    pub name: String,
    pub relative_path: Option<String>,
    pub display_name: Option<String>,
    pub episode: Option<i32>,
    pub season: Option<i32>,
}

impl ExtractorUri {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: name.into(),
            relative_path: None,
            display_name: None,
            episode: None,
            season: None,
        }
    }
}

/// A discovered playable media reference.
///
/// Candidates are opaque to the coordinator: they are only compared by
/// value to drop duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LinkCandidate {
    Extractor(ExtractorLink),
    Uri(ExtractorUri),
}

impl LinkCandidate {
    pub fn url(&self) -> &str {
        match self {
            LinkCandidate::Extractor(link) => &link.url,
            LinkCandidate::Uri(uri) => &uri.uri,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            LinkCandidate::Extractor(link) => &link.name,
            LinkCandidate::Uri(uri) => &uri.name,
        }
    }
}

impl From<ExtractorLink> for LinkCandidate {
    fn from(link: ExtractorLink) -> Self {
        LinkCandidate::Extractor(link)
    }
}

impl From<ExtractorUri> for LinkCandidate {
    fn from(uri: ExtractorUri) -> Self {
        LinkCandidate::Uri(uri)
    }
}

/// Where a subtitle track comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum SubtitleOrigin {
    #[default]
    Url,
    DownloadedFile,
    Embedded,
}

/// Subtitle track descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubtitleCandidate {
    /// Name shown in the track selector
    pub name: String,
    pub url: String,
    pub origin: SubtitleOrigin,
    pub mime_type: String,
    /// IETF language tag when the provider knows it
    pub language_code: Option<String>,
    pub headers: BTreeMap<String, String>,
}

impl SubtitleCandidate {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            origin: SubtitleOrigin::default(),
            mime_type: "text/vtt".to_string(),
            language_code: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_origin(mut self, origin: SubtitleOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_language(mut self, code: impl Into<String>) -> Self {
        self.language_code = Some(code.into());
        self
    }
}

/// Segment categories a skip provider can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SkipType {
    Opening,
    Ending,
    Recap,
    MixedOpening,
    MixedEnding,
    Credits,
    Intro,
}

/// Time range of an episode the player may offer to skip.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipStamp {
    pub kind: SkipType,
    pub start_ms: u64,
    pub end_ms: u64,
    /// Skipping this segment should jump to the next episode
    pub skip_to_next: bool,
}

impl SkipStamp {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms.saturating_sub(self.start_ms)
    }
}

/// Episode entry of the catalog a generator enumerates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    pub id: EpisodeId,
    /// Position in the generator's list
    pub index: usize,
    pub name: Option<String>,
    pub episode: i32,
    pub season: Option<i32>,
    /// Provider-specific payload used to fetch links
    pub data: String,
    pub duration_ms: Option<u64>,
}

/// Metadata for the item under the navigation cursor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemMetadata {
    Episode(EpisodeMeta),
    External(ExtractorUri),
}

impl ItemMetadata {
    pub fn as_episode(&self) -> Option<&EpisodeMeta> {
        match self {
            ItemMetadata::Episode(episode) => Some(episode),
            ItemMetadata::External(_) => None,
        }
    }
}

/// Show-level context a generator may expose, used by skip detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContext {
    pub name: String,
    pub url: String,
    pub api_name: String,
    pub year: Option<i32>,
    pub anilist_id: Option<i64>,
    pub mal_id: Option<i64>,
}

/// Progress of the last explicit load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum LoadingState {
    #[default]
    Idle,
    Loading,
    /// Carries the generator's "at least one link produced" flag
    Success(bool),
    /// Carries the display string of the generator error
    Failure(String),
}

impl LoadingState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoadingState::Success(_) | LoadingState::Failure(_))
    }
}

/// Which item a generation task works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// The item under the cursor
    Current,
    /// Move the cursor to this index first
    Index(usize),
    /// Advance the cursor first
    Next,
    /// Step the cursor back first
    Previous,
    /// Item `n` positions after the cursor, without moving it
    Lookahead(usize),
}

/// Parameters of one generation task. Never mutated once submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationRequest {
    pub target: Target,
    pub clear_cache: bool,
    pub is_casting: bool,
}

impl GenerationRequest {
    pub fn new(target: Target) -> Self {
        Self {
            target,
            clear_cache: false,
            is_casting: false,
        }
    }

    pub fn clear_cache(mut self, clear_cache: bool) -> Self {
        self.clear_cache = clear_cache;
        self
    }

    pub fn casting(mut self, is_casting: bool) -> Self {
        self.is_casting = is_casting;
        self
    }

    /// Parameters handed to [`crate::LinkGenerator::generate`].
    pub fn params(&self) -> GenerateParams {
        GenerateParams {
            clear_cache: self.clear_cache,
            is_casting: self.is_casting,
            offset: match self.target {
                Target::Lookahead(offset) => offset,
                _ => 0,
            },
        }
    }
}

/// What a generator receives for one streaming call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GenerateParams {
    pub clear_cache: bool,
    pub is_casting: bool,
    /// Items after the cursor to generate for; 0 is the current item
    pub offset: usize,
}
