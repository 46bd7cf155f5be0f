use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{PlaybackConfig, PlaybackMode};
use crate::media::{EpisodeRef, MediaKind, MediaRef};
use crate::progress::{User, WatchHistoryItem, WatchProgressStore};
use crate::providers::{EmbedTarget, ProviderRegistry};
use crate::resolver::{ResolveError, ResolverClient, StreamSource};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SessionError {
    #[error("nothing to play yet")]
    NotResolved,
    #[error("'{0}' is not one of the resolved streams")]
    UnknownChoice(String),
}

/// What the user asked to play
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub media: MediaRef,
    pub episode: Option<EpisodeRef>,
    /// Stored with the progress checkpoint
    pub poster_path: Option<String>,
}

impl PlayRequest {
    pub fn new(media: MediaRef) -> Self {
        Self {
            media,
            episode: None,
            poster_path: None,
        }
    }

    pub fn episode(mut self, episode: EpisodeRef) -> Self {
        self.episode = Some(episode);
        self
    }

    pub fn poster_path(mut self, poster_path: Option<String>) -> Self {
        self.poster_path = poster_path;
        self
    }

    /// Player title: the movie title, or "Show - S1 E3"
    pub fn display_title(&self) -> String {
        match (self.media.kind, self.episode) {
            (MediaKind::Series, Some(e)) => {
                format!("{} - S{} E{}", self.media.title, e.season, e.episode)
            }
            _ => self.media.title.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// HLS sources for the user to choose from. May be empty.
    Sources(Vec<StreamSource>),
    /// A single embed URL, played without a choice step
    Embed { provider: &'static str, url: String },
}

impl Resolution {
    pub fn requires_selection(&self) -> bool {
        matches!(self, Resolution::Sources(sources) if !sources.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Resolution::Sources(sources) if sources.is_empty())
    }

    /// The URL to play when there is no choice to make
    pub fn implicit_url(&self) -> Option<&str> {
        match self {
            Resolution::Embed { url, .. } => Some(url),
            Resolution::Sources(_) => None,
        }
    }

    fn contains(&self, url: &str) -> bool {
        match self {
            Resolution::Sources(sources) => sources.iter().any(|s| s.url == url),
            Resolution::Embed { url: embed, .. } => embed == url,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    Idle,
    Resolving,
    Succeeded(Resolution),
    NotFound,
    /// Resolver unreachable or answered with garbage
    Failed(String),
    /// The request can't be played as configured (no episode for a show,
    /// provider missing from the registry). Nothing was fetched.
    Rejected(String),
}

/// Why a session has nothing to play.
///
/// The first three are shown to the user as "no streams found".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    NotFound,
    EmptyResult,
    Transport,
    InvalidRequest,
}

impl SessionState {
    /// Resolved sources; empty in every state but a successful extraction
    pub fn sources(&self) -> &[StreamSource] {
        match self {
            SessionState::Succeeded(Resolution::Sources(sources)) => sources,
            _ => &[],
        }
    }

    pub fn failure(&self) -> Option<FailureKind> {
        match self {
            SessionState::NotFound => Some(FailureKind::NotFound),
            SessionState::Succeeded(resolution) if resolution.is_empty() => {
                Some(FailureKind::EmptyResult)
            }
            SessionState::Failed(_) => Some(FailureKind::Transport),
            SessionState::Rejected(_) => Some(FailureKind::InvalidRequest),
            _ => None,
        }
    }

    pub fn is_playable(&self) -> bool {
        matches!(self, SessionState::Succeeded(r) if !r.is_empty())
    }
}

/// Where the player should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackTarget {
    pub url: String,
    pub title: String,
}

/// Result of picking a stream
#[derive(Debug)]
pub struct Selection {
    pub target: PlaybackTarget,
    /// Background progress write, if the user is signed in. Navigation need
    /// not wait for it.
    pub progress: Option<JoinHandle<()>>,
}

/// Drives one title from "play" to a playable URL and records progress
/// when the user commits to a stream.
pub struct ResolutionSession {
    resolver: Arc<ResolverClient>,
    registry: Arc<ProviderRegistry>,
    store: WatchProgressStore,
    mode: PlaybackMode,
    provider: String,
    state: SessionState,
    request: Option<PlayRequest>,
}

impl ResolutionSession {
    pub fn new(
        resolver: Arc<ResolverClient>,
        registry: Arc<ProviderRegistry>,
        store: WatchProgressStore,
        playback: &PlaybackConfig,
    ) -> Self {
        Self {
            resolver,
            registry,
            store,
            mode: playback.mode,
            provider: playback.provider.clone(),
            state: SessionState::Idle,
            request: None,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn mode(&self) -> PlaybackMode {
        self.mode
    }

    /// Switch the embed provider used by direct mode. Unknown names are ignored.
    pub fn set_provider(&mut self, name: &str) -> bool {
        match self.registry.get(name) {
            Some(provider) => {
                self.provider = provider.name.to_string();
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.state = SessionState::Idle;
        self.request = None;
    }

    /// Resolve `request` into something playable.
    ///
    /// Extracted mode suspends for the network chain; direct mode completes
    /// without I/O.
    pub async fn play(&mut self, request: PlayRequest) -> &SessionState {
        self.state = SessionState::Resolving;

        let state = match self.mode {
            PlaybackMode::Direct => self.resolve_direct(&request),
            PlaybackMode::Extracted => self.resolve_extracted(&request).await,
        };

        self.state = state;
        self.request = Some(request);
        &self.state
    }

    fn resolve_direct(&self, request: &PlayRequest) -> SessionState {
        let Some(provider) = self.registry.get(&self.provider) else {
            error!(provider = %self.provider, "unknown embed provider");
            return SessionState::Rejected(format!("unknown provider '{}'", self.provider));
        };

        let Some(target) = EmbedTarget::for_media(&request.media, request.episode) else {
            error!(title = %request.media.title, "series playback requested without an episode");
            return SessionState::Rejected("no episode selected".to_string());
        };

        let url = provider.build_url(&target);
        debug!(provider = provider.name, url = %url, "built embed url");
        SessionState::Succeeded(Resolution::Embed {
            provider: provider.name,
            url,
        })
    }

    async fn resolve_extracted(&self, request: &PlayRequest) -> SessionState {
        match self
            .resolver
            .resolve_streams(&request.media, request.episode)
            .await
        {
            Ok(sources) => {
                if sources.is_empty() {
                    info!(title = %request.media.title, "no playable streams");
                }
                SessionState::Succeeded(Resolution::Sources(sources))
            }
            Err(ResolveError::NotFound(stage)) => {
                info!(title = %request.media.title, %stage, "media not found on resolver");
                SessionState::NotFound
            }
            Err(e) => {
                warn!(title = %request.media.title, error = %e, "error resolving streams");
                SessionState::Failed(e.to_string())
            }
        }
    }

    /// Commit to `url` and hand back where to navigate.
    ///
    /// For signed-in users the checkpoint is written on a spawned task; a
    /// failed write is logged and never blocks playback. Must be called from
    /// within a Tokio runtime.
    pub fn select(&self, user: &User, url: &str) -> Result<Selection, SessionError> {
        let (SessionState::Succeeded(resolution), Some(request)) = (&self.state, &self.request)
        else {
            return Err(SessionError::NotResolved);
        };

        if !resolution.contains(url) {
            return Err(SessionError::UnknownChoice(url.to_string()));
        }

        let target = PlaybackTarget {
            url: url.to_string(),
            title: request.display_title(),
        };

        let progress = user.id().is_some().then(|| {
            let store = self.store.clone();
            let user = user.clone();
            let item = WatchHistoryItem::checkpoint(
                &request.media,
                request.poster_path.clone(),
                request.episode,
            );

            tokio::spawn(async move {
                if let Err(e) = store.record_progress(&user, &item).await {
                    warn!(media_id = item.id, error = %e, "failed to record progress");
                }
            })
        });

        info!(title = %target.title, "starting playback");
        Ok(Selection { target, progress })
    }
}
