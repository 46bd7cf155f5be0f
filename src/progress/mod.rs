pub mod backend;
pub mod file;

pub use backend::{HistoryDocument, MemoryBackend, ProgressBackend, WatchlistDocument};
pub use file::JsonFileBackend;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::media::{EpisodeRef, MediaKind, MediaRef};

#[derive(Error, Debug)]
pub enum ProgressError {
    #[error("guests cannot save items")]
    GuestUser,
    #[error("storage error: {0}")]
    Backend(String),
    #[error("failed to access progress file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to (de)serialize progress document: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who is using the app. Guests can browse and play but nothing is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum User {
    Guest,
    SignedIn(UserId),
}

impl User {
    pub fn signed_in(id: impl Into<String>) -> Self {
        User::SignedIn(UserId::new(id))
    }

    pub fn id(&self) -> Option<&UserId> {
        match self {
            User::Guest => None,
            User::SignedIn(id) => Some(id),
        }
    }
}

/// Saved title in a user's watchlist.
///
/// Movies carry `title`, shows carry `name`. Equality is over every field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WatchlistItem {
    pub id: u64,
    pub media_type: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
}

impl WatchlistItem {
    pub fn from_media(media: &MediaRef, poster_path: Option<String>) -> Self {
        let (title, name) = split_title(media);
        Self {
            id: media.id,
            media_type: media.kind,
            title,
            name,
            poster_path,
        }
    }

    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Unknown")
    }
}

/// Last-watched checkpoint for one movie or show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchHistoryItem {
    pub id: u64,
    pub media_type: MediaKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(
        rename = "seasonNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub season_number: Option<u32>,
    #[serde(
        rename = "episodeNumber",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub episode_number: Option<u32>,
    /// Milliseconds since the Unix epoch
    #[serde(rename = "lastWatchedAt")]
    pub last_watched_at: u64,
}

impl WatchHistoryItem {
    /// Checkpoint stamped with the current time
    pub fn checkpoint(
        media: &MediaRef,
        poster_path: Option<String>,
        episode: Option<EpisodeRef>,
    ) -> Self {
        Self::checkpoint_at(media, poster_path, episode, now_millis())
    }

    pub fn checkpoint_at(
        media: &MediaRef,
        poster_path: Option<String>,
        episode: Option<EpisodeRef>,
        last_watched_at: u64,
    ) -> Self {
        let (title, name) = split_title(media);
        Self {
            id: media.id,
            media_type: media.kind,
            title,
            name,
            poster_path,
            season_number: episode.map(|e| e.season),
            episode_number: episode.map(|e| e.episode),
            last_watched_at,
        }
    }

    pub fn display_name(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn episode(&self) -> Option<EpisodeRef> {
        EpisodeRef::new(self.season_number?, self.episode_number?)
    }
}

fn split_title(media: &MediaRef) -> (Option<String>, Option<String>) {
    match media.kind {
        MediaKind::Movie => (Some(media.title.clone()), None),
        MediaKind::Series => (None, Some(media.title.clone())),
    }
}

pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-user watchlist and watch history.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct WatchProgressStore {
    backend: Arc<dyn ProgressBackend>,
}

impl WatchProgressStore {
    pub fn new(backend: Arc<dyn ProgressBackend>) -> Self {
        Self { backend }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    fn require_user(user: &User) -> Result<&UserId, ProgressError> {
        user.id().ok_or(ProgressError::GuestUser)
    }

    /// Insert unless an identical item is already present
    pub async fn add_to_watchlist(
        &self,
        user: &User,
        item: &WatchlistItem,
    ) -> Result<(), ProgressError> {
        let user = Self::require_user(user)?;
        self.backend.union_watchlist(user, item).await?;
        info!(user = %user, media_id = item.id, "added to watchlist");
        Ok(())
    }

    /// Remove every entry equal to `item`
    pub async fn remove_from_watchlist(
        &self,
        user: &User,
        item: &WatchlistItem,
    ) -> Result<(), ProgressError> {
        let user = Self::require_user(user)?;
        self.backend.remove_watchlist(user, item).await?;
        info!(user = %user, media_id = item.id, "removed from watchlist");
        Ok(())
    }

    /// Saved items, oldest first. Empty for guests and new users.
    pub async fn get_watchlist(&self, user: &User) -> Result<Vec<WatchlistItem>, ProgressError> {
        let Some(user) = user.id() else {
            return Ok(Vec::new());
        };
        Ok(self.backend.load_watchlist(user).await?.unwrap_or_default())
    }

    /// Membership by id only, whatever the stored metadata
    pub async fn is_in_watchlist(&self, user: &User, media_id: u64) -> Result<bool, ProgressError> {
        let items = self.get_watchlist(user).await?;
        Ok(items.iter().any(|item| item.id == media_id))
    }

    /// Overwrite the checkpoint for `item.id`, leaving other entries alone
    pub async fn record_progress(
        &self,
        user: &User,
        item: &WatchHistoryItem,
    ) -> Result<(), ProgressError> {
        let user = Self::require_user(user)?;
        self.backend.put_history_entry(user, item).await?;
        debug!(
            user = %user,
            media_id = item.id,
            season = ?item.season_number,
            episode = ?item.episode_number,
            "recorded progress"
        );
        Ok(())
    }

    /// Checkpoints, most recently watched first
    pub async fn get_history(&self, user: &User) -> Result<Vec<WatchHistoryItem>, ProgressError> {
        let Some(user) = user.id() else {
            return Ok(Vec::new());
        };
        let document = self.backend.load_history(user).await?.unwrap_or_default();
        Ok(document.sorted())
    }

    pub async fn get_show_history(
        &self,
        user: &User,
        media_id: u64,
    ) -> Result<Option<WatchHistoryItem>, ProgressError> {
        let Some(user) = user.id() else {
            return Ok(None);
        };
        let document = self.backend.load_history(user).await?;
        Ok(document.and_then(|mut d| d.shows.remove(&media_id)))
    }

    pub async fn remove_from_history(&self, user: &User, media_id: u64) -> Result<(), ProgressError> {
        let user = Self::require_user(user)?;
        self.backend.delete_history_entry(user, media_id).await?;
        info!(user = %user, media_id, "removed from history");
        Ok(())
    }
}

impl std::fmt::Debug for WatchProgressStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchProgressStore").finish_non_exhaustive()
    }
}
