use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{ProgressError, UserId, WatchHistoryItem, WatchlistItem};

/// Stored shape of a user's watchlist: `{ "items": [...] }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WatchlistDocument {
    #[serde(default)]
    pub items: Vec<WatchlistItem>,
}

impl WatchlistDocument {
    /// Append unless an equal item exists
    pub fn union(&mut self, item: &WatchlistItem) {
        if !self.items.contains(item) {
            self.items.push(item.clone());
        }
    }

    pub fn remove(&mut self, item: &WatchlistItem) {
        self.items.retain(|existing| existing != item);
    }
}

/// Stored shape of a user's watch history: `{ "shows": { "<id>": {...} } }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryDocument {
    #[serde(default)]
    pub shows: HashMap<u64, WatchHistoryItem>,
}

impl HistoryDocument {
    /// Entries ordered by `last_watched_at`, newest first
    pub fn sorted(self) -> Vec<WatchHistoryItem> {
        let mut items: Vec<_> = self.shows.into_values().collect();
        items.sort_by(|a, b| {
            b.last_watched_at
                .cmp(&a.last_watched_at)
                .then(a.id.cmp(&b.id))
        });
        items
    }
}

/// Storage for the two per-user progress documents.
///
/// Each history write addresses one key; implementations must apply it
/// against the current stored document, never a caller-held snapshot.
#[async_trait]
pub trait ProgressBackend: Send + Sync {
    /// `None` when the user has never saved anything
    async fn load_watchlist(
        &self,
        user: &UserId,
    ) -> Result<Option<Vec<WatchlistItem>>, ProgressError>;

    /// Set-insert, creating the document if needed
    async fn union_watchlist(
        &self,
        user: &UserId,
        item: &WatchlistItem,
    ) -> Result<(), ProgressError>;

    async fn remove_watchlist(
        &self,
        user: &UserId,
        item: &WatchlistItem,
    ) -> Result<(), ProgressError>;

    async fn load_history(&self, user: &UserId) -> Result<Option<HistoryDocument>, ProgressError>;

    /// Write `shows.<item.id>`, creating the document if needed
    async fn put_history_entry(
        &self,
        user: &UserId,
        item: &WatchHistoryItem,
    ) -> Result<(), ProgressError>;

    /// Delete `shows.<media_id>`
    async fn delete_history_entry(
        &self,
        user: &UserId,
        media_id: u64,
    ) -> Result<(), ProgressError>;
}

/// In-process backend
#[derive(Debug, Default)]
pub struct MemoryBackend {
    watchlists: Mutex<HashMap<UserId, WatchlistDocument>>,
    history: Mutex<HashMap<UserId, HistoryDocument>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProgressBackend for MemoryBackend {
    async fn load_watchlist(
        &self,
        user: &UserId,
    ) -> Result<Option<Vec<WatchlistItem>>, ProgressError> {
        let watchlists = self.watchlists.lock().await;
        Ok(watchlists.get(user).map(|d| d.items.clone()))
    }

    async fn union_watchlist(
        &self,
        user: &UserId,
        item: &WatchlistItem,
    ) -> Result<(), ProgressError> {
        let mut watchlists = self.watchlists.lock().await;
        watchlists.entry(user.clone()).or_default().union(item);
        Ok(())
    }

    async fn remove_watchlist(
        &self,
        user: &UserId,
        item: &WatchlistItem,
    ) -> Result<(), ProgressError> {
        let mut watchlists = self.watchlists.lock().await;
        if let Some(document) = watchlists.get_mut(user) {
            document.remove(item);
        }
        Ok(())
    }

    async fn load_history(&self, user: &UserId) -> Result<Option<HistoryDocument>, ProgressError> {
        let history = self.history.lock().await;
        Ok(history.get(user).cloned())
    }

    async fn put_history_entry(
        &self,
        user: &UserId,
        item: &WatchHistoryItem,
    ) -> Result<(), ProgressError> {
        let mut history = self.history.lock().await;
        history
            .entry(user.clone())
            .or_default()
            .shows
            .insert(item.id, item.clone());
        Ok(())
    }

    async fn delete_history_entry(
        &self,
        user: &UserId,
        media_id: u64,
    ) -> Result<(), ProgressError> {
        let mut history = self.history.lock().await;
        if let Some(document) = history.get_mut(user) {
            document.shows.remove(&media_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaKind;

    fn item(id: u64, poster: &str) -> WatchlistItem {
        WatchlistItem {
            id,
            media_type: MediaKind::Movie,
            title: Some("Title".to_string()),
            name: None,
            poster_path: Some(poster.to_string()),
        }
    }

    #[test]
    fn test_watchlist_document_union_and_remove() {
        let mut doc = WatchlistDocument::default();
        doc.union(&item(1, "/a.jpg"));
        doc.union(&item(2, "/b.jpg"));
        doc.union(&item(1, "/a.jpg"));
        assert_eq!(doc.items.len(), 2);

        // Insertion order is kept, most recent last
        assert_eq!(doc.items[1].id, 2);

        doc.remove(&item(1, "/a.jpg"));
        assert_eq!(doc.items, vec![item(2, "/b.jpg")]);
    }

    #[test]
    fn test_history_document_wire_format() {
        let doc: HistoryDocument = serde_json::from_str(
            r#"{"shows": {"42": {
                "id": 42,
                "media_type": "tv",
                "name": "Show",
                "poster_path": null,
                "seasonNumber": 1,
                "episodeNumber": 3,
                "lastWatchedAt": 1000
            }}}"#,
        )
        .unwrap();
        assert_eq!(doc.shows[&42].episode_number, Some(3));

        let json = serde_json::to_value(&doc).unwrap();
        assert!(json["shows"].get("42").is_some());
    }

    #[tokio::test]
    async fn test_memory_backend_creates_documents_lazily() {
        let backend = MemoryBackend::new();
        let user = UserId::new("u");

        assert!(backend.load_watchlist(&user).await.unwrap().is_none());
        assert!(backend.load_history(&user).await.unwrap().is_none());

        // Removing from a missing document is a no-op
        backend.remove_watchlist(&user, &item(1, "/a.jpg")).await.unwrap();
        backend.delete_history_entry(&user, 1).await.unwrap();
        assert!(backend.load_watchlist(&user).await.unwrap().is_none());

        backend.union_watchlist(&user, &item(1, "/a.jpg")).await.unwrap();
        assert_eq!(
            backend.load_watchlist(&user).await.unwrap(),
            Some(vec![item(1, "/a.jpg")])
        );
    }
}
