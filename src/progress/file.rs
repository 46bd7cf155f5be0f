use async_trait::async_trait;
use directories::ProjectDirs;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error};

use super::backend::{HistoryDocument, ProgressBackend, WatchlistDocument};
use super::{ProgressError, UserId, WatchHistoryItem, WatchlistItem};
use crate::config::StorageConfig;

/// Progress documents as JSON files:
/// `<root>/watchlists/<user>.json` and `<root>/watch_history/<user>.json`
#[derive(Debug)]
pub struct JsonFileBackend {
    root: PathBuf,
    // Serializes read-modify-write of a document within this process
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Use the configured directory, falling back to the platform data dir
    pub fn from_config(config: &StorageConfig) -> Result<Self, ProgressError> {
        let root = match &config.data_dir {
            Some(dir) => dir.clone(),
            None => Self::default_root()?,
        };
        Ok(Self::new(root))
    }

    pub fn default_root() -> Result<PathBuf, ProgressError> {
        ProjectDirs::from("", "", "ferriswatch")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .ok_or_else(|| ProgressError::Backend("data directory not found".to_string()))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn watchlist_path(&self, user: &UserId) -> PathBuf {
        self.root
            .join("watchlists")
            .join(format!("{}.json", file_stem(user)))
    }

    fn history_path(&self, user: &UserId) -> PathBuf {
        self.root
            .join("watch_history")
            .join(format!("{}.json", file_stem(user)))
    }

    async fn read<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, ProgressError> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to read progress document");
                return Err(e.into());
            }
        };

        match serde_json::from_str(&contents) {
            Ok(document) => Ok(Some(document)),
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to parse progress document");
                Err(e.into())
            }
        }
    }

    async fn write<T: Serialize>(path: &Path, document: &T) -> Result<(), ProgressError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = serde_json::to_string_pretty(document)?;

        // Write then rename so readers never see a torn file
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, path).await?;

        debug!(path = %path.display(), "wrote progress document");
        Ok(())
    }
}

/// File-safe form of a user id
fn file_stem(user: &UserId) -> String {
    user.as_str()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[async_trait]
impl ProgressBackend for JsonFileBackend {
    async fn load_watchlist(
        &self,
        user: &UserId,
    ) -> Result<Option<Vec<WatchlistItem>>, ProgressError> {
        let document: Option<WatchlistDocument> = Self::read(&self.watchlist_path(user)).await?;
        Ok(document.map(|d| d.items))
    }

    async fn union_watchlist(
        &self,
        user: &UserId,
        item: &WatchlistItem,
    ) -> Result<(), ProgressError> {
        let _guard = self.write_lock.lock().await;
        let path = self.watchlist_path(user);

        let mut document: WatchlistDocument = Self::read(&path).await?.unwrap_or_default();
        document.union(item);
        Self::write(&path, &document).await
    }

    async fn remove_watchlist(
        &self,
        user: &UserId,
        item: &WatchlistItem,
    ) -> Result<(), ProgressError> {
        let _guard = self.write_lock.lock().await;
        let path = self.watchlist_path(user);

        let Some(mut document) = Self::read::<WatchlistDocument>(&path).await? else {
            return Ok(());
        };
        document.remove(item);
        Self::write(&path, &document).await
    }

    async fn load_history(&self, user: &UserId) -> Result<Option<HistoryDocument>, ProgressError> {
        Self::read(&self.history_path(user)).await
    }

    async fn put_history_entry(
        &self,
        user: &UserId,
        item: &WatchHistoryItem,
    ) -> Result<(), ProgressError> {
        let _guard = self.write_lock.lock().await;
        let path = self.history_path(user);

        let mut document: HistoryDocument = Self::read(&path).await?.unwrap_or_default();
        document.shows.insert(item.id, item.clone());
        Self::write(&path, &document).await
    }

    async fn delete_history_entry(
        &self,
        user: &UserId,
        media_id: u64,
    ) -> Result<(), ProgressError> {
        let _guard = self.write_lock.lock().await;
        let path = self.history_path(user);

        let Some(mut document) = Self::read::<HistoryDocument>(&path).await? else {
            return Ok(());
        };
        if document.shows.remove(&media_id).is_some() {
            Self::write(&path, &document).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{EpisodeRef, MediaRef};
    use crate::progress::{User, WatchProgressStore};
    use std::sync::Arc;

    fn store(dir: &tempfile::TempDir) -> WatchProgressStore {
        WatchProgressStore::new(Arc::new(JsonFileBackend::new(dir.path())))
    }

    #[test]
    fn test_file_stem_sanitizes() {
        assert_eq!(file_stem(&UserId::new("abc-123_X")), "abc-123_X");
        assert_eq!(file_stem(&UserId::new("../etc/passwd")), "___etc_passwd");
    }

    #[tokio::test]
    async fn test_documents_created_lazily_and_separately() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let user = User::signed_in("uid:1");

        assert!(store.get_watchlist(&user).await.unwrap().is_empty());
        assert!(!dir.path().join("watchlists").exists());

        let item = crate::progress::WatchlistItem::from_media(
            &MediaRef::movie(27205, "Inception", Some(2010)),
            None,
        );
        store.add_to_watchlist(&user, &item).await.unwrap();

        assert!(dir.path().join("watchlists/uid_1.json").exists());
        assert!(!dir.path().join("watch_history/uid_1.json").exists());
        assert_eq!(store.get_watchlist(&user).await.unwrap(), vec![item]);
    }

    #[tokio::test]
    async fn test_history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let user = User::signed_in("uid-2");
        let show = MediaRef::series(1396, "Breaking Bad", Some(2008));

        store(&dir)
            .record_progress(
                &user,
                &WatchHistoryItem::checkpoint_at(&show, None, EpisodeRef::new(1, 3), 10),
            )
            .await
            .unwrap();
        store(&dir)
            .record_progress(
                &user,
                &WatchHistoryItem::checkpoint_at(&show, None, EpisodeRef::new(1, 4), 20),
            )
            .await
            .unwrap();

        let reopened = store(&dir);
        let entry = reopened.get_show_history(&user, 1396).await.unwrap().unwrap();
        assert_eq!(entry.episode(), EpisodeRef::new(1, 4));
        assert_eq!(reopened.get_history(&user).await.unwrap().len(), 1);

        reopened.remove_from_history(&user, 1396).await.unwrap();
        assert!(reopened.get_history(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_writes_keep_both_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir);
        let user = User::signed_in("uid-3");

        let a = WatchHistoryItem::checkpoint_at(&MediaRef::series(42, "A", None), None, None, 1);
        let b = WatchHistoryItem::checkpoint_at(&MediaRef::movie(7, "B", None), None, None, 2);

        let (ra, rb) = tokio::join!(
            store.record_progress(&user, &a),
            store.record_progress(&user, &b)
        );
        ra.unwrap();
        rb.unwrap();

        let ids: Vec<u64> = store
            .get_history(&user)
            .await
            .unwrap()
            .iter()
            .map(|h| h.id)
            .collect();
        assert_eq!(ids, vec![7, 42]);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("watchlists")).unwrap();
        std::fs::write(dir.path().join("watchlists/u.json"), "not json").unwrap();

        let err = store(&dir)
            .get_watchlist(&User::signed_in("u"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProgressError::Serde(_)));
    }
}
