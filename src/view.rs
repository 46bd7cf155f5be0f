//! Local copies of saved state that screens render from.
//!
//! Each mutation either lands in the store and then in local state, or leaves
//! local state exactly as it was and returns the error.

use tracing::warn;

use crate::progress::{ProgressError, User, WatchHistoryItem, WatchProgressStore, WatchlistItem};

/// The add/remove watchlist button
#[derive(Debug, Clone)]
pub struct WatchlistToggle {
    item: WatchlistItem,
    in_watchlist: bool,
}

impl WatchlistToggle {
    pub fn new(item: WatchlistItem, in_watchlist: bool) -> Self {
        Self { item, in_watchlist }
    }

    pub fn is_in_watchlist(&self) -> bool {
        self.in_watchlist
    }

    /// Flip membership. Returns the new membership once the store accepts it.
    pub async fn toggle(
        &mut self,
        store: &WatchProgressStore,
        user: &User,
    ) -> Result<bool, ProgressError> {
        let result = if self.in_watchlist {
            store.remove_from_watchlist(user, &self.item).await
        } else {
            store.add_to_watchlist(user, &self.item).await
        };

        if let Err(e) = result {
            warn!(media_id = self.item.id, error = %e, "could not update watchlist");
            return Err(e);
        }

        self.in_watchlist = !self.in_watchlist;
        Ok(self.in_watchlist)
    }
}

/// The "continue watching" row
#[derive(Debug, Clone, Default)]
pub struct ContinueWatching {
    items: Vec<WatchHistoryItem>,
}

impl ContinueWatching {
    pub fn new(items: Vec<WatchHistoryItem>) -> Self {
        Self { items }
    }

    pub async fn load(store: &WatchProgressStore, user: &User) -> Result<Self, ProgressError> {
        Ok(Self::new(store.get_history(user).await?))
    }

    pub fn items(&self) -> &[WatchHistoryItem] {
        &self.items
    }

    /// Drop `media_id` from the row right away, then from the store.
    ///
    /// On failure the entry goes back where it was.
    pub async fn remove(
        &mut self,
        store: &WatchProgressStore,
        user: &User,
        media_id: u64,
    ) -> Result<Option<WatchHistoryItem>, ProgressError> {
        let removed = self
            .items
            .iter()
            .position(|item| item.id == media_id)
            .map(|index| (index, self.items.remove(index)));

        match store.remove_from_history(user, media_id).await {
            Ok(()) => Ok(removed.map(|(_, item)| item)),
            Err(e) => {
                warn!(media_id, error = %e, "failed to remove item from history");
                if let Some((index, item)) = removed {
                    self.items.insert(index, item);
                }
                Err(e)
            }
        }
    }
}
