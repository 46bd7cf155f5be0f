use tracing::warn;

use crate::media::{EpisodeRef, MediaKind, MediaRef};
use crate::progress::{User, WatchHistoryItem, WatchProgressStore, WatchlistItem};
use crate::session::PlayRequest;
use crate::tmdb::{CastMember, HomeRows, MovieDetails, TmdbClient, TmdbError, TvDetails};
use crate::view::ContinueWatching;

/// Cast members shown on a details screen
pub const CAST_LIMIT: usize = 10;

#[derive(Debug, Clone)]
pub enum CatalogDetails {
    Movie(MovieDetails),
    Tv(TvDetails),
}

impl CatalogDetails {
    pub fn media_ref(&self) -> MediaRef {
        match self {
            CatalogDetails::Movie(movie) => movie.media_ref(),
            CatalogDetails::Tv(tv) => tv.media_ref(),
        }
    }

    pub fn poster_path(&self) -> Option<&str> {
        match self {
            CatalogDetails::Movie(movie) => movie.poster_path.as_deref(),
            CatalogDetails::Tv(tv) => tv.poster_path.as_deref(),
        }
    }
}

/// Everything a details screen needs before the user hits play
#[derive(Debug, Clone)]
pub struct DetailsContext {
    pub details: CatalogDetails,
    pub last_watched: Option<WatchHistoryItem>,
    pub in_watchlist: bool,
    /// Top-billed cast, at most [`CAST_LIMIT`]
    pub cast: Vec<CastMember>,
    /// Season to open on (shows only)
    pub initial_season: Option<u32>,
}

impl DetailsContext {
    /// Fetch catalog details, credits, checkpoint and watchlist membership together.
    ///
    /// Returns `None` when the details lookup fails. Credits degrade to an
    /// empty cast and progress lookups to "nothing saved".
    pub async fn load(
        tmdb: &TmdbClient,
        store: &WatchProgressStore,
        user: &User,
        kind: MediaKind,
        id: u64,
    ) -> Option<Self> {
        let details = async {
            match kind {
                MediaKind::Movie => tmdb.get_movie_details(id).await.map(CatalogDetails::Movie),
                MediaKind::Series => tmdb.get_tv_details(id).await.map(CatalogDetails::Tv),
            }
        };

        let (details, credits, history, in_watchlist) = tokio::join!(
            details,
            tmdb.get_credits(kind, id),
            store.get_show_history(user, id),
            store.is_in_watchlist(user, id)
        );

        let details = match details {
            Ok(details) => details,
            Err(TmdbError::NotFound) => {
                warn!(id, "title not found in catalog");
                return None;
            }
            Err(e) => {
                warn!(id, error = %e, "failed to load details");
                return None;
            }
        };

        let mut cast = credits.unwrap_or_else(|e| {
            warn!(id, error = %e, "failed to load credits");
            Vec::new()
        });
        cast.truncate(CAST_LIMIT);

        let last_watched = history.unwrap_or_else(|e| {
            warn!(id, error = %e, "failed to load watch history");
            None
        });
        let in_watchlist = in_watchlist.unwrap_or_else(|e| {
            warn!(id, error = %e, "failed to check watchlist");
            false
        });

        let initial_season = match &details {
            CatalogDetails::Tv(tv) => tv.initial_season(last_watched.as_ref()),
            CatalogDetails::Movie(_) => None,
        };

        Some(Self {
            details,
            last_watched,
            in_watchlist,
            cast,
            initial_season,
        })
    }

    pub fn media_ref(&self) -> MediaRef {
        self.details.media_ref()
    }

    pub fn watchlist_item(&self) -> WatchlistItem {
        WatchlistItem::from_media(
            &self.media_ref(),
            self.details.poster_path().map(String::from),
        )
    }

    pub fn play_request(&self, episode: Option<EpisodeRef>) -> PlayRequest {
        PlayRequest {
            media: self.media_ref(),
            episode,
            poster_path: self.details.poster_path().map(String::from),
        }
    }
}

/// Everything the home screen shows: catalog rows plus "continue watching"
#[derive(Debug, Clone, Default)]
pub struct HomeContext {
    pub rows: HomeRows,
    pub continue_watching: ContinueWatching,
}

impl HomeContext {
    /// Load rows and history together. A failure on either side leaves that
    /// side empty.
    pub async fn load(tmdb: &TmdbClient, store: &WatchProgressStore, user: &User) -> Self {
        let (rows, continue_watching) =
            tokio::join!(tmdb.home_rows(), ContinueWatching::load(store, user));

        let rows = rows.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load home rows");
            HomeRows::default()
        });
        let continue_watching = continue_watching.unwrap_or_else(|e| {
            warn!(error = %e, "failed to load watch history");
            ContinueWatching::default()
        });

        Self {
            rows,
            continue_watching,
        }
    }
}
