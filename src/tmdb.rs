use reqwest::{Client, StatusCode};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::media::{MediaKind, MediaRef, year_from_date};
use crate::progress::WatchHistoryItem;

// At compile time, set TMDB_API_KEY env var to embed it, otherwise users must provide in config
const EMBEDDED_API_KEY: Option<&str> = option_env!("TMDB_API_KEY");

#[derive(Error, Debug)]
pub enum TmdbError {
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("no results found")]
    NotFound,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MovieDetails {
    pub id: u64,
    pub title: String,
    pub overview: Option<String>,
    pub release_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    pub vote_average: Option<f64>,
}

impl MovieDetails {
    pub fn media_ref(&self) -> MediaRef {
        MediaRef::movie(
            self.id,
            self.title.clone(),
            self.release_date.as_deref().and_then(year_from_date),
        )
    }
}

/// One entry of a catalog listing (trending, popular, discover)
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResult {
    pub id: u64,
    pub title: Option<String>, // Movies
    pub name: Option<String>,  // TV shows
    pub release_date: Option<String>,
    pub first_air_date: Option<String>,
    pub poster_path: Option<String>,
    pub vote_average: Option<f64>,
}

impl SearchResult {
    pub fn display_title(&self) -> &str {
        self.title
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("Unknown")
    }

    pub fn year(&self) -> Option<u16> {
        self.release_date
            .as_deref()
            .or(self.first_air_date.as_deref())
            .and_then(year_from_date)
    }

    /// Listings don't always carry `media_type`, so the row decides the kind
    pub fn media_ref(&self, kind: MediaKind) -> MediaRef {
        MediaRef {
            id: self.id,
            kind,
            title: self.display_title().to_string(),
            release_year: self.year(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CastMember {
    pub id: u64,
    pub name: String,
    pub character: Option<String>,
    pub profile_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreditsResponse {
    #[serde(default)]
    cast: Vec<CastMember>,
}

/// The four catalog rows of the home screen
#[derive(Debug, Clone, Default)]
pub struct HomeRows {
    pub trending_movies: Vec<SearchResult>,
    pub popular_movies: Vec<SearchResult>,
    pub trending_tv: Vec<SearchResult>,
    pub popular_anime: Vec<SearchResult>,
}

/// TV show details including seasons
#[derive(Debug, Clone, Deserialize)]
pub struct TvDetails {
    pub id: u64,
    pub name: String,
    pub overview: Option<String>,
    pub first_air_date: Option<String>,
    pub poster_path: Option<String>,
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub seasons: Vec<SeasonSummary>,
}

/// Summary of a season (from TV details)
#[derive(Debug, Clone, Deserialize)]
pub struct SeasonSummary {
    pub id: u64,
    pub name: String,
    pub season_number: u32,
    #[serde(default)]
    pub episode_count: u32,
}

impl TvDetails {
    pub fn media_ref(&self) -> MediaRef {
        MediaRef::series(
            self.id,
            self.name.clone(),
            self.first_air_date.as_deref().and_then(year_from_date),
        )
    }

    pub fn season(&self, season_number: u32) -> Option<&SeasonSummary> {
        self.seasons
            .iter()
            .find(|s| s.season_number == season_number)
    }

    /// Season to show first: the one being watched, else season 1 if it has
    /// episodes, else the first season with any.
    pub fn initial_season(&self, history: Option<&WatchHistoryItem>) -> Option<u32> {
        if self.seasons.is_empty() {
            return None;
        }

        if let Some(season) = history.and_then(|h| h.season_number) {
            return Some(season);
        }

        self.seasons
            .iter()
            .find(|s| s.season_number == 1 && s.episode_count > 0)
            .or_else(|| self.seasons.iter().find(|s| s.episode_count > 0))
            .map(|s| s.season_number)
    }
}

pub struct TmdbClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl TmdbClient {
    /// Create a new TMDB client. Uses custom key if provided, otherwise tries embedded key.
    /// Returns None if no API key is available.
    pub fn new(custom_api_key: Option<&str>) -> Option<Self> {
        Self::with_base_url(custom_api_key, "https://api.themoviedb.org")
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(custom_api_key: Option<&str>, base_url: &str) -> Option<Self> {
        let api_key = custom_api_key
            .map(String::from)
            .or_else(|| EMBEDDED_API_KEY.map(String::from))?;

        Some(Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, TmdbError> {
        self.get_with(path, "").await
    }

    /// `params` is appended to the query string as-is, e.g. `&sort_by=popularity.desc`
    async fn get_with<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &str,
    ) -> Result<T, TmdbError> {
        let url = format!(
            "{}/3{}?api_key={}{}",
            self.base_url, path, self.api_key, params
        );

        let response = self.client.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(TmdbError::NotFound);
        }

        Ok(response.error_for_status()?.json().await?)
    }

    pub async fn get_movie_details(&self, movie_id: u64) -> Result<MovieDetails, TmdbError> {
        debug!(movie_id, "fetching movie details");
        self.get(&format!("/movie/{}", movie_id)).await
    }

    /// Get TV show details including list of seasons
    pub async fn get_tv_details(&self, tv_id: u64) -> Result<TvDetails, TmdbError> {
        debug!(tv_id, "fetching TV details");
        self.get(&format!("/tv/{}", tv_id)).await
    }

    /// Billed cast of a movie or show, in billing order
    pub async fn get_credits(
        &self,
        kind: MediaKind,
        id: u64,
    ) -> Result<Vec<CastMember>, TmdbError> {
        debug!(id, kind = kind.path_segment(), "fetching credits");

        let response: CreditsResponse = self
            .get(&format!("/{}/{}/credits", kind.path_segment(), id))
            .await?;
        Ok(response.cast)
    }

    pub async fn get_trending(&self, kind: MediaKind) -> Result<Vec<SearchResult>, TmdbError> {
        let response: SearchResponse = self
            .get(&format!("/trending/{}/week", kind.path_segment()))
            .await?;
        Ok(response.results)
    }

    pub async fn get_popular_movies(&self) -> Result<Vec<SearchResult>, TmdbError> {
        let response: SearchResponse = self.get("/movie/popular").await?;
        Ok(response.results)
    }

    /// Japanese animation, most popular first
    pub async fn get_popular_anime(&self) -> Result<Vec<SearchResult>, TmdbError> {
        let response: SearchResponse = self
            .get_with(
                "/discover/tv",
                "&with_genres=16&sort_by=popularity.desc&with_original_language=ja",
            )
            .await?;
        Ok(response.results)
    }

    /// Fetch all home rows in parallel; any failure fails the whole set
    pub async fn home_rows(&self) -> Result<HomeRows, TmdbError> {
        debug!("fetching home rows");

        let (trending_movies, popular_movies, trending_tv, popular_anime) = tokio::try_join!(
            self.get_trending(MediaKind::Movie),
            self.get_popular_movies(),
            self.get_trending(MediaKind::Series),
            self.get_popular_anime()
        )?;

        Ok(HomeRows {
            trending_movies,
            popular_movies,
            trending_tv,
            popular_anime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{EpisodeRef, MediaKind};

    fn season(number: u32, episodes: u32) -> SeasonSummary {
        SeasonSummary {
            id: number as u64,
            name: format!("Season {}", number),
            season_number: number,
            episode_count: episodes,
        }
    }

    fn show(seasons: Vec<SeasonSummary>) -> TvDetails {
        TvDetails {
            id: 1396,
            name: "Breaking Bad".to_string(),
            overview: None,
            first_air_date: Some("2008-01-20".to_string()),
            poster_path: Some("/bb.jpg".to_string()),
            backdrop_path: None,
            seasons,
        }
    }

    #[test]
    fn test_tv_media_ref() {
        let media = show(vec![]).media_ref();
        assert_eq!(media.kind, MediaKind::Series);
        assert_eq!(media.title, "Breaking Bad");
        assert_eq!(media.release_year, Some(2008));
    }

    #[test]
    fn test_movie_media_ref_without_date() {
        let movie = MovieDetails {
            id: 603,
            title: "The Matrix".to_string(),
            overview: None,
            release_date: None,
            poster_path: None,
            backdrop_path: None,
            vote_average: None,
        };
        assert_eq!(movie.media_ref().release_year, None);
        assert_eq!(movie.media_ref().kind, MediaKind::Movie);
    }

    #[test]
    fn test_search_result_titles() {
        let results: SearchResponse = serde_json::from_str(
            r#"{"results": [
                {"id": 27205, "title": "Inception", "release_date": "2010-07-15"},
                {"id": 1396, "name": "Breaking Bad", "first_air_date": "2008-01-20"},
                {"id": 1}
            ]}"#,
        )
        .unwrap();
        let results = results.results;

        assert_eq!(
            results[0].media_ref(MediaKind::Movie),
            MediaRef::movie(27205, "Inception", Some(2010))
        );
        assert_eq!(
            results[1].media_ref(MediaKind::Series),
            MediaRef::series(1396, "Breaking Bad", Some(2008))
        );
        assert_eq!(results[2].display_title(), "Unknown");
        assert_eq!(results[2].year(), None);
    }

    #[test]
    fn test_credits_without_cast() {
        let credits: CreditsResponse = serde_json::from_str(r#"{"id": 1}"#).unwrap();
        assert!(credits.cast.is_empty());
    }

    #[test]
    fn test_initial_season_prefers_history() {
        let details = show(vec![season(0, 3), season(1, 7), season(2, 13)]);
        let history = WatchHistoryItem::checkpoint_at(
            &details.media_ref(),
            None,
            EpisodeRef::new(2, 4),
            0,
        );
        assert_eq!(details.initial_season(Some(&history)), Some(2));
    }

    #[test]
    fn test_initial_season_defaults() {
        // Season 1 when it has episodes, even if specials come first
        let details = show(vec![season(0, 3), season(1, 7)]);
        assert_eq!(details.initial_season(None), Some(1));

        // Otherwise the first season with episodes
        let details = show(vec![season(1, 0), season(0, 2), season(2, 5)]);
        assert_eq!(details.initial_season(None), Some(0));

        let details = show(vec![season(1, 0)]);
        assert_eq!(details.initial_season(None), None);

        assert_eq!(show(vec![]).initial_season(None), None);
    }
}
