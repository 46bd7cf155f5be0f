use reqwest::Client;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ResolverConfig;
use crate::media::{EpisodeRef, MediaRef};

/// Which step of the resolution chain came up empty
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Title,
    Episode,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Title => write!(f, "title"),
            Stage::Episode => write!(f, "episode"),
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("no {0} match on resolver")]
    NotFound(Stage),
    #[error("request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl ResolveError {
    /// Network or decode failure, as opposed to a clean miss
    pub fn is_transport(&self) -> bool {
        !matches!(self, ResolveError::NotFound(_))
    }
}

/// One entry of the aggregator's search results
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default, deserialize_with = "lenient_year")]
    pub release_date: Option<u16>,
}

impl SearchHit {
    /// The aggregator labels shows "TV Series"
    pub fn is_series(&self) -> bool {
        self.kind.to_ascii_lowercase().contains("series")
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EpisodeEntry {
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: String,
    /// Specials and extras are often listed without a season
    #[serde(default, deserialize_with = "lenient_number")]
    pub season: Option<u32>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub number: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    episodes: Vec<EpisodeEntry>,
}

/// A candidate stream returned by the watch endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StreamSource {
    #[serde(default, deserialize_with = "lenient_string")]
    pub url: String,
    #[serde(default = "default_quality")]
    pub quality: String,
    /// Directly playable HLS playlist
    #[serde(rename = "isM3U8", default)]
    pub is_m3u8: bool,
}

fn default_quality() -> String {
    "auto".to_string()
}

#[derive(Debug, Deserialize)]
struct WatchResponse {
    #[serde(default)]
    sources: Vec<StreamSource>,
}

/// Ids are strings on some deployments and numbers on others
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

/// `releaseDate` arrives as either `2010` or `"2010"`
fn lenient_year<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u16>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u16::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<u32>, D::Error> {
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Pick the first hit released in `release_year`, or any series hit.
///
/// First matching entry wins; an exact-year hit listed after a series hit
/// loses to it. Without a year only series hits can match.
pub fn select_hit(hits: &[SearchHit], release_year: Option<u16>) -> Option<&SearchHit> {
    hits.iter().find(|hit| {
        !hit.id.is_empty()
            && ((release_year.is_some() && hit.release_date == release_year) || hit.is_series())
    })
}

/// Exact (season, episode) lookup; first duplicate wins.
/// Entries missing an id, season or number never match.
pub fn select_episode(episodes: &[EpisodeEntry], episode: EpisodeRef) -> Option<&EpisodeEntry> {
    episodes.iter().find(|e| {
        !e.id.is_empty() && e.season == Some(episode.season) && e.number == Some(episode.episode)
    })
}

/// Keep only HLS sources with an absolute URL
pub fn playable_sources(sources: Vec<StreamSource>) -> Vec<StreamSource> {
    sources
        .into_iter()
        .filter(|s| s.is_m3u8 && !s.url.is_empty())
        .filter(|s| match url::Url::parse(&s.url) {
            Ok(_) => true,
            Err(e) => {
                debug!(url = %s.url, error = %e, "dropping source with invalid url");
                false
            }
        })
        .collect()
}

/// Client for the scraper/aggregator service
pub struct ResolverClient {
    client: Client,
    base_url: String,
}

impl ResolverClient {
    pub fn new(config: &ResolverConfig) -> Self {
        Self::with_base_url(&config.url)
    }

    /// Create a client with a custom base URL (for testing)
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ResolveError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(ResolveError::InvalidResponse(format!(
                "status: {}",
                response.status()
            )));
        }

        Ok(response.json().await?)
    }

    /// `GET /{title}`; flixhq-style aggregators take the query as the path itself
    pub async fn search(&self, title: &str) -> Result<Vec<SearchHit>, ResolveError> {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(title));

        debug!(title, "searching resolver");

        let response: SearchResponse = self.get_json(&url).await?;
        Ok(response.results)
    }

    /// `GET /info?id=`
    pub async fn episodes(&self, media_id: &str) -> Result<Vec<EpisodeEntry>, ResolveError> {
        let url = format!(
            "{}/info?id={}",
            self.base_url,
            urlencoding::encode(media_id)
        );

        debug!(media_id, "fetching episode list");

        let response: InfoResponse = self.get_json(&url).await?;
        Ok(response.episodes)
    }

    /// `GET /watch?episodeId=&mediaId=`, unfiltered
    pub async fn watch(
        &self,
        episode_id: &str,
        media_id: &str,
    ) -> Result<Vec<StreamSource>, ResolveError> {
        let url = format!(
            "{}/watch?episodeId={}&mediaId={}",
            self.base_url,
            urlencoding::encode(episode_id),
            urlencoding::encode(media_id)
        );

        debug!(episode_id, media_id, "fetching sources");

        let response: WatchResponse = self.get_json(&url).await?;
        Ok(response.sources)
    }

    /// Map a display title to the aggregator's media entry
    pub async fn resolve_title(
        &self,
        title: &str,
        release_year: Option<u16>,
    ) -> Result<SearchHit, ResolveError> {
        let hits = self.search(title).await?;
        select_hit(&hits, release_year)
            .cloned()
            .ok_or(ResolveError::NotFound(Stage::Title))
    }

    /// Map a season/episode pair to the aggregator's episode id
    pub async fn locate_episode(
        &self,
        media_id: &str,
        episode: EpisodeRef,
    ) -> Result<String, ResolveError> {
        let episodes = self.episodes(media_id).await?;
        select_episode(&episodes, episode)
            .map(|e| e.id.clone())
            .ok_or(ResolveError::NotFound(Stage::Episode))
    }

    /// Playable sources for an episode (or a movie, whose episode id is its media id).
    /// An empty list is a valid answer.
    pub async fn extract_sources(
        &self,
        episode_id: &str,
        media_id: &str,
    ) -> Result<Vec<StreamSource>, ResolveError> {
        let sources = self.watch(episode_id, media_id).await?;
        let total = sources.len();
        let playable = playable_sources(sources);
        debug!(total, playable = playable.len(), "filtered sources");
        Ok(playable)
    }

    /// Run the full chain: title, then episode when asked for one, then sources
    pub async fn resolve_streams(
        &self,
        media: &MediaRef,
        episode: Option<EpisodeRef>,
    ) -> Result<Vec<StreamSource>, ResolveError> {
        let hit = self.resolve_title(&media.title, media.release_year).await?;

        let episode_id = match episode {
            Some(episode) if hit.is_series() => self.locate_episode(&hit.id, episode).await?,
            _ => hit.id.clone(),
        };

        let sources = self.extract_sources(&episode_id, &hit.id).await?;
        info!(
            title = %media.title,
            media_id = %hit.id,
            sources = sources.len(),
            "resolved streams"
        );
        Ok(sources)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(id: &str, kind: &str, year: Option<u16>) -> SearchHit {
        SearchHit {
            id: id.to_string(),
            kind: kind.to_string(),
            release_date: year,
        }
    }

    fn source(url: &str, is_m3u8: bool) -> StreamSource {
        StreamSource {
            url: url.to_string(),
            quality: "auto".to_string(),
            is_m3u8,
        }
    }

    #[test]
    fn test_select_hit_exact_year() {
        let hits = vec![
            hit("a", "Movie", Some(2009)),
            hit("b", "Movie", Some(2010)),
        ];
        assert_eq!(select_hit(&hits, Some(2010)).map(|h| h.id.as_str()), Some("b"));
    }

    #[test]
    fn test_select_hit_first_match_wins() {
        // A series hit listed first beats a later exact-year hit
        let hits = vec![
            hit("show", "TV Series", Some(2015)),
            hit("movie", "Movie", Some(2010)),
        ];
        assert_eq!(
            select_hit(&hits, Some(2010)).map(|h| h.id.as_str()),
            Some("show")
        );

        let hits = vec![
            hit("movie", "Movie", Some(2010)),
            hit("show", "TV Series", Some(2015)),
        ];
        assert_eq!(
            select_hit(&hits, Some(2010)).map(|h| h.id.as_str()),
            Some("movie")
        );
    }

    #[test]
    fn test_select_hit_without_year_only_series() {
        let hits = vec![hit("a", "Movie", None), hit("b", "Movie", Some(2010))];
        assert!(select_hit(&hits, None).is_none());

        let hits = vec![hit("a", "Movie", None), hit("b", "TV Series", Some(2010))];
        assert_eq!(select_hit(&hits, None).map(|h| h.id.as_str()), Some("b"));
    }

    #[test]
    fn test_select_hit_skips_missing_id() {
        let hits = vec![hit("", "Movie", Some(2010)), hit("ok", "Movie", Some(2010))];
        assert_eq!(select_hit(&hits, Some(2010)).map(|h| h.id.as_str()), Some("ok"));
        assert!(select_hit(&[], Some(2010)).is_none());
    }

    #[test]
    fn test_search_hit_lenient_fields() {
        let hits: SearchResponse = serde_json::from_str(
            r#"{"results": [
                {"id": "abc", "type": "Movie", "releaseDate": 2010},
                {"id": 42, "type": "TV Series", "releaseDate": "2008"},
                {"id": "x", "type": "Movie", "releaseDate": "2010-07-16"},
                {"id": "y"}
            ]}"#,
        )
        .unwrap();
        let hits = hits.results;
        assert_eq!(hits[0].release_date, Some(2010));
        assert_eq!(hits[1].id, "42");
        assert_eq!(hits[1].release_date, Some(2008));
        assert!(hits[1].is_series());
        assert_eq!(hits[2].release_date, None);
        assert_eq!(hits[3].kind, "");
    }

    fn entry(id: &str, season: Option<u32>, number: Option<u32>) -> EpisodeEntry {
        EpisodeEntry {
            id: id.to_string(),
            season,
            number,
        }
    }

    #[test]
    fn test_select_episode() {
        let episodes = vec![
            entry("e1", Some(1), Some(1)),
            entry("e2", Some(1), Some(2)),
            entry("dup", Some(1), Some(2)),
        ];
        let wanted = EpisodeRef::new(1, 2).unwrap();
        assert_eq!(select_episode(&episodes, wanted).map(|e| e.id.as_str()), Some("e2"));
        assert!(select_episode(&episodes, EpisodeRef::new(2, 1).unwrap()).is_none());
    }

    #[test]
    fn test_select_episode_skips_incomplete_entries() {
        let episodes = vec![
            entry("special", None, Some(1)),
            entry("", Some(1), Some(1)),
            entry("e11", Some(1), Some(1)),
        ];
        assert_eq!(
            select_episode(&episodes, EpisodeRef::new(1, 1).unwrap()).map(|e| e.id.as_str()),
            Some("e11")
        );
    }

    #[test]
    fn test_info_response_tolerates_missing_fields() {
        let info: InfoResponse = serde_json::from_str(
            r#"{"episodes": [
                {"id": "special", "number": 1},
                {"id": 7, "season": "2", "number": 3},
                {"season": 1, "number": 1}
            ]}"#,
        )
        .unwrap();
        assert_eq!(info.episodes.len(), 3);
        assert_eq!(info.episodes[0].season, None);
        assert_eq!(info.episodes[1].id, "7");
        assert_eq!(info.episodes[1].season, Some(2));
        assert!(info.episodes[2].id.is_empty());
    }

    #[test]
    fn test_watch_response_keeps_valid_sources_beside_broken_ones() {
        let watch: WatchResponse = serde_json::from_str(
            r#"{"sources": [
                {"quality": "auto", "isM3U8": false},
                {"url": null, "isM3U8": true},
                {"url": "https://cdn.example/a.m3u8", "isM3U8": true}
            ]}"#,
        )
        .unwrap();
        let playable = playable_sources(watch.sources);
        assert_eq!(playable.len(), 1);
        assert_eq!(playable[0].url, "https://cdn.example/a.m3u8");
    }

    #[test]
    fn test_playable_sources_filters_non_hls() {
        let sources = vec![
            source("https://cdn.example/a.m3u8", true),
            source("https://embed.example/iframe", false),
            source("not a url", true),
            source("https://cdn.example/b.m3u8", true),
        ];
        let playable = playable_sources(sources);
        assert_eq!(playable.len(), 2);
        assert!(playable.iter().all(|s| s.is_m3u8));
    }

    #[test]
    fn test_stream_source_defaults() {
        let s: StreamSource = serde_json::from_str(r#"{"url": "https://x/y.m3u8"}"#).unwrap();
        assert_eq!(s.quality, "auto");
        assert!(!s.is_m3u8);
    }

    #[test]
    fn test_error_classification() {
        assert!(!ResolveError::NotFound(Stage::Title).is_transport());
        assert!(ResolveError::InvalidResponse("status: 500".to_string()).is_transport());
        assert_eq!(
            ResolveError::NotFound(Stage::Episode).to_string(),
            "no episode match on resolver"
        );
    }
}
