use serde::{Deserialize, Serialize};

/// Kind of catalog entry. Serialized the way the catalog spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaKind {
    #[serde(rename = "movie")]
    Movie,
    #[serde(rename = "tv")]
    Series,
}

impl MediaKind {
    /// Path segment used by catalog and embed URLs
    pub fn path_segment(&self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }
}

/// A catalog title, as loaded by a details screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    /// External catalog (TMDB) id
    pub id: u64,
    pub kind: MediaKind,
    pub title: String,
    pub release_year: Option<u16>,
}

impl MediaRef {
    pub fn movie(id: u64, title: impl Into<String>, release_year: Option<u16>) -> Self {
        Self {
            id,
            kind: MediaKind::Movie,
            title: title.into(),
            release_year,
        }
    }

    pub fn series(id: u64, title: impl Into<String>, release_year: Option<u16>) -> Self {
        Self {
            id,
            kind: MediaKind::Series,
            title: title.into(),
            release_year,
        }
    }

    pub fn is_series(&self) -> bool {
        self.kind == MediaKind::Series
    }
}

/// Season/episode pair. Both numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EpisodeRef {
    pub season: u32,
    pub episode: u32,
}

impl EpisodeRef {
    /// Returns `None` when either number is zero
    pub fn new(season: u32, episode: u32) -> Option<Self> {
        if season == 0 || episode == 0 {
            return None;
        }
        Some(Self { season, episode })
    }
}

/// Parse a year from a catalog date such as "2010-07-15"
pub fn year_from_date(date: &str) -> Option<u16> {
    date.get(..4)?.parse().ok()
}
