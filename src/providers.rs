use crate::media::{EpisodeRef, MediaKind, MediaRef};

/// What an embed provider should play: a movie, or one episode of a show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedTarget {
    Movie { id: u64 },
    Episode { id: u64, episode: EpisodeRef },
}

impl EmbedTarget {
    /// Build a target for a catalog entry. A series needs an episode.
    pub fn for_media(media: &MediaRef, episode: Option<EpisodeRef>) -> Option<Self> {
        match (media.kind, episode) {
            (MediaKind::Movie, _) => Some(EmbedTarget::Movie { id: media.id }),
            (MediaKind::Series, Some(episode)) => Some(EmbedTarget::Episode {
                id: media.id,
                episode,
            }),
            (MediaKind::Series, None) => None,
        }
    }
}

/// A direct-embed playback provider
#[derive(Debug, Clone, Copy)]
pub struct Provider {
    pub name: &'static str,
    build: fn(&EmbedTarget) -> String,
}

impl Provider {
    pub const fn new(name: &'static str, build: fn(&EmbedTarget) -> String) -> Self {
        Self { name, build }
    }

    pub fn build_url(&self, target: &EmbedTarget) -> String {
        (self.build)(target)
    }
}

fn vidsrc_url(target: &EmbedTarget) -> String {
    match target {
        EmbedTarget::Movie { id } => format!("https://vidsrc.cc/v2/embed/movie/{}", id),
        EmbedTarget::Episode { id, episode } => format!(
            "https://vidsrc.cc/v2/embed/tv/{}/{}/{}",
            id, episode.season, episode.episode
        ),
    }
}

fn vidrock_url(target: &EmbedTarget) -> String {
    match target {
        EmbedTarget::Movie { id } => format!("https://vidrock.net/movie/{}", id),
        EmbedTarget::Episode { id, episode } => format!(
            "https://vidrock.net/tv/{}/{}/{}",
            id, episode.season, episode.episode
        ),
    }
}

pub const VIDSRC: Provider = Provider::new("VidSrc.cc", vidsrc_url);
pub const VIDROCK: Provider = Provider::new("VidRock", vidrock_url);

/// Immutable table of embed providers, handed to whoever needs it.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn new(providers: Vec<Provider>) -> Self {
        Self { providers }
    }

    /// The providers shipped with the crate, in display order
    pub fn builtin() -> Self {
        Self::new(vec![VIDSRC, VIDROCK])
    }

    /// Lookup is case-insensitive
    pub fn get(&self, name: &str) -> Option<&Provider> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Provider> {
        self.providers.iter()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(season: u32, episode: u32) -> EpisodeRef {
        EpisodeRef::new(season, episode).unwrap()
    }

    #[test]
    fn test_vidsrc_urls() {
        assert_eq!(
            VIDSRC.build_url(&EmbedTarget::Movie { id: 27205 }),
            "https://vidsrc.cc/v2/embed/movie/27205"
        );
        assert_eq!(
            VIDSRC.build_url(&EmbedTarget::Episode {
                id: 1396,
                episode: episode(2, 7)
            }),
            "https://vidsrc.cc/v2/embed/tv/1396/2/7"
        );
    }

    #[test]
    fn test_vidrock_urls() {
        assert_eq!(
            VIDROCK.build_url(&EmbedTarget::Movie { id: 603 }),
            "https://vidrock.net/movie/603"
        );
        assert_eq!(
            VIDROCK.build_url(&EmbedTarget::Episode {
                id: 1399,
                episode: episode(1, 1)
            }),
            "https://vidrock.net/tv/1399/1/1"
        );
    }

    #[test]
    fn test_target_for_media() {
        let movie = MediaRef::movie(603, "The Matrix", Some(1999));
        assert_eq!(
            EmbedTarget::for_media(&movie, None),
            Some(EmbedTarget::Movie { id: 603 })
        );

        // An episode on a movie is ignored
        assert_eq!(
            EmbedTarget::for_media(&movie, Some(episode(1, 2))),
            Some(EmbedTarget::Movie { id: 603 })
        );

        let show = MediaRef::series(1396, "Breaking Bad", Some(2008));
        assert_eq!(EmbedTarget::for_media(&show, None), None);
        assert_eq!(
            EmbedTarget::for_media(&show, Some(episode(3, 4))),
            Some(EmbedTarget::Episode {
                id: 1396,
                episode: episode(3, 4)
            })
        );
    }

    #[test]
    fn test_registry_lookup() {
        let registry = ProviderRegistry::builtin();
        assert_eq!(registry.names(), vec!["VidSrc.cc", "VidRock"]);
        assert_eq!(registry.get("vidrock").map(|p| p.name), Some("VidRock"));
        assert!(registry.get("nope").is_none());
        assert!(ProviderRegistry::new(Vec::new()).is_empty());
    }
}
