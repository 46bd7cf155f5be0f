use directories::ProjectDirs;
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

use crate::providers::ProviderRegistry;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("config directory not found")]
    NoConfigDir,
    #[error("config file not found at {0}")]
    NotFound(PathBuf),
    #[error("failed to read config: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("validation failed: {0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub resolver: ResolverConfig,
    pub tmdb: Option<TmdbConfig>,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolverConfig {
    #[serde(default = "default_resolver_url")]
    pub url: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            url: default_resolver_url(),
        }
    }
}

fn default_resolver_url() -> String {
    "https://api.consumet.org/movies/flixhq".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbConfig {
    pub apikey: String,
}

/// How the play button finds something to play
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackMode {
    /// Resolve HLS sources through the aggregator
    #[default]
    Extracted,
    /// Build an embed URL from the catalog id
    Direct,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default)]
    pub mode: PlaybackMode,
    /// Embed provider used in direct mode
    #[serde(default = "default_provider")]
    pub provider: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::default(),
            provider: default_provider(),
        }
    }
}

fn default_provider() -> String {
    "VidSrc.cc".to_string()
}

#[derive(Default, Debug, Clone, Deserialize)]
pub struct StorageConfig {
    pub data_dir: Option<PathBuf>,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.clone()));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        ProjectDirs::from("", "", "ferriswatch")
            .map(|dirs| dirs.config_dir().join("config.toml"))
            .ok_or(ConfigError::NoConfigDir)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.resolver.url.is_empty() {
            return Err(ConfigError::ValidationError(
                "resolver.url cannot be empty".to_string(),
            ));
        }

        let url = self.resolver.url.trim_end_matches('/');
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(ConfigError::ValidationError(
                "resolver.url must start with http:// or https://".to_string(),
            ));
        }

        if let Some(tmdb) = &self.tmdb
            && tmdb.apikey.is_empty()
        {
            return Err(ConfigError::ValidationError(
                "tmdb.apikey cannot be empty".to_string(),
            ));
        }

        if ProviderRegistry::builtin()
            .get(&self.playback.provider)
            .is_none()
        {
            return Err(ConfigError::ValidationError(format!(
                "playback.provider '{}' is not a known provider",
                self.playback.provider
            )));
        }

        Ok(())
    }
}
