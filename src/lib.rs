//! Turn a movie or episode into playable stream URLs and keep track of what
//! each user is watching.
//!
//! Two playback paths are supported. Extracted mode asks a scraper/aggregator
//! for HLS sources ([`resolver`]); direct mode builds an embed URL from the
//! catalog id ([`providers`]). [`session::ResolutionSession`] drives either
//! one and writes a [`progress`] checkpoint when the user picks a stream.

pub mod config;
pub mod details;
pub mod doctor;
pub mod media;
pub mod progress;
pub mod providers;
pub mod resolver;
pub mod session;
pub mod tmdb;
pub mod view;

pub use media::{EpisodeRef, MediaKind, MediaRef};
pub use progress::{User, UserId, WatchHistoryItem, WatchProgressStore, WatchlistItem};
pub use providers::ProviderRegistry;
pub use resolver::{ResolveError, ResolverClient, StreamSource};
pub use session::{PlayRequest, ResolutionSession, SessionState};
