use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod connect;
pub use connect::*;

mod web;
pub use web::*;

/// Statuses returned by player commands count as successful below this.
pub const SUCCESS_THRESHOLD: u16 = 300;

/// The scopes requested when an account is connected.
pub const CONNECT_SCOPES: [Scope; 3] = [
    Scope::UserReadPlaybackState,
    Scope::UserModifyPlaybackState,
    Scope::UserReadPrivate,
];

#[derive(Debug, Error)]
pub enum SpotifyError {
    #[error("Account is not connected to Spotify")]
    NotConnected,

    #[error("Failed to reach Spotify: {0}")]
    Transport(String),

    #[error("Failed to parse Spotify response: {0}")]
    Parse(String),

    #[error("Spotify rejected the request: {0}")]
    Rejected(String),
}

/// Long-lived credentials stored on an account once a connection completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpotifyCredentials {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    UserReadPlaybackState,
    UserModifyPlaybackState,
    UserReadPrivate,
}

/// A track as resolved by the external service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub id: String,
    pub title: String,
    pub artist: Option<String>,
    pub image: Option<String>,
}

/// A Spotify playback output, not to be confused with a turntable
#[derive(Debug, Clone)]
pub struct PlayerDevice {
    pub id: String,
    pub name: String,
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct PlaybackState {
    pub track: Option<Track>,
    pub playing: bool,
    pub progress_ms: Option<u64>,
}

/// An in-flight authorization, created when a user starts connecting their
/// account. The URL it produces carries the `state` correlation token.
#[async_trait]
pub trait AuthorizationFlow: Send + Sync + 'static {
    fn authorization_url(&self, scopes: &[Scope]) -> String;

    /// Exchanges an authorization code for long-lived credentials.
    /// A code is single-use against the provider.
    async fn exchange(&self, code: &str) -> Result<SpotifyCredentials, SpotifyError>;
}

/// A session acting on one account's Spotify player.
///
/// Player commands return the raw response status. Anything below
/// [SUCCESS_THRESHOLD] counts as success.
#[async_trait]
pub trait SpotifySession: Send + Sync {
    async fn track(&self, track_id: &str) -> Result<Track, SpotifyError>;
    async fn enqueue(&self, track: &Track, device_id: Option<&str>)
        -> Result<u16, SpotifyError>;
    async fn skip_next(&self) -> Result<u16, SpotifyError>;
    async fn start_playback(&self, device_id: Option<&str>) -> Result<u16, SpotifyError>;
    async fn pause(&self) -> Result<u16, SpotifyError>;
    async fn devices(&self) -> Result<Vec<PlayerDevice>, SpotifyError>;
    async fn current_playback(&self) -> Result<Option<PlaybackState>, SpotifyError>;
}

/// Represents the external music service integration.
#[async_trait]
pub trait SpotifyClient: Send + Sync + 'static {
    type Flow: AuthorizationFlow;
    type Session: SpotifySession;

    fn begin_authorization(&self) -> Self::Flow;

    /// Builds a session from stored credentials. When the access token had
    /// to be refreshed, the fresh credentials come back alongside so the
    /// caller can persist them and skip the refresh next time.
    async fn session(
        &self,
        credentials: &SpotifyCredentials,
    ) -> Result<(Self::Session, Option<SpotifyCredentials>), SpotifyError>;
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::UserReadPlaybackState => "user-read-playback-state",
            Scope::UserModifyPlaybackState => "user-modify-playback-state",
            Scope::UserReadPrivate => "user-read-private",
        }
    }
}

pub fn is_success(status: u16) -> bool {
    status < SUCCESS_THRESHOLD
}
