use async_trait::async_trait;
use chrono::{Duration, Utc};
use rand::{distributions::Alphanumeric, thread_rng, Rng};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use url::Url;

use crate::{
    AuthorizationFlow, PlaybackState, PlayerDevice, Scope, SpotifyClient, SpotifyConfig,
    SpotifyCredentials, SpotifyError, SpotifySession, Track,
};

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Access tokens within this margin of expiry are refreshed up front.
const EXPIRY_MARGIN_SECONDS: i64 = 60;

const STATE_LENGTH: usize = 16;

/// The Spotify Web API implementation of [SpotifyClient].
pub struct WebSpotifyClient {
    http: Client,
    config: SpotifyConfig,
}

pub struct WebAuthorizationFlow {
    http: Client,
    config: SpotifyConfig,
    state: String,
}

pub struct WebSpotifySession {
    http: Client,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Deserialize)]
struct TrackResponse {
    id: String,
    name: String,
    artists: Vec<ArtistResponse>,
    album: Option<AlbumResponse>,
}

#[derive(Debug, Deserialize)]
struct ArtistResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
struct AlbumResponse {
    images: Vec<ImageResponse>,
}

#[derive(Debug, Deserialize)]
struct ImageResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DevicesResponse {
    devices: Vec<DeviceResponse>,
}

#[derive(Debug, Deserialize)]
struct DeviceResponse {
    id: Option<String>,
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct CurrentPlaybackResponse {
    item: Option<TrackResponse>,
    is_playing: bool,
    progress_ms: Option<u64>,
}

impl WebSpotifyClient {
    pub fn new(config: &SpotifyConfig) -> Self {
        Self {
            http: Client::new(),
            config: config.clone(),
        }
    }

    async fn refresh(&self, credentials: &SpotifyCredentials) -> Result<SpotifyCredentials, SpotifyError> {
        let response = self
            .http
            .post(format!("{}/api/token", ACCOUNTS_BASE))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", credentials.refresh_token.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SpotifyError::Transport(e.to_string()))?;

        let token = parse_token_response(response).await?;
        Ok(token.into_credentials(Some(credentials.refresh_token.clone())))
    }
}

#[async_trait]
impl SpotifyClient for WebSpotifyClient {
    type Flow = WebAuthorizationFlow;
    type Session = WebSpotifySession;

    fn begin_authorization(&self) -> WebAuthorizationFlow {
        WebAuthorizationFlow {
            http: self.http.clone(),
            config: self.config.clone(),
            state: random_state(),
        }
    }

    async fn session(
        &self,
        credentials: &SpotifyCredentials,
    ) -> Result<(WebSpotifySession, Option<SpotifyCredentials>), SpotifyError> {
        let expires_soon =
            credentials.expires_at <= Utc::now() + Duration::seconds(EXPIRY_MARGIN_SECONDS);

        if !expires_soon {
            let session = WebSpotifySession {
                http: self.http.clone(),
                access_token: credentials.access_token.clone(),
            };

            return Ok((session, None));
        }

        let refreshed = self.refresh(credentials).await?;
        let session = WebSpotifySession {
            http: self.http.clone(),
            access_token: refreshed.access_token.clone(),
        };

        Ok((session, Some(refreshed)))
    }
}

#[async_trait]
impl AuthorizationFlow for WebAuthorizationFlow {
    fn authorization_url(&self, scopes: &[Scope]) -> String {
        let scope: Vec<_> = scopes.iter().map(|s| s.as_str()).collect();

        let url = Url::parse_with_params(
            &format!("{}/authorize", ACCOUNTS_BASE),
            &[
                ("client_id", self.config.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("state", self.state.as_str()),
                ("scope", scope.join(" ").as_str()),
            ],
        )
        .expect("authorize url is valid");

        url.to_string()
    }

    async fn exchange(&self, code: &str) -> Result<SpotifyCredentials, SpotifyError> {
        let response = self
            .http
            .post(format!("{}/api/token", ACCOUNTS_BASE))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SpotifyError::Transport(e.to_string()))?;

        let token = parse_token_response(response).await?;
        Ok(token.into_credentials(None))
    }
}

impl WebSpotifySession {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", API_BASE, path))
            .bearer_auth(&self.access_token)
    }

    /// Fires a player command and returns its raw status.
    async fn command(&self, builder: RequestBuilder) -> Result<u16, SpotifyError> {
        let response = builder
            .send()
            .await
            .map_err(|e| SpotifyError::Transport(e.to_string()))?;

        Ok(response.status().as_u16())
    }
}

#[async_trait]
impl SpotifySession for WebSpotifySession {
    async fn track(&self, track_id: &str) -> Result<Track, SpotifyError> {
        let response = self
            .request(Method::GET, &format!("/tracks/{}", track_id))
            .send()
            .await
            .map_err(|e| SpotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpotifyError::Rejected(read_error_body(response).await));
        }

        let track: TrackResponse = response
            .json()
            .await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(track.into())
    }

    async fn enqueue(
        &self,
        track: &Track,
        device_id: Option<&str>,
    ) -> Result<u16, SpotifyError> {
        let mut builder = self
            .request(Method::POST, "/me/player/queue")
            .query(&[("uri", format!("spotify:track:{}", track.id))]);

        if let Some(device_id) = device_id {
            builder = builder.query(&[("device_id", device_id)]);
        }

        self.command(builder).await
    }

    async fn skip_next(&self) -> Result<u16, SpotifyError> {
        self.command(self.request(Method::POST, "/me/player/next"))
            .await
    }

    async fn start_playback(&self, device_id: Option<&str>) -> Result<u16, SpotifyError> {
        let mut builder = self.request(Method::PUT, "/me/player/play");

        if let Some(device_id) = device_id {
            builder = builder.query(&[("device_id", device_id)]);
        }

        self.command(builder).await
    }

    async fn pause(&self) -> Result<u16, SpotifyError> {
        self.command(self.request(Method::PUT, "/me/player/pause"))
            .await
    }

    async fn devices(&self) -> Result<Vec<PlayerDevice>, SpotifyError> {
        let response = self
            .request(Method::GET, "/me/player/devices")
            .send()
            .await
            .map_err(|e| SpotifyError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SpotifyError::Rejected(read_error_body(response).await));
        }

        let devices: DevicesResponse = response
            .json()
            .await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        let devices = devices
            .devices
            .into_iter()
            .filter_map(|d| {
                Some(PlayerDevice {
                    id: d.id?,
                    name: d.name,
                    kind: d.kind,
                })
            })
            .collect();

        Ok(devices)
    }

    async fn current_playback(&self) -> Result<Option<PlaybackState>, SpotifyError> {
        let response = self
            .request(Method::GET, "/me/player/currently-playing")
            .send()
            .await
            .map_err(|e| SpotifyError::Transport(e.to_string()))?;

        let status = response.status();

        // Spotify answers 204 when nothing is playing
        if status.as_u16() == 204 {
            return Ok(None);
        }

        if !status.is_success() {
            return Err(SpotifyError::Rejected(read_error_body(response).await));
        }

        let playback: CurrentPlaybackResponse = response
            .json()
            .await
            .map_err(|e| SpotifyError::Parse(e.to_string()))?;

        Ok(Some(PlaybackState {
            track: playback.item.map(Into::into),
            playing: playback.is_playing,
            progress_ms: playback.progress_ms,
        }))
    }
}

impl TokenResponse {
    /// The refresh grant omits the refresh token, so the stored one is
    /// carried over.
    fn into_credentials(self, fallback_refresh: Option<String>) -> SpotifyCredentials {
        SpotifyCredentials {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(fallback_refresh).unwrap_or_default(),
            expires_at: Utc::now() + Duration::seconds(self.expires_in),
        }
    }
}

impl From<TrackResponse> for Track {
    fn from(response: TrackResponse) -> Self {
        let image = response
            .album
            .and_then(|album| album.images.into_iter().next())
            .map(|image| image.url);

        Track {
            id: response.id,
            title: response.name,
            artist: response.artists.into_iter().next().map(|a| a.name),
            image,
        }
    }
}

async fn parse_token_response(response: Response) -> Result<TokenResponse, SpotifyError> {
    let status = response.status();

    if !status.is_success() {
        return Err(SpotifyError::Rejected(read_error_body(response).await));
    }

    response
        .json()
        .await
        .map_err(|e| SpotifyError::Parse(e.to_string()))
}

async fn read_error_body(response: Response) -> String {
    response.text().await.unwrap_or_default()
}

/// The correlation token carried through the authorization round trip.
fn random_state() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(STATE_LENGTH)
        .map(char::from)
        .collect()
}
