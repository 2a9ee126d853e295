//! Test doubles and fixtures shared by the unit tests.

use std::sync::atomic::{AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::{
    AccountData, AuthorizationFlow, Config, Credentials, Database, DeviceData, FirmwareConfig,
    JwtConfig, MemoryDatabase, NewPlainAccount, PlaybackState, Plattenspieler, PlayerDevice,
    PrimaryKey, Scope, SpotifyClient, SpotifyConfig, SpotifyCredentials, SpotifyError,
    SpotifySession, Track,
};

/// Exchanging this code always fails, for retry tests.
pub const EXCHANGE_FAILS_CODE: &str = "code-that-fails";

/// Records every player call and the statuses they should answer with.
#[derive(Debug)]
pub struct CallCounts {
    enqueue: AtomicUsize,
    skip: AtomicUsize,
    start: AtomicUsize,
    pause: AtomicUsize,

    enqueue_status: AtomicU16,
    skip_status: AtomicU16,
    start_status: AtomicU16,
    pause_status: AtomicU16,
}

impl Default for CallCounts {
    fn default() -> Self {
        Self {
            enqueue: Default::default(),
            skip: Default::default(),
            start: Default::default(),
            pause: Default::default(),
            enqueue_status: AtomicU16::new(204),
            skip_status: AtomicU16::new(204),
            start_status: AtomicU16::new(204),
            pause_status: AtomicU16::new(204),
        }
    }
}

impl CallCounts {
    pub fn enqueue(&self) -> usize {
        self.enqueue.load(Ordering::SeqCst)
    }

    pub fn skip(&self) -> usize {
        self.skip.load(Ordering::SeqCst)
    }

    pub fn start(&self) -> usize {
        self.start.load(Ordering::SeqCst)
    }

    pub fn pause(&self) -> usize {
        self.pause.load(Ordering::SeqCst)
    }

    pub fn set_enqueue_status(&self, status: u16) {
        self.enqueue_status.store(status, Ordering::SeqCst);
    }

    pub fn set_skip_status(&self, status: u16) {
        self.skip_status.store(status, Ordering::SeqCst);
    }

    pub fn set_start_status(&self, status: u16) {
        self.start_status.store(status, Ordering::SeqCst);
    }

    pub fn set_pause_status(&self, status: u16) {
        self.pause_status.store(status, Ordering::SeqCst);
    }
}

/// An in-memory [SpotifyClient] with counting player commands.
pub struct TestClient {
    counts: Arc<CallCounts>,
    issued_flows: AtomicUsize,
}

pub struct TestFlow {
    state: String,
}

pub struct TestSession {
    counts: Arc<CallCounts>,
}

impl TestClient {
    pub fn new(counts: &Arc<CallCounts>) -> Self {
        Self {
            counts: counts.clone(),
            issued_flows: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpotifyClient for TestClient {
    type Flow = TestFlow;
    type Session = TestSession;

    fn begin_authorization(&self) -> TestFlow {
        let number = self.issued_flows.fetch_add(1, Ordering::SeqCst);

        TestFlow {
            state: format!("state-{}", number),
        }
    }

    async fn session(
        &self,
        credentials: &SpotifyCredentials,
    ) -> Result<(TestSession, Option<SpotifyCredentials>), SpotifyError> {
        let session = TestSession {
            counts: self.counts.clone(),
        };

        // Mirrors the web client: stale credentials come back refreshed
        let refreshed =
            (credentials.expires_at <= Utc::now()).then(|| test_credentials("refreshed"));

        Ok((session, refreshed))
    }
}

#[async_trait]
impl AuthorizationFlow for TestFlow {
    fn authorization_url(&self, scopes: &[Scope]) -> String {
        let scope: Vec<_> = scopes.iter().map(|s| s.as_str()).collect();

        format!(
            "https://accounts.spotify.com/authorize?client_id=test&state={}&scope={}",
            self.state,
            scope.join("+")
        )
    }

    async fn exchange(&self, code: &str) -> Result<SpotifyCredentials, SpotifyError> {
        if code == EXCHANGE_FAILS_CODE {
            return Err(SpotifyError::Transport("connection reset".to_string()));
        }

        Ok(test_credentials(code))
    }
}

#[async_trait]
impl SpotifySession for TestSession {
    async fn track(&self, track_id: &str) -> Result<Track, SpotifyError> {
        Ok(Track {
            id: track_id.to_string(),
            title: format!("Track {}", track_id),
            artist: Some("Artist".to_string()),
            image: Some("https://img.example/cover.png".to_string()),
        })
    }

    async fn enqueue(
        &self,
        _track: &Track,
        _device_id: Option<&str>,
    ) -> Result<u16, SpotifyError> {
        self.counts.enqueue.fetch_add(1, Ordering::SeqCst);
        Ok(self.counts.enqueue_status.load(Ordering::SeqCst))
    }

    async fn skip_next(&self) -> Result<u16, SpotifyError> {
        self.counts.skip.fetch_add(1, Ordering::SeqCst);
        Ok(self.counts.skip_status.load(Ordering::SeqCst))
    }

    async fn start_playback(&self, _device_id: Option<&str>) -> Result<u16, SpotifyError> {
        self.counts.start.fetch_add(1, Ordering::SeqCst);
        Ok(self.counts.start_status.load(Ordering::SeqCst))
    }

    async fn pause(&self) -> Result<u16, SpotifyError> {
        self.counts.pause.fetch_add(1, Ordering::SeqCst);
        Ok(self.counts.pause_status.load(Ordering::SeqCst))
    }

    async fn devices(&self) -> Result<Vec<PlayerDevice>, SpotifyError> {
        Ok(vec![PlayerDevice {
            id: "output-1".to_string(),
            name: "Living Room".to_string(),
            kind: "Speaker".to_string(),
        }])
    }

    async fn current_playback(&self) -> Result<Option<PlaybackState>, SpotifyError> {
        Ok(None)
    }
}

/// A fully wired system backed by [MemoryDatabase] and [TestClient].
pub struct TestSetup {
    pub system: Plattenspieler<MemoryDatabase, TestClient>,
    pub counts: Arc<CallCounts>,
}

impl TestSetup {
    pub const PASSWORD: &'static str = "correct horse battery staple";

    pub async fn new() -> Self {
        let counts: Arc<CallCounts> = Default::default();
        let client = TestClient::new(&counts);

        let system = Plattenspieler::new(test_config(), MemoryDatabase::new(), client);

        Self { system, counts }
    }

    pub async fn create_account(&self, name: &str) -> AccountData {
        self.system
            .auth
            .create_account(NewPlainAccount {
                name: name.to_string(),
                password: Self::PASSWORD.to_string(),
            })
            .await
            .expect("account is created")
    }

    /// Creates an account that already holds Spotify credentials.
    pub async fn create_connected_account(&self, name: &str) -> AccountData {
        let account = self.create_account(name).await;

        self.system
            .database
            .update_account_spotify(account.id, Some(test_credentials("seed")))
            .await
            .expect("credentials are stored")
    }

    /// Creates a connected account whose access token already expired.
    pub async fn create_stale_account(&self, name: &str) -> AccountData {
        let account = self.create_account(name).await;

        let mut credentials = test_credentials("stale");
        credentials.expires_at = Utc::now() - Duration::hours(1);

        self.system
            .database
            .update_account_spotify(account.id, Some(credentials))
            .await
            .expect("credentials are stored")
    }

    pub async fn register_device(&self, account_id: PrimaryKey, secret: &str) -> DeviceData {
        self.system
            .devices
            .register(account_id, secret.to_string())
            .await
            .expect("device is registered")
    }

    pub async fn account(&self, account_id: PrimaryKey) -> AccountData {
        self.system
            .database
            .account_by_id(account_id)
            .await
            .expect("account exists")
    }

    pub async fn login(&self, name: &str) -> String {
        self.system
            .auth
            .login(Credentials {
                name: name.to_string(),
                password: Self::PASSWORD.to_string(),
            })
            .await
            .expect("login succeeds")
    }
}

pub fn test_config() -> Config {
    Config {
        jwt: JwtConfig {
            secret: "test-secret-32-chars-long!!!!!!!".to_string(),
            audience: "plattenspieler-app".to_string(),
            issuer: "plattenspieler".to_string(),
        },
        spotify: SpotifyConfig {
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
            redirect_uri: "https://example.com/callback/spotify".to_string(),
        },
        firmware: FirmwareConfig {
            version: "fw-2".to_string(),
            payload: "#!/bin/sh\necho plattenspieler\n".to_string(),
        },
        frontend_redirect_url: "https://example.com/app".to_string(),
        registration_code: "secret-code".to_string(),
    }
}

fn test_credentials(seed: &str) -> SpotifyCredentials {
    SpotifyCredentials {
        access_token: format!("access-{}", seed),
        refresh_token: format!("refresh-{}", seed),
        expires_at: Utc::now() + Duration::hours(1),
    }
}
