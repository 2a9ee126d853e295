use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::{info, warn};
use thiserror::Error;
use url::Url;

use crate::{
    AccountData, AuthorizationFlow, Database, DatabaseError, PlattenspielerContext, PrimaryKey,
    SpotifyClient, SpotifyError, CONNECT_SCOPES,
};

/// Manages the connect → redirect → callback round trip that links an
/// account to Spotify.
pub struct SpotifyManager<Db, Sp>
where
    Sp: SpotifyClient,
{
    context: PlattenspielerContext<Db, Sp>,
    connecting: DashMap<PrimaryKey, PendingConnection<Sp::Flow>>,
}

/// An in-flight connection awaiting its callback, consumed exactly once
struct PendingConnection<F> {
    flow: F,
    /// The correlation token carried in the authorization URL
    state: String,
    created_at: Instant,
}

#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Authorization URL is missing a state parameter")]
    MissingState,

    /// The returned state matches no pending connection. Either it was
    /// already consumed, swept, or never issued by this process.
    #[error("No pending connection matches the returned state")]
    CorrelationMiss,

    #[error(transparent)]
    Spotify(SpotifyError),

    #[error(transparent)]
    Db(DatabaseError),
}

impl<Db, Sp> SpotifyManager<Db, Sp>
where
    Db: Database,
    Sp: SpotifyClient,
{
    /// Pending connections older than this are reclaimed by the sweep.
    pub const PENDING_TTL: Duration = Duration::from_secs(15 * 60);

    pub fn new(context: &PlattenspielerContext<Db, Sp>) -> Self {
        Self {
            context: context.clone(),
            connecting: Default::default(),
        }
    }

    /// Starts or re-issues a connection for an account, returning the URL
    /// the user must visit. Calling this again before the callback arrives
    /// returns the URL of the already pending flow.
    pub fn begin_connect(&self, account_id: PrimaryKey) -> Result<String, ConnectError> {
        if let Some(pending) = self.connecting.get(&account_id) {
            return Ok(pending.flow.authorization_url(&CONNECT_SCOPES));
        }

        let flow = self.context.client.begin_authorization();
        let url = flow.authorization_url(&CONNECT_SCOPES);
        let state = extract_state(&url).ok_or(ConnectError::MissingState)?;

        self.connecting.insert(
            account_id,
            PendingConnection {
                flow,
                state,
                created_at: Instant::now(),
            },
        );

        Ok(url)
    }

    /// Completes the connection matching `state`, exchanging `code` for
    /// credentials and persisting them onto the owning account.
    ///
    /// The matching entry is removed before the exchange so a concurrent
    /// callback cannot consume it twice. If the exchange fails the entry is
    /// put back, allowing a retry with a fresh code.
    pub async fn complete_connect(&self, code: &str, state: &str) -> Result<(), ConnectError> {
        let account_id = self
            .connecting
            .iter()
            .find(|entry| entry.value().state == state)
            .map(|entry| *entry.key())
            .ok_or(ConnectError::CorrelationMiss)?;

        let (_, pending) = self
            .connecting
            .remove_if(&account_id, |_, pending| pending.state == state)
            .ok_or(ConnectError::CorrelationMiss)?;

        let credentials = match pending.flow.exchange(code).await {
            Ok(credentials) => credentials,
            Err(e) => {
                self.connecting.insert(account_id, pending);
                return Err(ConnectError::Spotify(e));
            }
        };

        self.context
            .database
            .update_account_spotify(account_id, Some(credentials))
            .await
            .map_err(ConnectError::Db)?;

        info!("Account {} connected to Spotify.", account_id);
        Ok(())
    }

    /// Builds a session for an account from its stored credentials. When
    /// the client had to refresh them, the fresh credentials are written
    /// back so later sessions skip the refresh round trip.
    pub async fn session_for(&self, account: &AccountData) -> Result<Sp::Session, SpotifyError> {
        let credentials = account.spotify.as_ref().ok_or(SpotifyError::NotConnected)?;

        let (session, refreshed) = self.context.client.session(credentials).await?;

        if let Some(refreshed) = refreshed {
            let stored = self
                .context
                .database
                .update_account_spotify(account.id, Some(refreshed))
                .await;

            if let Err(e) = stored {
                warn!("Failed to store refreshed Spotify credentials: {}", e);
            }
        }

        Ok(session)
    }

    /// Drops pending connections that outlived [Self::PENDING_TTL].
    pub fn sweep(&self) {
        self.sweep_older_than(Self::PENDING_TTL)
    }

    fn sweep_older_than(&self, max_age: Duration) {
        self.connecting
            .retain(|_, pending| pending.created_at.elapsed() < max_age);
    }

    #[cfg(test)]
    fn pending_count(&self) -> usize {
        self.connecting.len()
    }
}

fn extract_state(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;

    url.query_pairs()
        .find(|(key, _)| key == "state")
        .map(|(_, value)| value.into_owned())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{TestSetup, EXCHANGE_FAILS_CODE};

    #[tokio::test]
    async fn test_connect_round_trip() {
        let setup = TestSetup::new().await;
        let account = setup.create_account("listener").await;

        let url = setup
            .system
            .spotify
            .begin_connect(account.id)
            .expect("connect begins");

        let state = extract_state(&url).expect("url carries state");

        setup
            .system
            .spotify
            .complete_connect("code-1", &state)
            .await
            .expect("connection completes");

        let account = setup.account(account.id).await;
        assert!(account.spotify.is_some());

        // The entry was consumed, so the same state is now a miss
        let again = setup.system.spotify.complete_connect("code-2", &state).await;
        assert!(matches!(again, Err(ConnectError::CorrelationMiss)));
    }

    #[tokio::test]
    async fn test_begin_connect_is_idempotent() {
        let setup = TestSetup::new().await;
        let account = setup.create_account("listener").await;

        let first = setup.system.spotify.begin_connect(account.id).unwrap();
        let second = setup.system.spotify.begin_connect(account.id).unwrap();

        assert_eq!(first, second);
        assert_eq!(setup.system.spotify.pending_count(), 1);
    }

    #[tokio::test]
    async fn test_failed_exchange_keeps_entry_for_retry() {
        let setup = TestSetup::new().await;
        let account = setup.create_account("listener").await;

        let url = setup.system.spotify.begin_connect(account.id).unwrap();
        let state = extract_state(&url).unwrap();

        let failed = setup
            .system
            .spotify
            .complete_connect(EXCHANGE_FAILS_CODE, &state)
            .await;
        assert!(matches!(failed, Err(ConnectError::Spotify(_))));

        // The entry survived the failure, so a fresh code still matches
        setup
            .system
            .spotify
            .complete_connect("code-retry", &state)
            .await
            .expect("retry completes");

        let account = setup.account(account.id).await;
        assert!(account.spotify.is_some());
    }

    #[tokio::test]
    async fn test_unknown_state_is_a_miss() {
        let setup = TestSetup::new().await;
        let account = setup.create_account("listener").await;

        setup.system.spotify.begin_connect(account.id).unwrap();

        let result = setup
            .system
            .spotify
            .complete_connect("code", "not-a-state")
            .await;

        assert!(matches!(result, Err(ConnectError::CorrelationMiss)));

        let account = setup.account(account.id).await;
        assert!(account.spotify.is_none());
    }

    #[tokio::test]
    async fn test_session_refresh_is_persisted() {
        use chrono::Utc;

        let setup = TestSetup::new().await;
        let account = setup.create_stale_account("listener").await;

        setup
            .system
            .spotify
            .session_for(&account)
            .await
            .expect("session is built");

        let stored = setup
            .account(account.id)
            .await
            .spotify
            .expect("still connected");

        assert_eq!(stored.access_token, "access-refreshed");
        assert!(stored.expires_at > Utc::now());
    }

    #[tokio::test]
    async fn test_sweep_expires_pending_connections() {
        let setup = TestSetup::new().await;
        let account = setup.create_account("listener").await;

        let url = setup.system.spotify.begin_connect(account.id).unwrap();
        let state = extract_state(&url).unwrap();

        setup.system.spotify.sweep_older_than(Duration::ZERO);
        assert_eq!(setup.system.spotify.pending_count(), 0);

        let result = setup.system.spotify.complete_connect("code", &state).await;
        assert!(matches!(result, Err(ConnectError::CorrelationMiss)));
    }

    #[test]
    fn test_state_extraction() {
        let url = "https://accounts.spotify.com/authorize?client_id=x&state=abc123&scope=y";
        assert_eq!(extract_state(url), Some("abc123".to_string()));
        assert_eq!(extract_state("https://accounts.spotify.com/authorize"), None);
    }
}
