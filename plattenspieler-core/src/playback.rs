use chrono::Utc;
use log::warn;
use thiserror::Error;

use crate::{
    is_success, AccountData, Database, DatabaseError, NewChipRecord, PlattenspielerContext,
    SpotifyClient, SpotifyError, SpotifySession, Track,
};

/// Drives a single device command: resolve the chip to a track, then run
/// the ordered enqueue → skip → play sequence against the owner's player.
pub struct PlaybackPipeline<Db, Sp> {
    context: PlattenspielerContext<Db, Sp>,
}

/// A device-authenticated command, as received from a turntable
#[derive(Debug)]
pub struct PlaybackCommand {
    pub secret: String,
    pub chip_id: Option<u64>,
    pub pause: bool,
}

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// No device matches the supplied secret
    #[error("Unknown device")]
    UnknownDevice,
    /// A play command arrived without a chip id
    #[error("No chip id was supplied")]
    MissingChip,
    /// The chip has no binding and nothing is staged for the owner
    #[error("No record is bound to this chip")]
    NoRecord,
    #[error(transparent)]
    Spotify(SpotifyError),
    #[error(transparent)]
    Db(DatabaseError),
}

impl<Db, Sp> PlaybackPipeline<Db, Sp>
where
    Db: Database,
    Sp: SpotifyClient,
{
    pub fn new(context: &PlattenspielerContext<Db, Sp>) -> Self {
        Self {
            context: context.clone(),
        }
    }

    /// Handles one command, returning whether every issued player call
    /// succeeded. Individual call failures do not abort the sequence.
    pub async fn handle(&self, command: PlaybackCommand) -> Result<bool, PlaybackError> {
        let database = &self.context.database;

        let device = database
            .device_by_secret(&command.secret)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => PlaybackError::UnknownDevice,
                e => PlaybackError::Db(e),
            })?;

        database
            .update_device_liveness(device.id, Utc::now())
            .await
            .map_err(PlaybackError::Db)?;

        let account = database
            .account_by_id(device.account_id)
            .await
            .map_err(PlaybackError::Db)?;

        let credentials = account
            .spotify
            .as_ref()
            .ok_or(PlaybackError::Spotify(SpotifyError::NotConnected))?;

        let (session, refreshed) = self
            .context
            .client
            .session(credentials)
            .await
            .map_err(PlaybackError::Spotify)?;

        if let Some(refreshed) = refreshed {
            database
                .update_account_spotify(account.id, Some(refreshed))
                .await
                .map_err(PlaybackError::Db)?;
        }

        if command.pause {
            return Ok(attempt(session.pause().await));
        }

        let track = self.resolve_track(&account, &command, &session).await?;
        let output = account.device_id.as_deref();

        // Strictly ordered: queue the track so it becomes "next", skip to
        // it, then make sure playback is running. Every step is attempted
        // even if an earlier one failed.
        let enqueued = attempt(session.enqueue(&track, output).await);
        let skipped = attempt(session.skip_next().await);
        let started = attempt(session.start_playback(output).await);

        Ok(enqueued && skipped && started)
    }

    /// Resolves the track for a scan. A staged track consumes the pending
    /// binding and is persisted as the chip's record before any player call
    /// is made, so the binding survives later failures.
    async fn resolve_track(
        &self,
        account: &AccountData,
        command: &PlaybackCommand,
        session: &Sp::Session,
    ) -> Result<Track, PlaybackError> {
        let chip_id = command.chip_id.ok_or(PlaybackError::MissingChip)?;

        if let Some(track) = self.context.bindings.consume(account.id) {
            self.context
                .database
                .upsert_chip_record(NewChipRecord {
                    chip_id,
                    track_id: track.id.clone(),
                    account_id: account.id,
                    image: track.image.clone(),
                    title: Some(track.title.clone()),
                })
                .await
                .map_err(PlaybackError::Db)?;

            return Ok(track);
        }

        let record = self
            .context
            .database
            .chip_record(account.id, chip_id)
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => PlaybackError::NoRecord,
                e => PlaybackError::Db(e),
            })?;

        session
            .track(&record.track_id)
            .await
            .map_err(PlaybackError::Spotify)
    }
}

fn attempt(result: Result<u16, SpotifyError>) -> bool {
    match result {
        Ok(status) => is_success(status),
        Err(e) => {
            warn!("Playback step failed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::TestSetup;
    use crate::Track;

    fn track(id: &str) -> Track {
        Track {
            id: id.to_string(),
            title: format!("Track {}", id),
            artist: Some("Artist".to_string()),
            image: Some("https://img.example/cover.png".to_string()),
        }
    }

    fn command(secret: &str, chip_id: Option<u64>, pause: bool) -> PlaybackCommand {
        PlaybackCommand {
            secret: secret.to_string(),
            chip_id,
            pause,
        }
    }

    #[tokio::test]
    async fn test_play_issues_all_three_calls_in_order() {
        let setup = TestSetup::new().await;
        let account = setup.create_connected_account("owner").await;
        setup.register_device(account.id, "secret").await;

        setup.system.bindings.stage(account.id, track("a"));

        let success = setup
            .system
            .playback
            .handle(command("secret", Some(7), false))
            .await
            .expect("command is processed");

        assert!(success);
        assert_eq!(setup.counts.enqueue(), 1);
        assert_eq!(setup.counts.skip(), 1);
        assert_eq!(setup.counts.start(), 1);
        assert_eq!(setup.counts.pause(), 0);
    }

    #[tokio::test]
    async fn test_failed_step_does_not_abort_the_sequence() {
        let setup = TestSetup::new().await;
        setup.counts.set_skip_status(502);

        let account = setup.create_connected_account("owner").await;
        setup.register_device(account.id, "secret").await;
        setup.system.bindings.stage(account.id, track("a"));

        let success = setup
            .system
            .playback
            .handle(command("secret", Some(7), false))
            .await
            .expect("command is processed");

        assert!(!success, "one failing step fails the aggregate");
        assert_eq!(setup.counts.enqueue(), 1);
        assert_eq!(setup.counts.skip(), 1);
        assert_eq!(setup.counts.start(), 1, "later steps are still attempted");
    }

    #[tokio::test]
    async fn test_scan_consumes_stage_then_falls_back_to_record() {
        let setup = TestSetup::new().await;
        let account = setup.create_connected_account("owner").await;
        setup.register_device(account.id, "secret").await;

        setup.system.bindings.stage(account.id, track("staged"));

        setup
            .system
            .playback
            .handle(command("secret", Some(7), false))
            .await
            .unwrap();

        let record = setup
            .system
            .playback
            .context
            .database
            .chip_record(account.id, 7)
            .await
            .expect("scan persisted the binding");
        assert_eq!(record.track_id, "staged");
        assert_eq!(record.title.as_deref(), Some("Track staged"));

        // Second scan without restaging plays the persisted record
        setup
            .system
            .playback
            .handle(command("secret", Some(7), false))
            .await
            .unwrap();

        let record = setup
            .system
            .playback
            .context
            .database
            .chip_record(account.id, 7)
            .await
            .unwrap();
        assert_eq!(record.track_id, "staged", "stale stage was not re-consumed");
        assert_eq!(setup.counts.enqueue(), 2);
    }

    #[tokio::test]
    async fn test_unbound_chip_is_rejected() {
        let setup = TestSetup::new().await;
        let account = setup.create_connected_account("owner").await;
        setup.register_device(account.id, "secret").await;

        let result = setup
            .system
            .playback
            .handle(command("secret", Some(99), false))
            .await;

        assert!(matches!(result, Err(PlaybackError::NoRecord)));
        assert_eq!(setup.counts.enqueue(), 0);
    }

    #[tokio::test]
    async fn test_pause_issues_a_single_call() {
        let setup = TestSetup::new().await;
        let account = setup.create_connected_account("owner").await;
        setup.register_device(account.id, "secret").await;

        let success = setup
            .system
            .playback
            .handle(command("secret", None, true))
            .await
            .expect("pause is processed");

        assert!(success);
        assert_eq!(setup.counts.pause(), 1);
        assert_eq!(setup.counts.enqueue(), 0);
    }

    #[tokio::test]
    async fn test_unknown_secret_fails_closed() {
        let setup = TestSetup::new().await;

        let result = setup
            .system
            .playback
            .handle(command("nope", Some(1), false))
            .await;

        assert!(matches!(result, Err(PlaybackError::UnknownDevice)));
        assert_eq!(setup.counts.enqueue(), 0);
    }

    #[tokio::test]
    async fn test_command_persists_refreshed_credentials() {
        let setup = TestSetup::new().await;
        let account = setup.create_stale_account("owner").await;
        setup.register_device(account.id, "secret").await;

        setup.system.bindings.stage(account.id, track("a"));

        setup
            .system
            .playback
            .handle(command("secret", Some(7), false))
            .await
            .unwrap();

        let stored = setup
            .account(account.id)
            .await
            .spotify
            .expect("still connected");

        assert_eq!(stored.access_token, "access-refreshed");
    }

    #[tokio::test]
    async fn test_command_updates_liveness() {
        let setup = TestSetup::new().await;
        let account = setup.create_connected_account("owner").await;
        let device = setup.register_device(account.id, "secret").await;

        assert!(device.last_active.is_none());

        setup
            .system
            .playback
            .handle(command("secret", None, true))
            .await
            .unwrap();

        let devices = setup.system.devices.list_all().await.unwrap();
        assert!(devices[0].last_active.is_some());
    }
}
