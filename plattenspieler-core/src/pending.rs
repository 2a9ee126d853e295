use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::{PrimaryKey, Track};

/// Short-lived, per-account, single-use correlation from "track selected in
/// the app" to "next chip scanned on a device".
#[derive(Debug, Default)]
pub struct PendingBindings {
    staged: DashMap<PrimaryKey, StagedTrack>,
}

#[derive(Debug)]
struct StagedTrack {
    track: Track,
    staged_at: Instant,
}

impl PendingBindings {
    /// Staged tracks older than this are reclaimed by the sweep.
    pub const STAGE_TTL: Duration = Duration::from_secs(30 * 60);

    /// Stages a track for the account's next chip scan. Overwrites any
    /// previously staged track.
    pub fn stage(&self, account_id: PrimaryKey, track: Track) {
        self.staged.insert(
            account_id,
            StagedTrack {
                track,
                staged_at: Instant::now(),
            },
        );
    }

    /// Takes the staged track for an account, if any. Removal is atomic so
    /// two concurrent scans cannot both consume the same stage.
    pub fn consume(&self, account_id: PrimaryKey) -> Option<Track> {
        self.staged.remove(&account_id).map(|(_, staged)| staged.track)
    }

    /// Drops staged tracks that outlived [Self::STAGE_TTL].
    pub fn sweep(&self) {
        self.sweep_older_than(Self::STAGE_TTL)
    }

    fn sweep_older_than(&self, max_age: Duration) {
        self.staged
            .retain(|_, staged| staged.staged_at.elapsed() < max_age);
    }
}
