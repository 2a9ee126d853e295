mod auth;
mod config;
mod db;
mod devices;
mod pending;
mod playback;
mod spotify;

#[cfg(test)]
mod testing;

use std::sync::Arc;
use std::time::Duration;

pub use auth::*;
pub use config::*;
pub use db::*;
pub use devices::*;
pub use pending::*;
pub use playback::*;
pub use spotify::*;

use tokio::task::JoinHandle;

/// How often the background sweep reclaims expired pending state.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// The plattenspieler domain system, facilitating authentication, device
/// management, Spotify connections, and the playback pipeline.
pub struct Plattenspieler<Db, Sp>
where
    Sp: SpotifyClient,
{
    pub database: Arc<Db>,

    pub config: Arc<Config>,
    pub bindings: Arc<PendingBindings>,

    pub auth: Auth<Db>,
    pub devices: DeviceRegistry<Db>,
    pub spotify: SpotifyManager<Db, Sp>,
    pub playback: PlaybackPipeline<Db, Sp>,
}

/// A type passed to various components of the system, to access the store,
/// the Spotify client, and the injected pending state.
pub struct PlattenspielerContext<Db, Sp> {
    pub database: Arc<Db>,
    pub client: Arc<Sp>,
    pub config: Arc<Config>,
    pub bindings: Arc<PendingBindings>,
}

impl<Db, Sp> Plattenspieler<Db, Sp>
where
    Db: Database,
    Sp: SpotifyClient,
{
    pub fn new(config: Config, database: Db, client: Sp) -> Self {
        let config = Arc::new(config);
        let database = Arc::new(database);
        let client = Arc::new(client);
        let bindings: Arc<PendingBindings> = Default::default();

        let context = PlattenspielerContext {
            database: database.clone(),
            client: client.clone(),
            config: config.clone(),
            bindings: bindings.clone(),
        };

        let auth = Auth::new(&database, &config);
        let devices = DeviceRegistry::new(&database, &config);
        let spotify = SpotifyManager::new(&context);
        let playback = PlaybackPipeline::new(&context);

        Self {
            database,
            config,
            bindings,
            auth,
            devices,
            spotify,
            playback,
        }
    }

    /// Spawns the background task that expires stale pending connections
    /// and stale staged tracks.
    pub fn start_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(SWEEP_INTERVAL);

            loop {
                interval.tick().await;

                this.spotify.sweep();
                this.bindings.sweep();
            }
        })
    }
}

impl<Db, Sp> Clone for PlattenspielerContext<Db, Sp>
where
    Db: Database,
    Sp: SpotifyClient,
{
    fn clone(&self) -> Self {
        Self {
            database: self.database.clone(),
            client: self.client.clone(),
            config: self.config.clone(),
            bindings: self.bindings.clone(),
        }
    }
}
