use std::sync::Arc;

use plattenspieler_core::{MemoryDatabase, Plattenspieler, WebSpotifyClient};

/// The concrete system this server exposes.
pub type App = Plattenspieler<MemoryDatabase, WebSpotifyClient>;

#[derive(Clone)]
pub struct ServerContext {
    pub app: Arc<App>,
}
