use std::sync::Arc;

use log::{error, info};

use plattenspieler_core::{Config, MemoryDatabase, Plattenspieler, WebSpotifyClient};
use plattenspieler_server::{logging, run_server, ServerContext};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    logging::init_logger();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Plattenspieler failed to start: {}", e);
            return;
        }
    };

    let client = WebSpotifyClient::new(&config.spotify);
    let app = Arc::new(Plattenspieler::new(config, MemoryDatabase::new(), client));

    app.start_sweeper();

    info!("Initialized successfully.");
    run_server(ServerContext { app }).await;
}
