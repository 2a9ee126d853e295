use std::{env, fs};

use thiserror::Error;

/// Static configuration for the whole system, read from the environment
/// once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub jwt: JwtConfig,
    pub spotify: SpotifyConfig,
    pub firmware: FirmwareConfig,

    /// Where the browser is sent after the Spotify callback.
    pub frontend_redirect_url: String,
    /// The shared code required to create an account.
    pub registration_code: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub audience: String,
    pub issuer: String,
}

#[derive(Debug, Clone)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

/// The single canonical firmware the server pushes to devices.
#[derive(Debug, Clone)]
pub struct FirmwareConfig {
    pub version: String,
    pub payload: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    MissingVariable(&'static str),
    #[error("Could not read firmware payload: {0}")]
    FirmwarePayload(std::io::Error),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let payload_path = var("FIRMWARE_PAYLOAD_PATH")?;
        let payload = fs::read_to_string(&payload_path).map_err(ConfigError::FirmwarePayload)?;

        Ok(Self {
            jwt: JwtConfig {
                secret: var("JWT_SECRET")?,
                audience: var("JWT_AUDIENCE")?,
                issuer: var("JWT_ISSUER")?,
            },
            spotify: SpotifyConfig {
                client_id: var("SPOTIFY_CLIENT_ID")?,
                client_secret: var("SPOTIFY_CLIENT_SECRET")?,
                redirect_uri: var("SPOTIFY_REDIRECT_URI")?,
            },
            firmware: FirmwareConfig {
                version: var("FIRMWARE_VERSION")?,
                payload,
            },
            frontend_redirect_url: var("FRONTEND_REDIRECT_URL")?,
            registration_code: var("REGISTRATION_CODE")?,
        })
    }
}

fn var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::MissingVariable(name))
}
