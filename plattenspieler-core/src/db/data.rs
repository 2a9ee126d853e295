use chrono::{DateTime, Utc};

use crate::SpotifyCredentials;

/// The type used for primary keys in the store.
pub type PrimaryKey = i32;

/// A plattenspieler account
#[derive(Debug, Clone)]
pub struct AccountData {
    pub id: PrimaryKey,
    /// The display name, unique across accounts
    pub name: String,
    /// The argon2 hash of the password
    pub password: String,
    pub picture: Option<String>,
    pub admin: bool,
    /// Set once the account completed a Spotify connection
    pub spotify: Option<SpotifyCredentials>,
    /// The Spotify output device playback is started on
    pub device_id: Option<String>,
}

/// A registered physical turntable
#[derive(Debug, Clone)]
pub struct DeviceData {
    pub id: PrimaryKey,
    /// The shared secret the device authenticates with, unique across devices
    pub secret: String,
    /// The account owning this device, set at registration
    pub account_id: PrimaryKey,
    /// When the device was last heard from
    pub last_active: Option<DateTime<Utc>>,
    pub wifi: Option<WifiCredentials>,
}

#[derive(Debug, Clone)]
pub struct WifiCredentials {
    pub ssid: String,
    pub passphrase: String,
}

/// The persisted binding from a physical chip to a track.
/// Note: `account_id` and `chip_id` are unique together.
#[derive(Debug, Clone)]
pub struct ChipRecordData {
    pub id: PrimaryKey,
    pub chip_id: u64,
    pub track_id: String,
    /// The account owning the binding
    pub account_id: PrimaryKey,
    pub image: Option<String>,
    pub title: Option<String>,
}
