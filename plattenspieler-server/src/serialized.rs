//! All schemas that are exposed from endpoints are defined here
//! along with the [ToSerialized] impls

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use plattenspieler_core::{
    AccountData, DeviceData, PlaybackState as CorePlaybackState, PlayerDevice,
    Track as CoreTrack,
};

#[derive(Debug, Serialize, ToSchema)]
pub struct Profile {
    name: String,
    picture: String,
    /// Whether the account completed a Spotify connection
    spotify: bool,
    admin: bool,
    /// The selected Spotify output, empty when none is selected
    device: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OutputDevice {
    id: String,
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OutputDevices {
    pub devices: Vec<OutputDevice>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackInfo {
    id: String,
    title: String,
    artist: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Playback {
    playing: bool,
    progress_ms: Option<u64>,
    track: Option<TrackInfo>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceInventoryEntry {
    id: i32,
    account_id: i32,
    last_active: Option<DateTime<Utc>>,
    /// The ssid the device connects with, if wifi credentials are stored
    wifi: Option<String>,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<Profile> for AccountData {
    fn to_serialized(&self) -> Profile {
        Profile {
            name: self.name.clone(),
            picture: self.picture.clone().unwrap_or_default(),
            spotify: self.spotify.is_some(),
            admin: self.admin,
            device: self.device_id.clone().unwrap_or_default(),
        }
    }
}

impl ToSerialized<OutputDevice> for PlayerDevice {
    fn to_serialized(&self) -> OutputDevice {
        OutputDevice {
            id: self.id.clone(),
            name: self.name.clone(),
            kind: self.kind.clone(),
        }
    }
}

impl ToSerialized<TrackInfo> for CoreTrack {
    fn to_serialized(&self) -> TrackInfo {
        TrackInfo {
            id: self.id.clone(),
            title: self.title.clone(),
            artist: self.artist.clone(),
            image: self.image.clone(),
        }
    }
}

impl ToSerialized<Playback> for CorePlaybackState {
    fn to_serialized(&self) -> Playback {
        Playback {
            playing: self.playing,
            progress_ms: self.progress_ms,
            track: self.track.as_ref().map(|t| t.to_serialized()),
        }
    }
}

impl ToSerialized<DeviceInventoryEntry> for DeviceData {
    fn to_serialized(&self) -> DeviceInventoryEntry {
        DeviceInventoryEntry {
            id: self.id,
            account_id: self.account_id,
            last_active: self.last_active,
            wifi: self.wifi.as_ref().map(|w| w.ssid.clone()),
        }
    }
}
