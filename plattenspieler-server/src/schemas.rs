use axum::{
    async_trait,
    extract::{FromRequest, Request},
    http::StatusCode,
    Json,
};
use serde::{de::DeserializeOwned, Deserialize};
use utoipa::ToSchema;
use validator::Validate;

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct LoginSchema {
    #[validate(length(max = 128))]
    pub user: String,
    #[validate(length(max = 64))]
    pub password: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct CreateAccountSchema {
    #[validate(length(min = 2, max = 128))]
    pub name: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
    /// The registration code admitting new accounts
    pub code: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct SelectDeviceSchema {
    /// The id of the Spotify output to start playback on
    #[validate(length(min = 1, max = 128))]
    pub device: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct StageTrackSchema {
    /// The Spotify id of the track to bind to the next scanned chip
    #[validate(length(min = 1, max = 64))]
    pub track: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct WifiSchema {
    #[validate(length(min = 1, max = 64))]
    pub ssid: String,
    #[validate(length(max = 128))]
    pub password: String,
    /// The id of the device the credentials are for
    pub pid: i32,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct RegisterDeviceSchema {
    /// The shared secret the new device will authenticate with
    #[validate(length(min = 8, max = 128))]
    pub auth: String,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct PlaybackSchema {
    /// The shared secret of the device issuing the command
    pub auth: String,
    /// The scanned chip id, absent when only pausing
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub pause: bool,
}

#[derive(Debug, ToSchema, Validate, Deserialize)]
pub struct FirmwareSchema {
    /// The shared secret of the device asking for an update
    pub auth: String,
    /// The firmware version the device currently runs
    pub version: String,
}

pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let extracted_json: Json<T> = Json::from_request(req, state)
            .await
            .map_err(|_| (StatusCode::BAD_REQUEST, "JSON parse failed"))?;

        extracted_json
            .0
            .validate()
            .map_err(|_| (StatusCode::BAD_REQUEST, "Request body is invalid"))?;

        Ok(Self(extracted_json.0))
    }
}
