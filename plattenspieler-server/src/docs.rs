use std::borrow::BorrowMut;

use axum::{response::IntoResponse, Json};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};

use crate::{schemas, serialized};

#[derive(OpenApi)]
#[openapi(
    modifiers(&Security),
    info(
        description = "plattenspieler-server exposes endpoints to control this plattenspieler instance"
    ),
    paths(
        crate::account::login,
        crate::account::create,
        crate::account::account,
        crate::account::devices,
        crate::account::playback,
        crate::account::select_device,
        crate::account::connect,
        crate::content::create,
        crate::content::wifi,
        crate::content::register,
        crate::content::information,
        crate::player::command,
        crate::player::update,
        crate::callback::spotify,
    ),
    components(schemas(
        schemas::LoginSchema,
        schemas::CreateAccountSchema,
        schemas::SelectDeviceSchema,
        schemas::StageTrackSchema,
        schemas::WifiSchema,
        schemas::RegisterDeviceSchema,
        schemas::PlaybackSchema,
        schemas::FirmwareSchema,
        serialized::Profile,
        serialized::OutputDevice,
        serialized::OutputDevices,
        serialized::TrackInfo,
        serialized::Playback,
        serialized::DeviceInventoryEntry,
    ))
)]
pub struct ApiDoc;

struct Security;

impl Modify for Security {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.borrow_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("Bearer <token>")
                .build();

            components.add_security_scheme("BearerAuth", SecurityScheme::Http(scheme))
        }
    }
}

pub async fn docs() -> impl IntoResponse {
    Json(ApiDoc::openapi())
}
