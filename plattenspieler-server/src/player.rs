use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use log::warn;

use plattenspieler_core::{PlaybackCommand, PlaybackError};

use crate::{
    auth::{authenticate_device, DEVICE_REJECTION},
    schemas::{FirmwareSchema, PlaybackSchema, ValidatedJson},
    ServerContext,
};

#[utoipa::path(
    post,
    path = "/plattenspieler",
    tag = "plattenspieler",
    request_body = PlaybackSchema,
    responses(
        (status = 202, description = "The command was carried out"),
        (status = 401, description = "The device secret is unknown")
    )
)]
pub(crate) async fn command(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<PlaybackSchema>,
) -> Response {
    let command = PlaybackCommand {
        secret: body.auth,
        chip_id: body.id,
        pause: body.pause,
    };

    match context.app.playback.handle(command).await {
        Ok(true) => StatusCode::ACCEPTED.into_response(),
        Ok(false) => {
            // The device cannot act on partial failures, so it still gets
            // an acceptance.
            warn!("A player call failed while handling a device command.");
            StatusCode::ACCEPTED.into_response()
        }
        Err(PlaybackError::UnknownDevice) => {
            (StatusCode::UNAUTHORIZED, DEVICE_REJECTION).into_response()
        }
        Err(e) => {
            warn!("Device command failed: {}", e);
            (StatusCode::BAD_REQUEST, DEVICE_REJECTION).into_response()
        }
    }
}

#[utoipa::path(
    post,
    path = "/plattenspieler/update",
    tag = "plattenspieler",
    request_body = FirmwareSchema,
    responses(
        (status = 200, description = "The new firmware, or an empty body when up to date", body = String),
        (status = 401, description = "The device secret is unknown")
    )
)]
pub(crate) async fn update(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<FirmwareSchema>,
) -> Response {
    let device = match authenticate_device(&context, &body.auth).await {
        Ok(device) => device,
        Err(rejection) => return rejection,
    };

    if let Err(e) = context.app.devices.record_activity(device.id).await {
        warn!("Failed to record device activity: {}", e);
    }

    let firmware = context
        .app
        .devices
        .firmware(&body.version)
        .unwrap_or_default();

    (StatusCode::OK, firmware).into_response()
}

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/", post(command))
        .route("/update", post(update))
}
