use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use plattenspieler_core::{Database, SpotifyError, SpotifySession, WifiCredentials};

use crate::{
    auth::{AdminSession, Session},
    errors::{ServerError, ServerResult},
    schemas::{RegisterDeviceSchema, StageTrackSchema, ValidatedJson, WifiSchema},
    serialized::{DeviceInventoryEntry, ToSerialized},
    ServerContext,
};

#[utoipa::path(
    post,
    path = "/content/create",
    tag = "content",
    request_body = StageTrackSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 202, description = "The track is staged for the next chip scan"),
        (status = 400, description = "The track could not be resolved")
    )
)]
pub(crate) async fn create(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<StageTrackSchema>,
) -> ServerResult<StatusCode> {
    let account = context
        .app
        .database
        .account_by_id(session.account_id())
        .await?;

    let spotify = context.app.spotify.session_for(&account).await?;

    let track = spotify.track(&body.track).await.map_err(|e| match e {
        SpotifyError::Rejected(_) => {
            ServerError::BadRequest("Track could not be resolved".to_string())
        }
        e => e.into(),
    })?;

    context.app.bindings.stage(account.id, track);

    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    post,
    path = "/content/wifi",
    tag = "content",
    request_body = WifiSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 202, description = "The credentials were stored"),
        (status = 403, description = "The device belongs to a different account"),
        (status = 404, description = "The device does not exist")
    )
)]
pub(crate) async fn wifi(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<WifiSchema>,
) -> ServerResult<StatusCode> {
    context
        .app
        .devices
        .update_wifi(
            session.account_id(),
            body.pid,
            WifiCredentials {
                ssid: body.ssid,
                passphrase: body.password,
            },
        )
        .await?;

    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    post,
    path = "/content/register",
    tag = "content",
    request_body = RegisterDeviceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 202, description = "The device was registered"),
        (status = 409, description = "The secret is already in use")
    )
)]
pub(crate) async fn register(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterDeviceSchema>,
) -> ServerResult<StatusCode> {
    context
        .app
        .devices
        .register(session.account_id(), body.auth)
        .await?;

    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    get,
    path = "/content/information",
    tag = "content",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "Every registered device", body = Vec<DeviceInventoryEntry>),
        (status = 403, description = "The caller is not an admin")
    )
)]
pub(crate) async fn information(
    _session: AdminSession,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<DeviceInventoryEntry>>> {
    let devices = context.app.devices.list_all().await?;

    Ok(Json(devices.to_serialized()))
}

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/create", post(create))
        .route("/wifi", post(wifi))
        .route("/register", post(register))
        .route("/information", get(information))
}
