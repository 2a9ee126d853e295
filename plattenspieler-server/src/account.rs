use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use plattenspieler_core::{
    AuthError, Credentials, Database, DatabaseError, NewPlainAccount, SpotifySession,
};

use crate::{
    auth::Session,
    errors::{ServerError, ServerResult},
    schemas::{CreateAccountSchema, LoginSchema, SelectDeviceSchema, ValidatedJson},
    serialized::{OutputDevices, Playback, Profile, ToSerialized},
    ServerContext,
};

#[utoipa::path(
    post,
    path = "/login",
    tag = "account",
    request_body = LoginSchema,
    responses(
        (status = 200, description = "A signed bearer token", body = String),
        (status = 401, description = "Name or password is incorrect")
    )
)]
pub(crate) async fn login(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LoginSchema>,
) -> ServerResult<String> {
    let token = context
        .app
        .auth
        .login(Credentials {
            name: body.user,
            password: body.password,
        })
        .await?;

    Ok(token)
}

#[utoipa::path(
    post,
    path = "/create",
    tag = "account",
    request_body = CreateAccountSchema,
    responses(
        (status = 201, description = "The account was created"),
        (status = 400, description = "Registration code is wrong or the name is taken")
    )
)]
pub(crate) async fn create(
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<CreateAccountSchema>,
) -> ServerResult<StatusCode> {
    if body.code != context.app.config.registration_code {
        return Err(ServerError::BadRequest(
            "Invalid registration code".to_string(),
        ));
    }

    context
        .app
        .auth
        .create_account(NewPlainAccount {
            name: body.name,
            password: body.password,
        })
        .await
        .map_err(|e| match e {
            AuthError::Db(DatabaseError::Conflict { .. }) => {
                ServerError::BadRequest("Account already exists".to_string())
            }
            e => e.into(),
        })?;

    Ok(StatusCode::CREATED)
}

#[utoipa::path(
    get,
    path = "/user/account",
    tag = "account",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Profile)
    )
)]
pub(crate) async fn account(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Profile>> {
    let account = context
        .app
        .database
        .account_by_id(session.account_id())
        .await?;

    Ok(Json(account.to_serialized()))
}

#[utoipa::path(
    get,
    path = "/user/account/devices",
    tag = "account",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The playback outputs available to the account", body = OutputDevices),
        (status = 400, description = "The account is not connected to Spotify")
    )
)]
pub(crate) async fn devices(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<OutputDevices>> {
    let account = context
        .app
        .database
        .account_by_id(session.account_id())
        .await?;

    let spotify = context.app.spotify.session_for(&account).await?;
    let devices = spotify.devices().await?;

    Ok(Json(OutputDevices {
        devices: devices.to_serialized(),
    }))
}

#[utoipa::path(
    get,
    path = "/user/account/playback",
    tag = "account",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Playback),
        (status = 204, description = "Nothing is playing")
    )
)]
pub(crate) async fn playback(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Response> {
    let account = context
        .app
        .database
        .account_by_id(session.account_id())
        .await?;

    let spotify = context.app.spotify.session_for(&account).await?;
    let state = spotify.current_playback().await?;

    let response = match state {
        Some(state) => Json(state.to_serialized()).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    };

    Ok(response)
}

#[utoipa::path(
    post,
    path = "/user/account/device",
    tag = "account",
    request_body = SelectDeviceSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 202, description = "The output was selected")
    )
)]
pub(crate) async fn select_device(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<SelectDeviceSchema>,
) -> ServerResult<StatusCode> {
    context
        .app
        .database
        .update_account_device(session.account_id(), Some(body.device))
        .await?;

    Ok(StatusCode::ACCEPTED)
}

#[utoipa::path(
    post,
    path = "/user/account/connect",
    tag = "account",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The authorization URL the user must visit", body = String)
    )
)]
pub(crate) async fn connect(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<String> {
    let url = context.app.spotify.begin_connect(session.account_id())?;

    Ok(url)
}

pub fn router() -> Router<ServerContext> {
    Router::new()
        .route("/", get(account))
        .route("/devices", get(devices))
        .route("/playback", get(playback))
        .route("/device", post(select_device))
        .route("/connect", post(connect))
}
