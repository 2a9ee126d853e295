use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    routing::get,
    Router,
};
use log::warn;
use serde::Deserialize;

use crate::ServerContext;

#[derive(Debug, Deserialize)]
pub(crate) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// The redirect target Spotify sends the user back to. The user always
/// ends up on the frontend, whether the connection completed or not.
#[utoipa::path(
    get,
    path = "/callback/spotify",
    tag = "callback",
    responses(
        (status = 303, description = "Back to the frontend"),
        (status = 400, description = "Spotify reported an error or the query is incomplete")
    )
)]
pub(crate) async fn spotify(
    State(context): State<ServerContext>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        return (StatusCode::BAD_REQUEST, format!("Error: {}", error)).into_response();
    }

    let (code, state) = match (params.code, params.state) {
        (Some(code), Some(state)) => (code, state),
        _ => {
            return (StatusCode::BAD_REQUEST, "Error. Please try again.").into_response();
        }
    };

    if let Err(e) = context.app.spotify.complete_connect(&code, &state).await {
        warn!("Spotify callback could not be completed: {}", e);
    }

    Redirect::to(&context.app.config.frontend_redirect_url).into_response()
}

pub fn router() -> Router<ServerContext> {
    Router::new().route("/spotify", get(spotify))
}
