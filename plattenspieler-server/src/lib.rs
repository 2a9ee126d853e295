use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    time::Duration,
};

use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};

mod account;
mod auth;
mod callback;
mod content;
mod context;
mod docs;
mod errors;
mod player;
mod schemas;
mod serialized;

pub mod logging;

pub use context::*;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 8080;

/// Requests that hang longer than this are cut off, so a stalled upstream
/// cannot pin a device or the frontend indefinitely.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Starts the plattenspieler server
pub async fn run_server(context: ServerContext) {
    let port = env::var("PLATTENSPIELER_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let router = Router::new()
        .route("/login", post(account::login))
        .route("/create", post(account::create))
        .nest("/user/account", account::router())
        .nest("/content", content::router())
        .nest("/plattenspieler", player::router())
        .nest("/callback", callback::router())
        .route("/api.json", get(docs::docs))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    axum::serve(listener, router.into_make_service())
        .await
        .expect("server runs until shutdown");
}
