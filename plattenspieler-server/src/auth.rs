use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, StatusCode},
    response::{IntoResponse, Response},
};

use plattenspieler_core::{AuthError, DeviceData, PrimaryKey, Principal, Scheme, Verified};

use crate::ServerContext;

/// Answers every failed device request, keeping the reason opaque.
pub const DEVICE_REJECTION: &str = "error.";

/// Wraps [Principal] so [FromRequestParts] can be implemented for it
pub struct Session(Principal);

/// Like [Session], but only admitting accounts with the admin flag
pub struct AdminSession(Principal);

impl Session {
    pub fn account_id(&self) -> PrimaryKey {
        self.0.account_id
    }
}

impl AdminSession {
    pub fn account_id(&self) -> PrimaryKey {
        self.0.account_id
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for Session {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        verify(parts, state, Scheme::User).await.map(Self)
    }
}

#[async_trait]
impl FromRequestParts<ServerContext> for AdminSession {
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerContext,
    ) -> Result<Self, Self::Rejection> {
        verify(parts, state, Scheme::Admin).await.map(Self)
    }
}

async fn verify(
    parts: &mut Parts,
    state: &ServerContext,
    scheme: Scheme,
) -> Result<Principal, (StatusCode, &'static str)> {
    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|x| x.to_str().ok())
        .ok_or((StatusCode::UNAUTHORIZED, "Missing authorization"))?;

    let parts: Vec<_> = header.split_ascii_whitespace().collect();

    if parts.first() != Some(&"Bearer") {
        return Err((StatusCode::BAD_REQUEST, "Authorization must be Bearer"));
    }

    let token = parts.last().cloned().unwrap_or_default();

    let verified = state
        .app
        .auth
        .authenticate(scheme, token)
        .await
        .map_err(|e| match e {
            AuthError::MissingPrivileges => (StatusCode::FORBIDDEN, "Missing privileges"),
            _ => (StatusCode::UNAUTHORIZED, "Authentication failed"),
        })?;

    match verified {
        Verified::Account(principal) => Ok(principal),
        Verified::Device(_) => Err((StatusCode::UNAUTHORIZED, "Authentication failed")),
    }
}

/// Resolves the `auth` shared secret carried in a device request body.
pub async fn authenticate_device(
    context: &ServerContext,
    secret: &str,
) -> Result<DeviceData, Response> {
    match context
        .app
        .auth
        .authenticate(Scheme::DeviceSecret, secret)
        .await
    {
        Ok(Verified::Device(device)) => Ok(device),
        _ => Err((StatusCode::UNAUTHORIZED, DEVICE_REJECTION).into_response()),
    }
}
