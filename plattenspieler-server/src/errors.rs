use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use plattenspieler_core::{AuthError, ConnectError, DatabaseError, DeviceError, SpotifyError};

pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Authentication failed")]
    AuthenticationFailed,
    #[error("Missing privileges")]
    MissingPrivileges,
    #[error("{resource}:{identifier} not found")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        resource: &'static str,
        field: &'static str,
        value: String,
    },
    #[error("Device secret is already in use")]
    SecretTaken,
    #[error("Device does not belong to this account")]
    NotOwner,
    #[error("{0}")]
    BadRequest(String),
    #[error("Spotify request failed: {0}")]
    Upstream(String),
    #[error("Unknown internal error: {0}")]
    Unknown(String),
}

impl ServerError {
    fn as_status_code(&self) -> StatusCode {
        match self {
            Self::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            Self::MissingPrivileges => StatusCode::FORBIDDEN,
            Self::NotOwner => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::SecretTaken => StatusCode::CONFLICT,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        (self.as_status_code(), self.to_string()).into_response()
    }
}

impl From<AuthError> for ServerError {
    fn from(value: AuthError) -> Self {
        match value {
            AuthError::InvalidCredentials => Self::AuthenticationFailed,
            AuthError::MissingPrivileges => Self::MissingPrivileges,
            AuthError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DatabaseError> for ServerError {
    fn from(value: DatabaseError) -> Self {
        match value {
            DatabaseError::NotFound {
                resource,
                identifier,
            } => Self::NotFound {
                resource,
                identifier,
            },
            DatabaseError::Conflict {
                resource,
                field,
                value,
            } => Self::Conflict {
                resource,
                field,
                value,
            },
            e => Self::Unknown(e.to_string()),
        }
    }
}

impl From<DeviceError> for ServerError {
    fn from(value: DeviceError) -> Self {
        match value {
            DeviceError::SecretTaken => Self::SecretTaken,
            DeviceError::NotOwner => Self::NotOwner,
            DeviceError::NotFound => Self::NotFound {
                resource: "device",
                identifier: "id",
            },
            DeviceError::Db(e) => e.into(),
        }
    }
}

impl From<SpotifyError> for ServerError {
    fn from(value: SpotifyError) -> Self {
        match value {
            SpotifyError::NotConnected => {
                Self::BadRequest("Account is not connected to Spotify".to_string())
            }
            e => Self::Upstream(e.to_string()),
        }
    }
}

impl From<ConnectError> for ServerError {
    fn from(value: ConnectError) -> Self {
        match value {
            ConnectError::CorrelationMiss => {
                Self::BadRequest("No pending connection matches".to_string())
            }
            ConnectError::Spotify(e) => e.into(),
            ConnectError::Db(e) => e.into(),
            e => Self::Unknown(e.to_string()),
        }
    }
}
