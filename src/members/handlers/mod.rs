pub mod health;
pub use self::health::health;

pub mod user_register;
pub use self::user_register::register;

pub mod user_login;
pub use self::user_login::login;

// common functions for the handlers
use crate::account::AccountError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

impl IntoResponse for AccountError {
    fn into_response(self) -> Response {
        match self {
            Self::MalformedInput(message) => (StatusCode::BAD_REQUEST, message).into_response(),
            Self::UsernameTaken => (StatusCode::CONFLICT, "Username is taken").into_response(),
            Self::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid credentials").into_response()
            }
            Self::StoreUnavailable(err) => {
                error!("Account store unavailable: {err:?}");
                StatusCode::SERVICE_UNAVAILABLE.into_response()
            }
            Self::Hashing(err) => {
                error!("Password hashing failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Credential(err) => {
                error!("Credential check failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
            Self::Token(err) => {
                error!("Token issuance failed: {err}");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
