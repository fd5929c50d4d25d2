use super::user_login::UserSession;
use crate::account::Accounts;
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::{fmt, sync::Arc};
use tracing::{debug, instrument};
use utoipa::ToSchema;

/// Username and password sent by register and login.
#[derive(ToSchema, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[utoipa::path(
    post,
    path= "/api/account/register",
    request_body = Credentials,
    responses (
        (status = 200, description = "Registration successful", body = UserSession, content_type = "application/json"),
        (status = 400, description = "Missing username or password"),
        (status = 409, description = "Username is taken"),
        (status = 503, description = "Account store unavailable"),
    ),
    tag= "account"
)]
// axum handler for register
#[instrument(skip(accounts, payload))]
pub async fn register(
    accounts: Extension<Arc<Accounts>>,
    payload: Option<Json<Credentials>>,
) -> Response {
    let credentials: Credentials = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload").into_response(),
    };

    debug!("credentials: {:?}", credentials);

    match accounts
        .register(&credentials.username, &credentials.password)
        .await
    {
        Ok(session) => (StatusCode::OK, Json(UserSession::from(session))).into_response(),
        Err(err) => err.into_response(),
    }
}
