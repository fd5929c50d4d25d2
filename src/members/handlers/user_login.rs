use super::user_register::Credentials;
use crate::account::{Accounts, Session};
use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, instrument};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub struct UserSession {
    username: String,
    token: String,
}

impl From<Session> for UserSession {
    fn from(session: Session) -> Self {
        Self {
            username: session.username,
            token: session.token,
        }
    }
}

#[utoipa::path(
    post,
    path= "/api/account/login",
    request_body = Credentials,
    responses (
        (status = 200, description = "Login successful", body = UserSession, content_type = "application/json"),
        (status = 400, description = "Missing username or password"),
        (status = 401, description = "Invalid credentials"),
        (status = 503, description = "Account store unavailable"),
    ),
    tag= "account"
)]
// axum handler for login
#[instrument(skip(accounts, payload))]
pub async fn login(
    accounts: Extension<Arc<Accounts>>,
    payload: Option<Json<Credentials>>,
) -> Response {
    let credentials: Credentials = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload").into_response(),
    };

    debug!("credentials: {:?}", credentials);

    match accounts
        .login(&credentials.username, &credentials.password)
        .await
    {
        Ok(session) => {
            debug!("Login successful");

            (StatusCode::OK, Json(UserSession::from(session))).into_response()
        }
        Err(err) => err.into_response(),
    }
}
