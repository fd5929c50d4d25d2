#![allow(clippy::needless_for_each)]

use crate::account::{Accounts, MemoryAccounts, OpaqueTokenIssuer, PgAccounts};
use crate::cli::telemetry;
use crate::members::handlers::{
    health, health::__path_health, user_login, user_login::__path_login, user_register,
    user_register::__path_register,
};
use anyhow::{anyhow, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::{get, post},
    Extension, Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer,
    trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;
use url::Url;
use utoipa::OpenApi;

pub(crate) mod handlers;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

#[derive(OpenApi)]
#[openapi(
    paths(health, register, login),
    components(schemas(
        health::Health,
        user_register::Credentials,
        user_login::UserSession
    )),
    tags(
        (name = "members", description = "Membership registration and login API")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Open the account store named by `dsn`: `memory://` or a PostgreSQL URL.
/// # Errors
/// Return error if the scheme is unsupported or the database is unreachable
pub async fn accounts(dsn: &str) -> Result<Accounts> {
    let url = Url::parse(dsn).context("Invalid DSN")?;

    let accounts = match url.scheme() {
        "memory" => {
            info!("Using in-memory account store, accounts are lost on restart");
            Accounts::new(Arc::new(MemoryAccounts::new()), Arc::new(OpaqueTokenIssuer))
        }
        "postgres" | "postgresql" => Accounts::new(
            Arc::new(PgAccounts::connect(dsn).await?),
            Arc::new(OpaqueTokenIssuer),
        ),
        scheme => return Err(anyhow!("Unsupported DSN scheme: {scheme}")),
    };

    Ok(accounts)
}

/// Build the application router around `accounts`.
#[must_use]
pub fn app(accounts: Arc<Accounts>, frontend_origin: Option<HeaderValue>) -> Router {
    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_methods([Method::GET, Method::POST]);

    let cors = match frontend_origin {
        Some(origin) => cors.allow_origin(AllowOrigin::exact(origin)),
        None => cors.allow_origin(Any),
    };

    Router::new()
        .route("/", get(|| async { "🌱" }))
        .route("/api/account/register", post(handlers::register))
        .route("/api/account/login", post(handlers::login))
        .route("/health", get(handlers::health).options(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(accounts)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn new(port: u16, dsn: &str, frontend_origin: Option<String>) -> Result<()> {
    let accounts = Arc::new(accounts(dsn).await?);

    let frontend_origin = frontend_origin
        .as_deref()
        .map(self::frontend_origin)
        .transpose()?;

    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    let served = axum::serve(listener, app(accounts, frontend_origin).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await;

    // flush pending spans before exit
    telemetry::shutdown_tracer();

    served?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Reduce a frontend URL to its origin (`scheme://host[:port]`) for CORS.
fn frontend_origin(frontend_url: &str) -> Result<HeaderValue> {
    let parsed = Url::parse(frontend_url)
        .with_context(|| format!("Invalid frontend origin: {frontend_url}"))?;
    let host = parsed
        .host_str()
        .ok_or_else(|| anyhow!("Frontend origin must include a valid host: {frontend_url}"))?;
    let port = parsed
        .port()
        .map_or_else(String::new, |port| format!(":{port}"));
    let origin = format!("{}://{}{}", parsed.scheme(), host, port);
    HeaderValue::from_str(&origin).context("Failed to build frontend origin header")
}
