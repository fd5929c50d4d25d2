use crate::{account::Accounts, members::GIT_COMMIT_HASH};
use axum::{
    body::Body,
    extract::Extension,
    http::{HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error};
use utoipa::ToSchema;

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Health {
    commit: String,
    name: String,
    version: String,
    database: String,
}

#[utoipa::path(
    get,
    path= "/health",
    responses (
        (status = 200, description = "Account store is healthy", body = [Health]),
        (status = 503, description = "Account store is unhealthy", body = [Health])
    ),
    tag= "health"
)]
// axum handler for health
pub async fn health(method: Method, accounts: Extension<Arc<Accounts>>) -> impl IntoResponse {
    let result = accounts.repository().ping().await.map_err(|err| {
        error!("Failed to ping account store: {:?}", err);
    });

    let health = Health {
        commit: GIT_COMMIT_HASH.to_string(),
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if result.is_ok() {
            "ok".to_string()
        } else {
            "error".to_string()
        },
    };

    let body = if method == Method::GET {
        Json(&health).into_response()
    } else {
        Body::empty().into_response()
    };

    let short_hash = if health.commit.len() > 7 {
        &health.commit[0..7]
    } else {
        ""
    };

    let headers = format!("{}:{}:{}", health.name, health.version, short_hash)
        .parse::<HeaderValue>()
        .map(|x_app_header_value| {
            debug!("X-App header: {:?}", x_app_header_value);

            let mut headers = HeaderMap::new();

            headers.insert("X-App", x_app_header_value);

            headers
        })
        .map_err(|err| {
            error!("Failed to parse X-App header: {}", err);
        });

    // Unwrap the headers or provide a default value (empty headers) in case of an error
    let headers = headers.unwrap_or_else(|()| HeaderMap::new());

    if result.is_ok() {
        debug!("Account store is healthy");
        (StatusCode::OK, headers, body)
    } else {
        debug!("Account store is unhealthy");
        (StatusCode::SERVICE_UNAVAILABLE, headers, body)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::account::{
        Account, AccountRepository, Accounts, MemoryAccounts, OpaqueTokenIssuer, RepositoryError,
    };
    use async_trait::async_trait;
    use crate::members::app;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn router() -> axum::Router {
        let accounts = Accounts::new(Arc::new(MemoryAccounts::new()), Arc::new(OpaqueTokenIssuer));
        app(Arc::new(accounts), None)
    }

    #[tokio::test]
    async fn health_get_reports_store_ok() {
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("X-App"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["database"], "ok");
        assert_eq!(health["name"], env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn health_options_has_empty_body() {
        let request = Request::builder()
            .method("OPTIONS")
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(body.is_empty());
    }

    struct UnreachableStore;

    #[async_trait]
    impl AccountRepository for UnreachableStore {
        async fn exists(&self, _username: &str) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Unavailable(sqlx::Error::PoolTimedOut))
        }

        async fn find_by_username(
            &self,
            _username: &str,
        ) -> Result<Option<Account>, RepositoryError> {
            Err(RepositoryError::Unavailable(sqlx::Error::PoolTimedOut))
        }

        async fn create(&self, _account: Account) -> Result<Account, RepositoryError> {
            Err(RepositoryError::Unavailable(sqlx::Error::PoolTimedOut))
        }

        async fn ping(&self) -> Result<(), RepositoryError> {
            Err(RepositoryError::Unavailable(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn health_reports_store_down() {
        let accounts = Accounts::new(Arc::new(UnreachableStore), Arc::new(OpaqueTokenIssuer));
        let request = Request::builder()
            .uri("/health")
            .body(Body::empty())
            .unwrap();
        let response = app(Arc::new(accounts), None)
            .oneshot(request)
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["database"], "error");
    }
}
