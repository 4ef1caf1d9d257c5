//! Identity extraction and other cross-cutting concerns

use axum::{
    async_trait,
    extract::{FromRequestParts, Query, Request},
    http::{request::Parts, HeaderMap, Method, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use huddle_chats::{utils::Validator, Actor};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::error::GatewayError;

pub const TENANT_HEADER: &str = "x-tenant-id";
pub const USER_HEADER: &str = "x-user-id";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Authenticated caller as asserted by the upstream auth proxy.
///
/// Read from the `x-tenant-id`, `x-user-id`, and `x-user-name` headers.
/// Browsers cannot set headers on a websocket upgrade, so the query
/// parameters `tenant`, `user`, and `name` are accepted as a fallback.
#[derive(Debug, Clone)]
pub struct Identity(pub Actor);

#[derive(Debug, Default, Deserialize)]
struct IdentityQuery {
    tenant: Option<String>,
    user: Option<String>,
    name: Option<String>,
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = Query::<IdentityQuery>::try_from_uri(&parts.uri)
            .map(|Query(query)| query)
            .unwrap_or_default();

        let tenant_id = header_value(&parts.headers, TENANT_HEADER)
            .or(query.tenant)
            .ok_or_else(|| GatewayError::AuthenticationFailed("Missing tenant identity".to_string()))?;
        let user_id = header_value(&parts.headers, USER_HEADER)
            .or(query.user)
            .ok_or_else(|| GatewayError::AuthenticationFailed("Missing user identity".to_string()))?;
        let display_name = header_value(&parts.headers, USER_NAME_HEADER).or(query.name);

        Validator::identifier("Tenant id", &tenant_id)
            .and_then(|_| Validator::identifier("User id", &user_id))
            .map_err(|err| GatewayError::AuthenticationFailed(err.detail().to_string()))?;

        let mut actor = Actor::new(tenant_id, user_id);
        actor.display_name = display_name;
        Ok(Identity(actor))
    }
}

/// Create tracing middleware
pub fn create_trace_middleware(
) -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>>
{
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO))
}

/// Logging middleware for request/response logging
pub async fn logging_middleware(
    request: Request,
    next: Next,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let start = std::time::Instant::now();
    let response = next.run(request).await;
    let duration = start.elapsed();

    tracing::info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        duration_ms = duration.as_millis(),
        "Request completed"
    );

    Ok(response)
}

/// CORS middleware for cross-origin requests
pub fn create_cors_middleware() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    async fn identify(request: HttpRequest<()>) -> Result<Identity, GatewayError> {
        let (mut parts, _) = request.into_parts();
        Identity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_identity_from_headers() {
        let request = HttpRequest::builder()
            .uri("/api/rooms")
            .header(TENANT_HEADER, "t1")
            .header(USER_HEADER, "alice")
            .header(USER_NAME_HEADER, "Alice")
            .body(())
            .unwrap();

        let Identity(actor) = identify(request).await.unwrap();
        assert_eq!(actor, Actor::new("t1", "alice").with_display_name("Alice"));
    }

    #[tokio::test]
    async fn test_identity_from_query_for_websockets() {
        let request = HttpRequest::builder()
            .uri("/ws?tenant=t1&user=bob&name=Bob%20B")
            .body(())
            .unwrap();

        let Identity(actor) = identify(request).await.unwrap();
        assert_eq!(actor.user_id, "bob");
        assert_eq!(actor.display_name.as_deref(), Some("Bob B"));
    }

    #[tokio::test]
    async fn test_missing_identity_is_rejected() {
        let request = HttpRequest::builder()
            .uri("/api/rooms")
            .header(TENANT_HEADER, "t1")
            .body(())
            .unwrap();

        let err = identify(request).await.unwrap_err();
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    }
}
