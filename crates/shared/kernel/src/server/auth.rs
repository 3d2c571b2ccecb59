use super::state::ApiState;
use axum::extract::{Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::{Json, http::Uri};
use fgate_domain::constants::{API_KEY_HEADER, API_KEY_QUERY};
use serde_json::json;
use tracing::warn;

/// Rejects requests that do not present the shared API key.
///
/// Lookup order, first match wins: `X-API-Key`, `Authorization: Bearer <key>`, `?key=`.
pub async fn require_api_key(
    State(state): State<ApiState>,
    request: Request,
    next: Next,
) -> Response {
    let query_key = query_key(request.uri());
    let presented = presented_key(request.headers()).or(query_key.as_deref());

    if state.gate.verify(presented) {
        return next.run(request).await;
    }

    warn!(
        method = %request.method(),
        path = %request.uri().path(),
        presented = presented.is_some(),
        "Rejected unauthenticated request"
    );
    unauthorized()
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers.get(API_KEY_HEADER).and_then(|value| value.to_str().ok()).or_else(|| {
        headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
    })
}

fn query_key(uri: &Uri) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    pairs.into_iter().find(|(name, _)| name == API_KEY_QUERY).map(|(_, value)| value)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Bearer")],
        Json(json!({ "detail": "Unauthorized" })),
    )
        .into_response()
}
