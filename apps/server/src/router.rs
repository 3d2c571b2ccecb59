use anyhow::{Context, Result};
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::middleware;
use fgate_domain::config::CorsConfig;
use fgate_domain::constants::API_KEY_HEADER;
use fgate_kernel::server::{ApiState, require_api_key, system_router};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

const API_KEY_SCHEME: &str = "api_key";

#[derive(OpenApi)]
#[openapi(
    info(title = "FileGate", description = "Scoped file server: list, stream, upload and manage files under one root."),
    modifiers(&ApiKeyScheme),
)]
struct ApiDoc;

struct ApiKeyScheme;

impl Modify for ApiKeyScheme {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.components.get_or_insert_with(Default::default).add_security_scheme(
            API_KEY_SCHEME,
            SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(API_KEY_HEADER))),
        );
    }
}

/// Assembles the service: open system routes, key-guarded file routes and the Scalar UI.
pub(crate) fn init(state: ApiState) -> Result<Router> {
    let body_limit = usize::try_from(state.config.storage.max_upload_bytes).unwrap_or(usize::MAX);
    let cors = cors_layer(&state.config.security.cors)?;

    let files = fgate_files::router()
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let (openapi_routes, api_doc) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(system_router())
        .merge(files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .split_for_parts();

    let app = Router::new().merge(openapi_routes).merge(Scalar::with_url("/api", api_doc));

    Ok(match cors {
        Some(cors) => app.layer(cors),
        None => app,
    })
}

/// `None` when no origin is configured.
pub(crate) fn cors_layer(cfg: &CorsConfig) -> Result<Option<CorsLayer>> {
    if cfg.allowed_origins.is_empty() {
        return Ok(None);
    }

    let origin = if cfg.allows_any() {
        AllowOrigin::from(Any)
    } else {
        let origins = cfg
            .allowed_origins
            .iter()
            .map(|origin| {
                HeaderValue::from_str(origin)
                    .with_context(|| format!("Invalid CORS origin '{origin}'"))
            })
            .collect::<Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };

    Ok(Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([
                header::AUTHORIZATION,
                header::CONTENT_TYPE,
                header::RANGE,
                HeaderName::from_static(API_KEY_HEADER),
            ])
            .expose_headers([
                header::ACCEPT_RANGES,
                header::CONTENT_DISPOSITION,
                header::CONTENT_LENGTH,
                header::CONTENT_RANGE,
            ]),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_origins_disable_cors() {
        assert!(cors_layer(&CorsConfig::default()).unwrap().is_none());
    }

    #[test]
    fn wildcard_and_lists_build() {
        let any = CorsConfig { allowed_origins: vec!["*".to_owned()] };
        assert!(cors_layer(&any).unwrap().is_some());

        let list = CorsConfig {
            allowed_origins: vec!["https://a.example".to_owned(), "http://localhost:3000".to_owned()],
        };
        assert!(cors_layer(&list).unwrap().is_some());
    }

    #[test]
    fn invalid_origin_is_rejected() {
        let bad = CorsConfig { allowed_origins: vec!["bad\norigin".to_owned()] };
        assert!(cors_layer(&bad).is_err());
    }
}
