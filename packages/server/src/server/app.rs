//! Application setup and server configuration.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::kernel::ServerDeps;
use crate::server::middleware::{extract_client_ip, jwt_auth_middleware};
use crate::server::routes::{
    audit_query_handler, check_handler, effective_grants_handler, grant_role_handler,
    health_handler, me_handler, revoke_role_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub server_deps: Arc<ServerDeps>,
    /// Only used by the health check; absent in in-memory setups.
    pub db_pool: Option<PgPool>,
}

/// Build the Axum application router
pub fn build_app(
    server_deps: ServerDeps,
    db_pool: Option<PgPool>,
    allowed_origins: &[String],
) -> Router {
    let jwt_service = server_deps.jwt_service.clone();

    let app_state = AppState {
        server_deps: Arc::new(server_deps),
        db_pool,
    };

    Router::new()
        .route("/health", get(health_handler))
        .route("/authz/check", post(check_handler))
        .route("/authz/me", get(me_handler))
        .route("/roles/grants", post(grant_role_handler))
        .route("/roles/grants/:id/revoke", post(revoke_role_handler))
        .route(
            "/roles/subjects/:subject/effective",
            get(effective_grants_handler),
        )
        .route("/audit", get(audit_query_handler))
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service.clone(), req, next)
        }))
        .layer(middleware::from_fn(extract_client_ip))
        .layer(Extension(app_state))
        .layer(cors_layer(allowed_origins))
        .layer(TimeoutLayer::new(Duration::from_secs(10)))
        .layer(TraceLayer::new_for_http())
}

/// CORS for the admin UI. No configured origins means any origin (development).
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    if allowed_origins.is_empty() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(origins))
}
