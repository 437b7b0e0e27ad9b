//! HTTP layer: router, handlers and middleware

pub mod handlers;
pub mod middleware;
pub mod routes;

use crate::state::AppState;
use axum::{http::HeaderValue, routing::get, Router};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o.trim() == "*") {
        return layer.allow_origin(Any);
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(parsed))
}

pub fn create_router(state: AppState) -> Router {
    let server = &state.config.server;
    let cors = cors_layer(&server.cors_origins);
    let body_limit = RequestBodyLimitLayer::new(server.max_request_body_size);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/ready", get(handlers::health::ready))
        .nest("/api", routes::api_routes())
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(body_limit)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
