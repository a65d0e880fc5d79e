//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                   - Landing page (refreshes the duplicate cache)
//! GET  /privacy            - Privacy policy
//! GET  /health             - Liveness check
//! GET  /health/ready       - Readiness check (store ping)
//! GET  /static/*           - Page script and styles
//!
//! # API (CORS, per-IP rate limit)
//! POST /api/pre-register   - Register an email (stricter per-IP limit)
//! *    /api/*              - 404 page, still counted by the API limit
//!
//! *                        - 404 page
//! ```

pub mod health;
pub mod home;
pub mod pages;
pub mod pre_register;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tower_http::{
    cors::CorsLayer,
    services::ServeDir,
    trace::{DefaultOnResponse, OnResponse, TraceLayer},
};
use tracing::Span;

use crate::config::RateLimitConfig;
use crate::middleware::{
    RateLimiter, enforce_rate_limit, request_id_middleware, security_headers_middleware,
};
use crate::state::AppState;

/// Create the API routes router.
///
/// The registration limiter wraps only `POST /pre-register`; the API limiter
/// wraps every request under the prefix, unmatched paths included.
pub fn api_routes(limits: RateLimitConfig) -> Router<AppState> {
    let register_limiter = RateLimiter::new(limits.register);
    let api_limiter = RateLimiter::new(limits.api);

    Router::new()
        .route(
            "/pre-register",
            post(pre_register::pre_register).layer(middleware::from_fn_with_state(
                register_limiter,
                enforce_rate_limit,
            )),
        )
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(api_limiter, enforce_rate_limit))
        .layer(CorsLayer::permissive())
}

/// Create all routes.
pub fn routes(limits: RateLimitConfig) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/privacy", get(pages::privacy))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .nest("/api", api_routes(limits))
}

/// Build the full application with middleware and state applied.
///
/// Sentry layers are left to the binary so tests run without a client.
/// Serve with `into_make_service_with_connect_info::<SocketAddr>()` so the
/// rate limiters can fall back to the peer address.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes(state.rate_limits()))
        .nest_service("/static", ServeDir::new(state.static_dir()))
        .fallback(pages::not_found)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
