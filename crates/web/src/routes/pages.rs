//! Static page route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{http::StatusCode, response::IntoResponse};
use tracing::instrument;

/// Privacy policy template.
#[derive(Template, WebTemplate)]
#[template(path = "privacy.html")]
pub struct PrivacyTemplate;

/// Not-found page template.
#[derive(Template, WebTemplate)]
#[template(path = "404.html")]
pub struct NotFoundTemplate;

/// Display the privacy policy.
#[instrument]
pub async fn privacy() -> impl IntoResponse {
    PrivacyTemplate
}

/// Fallback for every unmatched route.
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, NotFoundTemplate)
}
