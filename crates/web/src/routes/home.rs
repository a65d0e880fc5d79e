//! Landing page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use prelaunch_core::submission::{DEFAULT_SOURCE, REVERT_DELAY, SubmissionController};
use tracing::instrument;

use crate::state::AppState;

/// Landing page template.
#[derive(Template, WebTemplate)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub source: &'static str,
    pub idle_label: &'static str,
    pub revert_ms: u128,
}

impl Default for IndexTemplate {
    fn default() -> Self {
        Self {
            source: DEFAULT_SOURCE,
            idle_label: SubmissionController::IDLE_LABEL,
            revert_ms: REVERT_DELAY.as_millis(),
        }
    }
}

/// Display the landing page.
///
/// Each visit clears the duplicate cache and reloads it from the store in
/// the background; the page never waits for the reload.
#[instrument(skip(state))]
pub async fn home(State(state): State<AppState>) -> impl IntoResponse {
    drop(state.registrations().refresh_cache());
    IndexTemplate::default()
}
