//! Pre-registration API handler.

use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use prelaunch_core::{PreRegisterRequest, PreRegisterResponse};
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::state::AppState;

pub const CREATED_MESSAGE: &str = "Pre-registration complete!";

/// Register an email for launch updates.
///
/// # Errors
///
/// - 400 for an unparseable body or invalid email
/// - 409 if the email is already registered
/// - 403 if the store rejects the credential
/// - 500 for any other store failure
#[instrument(skip_all)]
pub async fn pre_register(
    State(state): State<AppState>,
    payload: std::result::Result<Json<PreRegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse> {
    let Json(request) = payload.map_err(|e| AppError::BadRequest(e.body_text()))?;

    let record = state.registrations().register(request).await?;

    Ok((
        StatusCode::CREATED,
        Json(PreRegisterResponse {
            message: CREATED_MESSAGE.to_string(),
            data: Some(record),
        }),
    ))
}
