//! JSON bodies exchanged on `POST /api/pre-register`.

use serde::{Deserialize, Serialize};

use super::PreRegistration;

/// Request body. `source` is optional on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreRegisterRequest {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Response body for every status the endpoint returns.
///
/// `data` is only present on `201 Created`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreRegisterResponse {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<PreRegistration>,
}

impl PreRegisterResponse {
    /// A body carrying only a message.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            data: None,
        }
    }
}
