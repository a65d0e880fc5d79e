//! Submit the pre-registration form from the terminal.
//!
//! Drives the same submission state machine as the landing page: local
//! validation first, then `POST /api/pre-register`, then the terminal state
//! and (with `--wait`) its revert to idle.

use std::time::Instant;

use prelaunch_core::submission::{
    ButtonView, Reply, SubmissionController, SubmissionState, SubmitAction, SubmitForm,
};
use prelaunch_core::{PreRegisterRequest, PreRegisterResponse, RegistrationSource};
use thiserror::Error;
use url::Url;

const ENDPOINT: &str = "/api/pre-register";

/// Errors that can occur while registering.
#[derive(Debug, Error)]
pub enum RegisterError {
    /// Base URL is not a valid URL.
    #[error("Invalid base URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    /// The submission ended in the error state.
    #[error("{0}")]
    Failed(String),
}

/// Options for the `register` command.
#[derive(Debug, Clone)]
pub struct RegisterOptions {
    pub email: String,
    pub source: String,
    pub consent: bool,
    pub base_url: String,
    pub wait: bool,
}

/// Run one submission to completion.
///
/// Succeeds for both a new registration and an already-registered email.
///
/// # Errors
///
/// Returns `RegisterError::Failed` when the controller ends in its error
/// state, with the message the page would show.
pub async fn run(options: RegisterOptions) -> Result<(), RegisterError> {
    let endpoint = Url::parse(&options.base_url)?.join(ENDPOINT)?;
    let client = reqwest::Client::builder().build()?;

    let mut controller =
        SubmissionController::new(RegistrationSource::from_input(Some(&options.source)));
    let form = SubmitForm::new(options.email, options.consent);

    match controller.submit(&form, Instant::now()) {
        SubmitAction::Send(request) => {
            render(&controller.view());
            let reply = send(&client, endpoint, &request).await;
            controller.complete(reply, Instant::now());
        }
        SubmitAction::Rejected(reason) => {
            tracing::debug!(?reason, "Rejected before sending");
        }
        SubmitAction::Ignored => {}
    }

    let view = controller.view();
    render(&view);
    let outcome = match controller.state() {
        SubmissionState::Error { .. } => Err(RegisterError::Failed(
            view.inline_message.unwrap_or_default(),
        )),
        _ => Ok(()),
    };

    if options.wait
        && let Some(deadline) = controller.state().revert_at()
    {
        tokio::time::sleep_until(deadline.into()).await;
        if controller.tick(Instant::now()) {
            render(&controller.view());
        }
    }

    outcome
}

/// Send the request and reduce the response to what the controller needs.
async fn send(client: &reqwest::Client, endpoint: Url, request: &PreRegisterRequest) -> Reply {
    let response = match client.post(endpoint).json(request).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(error = %e, "Request failed");
            return Reply::NetworkFailure;
        }
    };

    let status = response.status().as_u16();
    match response.text().await {
        Ok(body) => reply_from(status, &body),
        Err(e) => {
            tracing::warn!(error = %e, "Could not read response body");
            Reply::NetworkFailure
        }
    }
}

/// Build a reply from a status and raw body; a non-JSON body carries no message.
fn reply_from(status: u16, body: &str) -> Reply {
    let message = serde_json::from_str::<PreRegisterResponse>(body)
        .ok()
        .map(|response| response.message);
    Reply::status(status, message)
}

#[allow(clippy::print_stdout)]
fn render(view: &ButtonView) {
    match &view.inline_message {
        Some(message) => println!("[{}] {message}", view.label),
        None => println!("[{}]", view.label),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_from_json_body() {
        let reply = reply_from(409, r#"{"message":"This email is already registered."}"#);
        assert_eq!(
            reply,
            Reply::status(409, Some("This email is already registered.".to_string()))
        );
    }

    #[test]
    fn test_reply_from_non_json_body() {
        assert_eq!(reply_from(502, "Bad Gateway"), Reply::status(502, None));
    }

    #[tokio::test]
    async fn test_missing_consent_fails_without_network() {
        let options = RegisterOptions {
            email: "user@example.com".to_string(),
            source: "cli".to_string(),
            consent: false,
            // Nothing listens here; the request must never be sent.
            base_url: "http://127.0.0.1:9".to_string(),
            wait: false,
        };

        let err = run(options).await.unwrap_err();
        assert!(matches!(err, RegisterError::Failed(_)));
    }

    #[tokio::test]
    async fn test_invalid_base_url() {
        let options = RegisterOptions {
            email: "user@example.com".to_string(),
            source: "cli".to_string(),
            consent: true,
            base_url: "not a url".to_string(),
            wait: false,
        };

        assert!(matches!(
            run(options).await,
            Err(RegisterError::InvalidUrl(_))
        ));
    }
}
