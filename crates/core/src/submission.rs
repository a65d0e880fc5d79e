//! Client-side submission controller for the pre-registration form.
//!
//! Drives the submit button through
//! `Idle -> Validating -> Submitting -> {Success | Duplicate | Error}`.
//! Every terminal state reverts to `Idle` once its deadline passes; the
//! caller advances time by calling [`SubmissionController::tick`].
//!
//! The controller never performs I/O. [`SubmissionController::submit`] hands
//! back the request to send, and the caller reports what happened through
//! [`SubmissionController::complete`].
//!
//! ```
//! use std::time::{Duration, Instant};
//! use prelaunch_core::submission::{Reply, SubmitAction, SubmitForm, SubmissionController};
//!
//! let mut controller = SubmissionController::default();
//! let now = Instant::now();
//!
//! let action = controller.submit(&SubmitForm::new("User@Example.com", true), now);
//! assert!(matches!(action, SubmitAction::Send(_)));
//!
//! controller.complete(Reply::status(201, None), now);
//! assert!(controller.view().clear_input);
//!
//! controller.tick(now + Duration::from_secs(3));
//! assert!(controller.is_idle());
//! ```

use std::borrow::Cow;
use std::collections::HashSet;
use std::time::{Duration, Instant};

use crate::types::{Email, PreRegisterRequest, RegistrationSource};

/// How long a terminal state stays on screen before reverting to idle.
pub const REVERT_DELAY: Duration = Duration::from_secs(3);

/// Source tag the landing page form sends.
pub const DEFAULT_SOURCE: &str = "founders_register";

/// What the user entered when activating the button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitForm {
    pub email: String,
    pub consent: bool,
}

impl SubmitForm {
    #[must_use]
    pub fn new(email: impl Into<String>, consent: bool) -> Self {
        Self {
            email: email.into(),
            consent,
        }
    }
}

/// Outcome of a network round trip as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The server answered with a status and, possibly, a `message` field.
    Status { status: u16, message: Option<String> },
    /// The request never produced a readable response.
    NetworkFailure,
}

impl Reply {
    #[must_use]
    pub const fn status(status: u16, message: Option<String>) -> Self {
        Self::Status { status, message }
    }
}

/// Why a submission ended in the error state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Privacy consent box was not checked.
    ConsentMissing,
    /// Address failed the local shape check.
    InvalidEmail,
    /// Address was already accepted earlier in this session.
    AlreadySubmitted,
    /// Server answered 400.
    Rejected,
    /// Server answered 429.
    RateLimited,
    /// Server answered 500.
    ServerError,
    /// No response could be read.
    Network,
    /// Any other status.
    Unexpected { status: u16, message: Option<String> },
}

impl FailureReason {
    /// Inline message shown under the input.
    #[must_use]
    pub fn message(&self) -> Cow<'static, str> {
        match self {
            Self::ConsentMissing => Cow::Borrowed(
                "Please agree to the collection and use of your personal information.",
            ),
            Self::InvalidEmail => Cow::Borrowed("Please enter a valid email address."),
            Self::AlreadySubmitted => Cow::Borrowed("This email has already been submitted."),
            Self::Rejected => {
                Cow::Borrowed("That email doesn't look valid. Please check it and try again.")
            }
            Self::RateLimited => {
                Cow::Borrowed("Too many requests were detected. Please try again in an hour.")
            }
            Self::ServerError => {
                Cow::Borrowed("Something went wrong on our side. Please try again shortly.")
            }
            Self::Network => Cow::Borrowed("Please check your network connection."),
            Self::Unexpected { message, .. } => message.clone().map_or(
                Cow::Borrowed("An unknown error occurred."),
                Cow::Owned,
            ),
        }
    }
}

/// Controller state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Validating,
    Submitting { email: Email },
    Success { revert_at: Instant },
    Duplicate { message: String, revert_at: Instant },
    Error { reason: FailureReason, revert_at: Instant },
}

impl SubmissionState {
    /// Deadline after which the state reverts to idle, if any.
    #[must_use]
    pub const fn revert_at(&self) -> Option<Instant> {
        match self {
            Self::Success { revert_at }
            | Self::Duplicate { revert_at, .. }
            | Self::Error { revert_at, .. } => Some(*revert_at),
            Self::Idle | Self::Validating | Self::Submitting { .. } => None,
        }
    }
}

/// What the caller should do after activating the button.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitAction {
    /// A submission is already in flight or on screen; nothing happens.
    Ignored,
    /// Local validation failed; no request is sent.
    Rejected(FailureReason),
    /// Send this body to `POST /api/pre-register`.
    Send(PreRegisterRequest),
}

/// Visual tone of the button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Neutral,
    Success,
    Duplicate,
    Error,
}

/// Everything the page needs to render the button and inline message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ButtonView {
    pub label: &'static str,
    pub tone: Tone,
    pub disabled: bool,
    pub inline_message: Option<String>,
    pub clear_input: bool,
}

/// Submit button state machine with a session-local cache of accepted addresses.
#[derive(Debug)]
pub struct SubmissionController {
    state: SubmissionState,
    accepted: HashSet<Email>,
    source: RegistrationSource,
}

impl Default for SubmissionController {
    fn default() -> Self {
        Self::new(RegistrationSource::from_input(Some(DEFAULT_SOURCE)))
    }
}

impl SubmissionController {
    pub const IDLE_LABEL: &'static str = "Pre-register now";
    pub const BUSY_LABEL: &'static str = "Processing...";
    pub const SUCCESS_LABEL: &'static str = "Registered";
    pub const DUPLICATE_LABEL: &'static str = "Already registered";
    pub const ERROR_LABEL: &'static str = "Save failed";

    /// Fallback text when a 409 carries no message.
    pub const DUPLICATE_FALLBACK: &'static str = "This email is already registered.";

    /// Create a controller that tags submissions with `source`.
    #[must_use]
    pub fn new(source: RegistrationSource) -> Self {
        Self {
            state: SubmissionState::Idle,
            accepted: HashSet::new(),
            source,
        }
    }

    #[must_use]
    pub const fn state(&self) -> &SubmissionState {
        &self.state
    }

    #[must_use]
    pub const fn is_idle(&self) -> bool {
        matches!(self.state, SubmissionState::Idle)
    }

    /// Whether `email` was accepted or confirmed duplicate earlier in this session.
    #[must_use]
    pub fn knows(&self, email: &Email) -> bool {
        self.accepted.contains(email)
    }

    /// Activate the submit button.
    pub fn submit(&mut self, form: &SubmitForm, now: Instant) -> SubmitAction {
        // Re-entrancy guard: stays closed until the terminal state reverts.
        if !self.is_idle() {
            return SubmitAction::Ignored;
        }

        self.state = SubmissionState::Validating;

        if !form.consent {
            return self.reject(FailureReason::ConsentMissing, now);
        }

        let Ok(email) = Email::parse(&form.email) else {
            return self.reject(FailureReason::InvalidEmail, now);
        };

        if self.accepted.contains(&email) {
            return self.reject(FailureReason::AlreadySubmitted, now);
        }

        let request = PreRegisterRequest {
            email: email.as_str().to_owned(),
            source: Some(self.source.as_str().to_owned()),
        };
        self.state = SubmissionState::Submitting { email };
        SubmitAction::Send(request)
    }

    /// Report the result of the request returned by [`Self::submit`].
    ///
    /// Replies that arrive while not submitting are ignored.
    pub fn complete(&mut self, reply: Reply, now: Instant) -> &SubmissionState {
        let email = match &self.state {
            SubmissionState::Submitting { email } => email.clone(),
            _ => return &self.state,
        };

        let revert_at = now + REVERT_DELAY;
        self.state = match reply {
            Reply::Status { status: 201, .. } => {
                self.accepted.insert(email);
                SubmissionState::Success { revert_at }
            }
            Reply::Status {
                status: 409,
                message,
            } => {
                self.accepted.insert(email);
                SubmissionState::Duplicate {
                    message: message.unwrap_or_else(|| Self::DUPLICATE_FALLBACK.to_owned()),
                    revert_at,
                }
            }
            Reply::Status { status, message } => SubmissionState::Error {
                reason: match status {
                    400 => FailureReason::Rejected,
                    429 => FailureReason::RateLimited,
                    500 => FailureReason::ServerError,
                    _ => FailureReason::Unexpected { status, message },
                },
                revert_at,
            },
            Reply::NetworkFailure => SubmissionState::Error {
                reason: FailureReason::Network,
                revert_at,
            },
        };

        &self.state
    }

    /// Advance time. Returns `true` if the controller reverted to idle.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.state.revert_at() {
            Some(deadline) if now >= deadline => {
                self.state = SubmissionState::Idle;
                true
            }
            _ => false,
        }
    }

    /// Render the current state.
    #[must_use]
    pub fn view(&self) -> ButtonView {
        match &self.state {
            SubmissionState::Idle | SubmissionState::Validating => ButtonView {
                label: Self::IDLE_LABEL,
                tone: Tone::Neutral,
                disabled: false,
                inline_message: None,
                clear_input: false,
            },
            SubmissionState::Submitting { .. } => ButtonView {
                label: Self::BUSY_LABEL,
                tone: Tone::Neutral,
                disabled: true,
                inline_message: None,
                clear_input: false,
            },
            SubmissionState::Success { .. } => ButtonView {
                label: Self::SUCCESS_LABEL,
                tone: Tone::Success,
                disabled: true,
                inline_message: None,
                clear_input: true,
            },
            SubmissionState::Duplicate { message, .. } => ButtonView {
                label: Self::DUPLICATE_LABEL,
                tone: Tone::Duplicate,
                disabled: true,
                inline_message: Some(message.clone()),
                clear_input: false,
            },
            SubmissionState::Error { reason, .. } => ButtonView {
                label: Self::ERROR_LABEL,
                tone: Tone::Error,
                disabled: true,
                inline_message: Some(reason.message().into_owned()),
                clear_input: false,
            },
        }
    }

    fn reject(&mut self, reason: FailureReason, now: Instant) -> SubmitAction {
        self.state = SubmissionState::Error {
            reason: reason.clone(),
            revert_at: now + REVERT_DELAY,
        };
        SubmitAction::Rejected(reason)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn send(controller: &mut SubmissionController, email: &str, now: Instant) -> PreRegisterRequest {
        match controller.submit(&SubmitForm::new(email, true), now) {
            SubmitAction::Send(request) => request,
            other => panic!("expected Send, got {other:?}"),
        }
    }

    #[test]
    fn test_happy_path_normalizes_and_tags() {
        let mut controller = SubmissionController::default();
        let now = Instant::now();

        let request = send(&mut controller, " User@Example.com ", now);
        assert_eq!(request.email, "user@example.com");
        assert_eq!(request.source.as_deref(), Some(DEFAULT_SOURCE));

        let view = controller.view();
        assert!(view.disabled);
        assert_eq!(view.label, SubmissionController::BUSY_LABEL);

        controller.complete(Reply::status(201, None), now);
        let view = controller.view();
        assert_eq!(view.tone, Tone::Success);
        assert!(view.clear_input);
        assert!(controller.knows(&Email::parse("user@example.com").unwrap()));
    }

    #[test]
    fn test_terminal_state_reverts_after_delay() {
        let mut controller = SubmissionController::default();
        let now = Instant::now();
        send(&mut controller, "user@example.com", now);
        controller.complete(Reply::status(500, None), now);

        assert!(!controller.tick(now + Duration::from_millis(2999)));
        assert!(!controller.is_idle());
        assert!(controller.tick(now + REVERT_DELAY));
        assert!(controller.is_idle());
        assert_eq!(controller.view().inline_message, None);
    }

    #[test]
    fn test_reentrant_activation_is_ignored() {
        let mut controller = SubmissionController::default();
        let now = Instant::now();
        send(&mut controller, "user@example.com", now);

        let second = controller.submit(&SubmitForm::new("other@example.com", true), now);
        assert_eq!(second, SubmitAction::Ignored);

        // Still ignored while the result is on screen.
        controller.complete(Reply::status(201, None), now);
        let third = controller.submit(&SubmitForm::new("other@example.com", true), now);
        assert_eq!(third, SubmitAction::Ignored);
    }

    #[test]
    fn test_missing_consent_fails_closed() {
        let mut controller = SubmissionController::default();
        let now = Instant::now();

        let action = controller.submit(&SubmitForm::new("user@example.com", false), now);
        assert_eq!(action, SubmitAction::Rejected(FailureReason::ConsentMissing));
        assert_eq!(controller.view().tone, Tone::Error);
        assert!(controller.state().revert_at().is_some());
    }

    #[test]
    fn test_malformed_email_fails_closed() {
        let mut controller = SubmissionController::default();
        let action = controller.submit(&SubmitForm::new("a@b", true), Instant::now());
        assert_eq!(action, SubmitAction::Rejected(FailureReason::InvalidEmail));
    }

    #[test]
    fn test_locally_known_address_is_not_resent() {
        let mut controller = SubmissionController::default();
        let now = Instant::now();
        send(&mut controller, "user@example.com", now);
        controller.complete(Reply::status(201, None), now);
        controller.tick(now + REVERT_DELAY);

        let action = controller.submit(&SubmitForm::new("USER@example.com", true), now + REVERT_DELAY);
        assert_eq!(action, SubmitAction::Rejected(FailureReason::AlreadySubmitted));
    }

    #[test]
    fn test_duplicate_reply_is_remembered_and_shows_server_message() {
        let mut controller = SubmissionController::default();
        let now = Instant::now();
        send(&mut controller, "dup@example.com", now);
        controller.complete(
            Reply::status(409, Some("This email is already registered.".to_owned())),
            now,
        );

        let view = controller.view();
        assert_eq!(view.tone, Tone::Duplicate);
        assert_eq!(view.label, SubmissionController::DUPLICATE_LABEL);
        assert_eq!(
            view.inline_message.as_deref(),
            Some("This email is already registered.")
        );
        assert!(controller.knows(&Email::parse("dup@example.com").unwrap()));
    }

    #[test]
    fn test_status_specific_error_messages() {
        let cases = [
            (400, FailureReason::Rejected),
            (429, FailureReason::RateLimited),
            (500, FailureReason::ServerError),
        ];

        for (status, expected) in cases {
            let mut controller = SubmissionController::default();
            let now = Instant::now();
            send(&mut controller, "user@example.com", now);
            let state = controller.complete(Reply::status(status, None), now).clone();
            assert!(
                matches!(&state, SubmissionState::Error { reason, .. } if *reason == expected),
                "status {status} gave {state:?}"
            );
            // Errors do not mark the address as known; the user may retry.
            assert!(!controller.knows(&Email::parse("user@example.com").unwrap()));
        }
    }

    #[test]
    fn test_unexpected_status_uses_server_message() {
        let mut controller = SubmissionController::default();
        let now = Instant::now();
        send(&mut controller, "user@example.com", now);
        controller.complete(Reply::status(403, Some("Permission error".to_owned())), now);
        assert_eq!(
            controller.view().inline_message.as_deref(),
            Some("Permission error")
        );
    }

    #[test]
    fn test_network_failure() {
        let mut controller = SubmissionController::default();
        let now = Instant::now();
        send(&mut controller, "user@example.com", now);
        controller.complete(Reply::NetworkFailure, now);
        assert_eq!(
            controller.view().inline_message.as_deref(),
            Some("Please check your network connection.")
        );
    }

    #[test]
    fn test_stray_reply_is_ignored() {
        let mut controller = SubmissionController::default();
        let state = controller.complete(Reply::status(201, None), Instant::now());
        assert_eq!(*state, SubmissionState::Idle);
    }
}
