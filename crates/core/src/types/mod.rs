//! Core types for prelaunch.
//!
//! This module provides type-safe wrappers for the pre-registration domain.

pub mod api;
pub mod email;
pub mod id;
pub mod registration;
pub mod source;

pub use api::{PreRegisterRequest, PreRegisterResponse};
pub use email::{Email, EmailError};
pub use id::RegistrationId;
pub use registration::{NewPreRegistration, PreRegistration};
pub use source::RegistrationSource;
