//! Business logic services.
//!
//! # Services
//!
//! - `registration` - Validate, de-duplicate and store pre-registrations

pub mod registration;

pub use registration::{RegistrationError, RegistrationService};
