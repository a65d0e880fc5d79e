//! Prelaunch Core - Shared types library.
//!
//! This crate provides the types used across all prelaunch components:
//! - `web` - Landing page and pre-registration API server
//! - `cli` - Terminal client and secret tooling
//!
//! # Architecture
//!
//! The core crate contains only types and state machines - no I/O, no
//! database access, no HTTP clients. Time is always passed in by the caller.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for emails, source tags, IDs and registration records
//! - [`submission`] - The client-side submit button state machine

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod submission;
pub mod types;

pub use types::*;
