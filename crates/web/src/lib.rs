//! Pre-registration landing page server library.
//!
//! This crate provides the server as a library so the binary and the
//! integration tests build the exact same application.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod state;
pub mod store;

pub use routes::app;
pub use state::AppState;
