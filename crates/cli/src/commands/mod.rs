//! Subcommand implementations.

pub mod register;
pub mod secrets;
