//! API endpoint handlers.
//!
//! Handlers are thin: identify the caller, call into `reports` or
//! `insights`, and shape the response.

pub mod health;
pub mod insights;
pub mod reports;
