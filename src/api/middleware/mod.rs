//! API middleware stack.
//!
//! Execution order (outermost → innermost):
//! 1. Caller identity: `X-Owner-Id` / `X-Tenant-Id` into a `Caller`
//! 2. Access log: method, path, status and owner per request

pub mod audit;
pub mod caller;
