//! HTTP boundary.
//!
//! Exposes report upload and the read operations as JSON endpoints under
//! `/api/`. Every route except `/api/health` acts for the caller named by
//! the `X-Owner-Id` and `X-Tenant-Id` headers.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{start_api_server, ApiServer};
pub use types::ApiContext;
