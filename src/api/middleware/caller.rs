//! Caller identification middleware.
//!
//! Reads the owner and tenant ids from request headers and injects a
//! `Caller` into request extensions for downstream handlers. Requests
//! without both headers never reach a handler.

use axum::http::{HeaderMap, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::api::types::{OWNER_HEADER, TENANT_HEADER};
use crate::models::Caller;

pub async fn require_caller(mut req: Request<axum::body::Body>, next: Next) -> Response {
    match caller_from_headers(req.headers()) {
        Ok(caller) => {
            req.extensions_mut().insert(caller);
            next.run(req).await
        }
        Err(err) => err.into_response(),
    }
}

pub fn caller_from_headers(headers: &HeaderMap) -> Result<Caller, ApiError> {
    let owner_id = uuid_header(headers, OWNER_HEADER)?;
    let tenant_id = uuid_header(headers, TENANT_HEADER)?;
    Ok(Caller::new(owner_id, tenant_id))
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Uuid, ApiError> {
    let raw = headers
        .get(name)
        .ok_or_else(|| ApiError::MissingCaller(format!("{name} header missing")))?
        .to_str()
        .map_err(|_| ApiError::MissingCaller(format!("{name} header is not valid text")))?;
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::MissingCaller(format!("{name} header is not a UUID")))
}
