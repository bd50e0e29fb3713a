//! Request DTOs for the proxy API
//!
//! Turns an incoming mutating HTTP request into the pieces
//! `OfflineQueue::perform_request` needs.

use axum::http::HeaderMap;
use serde_json::Value;

use crate::transport::HttpMethod;

/// Header carrying the JSON to return if the request ends up queued
pub const OPTIMISTIC_HEADER: &str = "x-optimistic-response";

/// Response header set to `true` when the request was queued, not sent
pub const QUEUED_HEADER: &str = "x-request-queued";

/// A mutation forwarded through the proxy
///
/// # Fields
/// - `method`: upstream method, never GET
/// - `url`: upstream path including the query string
/// - `body`: JSON body, `None` for an empty body
/// - `optimistic`: response to hand back if the request is queued
#[derive(Debug, Clone, PartialEq)]
pub struct MutationRequest {
    pub method: HttpMethod,
    pub url: String,
    pub body: Option<Value>,
    pub optimistic: Option<Value>,
}

impl MutationRequest {
    /// Builds and validates a mutation.
    ///
    /// Returns an error message if validation fails.
    pub fn from_parts(
        method: HttpMethod,
        url: impl Into<String>,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<Self, String> {
        if !method.is_mutating() {
            return Err(format!("{} is not a mutation", method));
        }

        let body = if body.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(
                serde_json::from_slice(body)
                    .map_err(|e| format!("Request body is not valid JSON: {}", e))?,
            )
        };

        let optimistic = match headers.get(OPTIMISTIC_HEADER) {
            Some(raw) => {
                let raw = raw
                    .to_str()
                    .map_err(|_| format!("{} header is not valid UTF-8", OPTIMISTIC_HEADER))?;
                Some(
                    serde_json::from_str(raw)
                        .map_err(|e| format!("{} header is not valid JSON: {}", OPTIMISTIC_HEADER, e))?,
                )
            }
            None => None,
        };

        Ok(Self {
            method,
            url: url.into(),
            body,
            optimistic,
        })
    }
}
