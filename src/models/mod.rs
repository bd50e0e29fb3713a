//! Request and Response models for the proxy API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{MutationRequest, OPTIMISTIC_HEADER, QUEUED_HEADER};
pub use responses::{ClearResponse, ErrorResponse, HealthResponse, StatsResponse, SyncResponse};
