//! Request and Response models for the debug API
//!
//! This module defines the DTOs (Data Transfer Objects) used for
//! serializing/deserializing HTTP request and response bodies.

pub mod requests;
pub mod responses;

// Re-export commonly used types
pub use requests::{LocationRequest, SettingsPayload, SightingRequest};
pub use responses::{
    BeaconsResponse, ErrorResponse, EventsResponse, HealthResponse, MessageResponse,
    SightingResponse, StatsResponse,
};
