//! API Module
//!
//! HTTP handlers and routing for the beacon debug API. An external scanner
//! process posts sightings; operators inspect the cache and the delegate
//! events.

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
