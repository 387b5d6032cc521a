//! WhatsBox HTTP server library.
//!
//! Exposed as a library so integration tests can assemble the full router
//! against a fake upstream session; the `whatsbox` binary lives in
//! `main.rs`.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod jobs;
pub mod middleware;
pub mod setup;
pub mod state;
pub mod telemetry;
