//! Process wiring for the autonumber HTTP service.
//!
//! ## Structure
//!
//! - [`config`] - CLI and environment configuration.
//! - [`routes`] - axum handlers and shared state.
//! - [`error`] - mapping of numbering failures onto HTTP status codes.
//! - [`store`] - the counter backend with conflict and error accounting.
//! - [`telemetry`] - logging and optional metrics export.

pub mod config;
pub mod error;
pub mod routes;
pub mod store;
pub mod telemetry;
