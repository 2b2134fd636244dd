//! Tile server internals.
//!
//! ## Structure
//!
//! - [`config`] - CLI/env parsing into a validated [`config::ServerConfig`].
//! - [`handler`] - axum router: tile endpoint, health, error mapping.
//! - [`offline`] - one-shot rendering of a single tile to a file.
//! - [`telemetry`] - logging subscriber and optional OpenTelemetry metrics.

pub mod config;
pub mod handler;
pub mod offline;
pub mod telemetry;
