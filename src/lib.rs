//! comma-bridge - comma.ai device telemetry for home automation.
//!
//! This crate polls the comma.ai device API and turns the answers into
//! per-device sensor and tracker readings a home-automation host can show.
//!
//! # Architecture
//!
//! - **ApiClient** - Typed REST client, one connection pool, static JWT
//! - **Coordinator** - Periodic refresh; fans out requests, builds snapshots
//! - **Snapshot** - Immutable result of one refresh cycle
//! - **Entities** - Read-only views over the latest snapshot
//!
//! # Modules
//!
//! - [`api`] - comma.ai API client, types and errors
//! - [`coordinator`] - Refresh coordinator
//! - [`snapshot`] - Snapshot and device records
//! - [`entities`] - Sensor and tracker descriptions
//! - [`integration`] - Setup and unload of a config entry
//! - [`config_flow`] - Token validation before storing it
//! - [`config`] - Configuration loading/saving

pub mod api;
pub mod config;
pub mod config_flow;
pub mod constants;
pub mod coordinator;
pub mod entities;
pub mod integration;
pub mod snapshot;

// Re-export commonly used types
pub use api::{ApiClient, ApiError, TelemetryApi};
pub use config::Config;
pub use coordinator::{Coordinator, UpdateFailed};
pub use integration::Integration;
pub use snapshot::{DeviceRecord, Snapshot};
