//! comma.ai API module.
//!
//! This module provides everything needed to talk to the device API:
//!
//! - HTTP client (`ApiClient`)
//! - Response data types (`Profile`, `DeviceDescriptor`, ...)
//! - Error taxonomy (`ApiError`)
//!
//! # Architecture
//!
//! The coordinator depends on the [`TelemetryApi`] trait, not on
//! `ApiClient` directly. `ApiClient` is the production implementation;
//! anything else that can answer the four calls can drive a coordinator.
//!
//! # Modules
//!
//! - [`client`] - HTTP client
//! - [`types`] - Response data types
//! - [`error`] - Error taxonomy

pub mod client;
pub mod error;
pub mod types;

use async_trait::async_trait;

pub use client::ApiClient;
pub use error::ApiError;
pub use types::{DeviceDescriptor, DeviceLocation, Profile, StatsBucket, StatsRecord};

/// The four read operations the device API offers.
///
/// Implementations must be shareable across concurrently running requests
/// and must not mutate any state a sibling request could observe.
#[async_trait]
pub trait TelemetryApi: Send + Sync + std::fmt::Debug {
    /// Fetch the authenticated account's profile.
    ///
    /// # Errors
    ///
    /// Returns an [`ApiError`] for error statuses, transport failures, or
    /// an undecodable body.
    async fn get_profile(&self) -> Result<Profile, ApiError>;

    /// List the devices the account owns or can read.
    async fn get_devices(&self) -> Result<Vec<DeviceDescriptor>, ApiError>;

    /// Fetch the last reported location of one device.
    async fn get_device_location(&self, dongle_id: &str) -> Result<DeviceLocation, ApiError>;

    /// Fetch driving statistics of one device.
    async fn get_device_stats(&self, dongle_id: &str) -> Result<StatsRecord, ApiError>;
}
