//! Aggregated refresh results.
//!
//! A [`Snapshot`] is what one successful refresh cycle produces: the account
//! profile plus one [`DeviceRecord`] per device. Snapshots are built whole
//! and never edited afterwards; the coordinator publishes them behind an
//! `Arc` and swaps in a new one each cycle.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::api::{DeviceDescriptor, Profile, StatsRecord};
use crate::constants::{DEFAULT_ALIAS, DEFAULT_DEVICE_TYPE};

/// One tracked device with defaults applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecord {
    /// Unique device identifier.
    pub dongle_id: String,
    /// Display name, `"Unknown"` if the device has none.
    pub alias: String,
    /// Hardware type, `"unknown"` if not reported.
    pub device_type: String,
    /// Authenticated user has write access.
    pub is_owner: bool,
    /// Device has an owner.
    pub is_paired: bool,
    /// Prime subscription active.
    pub prime: bool,
    /// Latitude of the last GPS fix.
    pub last_gps_lat: Option<f64>,
    /// Longitude of the last GPS fix.
    pub last_gps_lng: Option<f64>,
    /// Milliseconds since epoch.
    pub last_gps_time: Option<i64>,
    /// Meters per second.
    pub last_gps_speed: Option<f64>,
    /// Degrees from north.
    pub last_gps_bearing: Option<f64>,
    /// Accuracy radius in meters.
    pub last_gps_accuracy: Option<f64>,
    /// Seconds since epoch.
    pub last_athena_ping: Option<i64>,
    /// Installed openpilot version.
    pub openpilot_version: Option<String>,
    /// `None` when the stats request for this device failed.
    pub stats: Option<StatsRecord>,
}

impl DeviceRecord {
    /// Build a record from a device-list entry and its stats result.
    pub fn from_descriptor(device: DeviceDescriptor, stats: Option<StatsRecord>) -> Self {
        Self {
            dongle_id: device.dongle_id,
            alias: device.alias.unwrap_or_else(|| DEFAULT_ALIAS.to_string()),
            device_type: device
                .device_type
                .unwrap_or_else(|| DEFAULT_DEVICE_TYPE.to_string()),
            is_owner: device.is_owner.unwrap_or(false),
            is_paired: device.is_paired.unwrap_or(false),
            prime: device.prime.unwrap_or(false),
            last_gps_lat: device.last_gps_lat,
            last_gps_lng: device.last_gps_lng,
            last_gps_time: device.last_gps_time,
            last_gps_speed: device.last_gps_speed,
            last_gps_bearing: device.last_gps_bearing,
            last_gps_accuracy: device.last_gps_accuracy,
            last_athena_ping: device.last_athena_ping,
            openpilot_version: device.openpilot_version,
            stats,
        }
    }

    /// Returns `true` if both coordinates of the last GPS fix are known.
    pub fn has_gps_fix(&self) -> bool {
        self.last_gps_lat.is_some() && self.last_gps_lng.is_some()
    }
}

/// Result of one complete refresh cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    /// Account the token belongs to.
    pub profile: Profile,
    /// Devices keyed by `dongle_id`.
    pub devices: BTreeMap<String, DeviceRecord>,
}

impl Snapshot {
    /// Look up a device by its `dongle_id`.
    pub fn device(&self, dongle_id: &str) -> Option<&DeviceRecord> {
        self.devices.get(dongle_id)
    }

    /// Number of devices in the snapshot.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }
}
