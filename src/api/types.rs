//! Response types for the comma.ai device API.
//!
//! These mirror what the server sends. Every field the server may omit or
//! send as `null` is an `Option`; defaults are applied later, when the
//! coordinator turns a [`DeviceDescriptor`] into a snapshot record.

use serde::{Deserialize, Serialize};

/// Account information from `GET /v1/me/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Account username.
    #[serde(default)]
    pub username: Option<String>,
    /// Remaining account attributes, passed through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Profile {
    /// Username, or `"Unknown"` when the account has none.
    pub fn username_or_default(&self) -> &str {
        self.username
            .as_deref()
            .unwrap_or(crate::constants::DEFAULT_USERNAME)
    }
}

/// One entry of `GET /v1/me/devices/`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DeviceDescriptor {
    /// Unique device identifier.
    pub dongle_id: String,
    /// User-assigned nickname.
    #[serde(default)]
    pub alias: Option<String>,
    /// Hardware type, e.g. "neo", "three".
    #[serde(default)]
    pub device_type: Option<String>,
    /// Authenticated user has write access.
    #[serde(default)]
    pub is_owner: Option<bool>,
    /// Device has an owner.
    #[serde(default)]
    pub is_paired: Option<bool>,
    /// Device has a prime subscription.
    #[serde(default)]
    pub prime: Option<bool>,
    /// Latitude of the last GPS fix.
    #[serde(default)]
    pub last_gps_lat: Option<f64>,
    /// Longitude of the last GPS fix.
    #[serde(default)]
    pub last_gps_lng: Option<f64>,
    /// Milliseconds since epoch.
    #[serde(default)]
    pub last_gps_time: Option<i64>,
    /// Meters per second.
    #[serde(default)]
    pub last_gps_speed: Option<f64>,
    /// Degrees from north.
    #[serde(default)]
    pub last_gps_bearing: Option<f64>,
    /// Meters. The server has used both spellings.
    #[serde(default, alias = "last_gps_accur")]
    pub last_gps_accuracy: Option<f64>,
    /// Seconds since epoch of the last athena heartbeat.
    #[serde(default)]
    pub last_athena_ping: Option<i64>,
    /// Installed openpilot version.
    #[serde(default)]
    pub openpilot_version: Option<String>,
}

/// Response of `GET /v1/devices/{dongle_id}/location`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceLocation {
    /// Device the fix belongs to.
    #[serde(default)]
    pub dongle_id: Option<String>,
    /// Latitude.
    #[serde(default)]
    pub lat: Option<f64>,
    /// Longitude.
    #[serde(default)]
    pub lng: Option<f64>,
    /// Milliseconds since epoch.
    #[serde(default)]
    pub time: Option<i64>,
    /// Accuracy radius in meters.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// Meters per second.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Degrees from north.
    #[serde(default)]
    pub bearing: Option<f64>,
}

/// Driving totals for one time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsBucket {
    /// Distance driven, in kilometers.
    #[serde(default)]
    pub distance: f64,
    /// Time driven, in minutes.
    #[serde(default)]
    pub minutes: f64,
    /// Number of recorded drives.
    #[serde(default)]
    pub routes: u64,
}

/// Response of `GET /v1.1/devices/{dongle_id}/stats`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsRecord {
    /// All-time totals.
    #[serde(default)]
    pub all: Option<StatsBucket>,
    /// Totals for the current week.
    #[serde(default)]
    pub week: Option<StatsBucket>,
}
