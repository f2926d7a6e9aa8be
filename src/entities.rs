//! Presentation layer: what each device exposes to the host.
//!
//! Entities hold no data of their own. They name a device and a field, and
//! read the value from the coordinator's current [`Snapshot`] when asked.
//! Every device gets one [`SensorEntity`] per entry in
//! [`SENSOR_DESCRIPTIONS`] plus one [`DeviceTracker`].
//!
//! # Availability
//!
//! An entity is available when the last refresh succeeded and its device is
//! in the snapshot. A tracker additionally needs both GPS coordinates. Stats
//! sensors of a device whose stats request failed stay available but have
//! no value.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::StatsBucket;
use crate::constants::{DOMAIN, MANUFACTURER};
use crate::coordinator::Coordinator;
use crate::snapshot::{DeviceRecord, Snapshot};

/// Device registry metadata shared by all entities of a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    /// `(domain, dongle_id)`.
    pub identifiers: (String, String),
    /// Device alias.
    pub name: String,
    /// Always "comma.ai".
    pub manufacturer: String,
    /// Hardware type.
    pub model: String,
    /// openpilot version.
    pub sw_version: Option<String>,
}

impl DeviceInfo {
    /// Registry entry for `device`.
    pub fn for_device(device: &DeviceRecord) -> Self {
        Self {
            identifiers: (DOMAIN.to_string(), device.dongle_id.clone()),
            name: device.alias.clone(),
            manufacturer: MANUFACTURER.to_string(),
            model: device.device_type.clone(),
            sw_version: device.openpilot_version.clone(),
        }
    }
}

/// A sensor reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SensorValue {
    /// Free text.
    Text(String),
    /// Measured quantity.
    Number(f64),
    /// Whole count.
    Count(u64),
    /// Point in time.
    Timestamp(DateTime<Utc>),
}

impl std::fmt::Display for SensorValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Count(n) => write!(f, "{n}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339()),
        }
    }
}

/// Kind of quantity a sensor reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceClass {
    /// Point in time.
    Timestamp,
    /// Length.
    Distance,
    /// Elapsed time.
    Duration,
}

/// How a numeric sensor accumulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateClass {
    /// Resets at the start of each window.
    Total,
    /// Only ever grows.
    TotalIncreasing,
}

/// Static description of one sensor kind.
#[derive(Debug)]
pub struct SensorDescription {
    /// Unique key, also the translation key.
    pub key: &'static str,
    /// Material Design icon name.
    pub icon: Option<&'static str>,
    /// Unit of the native value.
    pub unit: Option<&'static str>,
    /// Kind of quantity, if any.
    pub device_class: Option<DeviceClass>,
    /// Accumulation, for statistics.
    pub state_class: Option<StateClass>,
    /// Decimal places suggested for display.
    pub display_precision: Option<u8>,
    /// Extracts the value from a device record.
    pub value_fn: fn(&DeviceRecord) -> Option<SensorValue>,
}

fn device_type(device: &DeviceRecord) -> Option<SensorValue> {
    Some(SensorValue::Text(device.device_type.clone()))
}

fn openpilot_version(device: &DeviceRecord) -> Option<SensorValue> {
    device.openpilot_version.clone().map(SensorValue::Text)
}

fn is_prime(device: &DeviceRecord) -> Option<SensorValue> {
    let label = if device.prime { "Yes" } else { "No" };
    Some(SensorValue::Text(label.to_string()))
}

fn last_ping(device: &DeviceRecord) -> Option<SensorValue> {
    // Seconds since epoch
    let secs = device.last_athena_ping?;
    DateTime::from_timestamp(secs, 0).map(SensorValue::Timestamp)
}

fn last_location_time(device: &DeviceRecord) -> Option<SensorValue> {
    // Milliseconds since epoch
    let millis = device.last_gps_time?;
    DateTime::from_timestamp_millis(millis).map(SensorValue::Timestamp)
}

fn all_time(device: &DeviceRecord) -> Option<StatsBucket> {
    device.stats?.all
}

fn this_week(device: &DeviceRecord) -> Option<StatsBucket> {
    device.stats?.week
}

fn total_distance(device: &DeviceRecord) -> Option<SensorValue> {
    all_time(device).map(|b| SensorValue::Number(b.distance))
}

fn total_minutes(device: &DeviceRecord) -> Option<SensorValue> {
    all_time(device).map(|b| SensorValue::Number(b.minutes))
}

fn total_routes(device: &DeviceRecord) -> Option<SensorValue> {
    all_time(device).map(|b| SensorValue::Count(b.routes))
}

fn week_distance(device: &DeviceRecord) -> Option<SensorValue> {
    this_week(device).map(|b| SensorValue::Number(b.distance))
}

fn week_minutes(device: &DeviceRecord) -> Option<SensorValue> {
    this_week(device).map(|b| SensorValue::Number(b.minutes))
}

fn week_routes(device: &DeviceRecord) -> Option<SensorValue> {
    this_week(device).map(|b| SensorValue::Count(b.routes))
}

/// Every sensor created for each device.
pub static SENSOR_DESCRIPTIONS: &[SensorDescription] = &[
    SensorDescription {
        key: "device_type",
        icon: Some("mdi:car-connected"),
        unit: None,
        device_class: None,
        state_class: None,
        display_precision: None,
        value_fn: device_type,
    },
    SensorDescription {
        key: "openpilot_version",
        icon: Some("mdi:application-cog"),
        unit: None,
        device_class: None,
        state_class: None,
        display_precision: None,
        value_fn: openpilot_version,
    },
    SensorDescription {
        key: "is_prime",
        icon: Some("mdi:crown"),
        unit: None,
        device_class: None,
        state_class: None,
        display_precision: None,
        value_fn: is_prime,
    },
    SensorDescription {
        key: "last_ping",
        icon: None,
        unit: None,
        device_class: Some(DeviceClass::Timestamp),
        state_class: None,
        display_precision: None,
        value_fn: last_ping,
    },
    SensorDescription {
        key: "last_location_time",
        icon: None,
        unit: None,
        device_class: Some(DeviceClass::Timestamp),
        state_class: None,
        display_precision: None,
        value_fn: last_location_time,
    },
    // All-time stats
    SensorDescription {
        key: "total_distance",
        icon: Some("mdi:map-marker-distance"),
        unit: Some("km"),
        device_class: Some(DeviceClass::Distance),
        state_class: Some(StateClass::TotalIncreasing),
        display_precision: Some(1),
        value_fn: total_distance,
    },
    SensorDescription {
        key: "total_minutes",
        icon: Some("mdi:clock-outline"),
        unit: Some("min"),
        device_class: Some(DeviceClass::Duration),
        state_class: Some(StateClass::TotalIncreasing),
        display_precision: None,
        value_fn: total_minutes,
    },
    SensorDescription {
        key: "total_routes",
        icon: Some("mdi:road-variant"),
        unit: None,
        device_class: None,
        state_class: Some(StateClass::TotalIncreasing),
        display_precision: None,
        value_fn: total_routes,
    },
    // Week stats
    SensorDescription {
        key: "week_distance",
        icon: Some("mdi:calendar-week"),
        unit: Some("km"),
        device_class: Some(DeviceClass::Distance),
        state_class: Some(StateClass::Total),
        display_precision: Some(1),
        value_fn: week_distance,
    },
    SensorDescription {
        key: "week_minutes",
        icon: Some("mdi:calendar-week"),
        unit: Some("min"),
        device_class: Some(DeviceClass::Duration),
        state_class: Some(StateClass::Total),
        display_precision: None,
        value_fn: week_minutes,
    },
    SensorDescription {
        key: "week_routes",
        icon: Some("mdi:calendar-week"),
        unit: None,
        device_class: None,
        state_class: Some(StateClass::Total),
        display_precision: None,
        value_fn: week_routes,
    },
];

/// One sensor of one device.
#[derive(Debug, Clone)]
pub struct SensorEntity {
    /// Device this sensor reads.
    pub dongle_id: String,
    /// What to read and how to present it.
    pub description: &'static SensorDescription,
}

impl SensorEntity {
    /// Stable id, `<dongle_id>_<key>`.
    pub fn unique_id(&self) -> String {
        format!("{}_{}", self.dongle_id, self.description.key)
    }

    /// Current value, `None` if the device or the field is missing.
    pub fn native_value(&self, snapshot: &Snapshot) -> Option<SensorValue> {
        snapshot
            .device(&self.dongle_id)
            .and_then(self.description.value_fn)
    }

    /// Value formatted with the description's display precision.
    pub fn display_value(&self, snapshot: &Snapshot) -> Option<String> {
        let value = self.native_value(snapshot)?;
        Some(match (value, self.description.display_precision) {
            (SensorValue::Number(n), Some(precision)) => {
                format!("{:.*}", usize::from(precision), n)
            }
            (value, _) => value.to_string(),
        })
    }

    /// Last refresh succeeded and the device is in its snapshot.
    pub fn available(&self, coordinator: &Coordinator) -> bool {
        coordinator.last_update_success()
            && coordinator
                .snapshot()
                .is_some_and(|s| s.device(&self.dongle_id).is_some())
    }
}

/// GPS position of one device.
#[derive(Debug, Clone)]
pub struct DeviceTracker {
    /// Device this tracker follows.
    pub dongle_id: String,
}

impl DeviceTracker {
    /// Stable id, `<dongle_id>_tracker`.
    pub fn unique_id(&self) -> String {
        format!("{}_tracker", self.dongle_id)
    }

    /// Location source reported to the host.
    pub fn source_type(&self) -> &'static str {
        "gps"
    }

    /// Latitude of the last GPS fix.
    pub fn latitude(&self, snapshot: &Snapshot) -> Option<f64> {
        snapshot.device(&self.dongle_id)?.last_gps_lat
    }

    /// Longitude of the last GPS fix.
    pub fn longitude(&self, snapshot: &Snapshot) -> Option<f64> {
        snapshot.device(&self.dongle_id)?.last_gps_lng
    }

    /// Accuracy radius in meters, 0 when unknown.
    pub fn location_accuracy(&self, snapshot: &Snapshot) -> f64 {
        snapshot
            .device(&self.dongle_id)
            .and_then(|d| d.last_gps_accuracy)
            .unwrap_or(0.0)
    }

    /// Last refresh succeeded and the device has a GPS fix.
    pub fn available(&self, coordinator: &Coordinator) -> bool {
        coordinator.last_update_success()
            && coordinator
                .snapshot()
                .and_then(|s| s.device(&self.dongle_id).map(DeviceRecord::has_gps_fix))
                .unwrap_or(false)
    }
}

/// All entities of one device.
#[derive(Debug, Clone)]
pub struct DeviceEntities {
    /// Registry metadata.
    pub info: DeviceInfo,
    /// One per [`SENSOR_DESCRIPTIONS`] entry.
    pub sensors: Vec<SensorEntity>,
    /// GPS tracker.
    pub tracker: DeviceTracker,
}

/// Build entities for every device in `snapshot`.
///
/// Devices that appear in later snapshots get no entities until this is
/// called again.
pub fn entities_for(snapshot: &Snapshot) -> Vec<DeviceEntities> {
    snapshot
        .devices
        .values()
        .map(|device| DeviceEntities {
            info: DeviceInfo::for_device(device),
            sensors: SENSOR_DESCRIPTIONS
                .iter()
                .map(|description| SensorEntity {
                    dongle_id: device.dongle_id.clone(),
                    description,
                })
                .collect(),
            tracker: DeviceTracker {
                dongle_id: device.dongle_id.clone(),
            },
        })
        .collect()
}
