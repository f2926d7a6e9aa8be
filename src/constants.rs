//! Application-wide constants for comma-bridge.
//!
//! Centralizes the API location, refresh schedule, and the labels used
//! when presenting devices to the host.
//!
//! # Categories
//!
//! - **API**: Base URL and request timeout
//! - **Polling**: Refresh interval
//! - **Presentation**: Integration domain and device metadata

use std::time::Duration;

// ============================================================================
// API
// ============================================================================

/// Base URL of the comma.ai device API.
pub const API_BASE_URL: &str = "https://api.commadotai.com";

/// HTTP client request timeout for API calls.
///
/// Applies to each request individually. A hung request fails the sub-fetch
/// it belongs to instead of stalling the whole refresh cycle.
pub const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ============================================================================
// Polling
// ============================================================================

/// Interval between coordinator refresh cycles.
pub const UPDATE_INTERVAL: Duration = Duration::from_secs(60);

/// Shortest interval the coordinator will schedule.
pub const MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Presentation
// ============================================================================

/// Integration domain, used as the namespace for device identifiers.
pub const DOMAIN: &str = "comma";

/// Manufacturer reported for every device.
pub const MANUFACTURER: &str = "comma.ai";

/// Alias used when the device list omits one.
pub const DEFAULT_ALIAS: &str = "Unknown";

/// Device type used when the device list omits one.
pub const DEFAULT_DEVICE_TYPE: &str = "unknown";

/// Username used when the profile omits one.
pub const DEFAULT_USERNAME: &str = "Unknown";
