//! Periodic refresh coordinator.
//!
//! The [`Coordinator`] owns the latest [`Snapshot`] and produces a new one
//! on every tick:
//!
//! ```text
//!   tick ──► ┌ profile ┐              ┌ stats(dongle 1) ┐
//!            │         ├─ barrier 1 ─►│ stats(dongle 2) ├─ barrier 2 ─► merge ─► publish
//!            └ devices ┘              └ stats(dongle n) ┘
//! ```
//!
//! Barrier 1 fails as a group: if either request fails the other is dropped
//! and the whole cycle fails with [`UpdateFailed`]. Barrier 2 isolates its
//! members: a failed stats request only leaves that device's `stats` empty.
//!
//! All requests of a tick run concurrently on the calling task and share the
//! API client's connection pool. The finished snapshot is published on a
//! `watch` channel in a single swap, so readers see either the previous
//! snapshot or the new one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::api::{ApiError, StatsRecord, TelemetryApi};
use crate::constants::MIN_UPDATE_INTERVAL;
use crate::snapshot::{DeviceRecord, Snapshot};

/// A refresh cycle that produced no snapshot.
#[derive(Debug)]
pub enum UpdateFailed {
    /// The server answered the profile or device-list request with an error status.
    Api(ApiError),
    /// The profile or device-list request failed without an error status
    /// (transport failure, undecodable body).
    Unexpected(ApiError),
}

impl UpdateFailed {
    /// The error that aborted the cycle.
    pub fn api_error(&self) -> &ApiError {
        match self {
            Self::Api(err) | Self::Unexpected(err) => err,
        }
    }

    /// Returns `true` if the cycle failed because the token was rejected.
    pub fn is_authentication(&self) -> bool {
        matches!(self.api_error(), ApiError::Authentication)
    }
}

impl From<ApiError> for UpdateFailed {
    fn from(err: ApiError) -> Self {
        if err.is_api_error() {
            Self::Api(err)
        } else {
            Self::Unexpected(err)
        }
    }
}

impl std::fmt::Display for UpdateFailed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api(err) => write!(f, "Error communicating with API: {err}"),
            Self::Unexpected(err) => write!(f, "Unexpected error: {err}"),
        }
    }
}

impl std::error::Error for UpdateFailed {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.api_error())
    }
}

/// Outcome of the most recent refresh cycle.
#[derive(Debug, Clone, Default)]
struct UpdateStatus {
    last_update_success: bool,
    last_error: Option<String>,
    last_success_at: Option<DateTime<Utc>>,
}

/// Runs refresh cycles and holds the latest snapshot.
#[derive(Debug)]
pub struct Coordinator {
    api: Arc<dyn TelemetryApi>,
    update_interval: Duration,
    snapshot_tx: watch::Sender<Option<Arc<Snapshot>>>,
    status: RwLock<UpdateStatus>,
}

impl Coordinator {
    /// Creates a coordinator with no snapshot yet.
    ///
    /// Intervals shorter than [`MIN_UPDATE_INTERVAL`] are raised to it.
    pub fn new(api: Arc<dyn TelemetryApi>, update_interval: Duration) -> Self {
        if update_interval < MIN_UPDATE_INTERVAL {
            log::warn!(
                "Update interval {:?} is too short, using {:?}",
                update_interval,
                MIN_UPDATE_INTERVAL
            );
        }
        let update_interval = update_interval.max(MIN_UPDATE_INTERVAL);
        let (snapshot_tx, _) = watch::channel(None);
        Self {
            api,
            update_interval,
            snapshot_tx,
            status: RwLock::new(UpdateStatus::default()),
        }
    }

    /// Interval between scheduled refreshes.
    pub fn update_interval(&self) -> Duration {
        self.update_interval
    }

    /// The most recent successful snapshot, if any.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot_tx.borrow().clone()
    }

    /// Subscribe to snapshot changes.
    ///
    /// The receiver is also notified after a failed cycle, with the value
    /// unchanged, so consumers can re-check [`Self::last_update_success`].
    pub fn subscribe(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.snapshot_tx.subscribe()
    }

    /// Whether the most recent cycle produced a snapshot.
    ///
    /// `false` before the first cycle has run.
    pub fn last_update_success(&self) -> bool {
        self.read_status().last_update_success
    }

    /// Reason the most recent cycle failed, if it did.
    pub fn last_error(&self) -> Option<String> {
        self.read_status().last_error
    }

    /// When the current snapshot was published.
    pub fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.read_status().last_success_at
    }

    fn read_status(&self) -> UpdateStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Runs one refresh cycle.
    ///
    /// On success the new snapshot replaces the previous one. On failure the
    /// previous snapshot stays in place and the failure is recorded.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, UpdateFailed> {
        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);

                // Status is written before subscribers are woken
                let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
                if !status.last_update_success && status.last_error.is_some() {
                    log::info!("Fetching comma.ai data recovered");
                }
                *status = UpdateStatus {
                    last_update_success: true,
                    last_error: None,
                    last_success_at: Some(Utc::now()),
                };
                drop(status);

                self.snapshot_tx.send_replace(Some(Arc::clone(&snapshot)));

                log::debug!(
                    "Refreshed comma.ai data: {} devices",
                    snapshot.device_count()
                );
                Ok(snapshot)
            }
            Err(err) => {
                let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
                if status.last_error.is_none() {
                    log::error!("Error fetching comma.ai data: {err}");
                } else {
                    log::debug!("Error fetching comma.ai data: {err}");
                }
                status.last_update_success = false;
                status.last_error = Some(err.to_string());
                drop(status);

                self.snapshot_tx.send_modify(|_| {});
                Err(err)
            }
        }
    }

    /// Fetches everything and builds a snapshot without publishing it.
    pub async fn fetch_snapshot(&self) -> Result<Snapshot, UpdateFailed> {
        // Barrier 1: group-fail, the sibling is dropped on the first error
        let (profile, devices) =
            tokio::try_join!(self.api.get_profile(), self.api.get_devices())?;

        let mut seen = HashSet::new();
        let dongle_ids: Vec<String> = devices
            .iter()
            .filter(|device| seen.insert(device.dongle_id.as_str()))
            .map(|device| device.dongle_id.clone())
            .collect();

        // Barrier 2: every stats request settles on its own
        let results = join_all(dongle_ids.iter().map(|id| self.device_stats(id))).await;
        let stats: HashMap<String, Option<StatsRecord>> =
            dongle_ids.into_iter().zip(results).collect();

        let devices: BTreeMap<String, DeviceRecord> = devices
            .into_iter()
            .map(|device| {
                let device_stats = stats.get(&device.dongle_id).copied().flatten();
                (
                    device.dongle_id.clone(),
                    DeviceRecord::from_descriptor(device, device_stats),
                )
            })
            .collect();

        Ok(Snapshot { profile, devices })
    }

    async fn device_stats(&self, dongle_id: &str) -> Option<StatsRecord> {
        match self.api.get_device_stats(dongle_id).await {
            Ok(stats) => Some(stats),
            Err(err) => {
                log::debug!("Could not fetch stats for device {dongle_id}: {err}");
                None
            }
        }
    }

    /// Refreshes on a fixed schedule until `shutdown` is cancelled.
    ///
    /// The first tick fires immediately unless a snapshot already exists.
    /// Cancelling during a refresh drops its in-flight requests; nothing from
    /// that cycle is published.
    pub async fn run(&self, shutdown: CancellationToken) {
        let start = if self.snapshot().is_some() {
            Instant::now() + self.update_interval
        } else {
            Instant::now()
        };
        let mut ticker = tokio::time::interval_at(start, self.update_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        log::debug!(
            "Refreshing comma.ai data every {}s",
            self.update_interval.as_secs()
        );

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    tokio::select! {
                        () = shutdown.cancelled() => break,
                        // Failures are recorded and logged by refresh()
                        _ = self.refresh() => {}
                    }
                }
            }
        }

        log::debug!("Refresh loop stopped");
    }
}
