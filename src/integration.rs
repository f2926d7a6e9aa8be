//! Integration lifecycle: setting up and unloading a config entry.
//!
//! Setup validates the stored token, primes the coordinator with a first
//! refresh, and starts the periodic refresh task. Unload stops that task.
//!
//! # Usage
//!
//! ```ignore
//! let integration = integration::setup_entry(&Config::load()?).await?;
//! let snapshot = integration.coordinator().snapshot();
//! integration.unload().await;
//! ```

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::{ApiClient, ApiError, TelemetryApi};
use crate::config::Config;
use crate::coordinator::{Coordinator, UpdateFailed};

/// Reasons a config entry could not be set up.
#[derive(Debug)]
pub enum SetupError {
    /// No token has been configured.
    MissingToken,
    /// The HTTP client could not be built.
    Client(ApiError),
    /// The token did not validate against the profile endpoint.
    Authentication(ApiError),
    /// The first refresh failed; setup may be retried later.
    NotReady(UpdateFailed),
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingToken => write!(f, "No JWT token configured"),
            Self::Client(err) => write!(f, "Failed to create API client: {err}"),
            Self::Authentication(err) => write!(f, "Failed to authenticate with comma.ai: {err}"),
            Self::NotReady(err) => write!(f, "comma.ai not ready: {err}"),
        }
    }
}

impl std::error::Error for SetupError {}

/// A running integration: the API client, its coordinator, and the refresh task.
#[derive(Debug)]
pub struct Integration {
    api: Arc<dyn TelemetryApi>,
    coordinator: Arc<Coordinator>,
    shutdown: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Set up the integration for a stored config entry.
pub async fn setup_entry(entry: &Config) -> Result<Integration, SetupError> {
    if !entry.has_token() {
        return Err(SetupError::MissingToken);
    }

    log::debug!("Setting up comma.ai integration");
    let client =
        ApiClient::with_base_url(&entry.base_url, &entry.jwt_token).map_err(SetupError::Client)?;

    setup_with_api(Arc::new(client), entry.update_interval()).await
}

/// Set up the integration on top of an existing API implementation.
pub async fn setup_with_api(
    api: Arc<dyn TelemetryApi>,
    update_interval: Duration,
) -> Result<Integration, SetupError> {
    match api.get_profile().await {
        Ok(profile) => {
            log::debug!("Authenticated as user: {}", profile.username_or_default());
        }
        Err(err) => {
            log::error!("Failed to authenticate with comma.ai: {err}");
            return Err(SetupError::Authentication(err));
        }
    }

    let coordinator = Arc::new(Coordinator::new(Arc::clone(&api), update_interval));
    coordinator.refresh().await.map_err(SetupError::NotReady)?;

    let shutdown = CancellationToken::new();
    let task = tokio::spawn({
        let coordinator = Arc::clone(&coordinator);
        let shutdown = shutdown.clone();
        async move { coordinator.run(shutdown).await }
    });

    log::info!(
        "comma.ai integration ready ({} devices)",
        coordinator.snapshot().map_or(0, |s| s.device_count())
    );

    Ok(Integration {
        api,
        coordinator,
        shutdown,
        task: Some(task),
    })
}

impl Integration {
    /// The coordinator holding the latest snapshot.
    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    /// The API client shared with the coordinator.
    pub fn api(&self) -> &Arc<dyn TelemetryApi> {
        &self.api
    }

    /// Stop the refresh task and wait for it to finish.
    pub async fn unload(mut self) {
        self.shutdown.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                log::warn!("Refresh task ended abnormally: {e}");
            }
        }
        log::debug!("Unloaded comma.ai integration");
    }
}

impl Drop for Integration {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
