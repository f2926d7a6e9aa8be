//! HTTP client for the comma.ai device API.
//!
//! This module provides the [`ApiClient`] struct which handles all HTTP
//! communication with `api.commadotai.com`.

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;

use super::error::ApiError;
use super::types::{DeviceDescriptor, DeviceLocation, Profile, StatsRecord};
use super::TelemetryApi;
use crate::constants;

/// API client for the comma.ai device API.
///
/// Holds one reqwest [`Client`] (and with it one connection pool) plus the
/// JWT it authenticates with. Cloning is cheap and clones share the pool.
/// The token cannot be changed after construction; build a new client to
/// rotate it.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    jwt_token: String,
}

impl ApiClient {
    /// Creates a client for the production API.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(jwt_token: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_base_url(constants::API_BASE_URL, jwt_token)
    }

    /// Creates a client against a different host.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_base_url(
        base_url: impl Into<String>,
        jwt_token: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(constants::HTTP_REQUEST_TIMEOUT)
            .build()?;

        Ok(Self::with_client(client, base_url, jwt_token))
    }

    /// Creates an API client with a pre-configured HTTP client.
    ///
    /// Useful for testing or when custom client configuration is needed.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        jwt_token: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            jwt_token: jwt_token.into(),
        }
    }

    /// Returns the base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Sends an authenticated request and returns the decoded JSON body.
    ///
    /// Error statuses are mapped to [`ApiError`] before the body is read.
    /// The body is returned untyped; object and array payloads both pass.
    pub async fn request(&self, method: Method, endpoint: &str) -> Result<serde_json::Value, ApiError> {
        let url = format!("{}{}", self.base_url, endpoint);
        log::debug!("{} {}", method, url);

        let response = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, format!("JWT {}", self.jwt_token))
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        if let Some(err) = ApiError::from_status(status) {
            log::debug!("{} returned {}", url, status);
            return Err(err);
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, ApiError> {
        let value = self.request(Method::GET, endpoint).await?;
        Ok(serde_json::from_value(value)?)
    }
}

#[async_trait]
impl TelemetryApi for ApiClient {
    async fn get_profile(&self) -> Result<Profile, ApiError> {
        self.get_json("/v1/me/").await
    }

    async fn get_devices(&self) -> Result<Vec<DeviceDescriptor>, ApiError> {
        self.get_json("/v1/me/devices/").await
    }

    async fn get_device_location(&self, dongle_id: &str) -> Result<DeviceLocation, ApiError> {
        self.get_json(&format!("/v1/devices/{dongle_id}/location"))
            .await
    }

    async fn get_device_stats(&self, dongle_id: &str) -> Result<StatsRecord, ApiError> {
        self.get_json(&format!("/v1.1/devices/{dongle_id}/stats"))
            .await
    }
}
