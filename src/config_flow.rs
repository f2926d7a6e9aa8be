//! Settings flow: validating a token before it is stored.
//!
//! A candidate JWT is checked against the profile endpoint. Failures are
//! reduced to the two categories a user can act on:
//!
//! - `invalid_auth`: the server answered with an error status
//! - `cannot_connect`: no usable answer arrived

use crate::api::{ApiError, Profile, TelemetryApi};
use crate::config::Config;

/// Account resolved from a valid token.
#[derive(Debug, Clone)]
pub struct AccountInfo {
    /// Username, `"Unknown"` if the profile has none.
    pub username: String,
    /// Full profile as returned by the server.
    pub profile: Profile,
}

/// Why a candidate token was rejected.
#[derive(Debug)]
pub enum ValidationError {
    /// The server rejected the token or the request.
    InvalidAuth(ApiError),
    /// The server could not be reached or sent garbage.
    CannotConnect(ApiError),
}

impl ValidationError {
    /// Error key shown next to the form field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidAuth(_) => "invalid_auth",
            Self::CannotConnect(_) => "cannot_connect",
        }
    }
}

impl From<ApiError> for ValidationError {
    fn from(err: ApiError) -> Self {
        if err.is_api_error() {
            Self::InvalidAuth(err)
        } else {
            Self::CannotConnect(err)
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAuth(err) => write!(f, "invalid_auth: {err}"),
            Self::CannotConnect(err) => write!(f, "cannot_connect: {err}"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors from creating or updating a config entry.
#[derive(Debug)]
pub enum FlowError {
    /// The token did not validate.
    Invalid(ValidationError),
    /// An entry for this account already exists.
    AlreadyConfigured(String),
}

impl std::fmt::Display for FlowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Invalid(err) => write!(f, "{err}"),
            Self::AlreadyConfigured(username) => {
                write!(f, "already_configured: account {username} is already set up")
            }
        }
    }
}

impl std::error::Error for FlowError {}

impl From<ValidationError> for FlowError {
    fn from(err: ValidationError) -> Self {
        Self::Invalid(err)
    }
}

/// Check a token by fetching the profile it belongs to.
pub async fn validate_credential(api: &dyn TelemetryApi) -> Result<AccountInfo, ValidationError> {
    match api.get_profile().await {
        Ok(profile) => {
            let username = profile.username_or_default().to_string();
            log::debug!("Successfully authenticated as: {username}");
            Ok(AccountInfo { username, profile })
        }
        Err(err) => {
            let err = ValidationError::from(err);
            log::error!("Token validation failed: {err}");
            Err(err)
        }
    }
}

/// Validate `token` and build a new config entry from `current`.
///
/// `api` must be a client built with `token`. The resolved username becomes
/// the entry's unique id; setting up the account `current` already holds is
/// refused.
pub async fn create_entry(
    api: &dyn TelemetryApi,
    token: &str,
    current: &Config,
) -> Result<Config, FlowError> {
    let account = validate_credential(api).await?;

    if current.has_token() && current.username.as_deref() == Some(account.username.as_str()) {
        return Err(FlowError::AlreadyConfigured(account.username));
    }

    Ok(Config {
        jwt_token: token.to_string(),
        username: Some(account.username),
        ..current.clone()
    })
}

/// Validate a replacement `token` for an existing entry.
///
/// Returns the entry with the new token. The caller must build a new client
/// from it; running clients keep the token they were created with.
pub async fn reconfigure_entry(
    api: &dyn TelemetryApi,
    token: &str,
    entry: &Config,
) -> Result<Config, FlowError> {
    let account = validate_credential(api).await?;

    if let Some(existing) = entry.username.as_deref() {
        if existing != account.username {
            log::warn!(
                "New token belongs to {}, entry was set up for {}",
                account.username,
                existing
            );
        }
    }

    Ok(Config {
        jwt_token: token.to_string(),
        username: entry.username.clone().or(Some(account.username)),
        ..entry.clone()
    })
}
