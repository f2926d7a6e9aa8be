//! Error taxonomy for the comma.ai API client.

/// Errors returned by [`ApiClient`](super::ApiClient) requests.
///
/// The first four variants come from an HTTP status the server sent back.
/// `Transport` and `InvalidResponse` mean no usable answer arrived at all.
#[derive(Debug)]
pub enum ApiError {
    /// HTTP 401: the JWT was rejected.
    Authentication,
    /// HTTP 403: the token is valid but may not read this resource.
    Authorization,
    /// HTTP 404: the resource does not exist.
    NotFound,
    /// Any other HTTP status at or above 400.
    Status(u16),
    /// Connection, timeout, or body read failure.
    Transport(reqwest::Error),
    /// A success response whose body did not match the expected shape.
    InvalidResponse(serde_json::Error),
}

impl ApiError {
    /// Map an HTTP status code to its error, or `None` for non-error codes.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            401 => Some(Self::Authentication),
            403 => Some(Self::Authorization),
            404 => Some(Self::NotFound),
            s if s >= 400 => Some(Self::Status(s)),
            _ => None,
        }
    }

    /// Returns `true` if the server answered with an error status.
    ///
    /// Transport and decode failures return `false`.
    pub fn is_api_error(&self) -> bool {
        matches!(
            self,
            Self::Authentication | Self::Authorization | Self::NotFound | Self::Status(_)
        )
    }

    /// The HTTP status behind this error, if there was one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication => Some(401),
            Self::Authorization => Some(403),
            Self::NotFound => Some(404),
            Self::Status(code) => Some(*code),
            Self::Transport(err) => err.status().map(|s| s.as_u16()),
            Self::InvalidResponse(_) => None,
        }
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Authentication => write!(f, "Invalid JWT token"),
            Self::Authorization => write!(f, "Access forbidden"),
            Self::NotFound => write!(f, "Resource not found"),
            Self::Status(code) => write!(f, "API error: {code}"),
            Self::Transport(err) => write!(f, "Transport error: {err}"),
            Self::InvalidResponse(err) => write!(f, "Invalid response body: {err}"),
        }
    }
}

impl std::error::Error for ApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Transport(err) => Some(err),
            Self::InvalidResponse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err)
    }
}
