//! Location client error types.

use thiserror::Error;

pub type LocationResult<T> = Result<T, LocationError>;

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Vision API key not configured")]
    MissingApiKey,

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LocationError {
    pub fn is_retryable(&self) -> bool {
        match self {
            LocationError::ServiceUnavailable(_) => true,
            LocationError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Map a non-success HTTP status and body to an error.
    pub(crate) fn from_status(service: &str, status: reqwest::StatusCode, body: String) -> Self {
        if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            LocationError::ServiceUnavailable(format!("{} returned {}", service, status))
        } else {
            LocationError::RequestFailed(format!("{} returned {}: {}", service, status, body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_status_mapping() {
        let e = LocationError::from_status("vision", StatusCode::SERVICE_UNAVAILABLE, String::new());
        assert!(e.is_retryable());
        let e = LocationError::from_status("vision", StatusCode::FORBIDDEN, "bad key".into());
        assert!(!e.is_retryable());
        assert!(e.to_string().contains("bad key"));
        assert!(!LocationError::MissingApiKey.is_retryable());
    }
}
