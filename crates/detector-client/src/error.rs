//! Backend Error Types

use thiserror::Error;

/// Errors that can occur talking to the detector backend
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection or protocol failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// No response within the allotted time
    #[error("Timeout waiting for backend response after {0}ms")]
    Timeout(u64),

    /// Non-2xx status
    #[error("Backend returned status {0}")]
    Status(u16),

    /// Body did not match the expected shape
    #[error("Invalid response body: {0}")]
    Decode(String),

    /// Base URL could not be parsed or joined
    #[error("Invalid backend URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(0)
        } else if let Some(status) = err.status() {
            BackendError::Status(status.as_u16())
        } else if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else {
            BackendError::Http(err.to_string())
        }
    }
}
