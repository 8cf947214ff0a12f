use std::time::Duration;
use thiserror::Error;

/// Type alias for Result with SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Error types for credential acquisition and label reconciliation
#[derive(Error, Debug)]
pub enum SyncError {
    /// Missing or malformed local secret or configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Token exchange, refresh or consent failed
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// The user did not complete consent in time
    #[error("Timed out after {0:?} waiting for authorization consent")]
    ConsentTimeout(Duration),

    /// Gmail API returned an error
    #[error("Gmail API error: {0}")]
    ApiError(String),

    /// Network-related error (connection issues, timeouts, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Server returned 5xx error
    #[error("Server error (HTTP {status}): {message}")]
    ServerError { status: u16, message: String },

    /// Bad request (400)
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Forbidden (403)
    #[error("Access forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Label-related errors
    #[error("Label error: {0}")]
    LabelError(String),

    /// A reconciliation pass was aborted
    #[error("Reconciliation failed while {stage}: {source}")]
    ReconciliationError {
        stage: String,
        #[source]
        source: Box<SyncError>,
    },

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl SyncError {
    /// Wrap a failure that happened during a reconciliation pass
    pub fn reconciliation(stage: impl Into<String>, source: SyncError) -> Self {
        SyncError::ReconciliationError {
            stage: stage.into(),
            source: Box::new(source),
        }
    }

    /// Errors that must abort startup rather than leave the process degraded
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::ConfigError(_) | SyncError::AuthError(_) | SyncError::ConsentTimeout(_)
        )
    }
}

impl From<google_gmail1::Error> for SyncError {
    fn from(error: google_gmail1::Error) -> Self {
        match error {
            // HTTP response with status code (non-success responses)
            google_gmail1::Error::Failure(ref response) => {
                let status = response.status();
                let status_code = status.as_u16();
                let message = format!(
                    "HTTP {}: {}",
                    status_code,
                    status.canonical_reason().unwrap_or("Unknown")
                );

                match status_code {
                    400 => SyncError::BadRequest(message),
                    // A revoked grant surfaces here on the next call
                    401 => SyncError::AuthError(message),
                    403 => SyncError::Forbidden(message),
                    404 => SyncError::NotFound(message),
                    500..=599 => SyncError::ServerError {
                        status: status_code,
                        message,
                    },
                    _ => SyncError::ApiError(message),
                }
            }
            google_gmail1::Error::BadRequest(ref err) => SyncError::BadRequest(format!("{}", err)),
            google_gmail1::Error::HttpError(ref err) => {
                SyncError::NetworkError(format!("Connection error: {}", err))
            }
            google_gmail1::Error::Io(err) => SyncError::NetworkError(err.to_string()),
            google_gmail1::Error::MissingToken(err) => {
                SyncError::AuthError(format!("No access token available: {}", err))
            }
            _ => SyncError::ApiError(error.to_string()),
        }
    }
}
