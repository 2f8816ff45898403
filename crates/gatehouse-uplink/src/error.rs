use thiserror::Error;

/// Result type alias for upload operations.
pub type UplinkResult<T> = std::result::Result<T, UplinkError>;

/// Errors from the remote document store.
#[derive(Debug, Error)]
pub enum UplinkError {
    #[error("Remote write failed: {message}")]
    WriteFailed { message: String },

    #[error("Remote write timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Remote client not initialized")]
    NotInitialized,
}

impl UplinkError {
    /// Create a new write-failed error.
    pub fn write_failed(message: impl Into<String>) -> Self {
        Self::WriteFailed {
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }
}

impl From<UplinkError> for gatehouse_core::Error {
    fn from(err: UplinkError) -> Self {
        gatehouse_core::Error::Remote(err.to_string())
    }
}
