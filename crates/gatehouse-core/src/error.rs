use thiserror::Error;

/// The closed error taxonomy for the access controller.
///
/// Variants map one-to-one onto the handling policy: hardware transients
/// and invalid frames are logged and absorbed near their source, remote
/// failures downgrade to the upload cache, and everything else surfaces
/// through the control plane with a specific status code.
#[derive(Error, Debug)]
pub enum Error {
    // Validation errors (HTTP 400)
    #[error("Invalid card format: {0}")]
    InvalidCardFormat(String),

    #[error("Invalid reader id: {0}")]
    InvalidReaderId(u8),

    #[error("Validation failed: {message}")]
    Validation { message: String },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Lookup failures (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    // Authentication / authorization (HTTP 401, generic on the wire)
    #[error("Authentication required")]
    Unauthorized,

    // Persistent-store write failures (HTTP 500)
    #[error("Storage error: {0}")]
    Storage(String),

    // Hardware transients
    #[error("Hardware error: {0}")]
    Hardware(String),

    // Remote document store
    #[error("Remote store error: {0}")]
    Remote(String),

    // Platform facilities that may be absent (HTTP 501)
    #[error("Not supported on this platform: {0}")]
    Unsupported(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = Error::InvalidCardFormat("empty".to_string());
        assert_eq!(error.to_string(), "Invalid card format: empty");

        let error = Error::validation("relay out of range");
        assert_eq!(error.to_string(), "Validation failed: relay out of range");

        let error = Error::Unauthorized;
        assert_eq!(error.to_string(), "Authentication required");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let error: Error = io.into();
        assert!(matches!(error, Error::Io(_)));
    }
}
