use thiserror::Error;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors from the JSON persistence layer.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Wrap an IO error with the path it occurred on.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<StorageError> for gatehouse_core::Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => gatehouse_core::Error::NotFound(what),
            StorageError::Validation(message) => gatehouse_core::Error::Validation { message },
            other => gatehouse_core::Error::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = StorageError::NotFound("card 123".to_string());
        assert_eq!(error.to_string(), "Record not found: card 123");
    }

    #[test]
    fn test_core_error_mapping() {
        let error: gatehouse_core::Error = StorageError::NotFound("x".into()).into();
        assert!(matches!(error, gatehouse_core::Error::NotFound(_)));

        let error: gatehouse_core::Error = StorageError::validation("bad").into();
        assert!(matches!(error, gatehouse_core::Error::Validation { .. }));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let error: gatehouse_core::Error = StorageError::io("/tmp/users.json", io).into();
        assert!(matches!(error, gatehouse_core::Error::Storage(_)));
    }
}
