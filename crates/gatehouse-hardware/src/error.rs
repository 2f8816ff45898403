//! Error types for hardware operations.

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur while driving GPIO lines or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Edge source or pin is gone (channel closed, device unplugged).
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// GPIO write failed.
    #[error("GPIO error: {message}")]
    Gpio { message: String },

    /// Invalid data or parameters.
    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    /// Decoder or relay initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new GPIO error.
    pub fn gpio(message: impl Into<String>) -> Self {
        Self::Gpio {
            message: message.into(),
        }
    }

    /// Create a new invalid data error.
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::InvalidData {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }
}

impl From<HardwareError> for gatehouse_core::Error {
    fn from(err: HardwareError) -> Self {
        gatehouse_core::Error::Hardware(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = HardwareError::disconnected("reader 1 edge channel");
        assert_eq!(
            error.to_string(),
            "Device disconnected: reader 1 edge channel"
        );

        let error = HardwareError::invalid_data("relay 9 out of range");
        assert_eq!(error.to_string(), "Invalid data: relay 9 out of range");
    }

    #[test]
    fn test_core_error_conversion() {
        let error: gatehouse_core::Error = HardwareError::gpio("write failed").into();
        assert!(matches!(error, gatehouse_core::Error::Hardware(_)));
    }
}
