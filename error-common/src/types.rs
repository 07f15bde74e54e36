use thiserror::Error;

/// Top-level error enum for gateway start-up and serving
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Socket binding and transport failures
    #[error("Network error: {0}")]
    NetworkError(String),

    /// HTTP server runtime errors
    #[error("Server error: {0}")]
    ServerError(String),

    /// Missing or malformed settings
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type alias for gateway operations
pub type Result<T> = std::result::Result<T, GatewayError>;
