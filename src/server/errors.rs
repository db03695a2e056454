//! # Server Errors

use thiserror::Error;

use crate::config::ConfigError;

/// Result type for server lifecycle operations
pub type ServerResult<T> = Result<T, ServerError>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Invalid listen address {0}")]
    InvalidAddress(String),

    #[error("Failed to bind {addr}: {reason}")]
    Bind { addr: String, reason: String },

    #[error("Server terminated: {0}")]
    Serve(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ServerError {
    /// Stable code used in startup failure logs
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::InvalidAddress(_) => "FQ_SERVER_INVALID_ADDRESS",
            ServerError::Bind { .. } => "FQ_SERVER_BIND_FAILED",
            ServerError::Serve(_) => "FQ_SERVER_TERMINATED",
            ServerError::Config(_) => "FQ_SERVER_CONFIG_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(
            ServerError::InvalidAddress("x".into()).code(),
            "FQ_SERVER_INVALID_ADDRESS"
        );
        let config: ServerError = ConfigError::invalid("port").into();
        assert_eq!(config.code(), "FQ_SERVER_CONFIG_ERROR");
        assert_eq!(config.to_string(), "Invalid config: port");
    }
}
