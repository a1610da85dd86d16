//! Error types for the simulation crate.

use phylink_core::PhyError;
use thiserror::Error;

/// Link simulation error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LinkError {
    /// Rate, bandwidth or payload rejected by the PHY
    #[error(transparent)]
    Phy(#[from] PhyError),

    /// Non-finite or otherwise unusable callback input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be loaded or is inconsistent
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result type alias for link operations
pub type LinkResult<T> = std::result::Result<T, LinkError>;

/// Configuration error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("config not found: {0}")]
    NotFound(String),

    /// Failed to read or write a configuration file
    #[error("failed to read config: {0}")]
    Read(String),

    /// Failed to parse or serialize configuration
    #[error("failed to parse config: {0}")]
    Parse(String),

    /// Invalid configuration value
    #[error("invalid config: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phy_error_passthrough() {
        let err: LinkError = PhyError::Configuration("MCS 9 unsupported".into()).into();
        assert_eq!(err.to_string(), "configuration error: MCS 9 unsupported");
        assert!(matches!(err, LinkError::Phy(_)));
    }

    #[test]
    fn test_config_error_display() {
        let err: LinkError = ConfigError::Validation("noise_figure_db must be >= 0".into()).into();
        assert_eq!(err.to_string(), "invalid config: noise_figure_db must be >= 0");
    }
}
