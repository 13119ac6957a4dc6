//! Server configuration
//!
//! This module provides configuration options for the WebSocket server.

use pollsocket_core::error::ConfigError;
use pollsocket_core::protocol::constants::{
    DEFAULT_HANDSHAKE_TIMEOUT, DEFAULT_MAX_CONNECTIONS, DEFAULT_MAX_FRAME_SIZE,
    DEFAULT_POLL_INTERVAL,
};
use std::time::Duration;

/// Server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Listen address as `host:port`
    pub bind_address: String,
    /// Readiness wait budget; "idle" fires each time it runs out
    pub poll_interval: Duration,
    /// Maximum concurrent connections, pending handshakes included
    pub max_connections: usize,
    /// Maximum frame payload in bytes
    pub max_frame_size: usize,
    /// How long an accepted socket may take to send its upgrade request
    pub handshake_timeout: Duration,
    /// Install SIGINT/SIGTERM listeners when the server runs
    pub handle_signals: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT,
            handle_signals: true,
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(ConfigError::Validation(
                "bind_address must not be empty".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(ConfigError::Validation(
                "poll_interval must be greater than 0".to_string(),
            ));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "max_connections must be greater than 0".to_string(),
            ));
        }

        if self.max_frame_size == 0 {
            return Err(ConfigError::Validation(
                "max_frame_size must be greater than 0".to_string(),
            ));
        }

        if self.handshake_timeout.is_zero() {
            return Err(ConfigError::Validation(
                "handshake_timeout must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Convert a fractional number of seconds into a poll interval
pub fn interval_from_secs(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|_| ConfigError::InvalidValue {
        field: "poll_interval".to_string(),
        value: secs.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.poll_interval, Duration::from_secs(60));
        assert_eq!(config.max_connections, 10_000);
        assert!(config.handle_signals);
    }

    #[test]
    fn test_server_config_validation() {
        let mut config = ServerConfig::default();
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());

        config.poll_interval = Duration::from_millis(250);
        config.max_connections = 0;
        assert!(config.validate().is_err());

        config.max_connections = 16;
        config.max_frame_size = 0;
        assert!(config.validate().is_err());

        config.max_frame_size = 1024;
        config.bind_address = "  ".to_string();
        assert!(config.validate().is_err());

        config.bind_address = "127.0.0.1:0".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_fractional_interval() {
        assert_eq!(interval_from_secs(0.5).unwrap(), Duration::from_millis(500));
        assert_eq!(interval_from_secs(60.0).unwrap(), Duration::from_secs(60));
        assert!(interval_from_secs(-1.0).is_err());
        assert!(interval_from_secs(f64::NAN).is_err());
    }
}
