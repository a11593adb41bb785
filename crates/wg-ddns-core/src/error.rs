//! Error types for the wg-ddns system
//!
//! This module defines all error types used throughout the crate.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for wg-ddns operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the wg-ddns system
#[derive(Error, Debug)]
pub enum Error {
    /// The service manager could not enumerate units
    #[error("Discovery error: {0}")]
    Discovery(String),

    /// A tunnel configuration file could not be read
    #[error("Config unavailable for {interface} ({}): {source}", path.display())]
    ConfigUnavailable {
        /// Interface whose configuration was requested
        interface: String,
        /// Path that was read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Hostname resolution failed
    #[error("Failed to resolve {hostname}: {message}")]
    Resolve {
        /// Hostname that was looked up
        hostname: String,
        /// Resolver diagnostic
        message: String,
    },

    /// Service manager request failed
    #[error("Service manager error: {0}")]
    ServiceManager(String),

    /// Restart job reached a terminal state other than "done"
    #[error("service restart job failed: {result}")]
    RestartFailed {
        /// Unit that was restarted
        unit: String,
        /// Literal job result reported by the service manager
        result: String,
    },

    /// An operation exceeded its time bound
    #[error("Timed out: {0}")]
    Timeout(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Create a discovery error
    pub fn discovery(msg: impl Into<String>) -> Self {
        Self::Discovery(msg.into())
    }

    /// Create a "config unavailable" error
    pub fn config_unavailable(
        interface: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::ConfigUnavailable {
            interface: interface.into(),
            path: path.into(),
            source,
        }
    }

    /// Create a resolution error
    pub fn resolve(hostname: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Resolve {
            hostname: hostname.into(),
            message: message.into(),
        }
    }

    /// Create a service manager error
    pub fn service_manager(msg: impl Into<String>) -> Self {
        Self::ServiceManager(msg.into())
    }

    /// Create a restart failure carrying the job result literal
    pub fn restart_failed(unit: impl Into<String>, result: impl Into<String>) -> Self {
        Self::RestartFailed {
            unit: unit.into(),
            result: result.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }
}
