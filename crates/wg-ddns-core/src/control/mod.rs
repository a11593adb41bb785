//! Control surface handler logic
//!
//! Transport-independent implementation of the operator requests: listing
//! the monitored endpoints and forcing a restart of one interface. The HTTP
//! crate maps [`ControlError`] variants to status codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::registry::{EndpointRegistry, MonitoredEndpoint};
use crate::restart::RestartCoordinator;

/// One monitored endpoint as exposed to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceInfo {
    pub interface: String,
    pub endpoint: String,
    pub hostname: String,
    pub last_ip: Option<String>,
    pub last_changed: Option<DateTime<Utc>>,
}

impl From<MonitoredEndpoint> for InterfaceInfo {
    fn from(endpoint: MonitoredEndpoint) -> Self {
        Self {
            interface: endpoint.interface,
            endpoint: endpoint.raw_endpoint,
            hostname: endpoint.hostname,
            last_ip: endpoint.last_resolved.map(|ip| ip.to_string()),
            last_changed: endpoint.last_changed,
        }
    }
}

/// Listing of all monitored endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfacesResponse {
    pub single_interface_mode: bool,
    pub monitored_interface: Option<String>,
    pub interfaces: Vec<InterfaceInfo>,
    pub total_count: usize,
}

/// Request to restart one interface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartRequest {
    pub interface: String,
}

/// Result of a restart request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestartResponse {
    pub success: bool,
    pub message: String,
}

impl RestartResponse {
    /// Failure response carrying the error message
    pub fn failure(error: &ControlError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
        }
    }
}

/// Reasons a control request is refused or fails
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ControlError {
    /// Body missing, malformed, or naming no interface
    #[error("Invalid request format")]
    InvalidRequest,

    /// Pinned mode and the request names another interface
    #[error("Only interface '{pinned}' is monitored")]
    NotAllowed { pinned: String },

    /// Interface is not in the registry
    #[error("Interface '{0}' not found in monitored interfaces")]
    NotFound(String),

    /// The restart itself failed
    #[error("Failed to restart interface: {0}")]
    RestartFailed(String),
}

/// Handler logic shared by every control transport
#[derive(Clone)]
pub struct ControlPlane {
    registry: EndpointRegistry,
    coordinator: RestartCoordinator,
    pinned: Option<String>,
}

impl ControlPlane {
    /// Create a control plane over the engine's registry and coordinator
    pub fn new(
        registry: EndpointRegistry,
        coordinator: RestartCoordinator,
        pinned: Option<String>,
    ) -> Self {
        Self {
            registry,
            coordinator,
            pinned,
        }
    }

    /// List the monitored endpoints from a registry snapshot
    pub async fn list(&self) -> InterfacesResponse {
        let interfaces: Vec<InterfaceInfo> = self
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(InterfaceInfo::from)
            .collect();

        InterfacesResponse {
            single_interface_mode: self.pinned.is_some(),
            monitored_interface: self.pinned.clone(),
            total_count: interfaces.len(),
            interfaces,
        }
    }

    /// Restart the interface named in `request`
    ///
    /// The interface must be monitored, and in pinned mode it must be the
    /// pinned interface. Names are compared exactly as sent. Nothing reaches
    /// the service manager otherwise.
    pub async fn restart(&self, request: RestartRequest) -> Result<RestartResponse, ControlError> {
        let interface = request.interface.as_str();
        if interface.is_empty() {
            return Err(ControlError::InvalidRequest);
        }

        if let Some(pinned) = &self.pinned {
            if interface != pinned {
                return Err(ControlError::NotAllowed {
                    pinned: pinned.clone(),
                });
            }
        }

        if !self.registry.contains(interface).await {
            return Err(ControlError::NotFound(interface.to_string()));
        }

        info!("API restart requested for interface {}", interface);
        match self.coordinator.restart(interface).await {
            Ok(()) => {
                info!("Successfully restarted interface {} via API", interface);
                Ok(RestartResponse {
                    success: true,
                    message: format!("Interface '{interface}' restarted successfully"),
                })
            }
            Err(e) => {
                warn!("API restart of interface {} failed: {}", interface, e);
                Err(ControlError::RestartFailed(e.to_string()))
            }
        }
    }
}
