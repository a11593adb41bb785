//! Drift detection
//!
//! One pass resolves every registered hostname, compares the result with
//! the recorded address and restarts the tunnel of every endpoint that
//! drifted.
//!
//! The recorded address advances before the restart is issued. A restart
//! that fails is therefore not retried on the next pass; only a further
//! change of the resolved address triggers another attempt.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

use super::{EngineEvent, emit_event};
use crate::registry::{AddressUpdate, EndpointRegistry, MonitoredEndpoint, display_address};
use crate::restart::RestartCoordinator;
use crate::traits::Resolver;

/// Counters for one detection pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Endpoints examined
    pub checked: usize,
    /// Endpoints whose address advanced
    pub changed: usize,
    /// Endpoints skipped because the lookup failed
    pub resolution_failures: usize,
    /// Restarts whose job finished with `done`
    pub restarts_succeeded: usize,
    /// Restarts that failed, timed out or could not be issued
    pub restarts_failed: usize,
}

/// Resolve-compare-restart loop over the registry
#[derive(Clone)]
pub struct ChangeDetector {
    registry: EndpointRegistry,
    resolver: Arc<dyn Resolver>,
    coordinator: RestartCoordinator,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl ChangeDetector {
    /// Create a new detector
    pub fn new(
        registry: EndpointRegistry,
        resolver: Arc<dyn Resolver>,
        coordinator: RestartCoordinator,
        event_tx: mpsc::Sender<EngineEvent>,
    ) -> Self {
        Self {
            registry,
            resolver,
            coordinator,
            event_tx,
        }
    }

    /// Run one pass over every registered endpoint, in registry order
    ///
    /// Errors never escape a pass: each endpoint is handled on its own and
    /// its outcome is counted in the returned summary.
    pub async fn check_all(&self) -> PassSummary {
        let endpoints = self.registry.snapshot().await;
        let mut summary = PassSummary::default();

        for endpoint in &endpoints {
            summary.checked += 1;
            self.check_endpoint(endpoint, &mut summary).await;
        }

        summary
    }

    async fn check_endpoint(&self, endpoint: &MonitoredEndpoint, summary: &mut PassSummary) {
        let current = match self.resolver.resolve_ipv4(&endpoint.hostname).await {
            Ok(ip) => ip,
            Err(e) => {
                warn!(
                    "Failed to resolve {} (interface: {}): {}",
                    endpoint.hostname, endpoint.interface, e
                );
                summary.resolution_failures += 1;
                emit_event(
                    &self.event_tx,
                    EngineEvent::ResolutionFailed {
                        interface: endpoint.interface.clone(),
                        hostname: endpoint.hostname.clone(),
                        error: e.to_string(),
                    },
                );
                return;
            }
        };

        let previous = match self.registry.record_address(&endpoint.interface, current).await {
            AddressUpdate::Changed { previous } => previous,
            AddressUpdate::Unchanged => {
                debug!(
                    "No change for {}: {} (interface: {})",
                    endpoint.hostname, current, endpoint.interface
                );
                return;
            }
            AddressUpdate::Unknown => {
                debug!("Interface {} is no longer monitored", endpoint.interface);
                return;
            }
        };

        summary.changed += 1;
        warn!(
            "IP change detected for {}: {} -> {} (interface: {})",
            endpoint.hostname,
            display_address(previous),
            current,
            endpoint.interface
        );
        emit_event(
            &self.event_tx,
            EngineEvent::ChangeDetected {
                interface: endpoint.interface.clone(),
                hostname: endpoint.hostname.clone(),
                previous,
                current,
            },
        );

        match self.coordinator.restart(&endpoint.interface).await {
            Ok(()) => {
                warn!("Successfully restarted interface {}", endpoint.interface);
                summary.restarts_succeeded += 1;
                emit_event(
                    &self.event_tx,
                    EngineEvent::RestartSucceeded {
                        interface: endpoint.interface.clone(),
                    },
                );
            }
            Err(e) => {
                error!("Failed to restart interface {}: {}", endpoint.interface, e);
                summary.restarts_failed += 1;
                emit_event(
                    &self.event_tx,
                    EngineEvent::RestartFailed {
                        interface: endpoint.interface.clone(),
                        reason: e.to_string(),
                    },
                );
            }
        }
    }
}
