//! Monitor engine
//!
//! The MonitorEngine owns the registry and drives the [`ChangeDetector`] on a
//! fixed period until cancelled:
//! - Populating the registry through the [`InterfaceDiscoverer`]
//! - Running one detection pass per tick
//! - Re-discovering interfaces on request, between passes
//!
//! ## Architecture
//!
//! ```text
//!                  ┌──────────────────────┐
//!   tick / rescan ─│    MonitorEngine     │── EngineEvent ──▶ observers
//!                  └──────────────────────┘
//!                     │               │
//!                     ▼               ▼
//!          ┌────────────────┐  ┌────────────────┐
//!          │ ChangeDetector │  │  Interface     │
//!          │ (one pass)     │  │  Discoverer    │
//!          └────────────────┘  └────────────────┘
//!             │          │             │
//!             ▼          ▼             ▼
//!      ┌──────────┐ ┌───────────┐ ┌──────────────────┐
//!      │ Resolver │ │ Restart   │ │ EndpointRegistry │
//!      └──────────┘ │Coordinator│ └──────────────────┘
//!                   └───────────┘
//! ```
//!
//! ## Scheduling
//!
//! The first pass runs one period after start. A pass that overruns the
//! period delays the next tick instead of producing a burst, so passes never
//! overlap. Cancellation is observed between passes: a pass in progress
//! always completes.

mod detector;

pub use detector::{ChangeDetector, PassSummary};

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, mpsc};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::control::ControlPlane;
use crate::discovery::InterfaceDiscoverer;
use crate::error::Result;
use crate::registry::EndpointRegistry;
use crate::restart::RestartCoordinator;
use crate::traits::{Resolver, ServiceManager};

/// Events emitted by the MonitorEngine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Engine started
    Started { endpoints: usize },

    /// A detection pass began
    PassStarted,

    /// A hostname resolved to a new address
    ChangeDetected {
        interface: String,
        hostname: String,
        previous: Option<Ipv4Addr>,
        current: Ipv4Addr,
    },

    /// A hostname could not be resolved; its record is untouched
    ResolutionFailed {
        interface: String,
        hostname: String,
        error: String,
    },

    /// Restart job finished with `done`
    RestartSucceeded { interface: String },

    /// Restart job failed or could not be issued
    RestartFailed { interface: String, reason: String },

    /// A detection pass finished
    PassCompleted { summary: PassSummary },

    /// The registry was rebuilt from a new discovery
    Rediscovered { endpoints: usize },

    /// Engine stopped
    Stopped { reason: String },
}

/// Handle used to request a re-discovery from outside the engine
///
/// Requests arriving while a pass runs are remembered and served once the
/// pass completes. Several requests collapse into one.
#[derive(Clone)]
pub struct RescanHandle {
    notify: Arc<Notify>,
}

impl RescanHandle {
    /// Request a re-discovery
    pub fn trigger(&self) {
        self.notify.notify_one();
    }
}

/// Core monitoring engine
///
/// ## Lifecycle
///
/// 1. Create with [`MonitorEngine::new()`]
/// 2. Populate the registry with [`MonitorEngine::discover()`]
/// 3. Run with [`MonitorEngine::run()`] until the token is cancelled
pub struct MonitorEngine {
    discoverer: InterfaceDiscoverer,
    registry: EndpointRegistry,
    coordinator: RestartCoordinator,
    detector: ChangeDetector,
    check_interval: Duration,
    pinned: Option<String>,
    rescan: Arc<Notify>,
    event_tx: mpsc::Sender<EngineEvent>,
}

impl MonitorEngine {
    /// Create a new engine
    ///
    /// # Parameters
    ///
    /// - `config`: Monitor configuration, validated here
    /// - `manager`: Service manager owning the tunnel units
    /// - `resolver`: Hostname resolver
    ///
    /// # Returns
    ///
    /// A tuple of (engine, event_receiver) where event_receiver yields engine events
    pub fn new(
        config: &MonitorConfig,
        manager: Arc<dyn ServiceManager>,
        resolver: Arc<dyn Resolver>,
    ) -> Result<(Self, mpsc::Receiver<EngineEvent>)> {
        config.validate()?;

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let registry = EndpointRegistry::new();
        let coordinator = RestartCoordinator::from_config(config, manager.clone());
        let discoverer = InterfaceDiscoverer::from_config(config, manager, resolver.clone());
        let detector = ChangeDetector::new(
            registry.clone(),
            resolver,
            coordinator.clone(),
            tx.clone(),
        );

        let engine = Self {
            discoverer,
            registry,
            coordinator,
            detector,
            check_interval: config.check_interval,
            pinned: config.single_interface.clone(),
            rescan: Arc::new(Notify::new()),
            event_tx: tx,
        };

        Ok((engine, rx))
    }

    /// Shared registry of monitored endpoints
    pub fn registry(&self) -> &EndpointRegistry {
        &self.registry
    }

    /// Control-surface handler bound to this engine's state
    pub fn control_plane(&self) -> ControlPlane {
        ControlPlane::new(
            self.registry.clone(),
            self.coordinator.clone(),
            self.pinned.clone(),
        )
    }

    /// Handle for requesting re-discovery
    pub fn rescan_handle(&self) -> RescanHandle {
        RescanHandle {
            notify: self.rescan.clone(),
        }
    }

    /// Populate the registry from a fresh discovery
    ///
    /// # Returns
    ///
    /// - `Ok(count)`: Number of monitored endpoints
    /// - `Err(Error::Discovery)`: The service manager could not be queried
    pub async fn discover(&self) -> Result<usize> {
        let endpoints = self.discoverer.discover().await?;
        let count = endpoints.len();
        self.registry.replace(endpoints).await;
        Ok(count)
    }

    /// Run the scheduler until `shutdown` is cancelled
    ///
    /// # Returns
    ///
    /// - `Ok(())`: Clean shutdown
    pub async fn run(&self, shutdown: CancellationToken) -> Result<()> {
        let endpoints = self.registry.len().await;
        info!(
            "Starting endpoint monitor ({} endpoints, check interval {:?})",
            endpoints, self.check_interval
        );
        self.emit(EngineEvent::Started { endpoints });

        let mut ticker =
            tokio::time::interval_at(Instant::now() + self.check_interval, self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Shutdown signal received");
                    self.emit(EngineEvent::Stopped {
                        reason: "Shutdown signal".to_string(),
                    });
                    break;
                }

                _ = ticker.tick() => {
                    self.run_pass().await;
                }

                _ = self.rescan.notified() => {
                    self.rediscover().await;
                }
            }
        }

        info!("Endpoint monitor stopped");
        Ok(())
    }

    /// Run one detection pass immediately
    pub async fn run_pass(&self) -> PassSummary {
        self.emit(EngineEvent::PassStarted);
        debug!("Checking {} endpoints", self.registry.len().await);

        let summary = self.detector.check_all().await;

        debug!(
            "Pass complete: {} checked, {} changed, {} unresolved, {} restarted, {} restart failures",
            summary.checked,
            summary.changed,
            summary.resolution_failures,
            summary.restarts_succeeded,
            summary.restarts_failed
        );
        self.emit(EngineEvent::PassCompleted { summary });
        summary
    }

    /// Re-run discovery and swap the registry contents
    ///
    /// A failed discovery keeps the current registry.
    pub async fn rediscover(&self) {
        match self.discoverer.discover().await {
            Ok(endpoints) => {
                let count = endpoints.len();
                self.registry.reconcile(endpoints).await;
                info!("Re-discovery complete: monitoring {} endpoints", count);
                self.emit(EngineEvent::Rediscovered { endpoints: count });
            }
            Err(e) => {
                error!(
                    "Re-discovery failed, keeping {} endpoints: {}",
                    self.registry.len().await,
                    e
                );
            }
        }
    }

    fn emit(&self, event: EngineEvent) {
        emit_event(&self.event_tx, event);
    }
}

/// Send an event without waiting
///
/// A full channel drops the event with a warning. A closed channel means
/// nobody is observing, which is not an error.
pub(crate) fn emit_event(tx: &mpsc::Sender<EngineEvent>, event: EngineEvent) {
    if let Err(mpsc::error::TrySendError::Full(_)) = tx.try_send(event) {
        warn!("Event channel full, dropping event. Consider increasing event_channel_capacity.");
    }
}
