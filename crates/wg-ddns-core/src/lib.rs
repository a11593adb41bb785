// # wg-ddns-core
//
// Core library for keeping WireGuard tunnels pointed at dynamic-DNS endpoints.
//
// ## Architecture Overview
//
// - **ConfigParser**: Extracts the hostname endpoint from a tunnel configuration
// - **InterfaceDiscoverer**: Finds active tunnel units, or takes one pinned interface
// - **EndpointRegistry**: Ordered in-memory record of endpoints and their last address
// - **ChangeDetector**: Re-resolves every hostname and restarts drifted tunnels
// - **RestartCoordinator**: Restarts one tunnel unit and waits for the job result
// - **MonitorEngine**: Drives detection passes on a fixed period until cancelled
// - **ControlPlane**: Handler logic for the operator control surface
//
// The service manager and the resolver sit behind traits so the engine can
// be exercised without systemd or a network.

pub mod traits;
pub mod config;
pub mod control;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod parser;
pub mod registry;
pub mod resolver;
pub mod restart;

// Re-export core types for convenience
pub use traits::{JobHandle, JobMode, JobResult, Resolver, ServiceManager, UnitStatus};
pub use config::{ApiConfig, LogLevel, MonitorConfig, ServiceNaming};
pub use control::{ControlError, ControlPlane, RestartRequest, RestartResponse};
pub use discovery::{DiscoveryMode, InterfaceDiscoverer};
pub use engine::{ChangeDetector, EngineEvent, MonitorEngine, PassSummary, RescanHandle};
pub use error::{Error, Result};
pub use parser::ConfigParser;
pub use registry::{EndpointRegistry, MonitoredEndpoint};
pub use resolver::SystemResolver;
pub use restart::RestartCoordinator;
