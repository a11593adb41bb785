//! Interface discovery
//!
//! Determines which tunnel interfaces to monitor and turns each one into a
//! [`MonitoredEndpoint`] through the [`ConfigParser`].
//!
//! ## Modes
//!
//! - **Auto**: every unit following the naming convention whose active state
//!   is `active`
//! - **Pinned**: exactly one interface given by the operator; the service
//!   manager is not queried
//!
//! A configuration that cannot be read only removes that interface from the
//! result. A failing unit query is fatal: without it nothing can be monitored.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{MonitorConfig, ServiceNaming, config_path_in};
use crate::error::{Error, Result};
use crate::parser::ConfigParser;
use crate::registry::MonitoredEndpoint;
use crate::traits::{Resolver, ServiceManager};

/// Which interfaces discovery considers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryMode {
    /// Query the service manager for active tunnel units
    Auto,
    /// Monitor exactly this interface
    Pinned(String),
}

/// Discovers monitorable endpoints
#[derive(Clone)]
pub struct InterfaceDiscoverer {
    manager: Arc<dyn ServiceManager>,
    parser: ConfigParser,
    naming: ServiceNaming,
    config_dir: PathBuf,
    mode: DiscoveryMode,
}

impl InterfaceDiscoverer {
    /// Create a new discoverer
    pub fn new(
        manager: Arc<dyn ServiceManager>,
        resolver: Arc<dyn Resolver>,
        naming: ServiceNaming,
        config_dir: impl Into<PathBuf>,
        mode: DiscoveryMode,
    ) -> Self {
        Self {
            manager,
            parser: ConfigParser::new(resolver),
            naming,
            config_dir: config_dir.into(),
            mode,
        }
    }

    /// Create a discoverer from the monitor configuration
    pub fn from_config(
        config: &MonitorConfig,
        manager: Arc<dyn ServiceManager>,
        resolver: Arc<dyn Resolver>,
    ) -> Self {
        let mode = match &config.single_interface {
            Some(name) => DiscoveryMode::Pinned(name.clone()),
            None => DiscoveryMode::Auto,
        };
        Self::new(
            manager,
            resolver,
            config.naming.clone(),
            config.config_dir.clone(),
            mode,
        )
    }

    /// Names of the interfaces to monitor, in discovery order
    pub async fn interfaces(&self) -> Result<Vec<String>> {
        if let DiscoveryMode::Pinned(name) = &self.mode {
            return Ok(vec![name.clone()]);
        }

        let units = self.manager.list_units().await.map_err(|e| {
            Error::discovery(format!(
                "failed to list {} units: {}",
                self.manager.manager_name(),
                e
            ))
        })?;

        let mut interfaces: Vec<String> = Vec::new();
        for unit in &units {
            let Some(interface) = self.naming.interface_of(&unit.name) else {
                continue;
            };
            if !unit.is_active() {
                debug!("Skipping {} (state: {})", unit.name, unit.active_state);
                continue;
            }
            if !interfaces.iter().any(|i| i == interface) {
                interfaces.push(interface.to_string());
            }
        }

        Ok(interfaces)
    }

    /// Discover all monitorable endpoints
    ///
    /// # Returns
    ///
    /// - `Ok(endpoints)`: One entry per interface with a hostname endpoint
    /// - `Err(Error::Discovery)`: The service manager could not be queried
    pub async fn discover(&self) -> Result<Vec<MonitoredEndpoint>> {
        let interfaces = self.interfaces().await?;

        let mut endpoints = Vec::with_capacity(interfaces.len());
        for interface in &interfaces {
            let path = config_path_in(&self.config_dir, interface);
            match self.parser.parse_file(interface, &path).await {
                Ok(Some(endpoint)) => endpoints.push(endpoint),
                Ok(None) => debug!("Interface {} has no domain endpoint", interface),
                Err(e) => warn!("Failed to parse config for {}: {}", interface, e),
            }
        }

        match &self.mode {
            DiscoveryMode::Pinned(name) => info!(
                "Monitoring single interface: {} with {} domain endpoints",
                name,
                endpoints.len()
            ),
            DiscoveryMode::Auto => info!(
                "Discovered {} WireGuard interfaces with domain endpoints",
                endpoints.len()
            ),
        }

        Ok(endpoints)
    }
}
