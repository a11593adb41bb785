//! Tunnel restart coordination
//!
//! Asks the service manager to restart the unit of one interface and waits
//! for the job to reach a terminal state.
//!
//! Requests for the same interface are serialized through a per-interface
//! async lock, so the scheduler and the control surface never race on one
//! unit. Different interfaces restart concurrently.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tracing::debug;

use crate::config::{MonitorConfig, ServiceNaming};
use crate::error::{Error, Result};
use crate::traits::{JobMode, ServiceManager};

/// Default upper bound on waiting for a restart job
pub const DEFAULT_RESTART_TIMEOUT: Duration = Duration::from_secs(300);

/// Restarts tunnel units through a [`ServiceManager`]
#[derive(Clone)]
pub struct RestartCoordinator {
    manager: Arc<dyn ServiceManager>,
    naming: ServiceNaming,
    timeout: Duration,
    locks: Arc<Mutex<HashMap<String, Arc<AsyncMutex<()>>>>>,
}

impl RestartCoordinator {
    /// Create a new coordinator
    pub fn new(manager: Arc<dyn ServiceManager>, naming: ServiceNaming, timeout: Duration) -> Self {
        Self {
            manager,
            naming,
            timeout,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Create a coordinator from the monitor configuration
    pub fn from_config(config: &MonitorConfig, manager: Arc<dyn ServiceManager>) -> Self {
        Self::new(manager, config.naming.clone(), config.restart_timeout)
    }

    /// Restart the unit of `interface` and wait for the job to finish
    ///
    /// # Returns
    ///
    /// - `Ok(())`: The job reported `done`
    /// - `Err(Error::RestartFailed)`: The job ended in any other state
    /// - `Err(Error::Timeout)`: No terminal state within the restart timeout
    /// - `Err(_)`: The request could not be issued
    pub async fn restart(&self, interface: &str) -> Result<()> {
        let lock = self.lock_for(interface);
        let _guard = lock.lock().await;

        let unit = self.naming.unit_for(interface);
        debug!("Restarting {} via {}", unit, self.manager.manager_name());

        let handle = self.manager.restart_unit(&unit, JobMode::Replace).await?;

        let result = tokio::time::timeout(self.timeout, handle.wait())
            .await
            .map_err(|_| {
                Error::timeout(format!(
                    "restart of {} did not finish within {:?}",
                    unit, self.timeout
                ))
            })??;

        if result.is_success() {
            debug!("Restart job for {} finished: {}", unit, result);
            Ok(())
        } else {
            Err(Error::restart_failed(unit, result.as_str()))
        }
    }

    fn lock_for(&self, interface: &str) -> Arc<AsyncMutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks
            .entry(interface.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}
