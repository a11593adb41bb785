// # Service Manager Trait
//
// Defines the narrow command interface to the process supervisor that owns
// the tunnel units.
//
// ## Implementations
//
// - systemd via `systemctl`: `wg-ddns-systemd` crate
//
// ## Usage
//
// ```rust,ignore
// use wg_ddns_core::traits::{JobMode, ServiceManager};
//
// let manager = /* ServiceManager implementation */;
// let units = manager.list_units().await?;
//
// let job = manager.restart_unit("wg-quick@wg0.service", JobMode::Replace).await?;
// let result = job.wait().await?;
// assert!(result.is_success());
// ```

use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use tokio::sync::oneshot;

/// One unit as reported by the service manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitStatus {
    /// Full unit name (e.g., "wg-quick@wg0.service")
    pub name: String,
    /// Load state (e.g., "loaded")
    pub load_state: String,
    /// Active state (e.g., "active", "failed")
    pub active_state: String,
    /// Sub state (e.g., "exited", "running")
    pub sub_state: String,
    /// Human-readable description
    pub description: String,
}

impl UnitStatus {
    /// Active-state literal of a running unit
    pub const ACTIVE: &'static str = "active";

    /// Whether the unit reports the active state
    pub fn is_active(&self) -> bool {
        self.active_state == Self::ACTIVE
    }
}

/// How a new job interacts with jobs already queued for the unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobMode {
    /// Replace any conflicting queued job
    Replace,
}

impl JobMode {
    /// Literal mode name understood by the service manager
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::Replace => "replace",
        }
    }
}

/// Terminal state of a service manager job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobResult {
    Done,
    Canceled,
    Timeout,
    Failed,
    Dependency,
    Skipped,
    /// Any result literal not covered above
    Other(String),
}

impl JobResult {
    /// Only `Done` counts as success
    pub fn is_success(&self) -> bool {
        matches!(self, JobResult::Done)
    }

    /// Literal result string
    pub fn as_str(&self) -> &str {
        match self {
            JobResult::Done => "done",
            JobResult::Canceled => "canceled",
            JobResult::Timeout => "timeout",
            JobResult::Failed => "failed",
            JobResult::Dependency => "dependency",
            JobResult::Skipped => "skipped",
            JobResult::Other(s) => s,
        }
    }
}

impl FromStr for JobResult {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "done" => JobResult::Done,
            "canceled" => JobResult::Canceled,
            "timeout" => JobResult::Timeout,
            "failed" => JobResult::Failed,
            "dependency" => JobResult::Dependency,
            "skipped" => JobResult::Skipped,
            other => JobResult::Other(other.to_string()),
        })
    }
}

impl fmt::Display for JobResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A queued restart job
///
/// The completion channel is single-use: [`JobHandle::wait`] consumes the handle.
#[derive(Debug)]
pub struct JobHandle {
    unit: String,
    completion: oneshot::Receiver<JobResult>,
}

impl JobHandle {
    /// Create a handle for `unit` completed through `completion`
    pub fn new(unit: impl Into<String>, completion: oneshot::Receiver<JobResult>) -> Self {
        Self {
            unit: unit.into(),
            completion,
        }
    }

    /// Create a handle that is already completed with `result`
    pub fn completed(unit: impl Into<String>, result: JobResult) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(result);
        Self::new(unit, rx)
    }

    /// Unit the job operates on
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Wait for the terminal job result
    ///
    /// # Returns
    ///
    /// - `Ok(JobResult)`: The terminal state, successful or not
    /// - `Err(Error::ServiceManager)`: The job was abandoned without a result
    pub async fn wait(self) -> Result<JobResult, crate::Error> {
        self.completion.await.map_err(|_| {
            crate::Error::service_manager(format!(
                "job completion channel closed for {}",
                self.unit
            ))
        })
    }
}

/// Trait for service manager implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Responsibilities
///
/// Service managers are thin adapters:
/// - ✅ Enumerate units with their states
/// - ✅ Enqueue restart jobs and report their terminal state
/// - ❌ Decide which units to restart (owned by `ChangeDetector`)
/// - ❌ Map interfaces to unit names (owned by `ServiceNaming`)
/// - ❌ Retry failed jobs
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// List all units known to the service manager
    ///
    /// # Returns
    ///
    /// - `Ok(Vec<UnitStatus>)`: Every unit with its states
    /// - `Err(Error)`: The query failed
    async fn list_units(&self) -> Result<Vec<UnitStatus>, crate::Error>;

    /// Enqueue a restart of `unit`
    ///
    /// Returns as soon as the job is accepted; the terminal state is delivered
    /// through the returned handle.
    async fn restart_unit(&self, unit: &str, mode: JobMode) -> Result<JobHandle, crate::Error>;

    /// Release the connection to the service manager
    async fn close(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Get the manager name (for logging/debugging)
    fn manager_name(&self) -> &'static str;
}
