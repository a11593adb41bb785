// # systemd Service Manager
//
// ServiceManager implementation that drives systemd through the `systemctl`
// command.
//
// ## Commands
//
// - Probe: `systemctl --version`
// - List: `systemctl list-units --type=service --all --plain --no-legend --no-pager --full`
// - Restart: `systemctl restart --no-ask-password --job-mode=<mode> <unit>`
//
// `systemctl restart` blocks until the job finishes, so the terminal job
// state is derived from its exit status and diagnostics. The command runs in
// a background task that owns the child process; dropping the JobHandle
// kills it.
//
// ## Constraints
//
// - ✅ Enumerate units and restart them
// - ❌ Decide which units to restart (owned by the engine)
// - ❌ Retry failed jobs

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, warn};
use wg_ddns_core::traits::{JobHandle, JobMode, JobResult, ServiceManager, UnitStatus};
use wg_ddns_core::{Error, Result};

/// Default control binary
pub const SYSTEMCTL: &str = "systemctl";

/// Service manager backed by `systemctl`
#[derive(Debug, Clone)]
pub struct SystemctlManager {
    program: String,
    prefix_args: Vec<String>,
}

impl SystemctlManager {
    /// Manager invoking `systemctl` from `PATH`
    pub fn new() -> Self {
        Self::with_command(SYSTEMCTL, Vec::<String>::new())
    }

    /// Manager invoking `program` with `prefix_args` before every subcommand
    pub fn with_command(
        program: impl Into<String>,
        prefix_args: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            program: program.into(),
            prefix_args: prefix_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Create a manager and verify that `systemctl` is usable
    ///
    /// # Errors
    ///
    /// Returns `Error::ServiceManager` when the binary cannot be executed or
    /// reports failure.
    pub async fn connect() -> Result<Self> {
        let manager = Self::new();
        let version = manager.version().await?;
        debug!("Connected to {}", version);
        Ok(manager)
    }

    /// First line of `systemctl --version`
    pub async fn version(&self) -> Result<String> {
        let output = self
            .command()
            .arg("--version")
            .output()
            .await
            .map_err(|e| Error::service_manager(format!("failed to execute {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::service_manager(format!(
                "{} --version failed: {}",
                self.program,
                stderr.trim()
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().next().unwrap_or_default().trim().to_string())
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.prefix_args).stdin(Stdio::null());
        command
    }
}

impl Default for SystemctlManager {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ServiceManager for SystemctlManager {
    async fn list_units(&self) -> Result<Vec<UnitStatus>> {
        let output = self
            .command()
            .args([
                "list-units",
                "--type=service",
                "--all",
                "--plain",
                "--no-legend",
                "--no-pager",
                "--full",
            ])
            .output()
            .await
            .map_err(|e| Error::discovery(format!("failed to execute {}: {}", self.program, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::discovery(format!(
                "list-units failed: {}",
                stderr.trim()
            )));
        }

        Ok(parse_unit_list(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn restart_unit(&self, unit: &str, mode: JobMode) -> Result<JobHandle> {
        let child = self
            .command()
            .arg("restart")
            .arg("--no-ask-password")
            .arg(format!("--job-mode={}", mode.as_str()))
            .arg(unit)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::service_manager(format!("failed to execute {}: {}", self.program, e))
            })?;

        let (mut tx, rx) = oneshot::channel();
        let job_unit = unit.to_string();
        tokio::spawn(async move {
            let result = tokio::select! {
                output = child.wait_with_output() => Some(match output {
                    Ok(output) if output.status.success() => JobResult::Done,
                    Ok(output) => {
                        let stderr = String::from_utf8_lossy(&output.stderr);
                        debug!("Restart of {} failed: {}", job_unit, stderr.trim());
                        classify_failure(&stderr)
                    }
                    Err(e) => {
                        warn!("Failed to wait for restart of {}: {}", job_unit, e);
                        JobResult::Failed
                    }
                }),
                _ = tx.closed() => None,
            };

            match result {
                Some(result) => {
                    let _ = tx.send(result);
                }
                None => debug!("Restart of {} abandoned", job_unit),
            }
        });

        Ok(JobHandle::new(unit, rx))
    }

    async fn close(&self) -> Result<()> {
        debug!("Released {} service manager", self.program);
        Ok(())
    }

    fn manager_name(&self) -> &'static str {
        "systemd"
    }
}

/// Parse `list-units --plain --no-legend` output
///
/// Lines that do not carry at least unit, load, active and sub columns are
/// skipped.
pub fn parse_unit_list(text: &str) -> Vec<UnitStatus> {
    text.lines().filter_map(parse_unit_line).collect()
}

fn parse_unit_line(line: &str) -> Option<UnitStatus> {
    let line = line.trim_start();
    let line = line
        .strip_prefix('●')
        .or_else(|| line.strip_prefix('*'))
        .unwrap_or(line);

    let mut fields = line.split_whitespace();
    let name = fields.next()?;
    let load_state = fields.next()?;
    let active_state = fields.next()?;
    let sub_state = fields.next()?;
    let description = fields.collect::<Vec<_>>().join(" ");

    Some(UnitStatus {
        name: name.to_string(),
        load_state: load_state.to_string(),
        active_state: active_state.to_string(),
        sub_state: sub_state.to_string(),
        description,
    })
}

/// Map the diagnostics of a failed `systemctl restart` to a job result
pub fn classify_failure(stderr: &str) -> JobResult {
    let stderr = stderr.to_ascii_lowercase();
    if stderr.contains("canceled") || stderr.contains("cancelled") {
        JobResult::Canceled
    } else if stderr.contains("dependency") {
        JobResult::Dependency
    } else if stderr.contains("timed out") || stderr.contains("timeout") {
        JobResult::Timeout
    } else if stderr.contains("skipped") {
        JobResult::Skipped
    } else {
        JobResult::Failed
    }
}
