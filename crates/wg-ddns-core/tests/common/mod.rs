//! Test doubles and common utilities for contract tests
//!
//! The doubles keep their counters behind `Arc`s: cloning a double yields a
//! second handle onto the same counters, so a test can hand one clone to the
//! engine and inspect the other.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use wg_ddns_core::config::MonitorConfig;
use wg_ddns_core::error::{Error, Result};
use wg_ddns_core::traits::{JobHandle, JobMode, JobResult, Resolver, ServiceManager, UnitStatus};

/// Resolver answering from a table the test can change between passes
#[derive(Clone, Default)]
pub struct ScriptedResolver {
    answers: Arc<Mutex<HashMap<String, Option<Ipv4Addr>>>>,
    call_count: Arc<AtomicUsize>,
}

impl ScriptedResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `hostname` resolve to `ip`
    pub fn set(&self, hostname: &str, ip: [u8; 4]) {
        self.answers
            .lock()
            .unwrap()
            .insert(hostname.to_string(), Some(Ipv4Addr::from(ip)));
    }

    /// Make lookups of `hostname` fail
    pub fn fail(&self, hostname: &str) {
        self.answers.lock().unwrap().insert(hostname.to_string(), None);
    }

    /// Get the number of lookups performed
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for ScriptedResolver {
    async fn resolve_ipv4(&self, hostname: &str) -> Result<Ipv4Addr> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        match self.answers.lock().unwrap().get(hostname) {
            Some(Some(ip)) => Ok(*ip),
            Some(None) => Err(Error::resolve(hostname, "scripted failure")),
            None => Err(Error::resolve(hostname, "no such host")),
        }
    }
}

/// A mock ServiceManager that records every call
#[derive(Clone)]
pub struct MockServiceManager {
    units: Arc<Mutex<Vec<UnitStatus>>>,
    list_fails: Arc<AtomicBool>,
    restart_result: Arc<Mutex<JobResult>>,
    restart_delay: Duration,
    list_call_count: Arc<AtomicUsize>,
    restarted_units: Arc<Mutex<Vec<String>>>,
}

impl MockServiceManager {
    /// Manager reporting `units`; restarts finish with `done`
    pub fn new(units: Vec<UnitStatus>) -> Self {
        Self {
            units: Arc::new(Mutex::new(units)),
            list_fails: Arc::new(AtomicBool::new(false)),
            restart_result: Arc::new(Mutex::new(JobResult::Done)),
            restart_delay: Duration::ZERO,
            list_call_count: Arc::new(AtomicUsize::new(0)),
            restarted_units: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Delay every restart job by `delay` before it completes
    pub fn with_restart_delay(mut self, delay: Duration) -> Self {
        self.restart_delay = delay;
        self
    }

    /// Make subsequent list_units() calls fail
    pub fn fail_listing(&self) {
        self.list_fails.store(true, Ordering::SeqCst);
    }

    /// Terminal result reported by subsequent restart jobs
    pub fn set_restart_result(&self, result: JobResult) {
        *self.restart_result.lock().unwrap() = result;
    }

    /// Replace the reported units
    pub fn set_units(&self, units: Vec<UnitStatus>) {
        *self.units.lock().unwrap() = units;
    }

    /// Get the number of times list_units() was called
    pub fn list_call_count(&self) -> usize {
        self.list_call_count.load(Ordering::SeqCst)
    }

    /// Units passed to restart_unit(), in call order
    pub fn restarted_units(&self) -> Vec<String> {
        self.restarted_units.lock().unwrap().clone()
    }

    /// Get the number of times restart_unit() was called
    pub fn restart_call_count(&self) -> usize {
        self.restarted_units.lock().unwrap().len()
    }
}

#[async_trait]
impl ServiceManager for MockServiceManager {
    async fn list_units(&self) -> Result<Vec<UnitStatus>> {
        self.list_call_count.fetch_add(1, Ordering::SeqCst);
        if self.list_fails.load(Ordering::SeqCst) {
            return Err(Error::service_manager("bus unavailable"));
        }
        Ok(self.units.lock().unwrap().clone())
    }

    async fn restart_unit(&self, unit: &str, mode: JobMode) -> Result<JobHandle> {
        assert_eq!(mode, JobMode::Replace, "restarts must replace queued jobs");
        self.restarted_units.lock().unwrap().push(unit.to_string());

        let result = self.restart_result.lock().unwrap().clone();
        if self.restart_delay.is_zero() {
            return Ok(JobHandle::completed(unit, result));
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let delay = self.restart_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(result);
        });
        Ok(JobHandle::new(unit, rx))
    }

    fn manager_name(&self) -> &'static str {
        "mock"
    }
}

/// Unit in the given active state
pub fn unit(name: &str, active_state: &str) -> UnitStatus {
    UnitStatus {
        name: name.to_string(),
        load_state: "loaded".to_string(),
        active_state: active_state.to_string(),
        sub_state: if active_state == "active" { "exited" } else { "dead" }.to_string(),
        description: format!("WireGuard via wg-quick(8) for {name}"),
    }
}

/// Active tunnel unit for `interface`
pub fn tunnel_unit(interface: &str) -> UnitStatus {
    unit(&format!("wg-quick@{interface}.service"), "active")
}

/// Directory of tunnel configuration files
pub struct ConfigDir {
    dir: TempDir,
}

impl ConfigDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write `<interface>.conf` with a single peer at `endpoint`
    pub fn write_tunnel(&self, interface: &str, endpoint: &str) {
        let text = format!(
            "[Interface]\n\
             PrivateKey = cHJpdmF0ZS1rZXktZm9yLXRlc3RzLW9ubHktMDAwMDA=\n\
             Address = 10.8.0.2/24\n\
             \n\
             [Peer]\n\
             PublicKey = cHVibGljLWtleS1mb3ItdGVzdHMtb25seS0wMDAwMDA=\n\
             Endpoint = {endpoint}\n\
             AllowedIPs = 10.8.0.0/24\n\
             PersistentKeepalive = 25\n"
        );
        self.write(interface, &text);
    }

    /// Write `<interface>.conf` with raw content
    pub fn write(&self, interface: &str, text: &str) {
        std::fs::write(self.dir.path().join(format!("{interface}.conf")), text).unwrap();
    }
}

/// Minimal configuration reading tunnels from `dir`
pub fn minimal_config(dir: &ConfigDir, single_interface: Option<&str>) -> MonitorConfig {
    MonitorConfig {
        check_interval: Duration::from_secs(1),
        single_interface: single_interface.map(str::to_string),
        config_dir: dir.path().to_path_buf(),
        restart_timeout: Duration::from_secs(5),
        ..MonitorConfig::default()
    }
}
