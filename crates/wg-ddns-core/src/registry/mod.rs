// # Endpoint Registry
//
// In-memory, ordered collection of monitored endpoints and their last
// observed address. This is the only mutable state shared between the
// scheduler and the control surface.
//
// ## Ownership
//
// - Writer: the change detector (one endpoint at a time), and re-discovery
//   (whole-registry swap between passes)
// - Readers: the control surface, through cloned snapshots
//
// ## Crash Behavior
//
// Nothing is persisted. Every process start rebuilds the registry from the
// tunnel configuration files.

use chrono::{DateTime, Utc};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::RwLock;

/// One tunnel interface whose endpoint is a hostname
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredEndpoint {
    /// Tunnel interface name; unique within the registry
    pub interface: String,
    /// `host:port` as configured
    pub raw_endpoint: String,
    /// Host portion; never a literal IP
    pub hostname: String,
    /// Most recent successfully resolved address
    pub last_resolved: Option<Ipv4Addr>,
    /// When `last_resolved` last advanced to a new value
    pub last_changed: Option<DateTime<Utc>>,
}

impl MonitoredEndpoint {
    /// Create a new endpoint record
    pub fn new(
        interface: impl Into<String>,
        raw_endpoint: impl Into<String>,
        hostname: impl Into<String>,
        last_resolved: Option<Ipv4Addr>,
    ) -> Self {
        Self {
            interface: interface.into(),
            raw_endpoint: raw_endpoint.into(),
            hostname: hostname.into(),
            last_resolved,
            last_changed: None,
        }
    }

    /// Whether `current` differs from the recorded address
    ///
    /// An unset address always counts as drift.
    pub fn has_drifted(&self, current: Ipv4Addr) -> bool {
        self.last_resolved != Some(current)
    }

    /// Recorded address for log output
    pub fn last_resolved_display(&self) -> String {
        display_address(self.last_resolved)
    }
}

/// Format an optional address for log output
pub(crate) fn display_address(address: Option<Ipv4Addr>) -> String {
    address
        .map(|ip| ip.to_string())
        .unwrap_or_else(|| "<none>".to_string())
}

/// Outcome of recording a resolution in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressUpdate {
    /// The address advanced; `previous` is what was recorded before
    Changed { previous: Option<Ipv4Addr> },
    /// The address matches the recorded one
    Unchanged,
    /// The interface is not registered (e.g., removed by re-discovery)
    Unknown,
}

/// Ordered registry of monitored endpoints
///
/// Insertion order is discovery order. Cloning the registry yields another
/// handle to the same underlying state.
///
/// # Example
///
/// ```rust,no_run
/// use wg_ddns_core::registry::{EndpointRegistry, MonitoredEndpoint};
///
/// #[tokio::main]
/// async fn main() {
///     let registry = EndpointRegistry::new();
///     registry
///         .insert(MonitoredEndpoint::new("wg0", "vpn.example.com:51820", "vpn.example.com", None))
///         .await;
///
///     registry.record_address("wg0", "1.2.3.4".parse().unwrap()).await;
///     assert_eq!(registry.snapshot().await.len(), 1);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct EndpointRegistry {
    inner: Arc<RwLock<Vec<MonitoredEndpoint>>>,
}

impl EndpointRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `endpoints`, de-duplicated by interface
    pub fn from_endpoints(endpoints: Vec<MonitoredEndpoint>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(dedup_by_interface(endpoints))),
        }
    }

    /// Add an endpoint, replacing any existing entry for the same interface in place
    pub async fn insert(&self, endpoint: MonitoredEndpoint) {
        let mut guard = self.inner.write().await;
        match guard.iter_mut().find(|e| e.interface == endpoint.interface) {
            Some(existing) => *existing = endpoint,
            None => guard.push(endpoint),
        }
    }

    /// Replace the whole registry atomically
    pub async fn replace(&self, endpoints: Vec<MonitoredEndpoint>) {
        let endpoints = dedup_by_interface(endpoints);
        *self.inner.write().await = endpoints;
    }

    /// Replace the registry with re-discovered `endpoints`
    ///
    /// An entry whose interface and hostname are unchanged keeps its recorded
    /// address, so drift that happened since the last pass is still detected
    /// by the next one.
    pub async fn reconcile(&self, endpoints: Vec<MonitoredEndpoint>) {
        let mut endpoints = dedup_by_interface(endpoints);
        let mut guard = self.inner.write().await;
        for endpoint in &mut endpoints {
            let previous = guard
                .iter()
                .find(|e| e.interface == endpoint.interface && e.hostname == endpoint.hostname);
            if let Some(previous) = previous {
                if previous.last_resolved.is_some() {
                    endpoint.last_resolved = previous.last_resolved;
                    endpoint.last_changed = previous.last_changed;
                }
            }
        }
        *guard = endpoints;
    }

    /// Record a confirmed resolution for `interface`
    ///
    /// The comparison and the update happen under one write lock, so
    /// readers never observe a half-applied change.
    pub async fn record_address(&self, interface: &str, address: Ipv4Addr) -> AddressUpdate {
        let mut guard = self.inner.write().await;
        let Some(endpoint) = guard.iter_mut().find(|e| e.interface == interface) else {
            return AddressUpdate::Unknown;
        };
        if !endpoint.has_drifted(address) {
            return AddressUpdate::Unchanged;
        }
        let previous = endpoint.last_resolved.replace(address);
        endpoint.last_changed = Some(Utc::now());
        AddressUpdate::Changed { previous }
    }

    /// Copy of the current entries, in registry order
    pub async fn snapshot(&self) -> Vec<MonitoredEndpoint> {
        self.inner.read().await.clone()
    }

    /// Look up one entry
    pub async fn get(&self, interface: &str) -> Option<MonitoredEndpoint> {
        let guard = self.inner.read().await;
        guard.iter().find(|e| e.interface == interface).cloned()
    }

    /// Whether `interface` is registered
    pub async fn contains(&self, interface: &str) -> bool {
        let guard = self.inner.read().await;
        guard.iter().any(|e| e.interface == interface)
    }

    /// Get the number of endpoints in the registry
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }
}

/// Keep the last entry per interface, at the position of its first occurrence
fn dedup_by_interface(endpoints: Vec<MonitoredEndpoint>) -> Vec<MonitoredEndpoint> {
    let mut out: Vec<MonitoredEndpoint> = Vec::with_capacity(endpoints.len());
    for endpoint in endpoints {
        match out.iter_mut().find(|e| e.interface == endpoint.interface) {
            Some(existing) => *existing = endpoint,
            None => out.push(endpoint),
        }
    }
    out
}
