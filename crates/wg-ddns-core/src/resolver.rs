// # System Resolver
//
// Resolver backed by the platform's name service (getaddrinfo via tokio).
//
// ## Behavior
//
// - No caching: every call performs a fresh lookup
// - IPv4 only: the first IPv4 address in the answer wins
// - Bounded: each lookup is wrapped in a timeout on top of the platform's own

use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use crate::traits::Resolver;
use crate::{Error, Result};

/// Default upper bound for a single lookup
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_secs(10);

/// Platform resolver
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    /// Create a resolver with the default timeout
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_RESOLVE_TIMEOUT)
    }

    /// Create a resolver with a custom timeout
    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve_ipv4(&self, hostname: &str) -> Result<Ipv4Addr> {
        let lookup = tokio::net::lookup_host((hostname, 0));
        let addrs = tokio::time::timeout(self.timeout, lookup)
            .await
            .map_err(|_| Error::resolve(hostname, format!("lookup timed out after {:?}", self.timeout)))?
            .map_err(|e| Error::resolve(hostname, e.to_string()))?;

        first_ipv4(addrs.map(|sa| sa.ip()))
            .ok_or_else(|| Error::resolve(hostname, "no IPv4 address in answer"))
    }
}

fn first_ipv4(addrs: impl IntoIterator<Item = IpAddr>) -> Option<Ipv4Addr> {
    addrs.into_iter().find_map(|ip| match ip {
        IpAddr::V4(v4) => Some(v4),
        IpAddr::V6(_) => None,
    })
}
