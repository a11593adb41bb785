// # Resolver Trait
//
// Defines the interface for resolving endpoint hostnames.
//
// ## Implementations
//
// - Platform resolver: `crate::resolver::SystemResolver`
// - Scripted resolvers in the contract tests
//
// ## Usage
//
// ```rust,ignore
// use wg_ddns_core::Resolver;
//
// let resolver = /* Resolver implementation */;
// let addr = resolver.resolve_ipv4("vpn.example.com").await?;
// ```

use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Trait for hostname resolver implementations
///
/// Implementations must be thread-safe and usable across async tasks.
///
/// # Contract
///
/// - Returns exactly one IPv4 address per successful lookup
/// - Must not cache results; every call reflects the current DNS answer
/// - Must be bounded in time; a lookup that cannot complete is an error
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolve `hostname` to an IPv4 address
    ///
    /// # Returns
    ///
    /// - `Ok(Ipv4Addr)`: The address the hostname currently resolves to
    /// - `Err(Error::Resolve)`: Lookup failed, timed out, or yielded no IPv4 address
    async fn resolve_ipv4(&self, hostname: &str) -> Result<Ipv4Addr, crate::Error>;
}
