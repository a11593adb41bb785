//! Tunnel configuration parsing
//!
//! Extracts the monitorable endpoint from a WireGuard configuration file.
//!
//! ## Rules
//!
//! - Only `Endpoint = <host:port>` lines are considered; the key is
//!   case-insensitive and trailing `#` comments are ignored
//! - Values that are not valid `host:port` (or `[v6]:port`) are skipped
//! - Literal IP hosts are skipped: they can never drift
//! - When several lines qualify, the last one wins
//!
//! ## Usage
//!
//! ```rust,ignore
//! use wg_ddns_core::parser::ConfigParser;
//!
//! let parser = ConfigParser::new(resolver);
//! if let Some(endpoint) = parser.parse_file("wg0", "/etc/wireguard/wg0.conf").await? {
//!     println!("{} -> {:?}", endpoint.hostname, endpoint.last_resolved);
//! }
//! ```

use std::net::Ipv6Addr;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::registry::MonitoredEndpoint;
use crate::traits::Resolver;

/// Endpoint extracted from configuration text, before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedEndpoint {
    /// Value as written after `Endpoint =`
    pub raw: String,
    /// Host portion (brackets removed for IPv6 literals)
    pub host: String,
    /// Port portion
    pub port: String,
}

/// Parser turning tunnel configuration files into monitored endpoints
#[derive(Clone)]
pub struct ConfigParser {
    resolver: Arc<dyn Resolver>,
}

impl ConfigParser {
    /// Create a parser that performs initial resolution with `resolver`
    pub fn new(resolver: Arc<dyn Resolver>) -> Self {
        Self { resolver }
    }

    /// Parse the configuration of `interface` stored at `path`
    ///
    /// # Returns
    ///
    /// - `Ok(Some(endpoint))`: A hostname endpoint was found
    /// - `Ok(None)`: No monitorable endpoint in the file
    /// - `Err(Error::ConfigUnavailable)`: The file could not be read
    pub async fn parse_file(
        &self,
        interface: &str,
        path: impl AsRef<Path>,
    ) -> Result<Option<MonitoredEndpoint>> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::config_unavailable(interface, path, e))?;

        self.parse_text(interface, &text).await
    }

    /// Parse configuration text already in memory
    pub async fn parse_text(
        &self,
        interface: &str,
        text: &str,
    ) -> Result<Option<MonitoredEndpoint>> {
        let Some(parsed) = parse_endpoint(text) else {
            debug!("No domain endpoint found for interface {}", interface);
            return Ok(None);
        };

        // A failed initial lookup is not fatal: the first pass records the baseline.
        let last_resolved = self.resolver.resolve_ipv4(&parsed.host).await.ok();

        let endpoint = MonitoredEndpoint::new(interface, parsed.raw, parsed.host, last_resolved);
        debug!(
            "Found domain endpoint: {} -> {} (interface: {})",
            endpoint.hostname,
            endpoint.last_resolved_display(),
            interface
        );
        Ok(Some(endpoint))
    }
}

/// Find the monitorable endpoint in configuration text
///
/// Returns the last `Endpoint` line whose value splits into host and port
/// and whose host is not a literal IP address.
pub fn parse_endpoint(text: &str) -> Option<ParsedEndpoint> {
    text.lines()
        .filter_map(endpoint_value)
        .filter_map(|raw| {
            let (host, port) = split_host_port(raw)?;
            if host.is_empty() || is_ip_literal(host) {
                return None;
            }
            Some(ParsedEndpoint {
                raw: raw.to_string(),
                host: host.to_string(),
                port: port.to_string(),
            })
        })
        .last()
}

/// Value of an `Endpoint = ...` line, if `line` is one
fn endpoint_value(line: &str) -> Option<&str> {
    let line = match line.split_once('#') {
        Some((before, _)) => before,
        None => line,
    };
    let (key, value) = line.split_once('=')?;
    if !key.trim().eq_ignore_ascii_case("Endpoint") {
        return None;
    }
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// Split `host:port` or `[host]:port`
///
/// Follows the usual rules: an unbracketed host may not contain `:`,
/// a bracketed host must be followed directly by `:port`.
pub fn split_host_port(value: &str) -> Option<(&str, &str)> {
    let colon = value.rfind(':')?;
    let (host_part, port) = (&value[..colon], &value[colon + 1..]);

    if let Some(inner) = host_part.strip_prefix('[') {
        let host = inner.strip_suffix(']')?;
        if host.contains('[') || host.contains(']') {
            return None;
        }
        return Some((host, port));
    }

    if host_part.contains(':') || host_part.contains('[') || host_part.contains(']') {
        return None;
    }
    if port.contains('[') || port.contains(']') {
        return None;
    }
    Some((host_part, port))
}

/// Whether `host` is a dotted-quad IPv4 literal
pub fn is_ipv4_literal(host: &str) -> bool {
    let mut groups = 0;
    for group in host.split('.') {
        if group.is_empty() || !group.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        groups += 1;
    }
    groups == 4
}

/// Whether `host` is a literal IPv4 or IPv6 address
pub fn is_ip_literal(host: &str) -> bool {
    if is_ipv4_literal(host) {
        return true;
    }
    let without_zone = host.split_once('%').map_or(host, |(addr, _)| addr);
    without_zone.parse::<Ipv6Addr>().is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hostname_endpoint() {
        let text = "\
[Interface]
PrivateKey = abc=
Address = 10.0.0.2/24

[Peer]
PublicKey = def=
Endpoint = vpn.example.com:51820
AllowedIPs = 0.0.0.0/0
";
        let parsed = parse_endpoint(text).unwrap();
        assert_eq!(parsed.raw, "vpn.example.com:51820");
        assert_eq!(parsed.host, "vpn.example.com");
        assert_eq!(parsed.port, "51820");
    }

    #[test]
    fn test_literal_ipv4_is_not_monitorable() {
        assert_eq!(parse_endpoint("Endpoint = 10.0.0.1:51820"), None);
        assert_eq!(parse_endpoint("Endpoint=203.0.113.9:443"), None);
    }

    #[test]
    fn test_literal_ipv6_is_not_monitorable() {
        assert_eq!(parse_endpoint("Endpoint = [2001:db8::1]:51820"), None);
        assert_eq!(parse_endpoint("Endpoint = [fe80::1%eth0]:51820"), None);
    }

    #[test]
    fn test_whitespace_case_and_comments() {
        let parsed = parse_endpoint("   endpoint   =   home.example.net:1234   # office\n").unwrap();
        assert_eq!(parsed.host, "home.example.net");
        assert_eq!(parsed.raw, "home.example.net:1234");
    }

    #[test]
    fn test_malformed_endpoint_is_skipped() {
        assert_eq!(parse_endpoint("Endpoint = vpn.example.com"), None);
        assert_eq!(parse_endpoint("Endpoint = a:b:c"), None);
        assert_eq!(parse_endpoint("Endpoint = :51820"), None);
        assert_eq!(parse_endpoint("Endpoint ="), None);
    }

    #[test]
    fn test_last_endpoint_wins() {
        let text = "\
[Peer]
Endpoint = first.example.com:51820
[Peer]
Endpoint = second.example.com:51821
";
        assert_eq!(parse_endpoint(text).unwrap().host, "second.example.com");
    }

    #[test]
    fn test_other_keys_ignored() {
        let text = "PublicKey = Endpoint=\nPostUp = echo Endpoint = x.example.com:1\n";
        assert_eq!(parse_endpoint(text), None);
    }

    #[test]
    fn test_split_host_port() {
        assert_eq!(split_host_port("host:80"), Some(("host", "80")));
        assert_eq!(split_host_port("[::1]:80"), Some(("::1", "80")));
        assert_eq!(split_host_port("host"), None);
        assert_eq!(split_host_port("::1:80"), None);
        assert_eq!(split_host_port("[::1]x:80"), None);
    }

    #[test]
    fn test_ipv4_literal_detection() {
        assert!(is_ipv4_literal("10.0.0.1"));
        assert!(is_ipv4_literal("255.255.255.255"));
        assert!(!is_ipv4_literal("10.0.0"));
        assert!(!is_ipv4_literal("10.0.0.1.example.com"));
        assert!(!is_ipv4_literal("vpn1.example.com"));
    }
}
