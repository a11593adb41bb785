//! Configuration types for the wg-ddns system
//!
//! This module defines all configuration structures used throughout the crate,
//! along with the duration grammar accepted on the command line and the
//! service naming convention shared by discovery and restart.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Directory holding `<interface>.conf` files
pub const DEFAULT_CONFIG_DIR: &str = "/etc/wireguard";

/// Shortest accepted check interval
pub const MIN_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Longest interface name the kernel accepts (IFNAMSIZ - 1)
const MAX_INTERFACE_NAME_LEN: usize = 15;

/// Main monitor configuration
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Period between drift-check passes
    pub check_interval: Duration,

    /// Monitor only this interface instead of auto-discovering
    pub single_interface: Option<String>,

    /// Directory containing tunnel configuration files
    pub config_dir: PathBuf,

    /// Unit naming convention of the tunnel service
    pub naming: ServiceNaming,

    /// Upper bound on waiting for a restart job to finish
    pub restart_timeout: Duration,

    /// Upper bound on a single hostname lookup
    pub resolve_timeout: Duration,

    /// HTTP control surface, enabled only when fully configured
    pub api: Option<ApiConfig>,

    /// Log verbosity
    pub log_level: LogLevel,

    /// Optional engine settings
    pub engine: EngineConfig,
}

impl MonitorConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            check_interval: default_check_interval(),
            single_interface: None,
            config_dir: default_config_dir(),
            naming: ServiceNaming::default(),
            restart_timeout: default_restart_timeout(),
            resolve_timeout: default_resolve_timeout(),
            api: None,
            log_level: LogLevel::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.check_interval < MIN_CHECK_INTERVAL {
            return Err(Error::config("Check interval must be at least 1 second"));
        }
        if self.restart_timeout.is_zero() {
            return Err(Error::config("Restart timeout must be > 0"));
        }
        if self.resolve_timeout.is_zero() {
            return Err(Error::config("Resolve timeout must be > 0"));
        }
        if let Some(interface) = &self.single_interface {
            validate_interface_name(interface)?;
        }
        if self.engine.event_channel_capacity == 0 {
            return Err(Error::config("Event channel capacity must be > 0"));
        }

        self.naming.validate()?;
        if let Some(api) = &self.api {
            api.validate()?;
        }

        Ok(())
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Path of `<interface>.conf` inside `dir`
pub fn config_path_in(dir: &Path, interface: &str) -> PathBuf {
    dir.join(format!("{interface}.conf"))
}

/// Naming convention mapping interfaces to service units
///
/// `unit_for` and `interface_of` are exact inverses:
/// `interface_of(&unit_for(x)) == Some(x)` for every non-empty `x`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceNaming {
    /// Text before the interface name (e.g., "wg-quick@")
    pub prefix: String,
    /// Text after the interface name (e.g., ".service")
    pub suffix: String,
}

impl ServiceNaming {
    /// Build the unit name for an interface
    pub fn unit_for(&self, interface: &str) -> String {
        format!("{}{}{}", self.prefix, interface, self.suffix)
    }

    /// Recover the interface name from a unit name, if it follows the convention
    pub fn interface_of<'a>(&self, unit: &'a str) -> Option<&'a str> {
        let interface = unit
            .strip_prefix(self.prefix.as_str())?
            .strip_suffix(self.suffix.as_str())?;
        (!interface.is_empty()).then_some(interface)
    }

    fn validate(&self) -> Result<()> {
        if self.prefix.is_empty() && self.suffix.is_empty() {
            return Err(Error::config(
                "Service naming needs a non-empty prefix or suffix",
            ));
        }
        Ok(())
    }
}

impl Default for ServiceNaming {
    fn default() -> Self {
        Self {
            prefix: "wg-quick@".to_string(),
            suffix: ".service".to_string(),
        }
    }
}

/// HTTP control surface configuration
#[derive(Clone)]
pub struct ApiConfig {
    /// Address to bind (e.g., "127.0.0.1")
    pub listen_address: String,
    /// Port to bind
    pub listen_port: u16,
    /// Shared secret expected in the `X-API-Key` header
    pub api_key: String,
}

// Keeps the API key out of logs
impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("listen_address", &self.listen_address)
            .field("listen_port", &self.listen_port)
            .field("api_key", &"<REDACTED>")
            .finish()
    }
}

impl ApiConfig {
    /// Build the API configuration from optional command-line parts
    ///
    /// The API is all-or-nothing: `Ok(None)` when no part is given,
    /// an error when only some parts are given.
    pub fn from_parts(
        listen_address: Option<String>,
        listen_port: Option<String>,
        api_key: Option<String>,
    ) -> Result<Option<Self>> {
        let listen_address = listen_address.filter(|s| !s.is_empty());
        let listen_port = listen_port.filter(|s| !s.is_empty());
        let api_key = api_key.filter(|s| !s.is_empty());

        match (listen_address, listen_port, api_key) {
            (None, None, None) => Ok(None),
            (Some(listen_address), Some(port), Some(api_key)) => {
                let listen_port = port
                    .parse::<u16>()
                    .map_err(|_| Error::config(format!("Invalid listen port: {port}")))?;
                let api = Self {
                    listen_address,
                    listen_port,
                    api_key,
                };
                api.validate()?;
                Ok(Some(api))
            }
            _ => Err(Error::config(
                "--listen-address, --listen-port and --api-key must be provided together to enable the API",
            )),
        }
    }

    /// Validate the API configuration
    pub fn validate(&self) -> Result<()> {
        if self.listen_address.is_empty() {
            return Err(Error::config("API listen address cannot be empty"));
        }
        if self.listen_port == 0 {
            return Err(Error::config("API listen port must be > 0"));
        }
        if self.api_key.is_empty() {
            return Err(Error::config("API key cannot be empty"));
        }
        Ok(())
    }

    /// `address:port` suitable for binding; IPv6 addresses are bracketed
    pub fn bind_addr(&self) -> String {
        if self.listen_address.contains(':') && !self.listen_address.starts_with('[') {
            format!("[{}]:{}", self.listen_address, self.listen_port)
        } else {
            format!("{}:{}", self.listen_address, self.listen_port)
        }
    }
}

/// Log verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lowercase name of the level
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(Error::config(format!(
                "Log level '{s}' is not valid. Valid levels: trace, debug, info, warn, error"
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_check_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_config_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CONFIG_DIR)
}

fn default_restart_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_resolve_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_event_channel_capacity() -> usize {
    1000
}

/// Check that `name` is usable as a WireGuard interface name
///
/// Mirrors the character set accepted by wg-quick: `[a-zA-Z0-9_=+.-]{1,15}`.
pub fn validate_interface_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_input("Interface name cannot be empty"));
    }
    if name.len() > MAX_INTERFACE_NAME_LEN {
        return Err(Error::invalid_input(format!(
            "Interface name too long: {} bytes (max {MAX_INTERFACE_NAME_LEN}). Got: {name}",
            name.len()
        )));
    }
    if !name
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'=' | b'+' | b'.' | b'-'))
    {
        return Err(Error::invalid_input(format!(
            "Interface name contains invalid characters: {name}"
        )));
    }
    Ok(())
}

/// Parse a duration such as `10s`, `1m30s`, `1.5h` or `250ms`
///
/// Accepted units: `ns`, `us`, `µs`, `ms`, `s`, `m`, `h`. A bare `0` is zero.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let malformed = || Error::config(format!("Invalid duration format: {input:?}"));

    let s = input.trim();
    if s == "0" {
        return Ok(Duration::ZERO);
    }
    if s.is_empty() {
        return Err(malformed());
    }

    let mut total: u128 = 0;
    let mut rest = s;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);

        let unit_len = tail
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3_600 * 1_000_000_000,
            _ => return Err(malformed()),
        };

        let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
        if whole.is_empty() && fraction.is_empty() {
            return Err(malformed());
        }
        if fraction.contains('.') {
            return Err(malformed());
        }

        let whole: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| malformed())?
        };
        let mut nanos = whole.checked_mul(unit_nanos).ok_or_else(malformed)?;

        // Digits past nanosecond precision cannot contribute.
        let fraction = &fraction[..fraction.len().min(18)];
        if !fraction.is_empty() {
            let numerator: u128 = fraction.parse().map_err(|_| malformed())?;
            let denominator = 10u128.pow(fraction.len() as u32);
            nanos = nanos
                .checked_add(numerator * unit_nanos / denominator)
                .ok_or_else(malformed)?;
        }

        total = total.checked_add(nanos).ok_or_else(malformed)?;
        rest = tail;
    }

    let secs = u64::try_from(total / 1_000_000_000).map_err(|_| malformed())?;
    Ok(Duration::new(secs, (total % 1_000_000_000) as u32))
}
