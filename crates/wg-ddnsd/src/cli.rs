//! Command-line options
//!
//! Every option can also be given through a `WG_DDNS_*` environment
//! variable; the flag wins when both are present.

use clap::Parser;
use std::path::PathBuf;
use wg_ddns_core::config::{
    ApiConfig, DEFAULT_CONFIG_DIR, LogLevel, MonitorConfig, parse_duration,
};
use wg_ddns_core::Result;

/// Restart WireGuard tunnels when their endpoint hostnames resolve to a new address
#[derive(Debug, Parser)]
#[command(name = "wg-ddnsd", version, about)]
pub struct Args {
    /// Monitor only this interface instead of every active wg-quick unit
    #[arg(long, env = "WG_DDNS_SINGLE_INTERFACE", value_name = "IFACE")]
    pub single_interface: Option<String>,

    /// Address the API server binds to
    #[arg(long, env = "WG_DDNS_LISTEN_ADDRESS", value_name = "ADDR")]
    pub listen_address: Option<String>,

    /// Port the API server binds to
    #[arg(long, env = "WG_DDNS_LISTEN_PORT", value_name = "PORT")]
    pub listen_port: Option<String>,

    /// Key expected in the X-API-Key header
    #[arg(long, env = "WG_DDNS_API_KEY", value_name = "KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, env = "WG_DDNS_LOG_LEVEL", value_name = "LEVEL", default_value = "info")]
    pub log_level: String,

    /// Time between DNS checks (e.g. 10s, 1m30s)
    #[arg(long, env = "WG_DDNS_CHECK_INTERVAL", value_name = "DURATION", default_value = "10s")]
    pub check_interval: String,

    /// Directory holding <interface>.conf files
    #[arg(long, env = "WG_DDNS_CONFIG_DIR", value_name = "PATH", default_value = DEFAULT_CONFIG_DIR)]
    pub config_dir: PathBuf,

    /// Upper bound on waiting for a tunnel restart
    #[arg(long, env = "WG_DDNS_RESTART_TIMEOUT", value_name = "DURATION", default_value = "5m")]
    pub restart_timeout: String,

    /// Upper bound on a single DNS lookup
    #[arg(long, env = "WG_DDNS_RESOLVE_TIMEOUT", value_name = "DURATION", default_value = "10s")]
    pub resolve_timeout: String,
}

impl Args {
    /// Turn the raw options into a validated configuration
    pub fn into_config(self) -> Result<MonitorConfig> {
        let config = MonitorConfig {
            check_interval: parse_duration(&self.check_interval)?,
            single_interface: self.single_interface.filter(|s| !s.is_empty()),
            config_dir: self.config_dir,
            restart_timeout: parse_duration(&self.restart_timeout)?,
            resolve_timeout: parse_duration(&self.resolve_timeout)?,
            api: ApiConfig::from_parts(self.listen_address, self.listen_port, self.api_key)?,
            log_level: self.log_level.parse::<LogLevel>()?,
            ..MonitorConfig::default()
        };

        config.validate()?;
        Ok(config)
    }
}
