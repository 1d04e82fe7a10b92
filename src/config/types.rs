//! Configuration types and CLI options.
//!
//! This module defines the command-line surface and the immutable runtime
//! configuration derived from it.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::config::constants::{DEFAULT_HTML_ROOT, DEFAULT_SESSION_EXPIRY_SECS};
use crate::strategy::Strategy;

/// Logging level for the application.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Log output format.
#[derive(Clone, Debug, ValueEnum)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

/// Command-line options.
///
/// Parsed once at startup and converted into an [`AppConfig`].
#[derive(Debug, Parser)]
#[command(
    name = "rebinder",
    about = "DNS rebinding attack server: rebinding DNS authority plus HTTP listener fleet"
)]
pub struct Options {
    /// Public IP address of this host; answers the first resolution so the
    /// victim fetches the attack payload from us
    #[arg(long)]
    pub response_ip: String,

    /// Fallback rebound address used when no program is encoded in the query
    #[arg(long, default_value = "127.0.0.1")]
    pub response_rebound_ip: String,

    /// HTTP ports to listen on (repeatable)
    #[arg(long = "http-port", default_values_t = vec![8080u16])]
    pub http_ports: Vec<u16>,

    /// Default rebinding strategy when the query does not carry a known tag
    #[arg(long, value_enum, default_value = "fs")]
    pub strategy: Strategy,

    /// Seconds during which the first-then-second strategy keeps answering
    /// with the rebound target
    #[arg(long, default_value_t = 300)]
    pub rebind_timeout: u64,

    /// Allow clients to start one extra HTTP listener via PUT /servers
    #[arg(long)]
    pub allow_dynamic_http_servers: bool,

    /// Address the DNS server binds to (UDP and TCP)
    #[arg(long, default_value = "0.0.0.0:53")]
    pub dns_bind_addr: String,

    /// Port of the external WebSocket HTTP proxy, advertised to attack pages
    #[arg(long, default_value_t = 3129)]
    pub ws_proxy_port: u16,

    /// Set IP_TRANSPARENT on HTTP listeners (Linux TPROXY support)
    #[arg(long)]
    pub tproxy: bool,

    /// Silently ignore DNS queries from these peer addresses (repeatable)
    #[arg(long = "ignore-dns-from")]
    pub ignore_dns_from: Vec<IpAddr>,

    /// Directory served on the catch-all route; its payloads/ subdirectory
    /// feeds the attack frame
    #[arg(long, default_value = DEFAULT_HTML_ROOT)]
    pub html_root: PathBuf,

    /// Seconds between session expiry sweeps; sessions idle longer than
    /// this are dropped
    #[arg(long, default_value_t = DEFAULT_SESSION_EXPIRY_SECS)]
    pub session_expiry: u64,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Log format
    #[arg(long, value_enum, default_value = "plain")]
    pub log_format: LogFormat,
}

/// Immutable runtime configuration.
///
/// Built from [`Options`] at startup and shared read-only by every task.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Ports of the static HTTP listeners.
    pub http_server_ports: Vec<u16>,
    /// Public attacker IP, answered on first resolution and on
    /// QNAME-minimization probes. Kept as a string: an unparseable value
    /// silently disables the minimization fallback rather than aborting.
    pub response_ip: String,
    /// Fallback rebound address when no program is encoded.
    pub response_rebound_ip: String,
    /// Strategy applied when the query carries no known tag.
    pub default_strategy: Strategy,
    /// Rebind timeout for the first-then-second strategy, in seconds.
    pub rebound_timeout_secs: u64,
    /// Whether `PUT /servers` may start a dynamic listener.
    pub allow_dynamic_http_servers: bool,
    /// DNS bind address, UDP and TCP.
    pub dns_bind_addr: String,
    /// WebSocket proxy port advertised to attack pages.
    pub ws_proxy_port: u16,
    /// Set IP_TRANSPARENT on HTTP listeners.
    pub tproxy: bool,
    /// Peers whose DNS queries are dropped without an answer.
    pub ignore_dns_request_from: Vec<IpAddr>,
    /// Root of the static attack pages.
    pub html_root: PathBuf,
    /// Max session idle age and sweep cadence.
    pub session_expiry: Duration,
}

impl From<&Options> for AppConfig {
    fn from(opt: &Options) -> Self {
        Self {
            http_server_ports: opt.http_ports.clone(),
            response_ip: opt.response_ip.clone(),
            response_rebound_ip: opt.response_rebound_ip.clone(),
            default_strategy: opt.strategy,
            rebound_timeout_secs: opt.rebind_timeout,
            allow_dynamic_http_servers: opt.allow_dynamic_http_servers,
            dns_bind_addr: opt.dns_bind_addr.clone(),
            ws_proxy_port: opt.ws_proxy_port,
            tproxy: opt.tproxy,
            ignore_dns_request_from: opt.ignore_dns_from.clone(),
            html_root: opt.html_root.clone(),
            session_expiry: Duration::from_secs(opt.session_expiry),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(
            log::LevelFilter::from(LogLevel::Error),
            log::LevelFilter::Error
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Info),
            log::LevelFilter::Info
        );
        assert_eq!(
            log::LevelFilter::from(LogLevel::Trace),
            log::LevelFilter::Trace
        );
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        // Catches duplicate flags, bad defaults, etc. at test time
        Options::command().debug_assert();
    }

    #[test]
    fn test_options_to_config() {
        let opt = Options::parse_from([
            "rebinder",
            "--response-ip",
            "203.0.113.5",
            "--http-port",
            "8080",
            "--http-port",
            "8081",
            "--strategy",
            "ma",
            "--rebind-timeout",
            "30",
        ]);
        let config = AppConfig::from(&opt);
        assert_eq!(config.http_server_ports, vec![8080, 8081]);
        assert_eq!(config.response_ip, "203.0.113.5");
        assert_eq!(config.default_strategy, Strategy::MultiA);
        assert_eq!(config.rebound_timeout_secs, 30);
        assert!(!config.allow_dynamic_http_servers);
        assert_eq!(config.session_expiry, Duration::from_secs(600));
    }
}
