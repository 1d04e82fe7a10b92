//! rebinder library: DNS rebinding attack server core.
//!
//! An attacker-controlled DNS + HTTP server pair. The DNS authority
//! decodes a per-victim rebinding program from the query name and answers
//! according to one of four strategies; the HTTP listener fleet serves
//! the attack pages and, on the multi-A path, synthesizes a packet-filter
//! rule that drops the attacker-bound flow so the victim browser fails
//! over to the target address.
//!
//! # Example
//!
//! ```no_run
//! use rebinder::{run, AppConfig, Options};
//! use clap::Parser;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = Options::parse_from([
//!     "rebinder",
//!     "--response-ip", "203.0.113.5",
//!     "--http-port", "8080",
//! ]);
//! run(AppConfig::from(&options)).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your
//! application or ensure you're calling library functions within an async
//! context. Binding port 53 and installing packet-filter rules both need
//! elevated privileges.

#![warn(missing_docs)]

pub mod config;
pub mod dns;
pub mod error_handling;
pub mod firewall;
pub mod http;
pub mod initialization;
pub mod session;
pub mod strategy;

// Re-export public API
pub use config::{AppConfig, LogFormat, LogLevel, Options};
pub use run::run;

// Internal run module (wires the stores, fleet, and servers together)
mod run {
    use std::sync::Arc;

    use anyhow::{anyhow, Context, Result};
    use log::{info, warn};

    use crate::config::AppConfig;
    use crate::dns::{run_dns_server, DnsResponder};
    use crate::firewall::platform_packet_filter;
    use crate::http::{AppContext, HttpServerStore};
    use crate::session::{spawn_expiry_sweeper, SessionStore};

    /// Runs the rebinding server until a shutdown signal or a fatal DNS
    /// server error.
    ///
    /// Starts every static HTTP listener, the session expiry sweeper, and
    /// the DNS authority. Listener terminal errors are logged as they
    /// arrive on the fan-in channel; they do not stop the process, and
    /// failed listeners are not restarted.
    ///
    /// # Errors
    ///
    /// Returns an error if a static listener cannot be bound at startup
    /// or if the DNS server terminates.
    pub async fn run(config: AppConfig) -> Result<()> {
        let config = Arc::new(config);
        let sessions = Arc::new(SessionStore::new());
        let (servers, mut listener_errors) = HttpServerStore::new();
        let filter = platform_packet_filter();

        let ctx = Arc::new(AppContext {
            config: Arc::clone(&config),
            sessions: Arc::clone(&sessions),
            servers: Arc::clone(&servers),
            filter,
        });

        for port in &config.http_server_ports {
            servers
                .start_static(*port, Arc::clone(&ctx))
                .with_context(|| format!("Failed to start HTTP listener on port {}", port))?;
        }

        let sweeper = spawn_expiry_sweeper(Arc::clone(&sessions), config.session_expiry);

        let responder = Arc::new(DnsResponder::new(
            Arc::clone(&config),
            Arc::clone(&sessions),
        ));
        let dns_bind = config.dns_bind_addr.clone();
        let mut dns_task =
            tokio::spawn(async move { run_dns_server(&dns_bind, responder).await });

        let result = loop {
            tokio::select! {
                result = &mut dns_task => {
                    break match result {
                        Ok(inner) => inner.context("DNS server terminated unexpectedly"),
                        Err(e) => Err(anyhow!("DNS server task failed: {}", e)),
                    };
                }
                Some(err) = listener_errors.recv() => {
                    warn!("HTTP: server on {} terminated: {}", err.addr, err.error);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutdown signal received; stopping");
                    break Ok(());
                }
            }
        };

        sweeper.abort();
        result
    }
}
