//! Host packet-filter driver.
//!
//! The multi-A rebinding path needs the host firewall to drop the
//! attacker-bound TCP flow so the victim browser fails over to the second
//! A record. The driver is deliberately narrow: add a drop rule for a
//! flow, remove it again. Both operations are best-effort and idempotent;
//! hosts without `iptables` substitute [`NoopPacketFilter`] and lose only
//! the forced connection drop.

use std::net::IpAddr;
use std::process::Command;

use anyhow::{Context, Result};
use log::info;

use crate::config::constants::SOURCE_PORT_WINDOW;

/// One TCP flow as seen from the listener: the victim is the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowRule {
    /// Victim address.
    pub src_ip: IpAddr,
    /// Victim source port at the instant of hijack.
    pub src_port: u16,
    /// Listener address.
    pub dst_ip: IpAddr,
    /// Listener port.
    pub dst_port: u16,
}

impl FlowRule {
    /// Whether the flow is IPv6; decided by the peer address family.
    pub fn is_ipv6(&self) -> bool {
        self.src_ip.is_ipv6()
    }

    /// Source-port match covering browser reconnect attempts from nearby
    /// ephemeral ports.
    pub fn source_port_range(&self) -> String {
        format!(
            "{}:{}",
            self.src_port,
            self.src_port.saturating_add(SOURCE_PORT_WINDOW)
        )
    }
}

/// Narrow interface over the host packet filter.
pub trait PacketFilter: Send + Sync {
    /// Installs a drop rule matching `rule`.
    fn add_rule(&self, rule: &FlowRule) -> Result<()>;
    /// Removes a previously installed rule.
    fn remove_rule(&self, rule: &FlowRule) -> Result<()>;
}

/// Packet filter backed by the `iptables`/`ip6tables` binaries.
#[derive(Debug, Default)]
pub struct IptablesPacketFilter;

impl IptablesPacketFilter {
    fn run(&self, action: &str, rule: &FlowRule) -> Result<()> {
        let binary = if rule.is_ipv6() { "ip6tables" } else { "iptables" };
        let src = rule.src_ip.to_string();
        let sport = rule.source_port_range();
        let dst = rule.dst_ip.to_string();
        let dport = rule.dst_port.to_string();
        let output = Command::new(binary)
            .args([
                action,
                "INPUT",
                "-p",
                "tcp",
                "-s",
                src.as_str(),
                "--sport",
                sport.as_str(),
                "-d",
                dst.as_str(),
                "--dport",
                dport.as_str(),
                "-j",
                "DROP",
            ])
            .output()
            .with_context(|| format!("Failed to execute {}", binary))?;
        if !output.status.success() {
            anyhow::bail!(
                "{} {} exited with {}: {}",
                binary,
                action,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

impl PacketFilter for IptablesPacketFilter {
    fn add_rule(&self, rule: &FlowRule) -> Result<()> {
        info!("Firewall: dropping flow {:?}", rule);
        self.run("-I", rule)
    }

    fn remove_rule(&self, rule: &FlowRule) -> Result<()> {
        info!("Firewall: releasing flow {:?}", rule);
        self.run("-D", rule)
    }
}

/// Packet filter that does nothing.
///
/// Keeps the rest of the multi-A machinery (the firewall latch included)
/// working on platforms without iptables; only the forced TCP drop is
/// elided.
#[derive(Debug, Default)]
pub struct NoopPacketFilter;

impl PacketFilter for NoopPacketFilter {
    fn add_rule(&self, _rule: &FlowRule) -> Result<()> {
        Ok(())
    }

    fn remove_rule(&self, _rule: &FlowRule) -> Result<()> {
        Ok(())
    }
}

/// The packet filter for this platform: iptables on Linux, no-op elsewhere.
pub fn platform_packet_filter() -> std::sync::Arc<dyn PacketFilter> {
    #[cfg(target_os = "linux")]
    {
        std::sync::Arc::new(IptablesPacketFilter)
    }
    #[cfg(not(target_os = "linux"))]
    {
        std::sync::Arc::new(NoopPacketFilter)
    }
}
