//! HTTP listener fleet supervision.
//!
//! Two compartments behind one lock: the static listeners built from the
//! configuration at startup, and a single dynamic slot replaceable at
//! runtime through `PUT /servers`. Every listener's terminal error is
//! fanned in on one channel; the run loop decides what to do with it.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};

use anyhow::{Context, Result};
use log::info;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::http::dispatcher::{serve_connection, AppContext};

/// Terminal error of one listener, published on the fan-in channel.
#[derive(Debug)]
pub struct HttpServerError {
    /// What ended the listener.
    pub error: String,
    /// The listener's bound address.
    pub addr: SocketAddr,
}

struct ListenerHandle {
    addr: SocketAddr,
    shutdown: CancellationToken,
}

#[derive(Default)]
struct Compartments {
    static_servers: Vec<ListenerHandle>,
    dynamic_server: Option<ListenerHandle>,
}

/// The listener fleet: static compartment, dynamic slot, error channel.
pub struct HttpServerStore {
    compartments: RwLock<Compartments>,
    errors: mpsc::UnboundedSender<HttpServerError>,
}

impl HttpServerStore {
    /// Creates an empty store and the receiving end of its error channel.
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<HttpServerError>) {
        let (errors, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                compartments: RwLock::new(Compartments::default()),
                errors,
            }),
            rx,
        )
    }

    /// Ports of all live listeners, static compartment first.
    pub fn server_ports(&self) -> Vec<u16> {
        let compartments = self.compartments.read().unwrap_or_else(|e| e.into_inner());
        let mut ports: Vec<u16> = compartments
            .static_servers
            .iter()
            .map(|h| h.addr.port())
            .collect();
        if let Some(dynamic) = &compartments.dynamic_server {
            ports.push(dynamic.addr.port());
        }
        ports
    }

    /// Port of the dynamic listener, if one is installed.
    pub fn dynamic_port(&self) -> Option<u16> {
        let compartments = self.compartments.read().unwrap_or_else(|e| e.into_inner());
        compartments.dynamic_server.as_ref().map(|h| h.addr.port())
    }

    /// Binds a static listener and spawns its accept loop.
    ///
    /// The transparent-proxy socket option is applied when configured.
    pub fn start_static(&self, port: u16, ctx: Arc<AppContext>) -> Result<()> {
        let listener = bind_listener(port, ctx.config.tproxy)?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        {
            let mut compartments = self.compartments.write().unwrap_or_else(|e| e.into_inner());
            compartments.static_servers.push(ListenerHandle {
                addr,
                shutdown: shutdown.clone(),
            });
        }
        tokio::spawn(run_listener(listener, addr, shutdown, ctx, self.errors.clone()));
        Ok(())
    }

    /// Binds a listener into the dynamic slot, replacing and stopping any
    /// previous occupant.
    ///
    /// A port already held by a static listener is never installed in the
    /// slot; dynamic listeners do not get the transparent-proxy option.
    pub fn start_dynamic(&self, port: u16, ctx: Arc<AppContext>) -> Result<()> {
        let listener = bind_listener(port, false)?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        {
            let mut compartments = self.compartments.write().unwrap_or_else(|e| e.into_inner());
            if compartments
                .static_servers
                .iter()
                .any(|h| h.addr.port() == addr.port())
            {
                return Ok(());
            }
            if let Some(old) = compartments.dynamic_server.replace(ListenerHandle {
                addr,
                shutdown: shutdown.clone(),
            }) {
                old.shutdown.cancel();
            }
        }
        tokio::spawn(run_listener(listener, addr, shutdown, ctx, self.errors.clone()));
        Ok(())
    }

    /// Stops and clears the dynamic slot, if occupied.
    pub fn stop_dynamic(&self) {
        let mut compartments = self.compartments.write().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = compartments.dynamic_server.take() {
            info!("HTTP: stopping HTTP server on {}", handle.addr);
            handle.shutdown.cancel();
        }
    }
}

/// Accepts connections until cancelled or the listener dies; the terminal
/// condition is published on the error channel either way.
async fn run_listener(
    listener: TcpListener,
    addr: SocketAddr,
    shutdown: CancellationToken,
    ctx: Arc<AppContext>,
    errors: mpsc::UnboundedSender<HttpServerError>,
) {
    info!("HTTP: starting HTTP server on {}", addr);
    let terminal = loop {
        tokio::select! {
            _ = shutdown.cancelled() => break "listener closed".to_string(),
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    let local = stream.local_addr().unwrap_or(addr);
                    tokio::spawn(serve_connection(stream, peer, local, ctx.clone()));
                }
                Err(e) => break format!("accept failed: {}", e),
            }
        }
    };
    let _ = errors.send(HttpServerError {
        error: terminal,
        addr,
    });
}

/// Binds a TCP listener on all interfaces, optionally transparent.
fn bind_listener(port: u16, tproxy: bool) -> Result<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = std::net::TcpListener::bind(addr)
        .with_context(|| format!("Failed to bind HTTP listener at {}", addr))?;
    if tproxy {
        set_transparent(&listener).context("Failed to set IP_TRANSPARENT")?;
    }
    listener
        .set_nonblocking(true)
        .context("Failed to make HTTP listener non-blocking")?;
    TcpListener::from_std(listener).context("Failed to register HTTP listener with the runtime")
}

/// Sets IP_TRANSPARENT so TPROXY-redirected flows land on this listener.
#[cfg(target_os = "linux")]
fn set_transparent(listener: &std::net::TcpListener) -> Result<()> {
    use std::os::fd::AsRawFd;

    let fd = listener.as_raw_fd();
    let one: libc::c_int = 1;
    let ret = unsafe {
        libc::setsockopt(
            fd,
            libc::IPPROTO_IP,
            libc::IP_TRANSPARENT,
            &one as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if ret != 0 {
        anyhow::bail!(
            "setsockopt(IP_TRANSPARENT) failed: {} (requires CAP_NET_ADMIN)",
            std::io::Error::last_os_error()
        );
    }
    Ok(())
}

#[cfg(not(target_os = "linux"))]
fn set_transparent(_listener: &std::net::TcpListener) -> Result<()> {
    anyhow::bail!("IP_TRANSPARENT is only available on Linux")
}
