//! DNS transport loops.
//!
//! Accepts queries over UDP and TCP on the configured bind address and
//! feeds them to the [`DnsResponder`]. TCP messages use the standard
//! two-byte length prefix.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use log::{error, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use crate::dns::responder::DnsResponder;

/// Largest UDP datagram we accept; rebinding queries are far smaller.
const MAX_UDP_MESSAGE: usize = 4096;

/// Runs the UDP and TCP DNS listeners until one of them fails.
pub async fn run_dns_server(bind_addr: &str, responder: Arc<DnsResponder>) -> Result<()> {
    let addr: SocketAddr = bind_addr
        .parse()
        .with_context(|| format!("Invalid DNS bind address: {}", bind_addr))?;

    let udp = UdpSocket::bind(addr)
        .await
        .with_context(|| format!("Failed to bind DNS UDP socket at {}", addr))?;
    let tcp = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind DNS TCP listener at {}", addr))?;

    info!("DNS: server listening on {} (udp/tcp)", addr);

    tokio::try_join!(
        run_udp(Arc::new(udp), responder.clone()),
        run_tcp(tcp, responder),
    )?;

    Ok(())
}

async fn run_udp(socket: Arc<UdpSocket>, responder: Arc<DnsResponder>) -> Result<()> {
    let mut buf = [0u8; MAX_UDP_MESSAGE];
    loop {
        let (len, peer) = socket
            .recv_from(&mut buf)
            .await
            .context("DNS UDP receive failed")?;
        let payload = buf[..len].to_vec();
        let socket = socket.clone();
        let responder = responder.clone();
        tokio::spawn(async move {
            if let Some(reply) = responder.handle(&payload, peer) {
                if let Err(e) = socket.send_to(&reply, peer).await {
                    warn!("DNS: failed to send response to {}: {}", peer, e);
                }
            }
        });
    }
}

async fn run_tcp(listener: TcpListener, responder: Arc<DnsResponder>) -> Result<()> {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(pair) => pair,
            Err(e) => {
                error!("DNS: failed to accept TCP connection: {}", e);
                continue;
            }
        };
        let responder = responder.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_tcp_connection(stream, peer, responder).await {
                warn!("DNS: TCP connection from {} ended with error: {}", peer, e);
            }
        });
    }
}

/// Serves length-prefixed DNS messages on one TCP connection until EOF.
async fn handle_tcp_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    responder: Arc<DnsResponder>,
) -> Result<()> {
    loop {
        let mut len_buf = [0u8; 2];
        match stream.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e).context("Failed to read DNS message length"),
        }
        let len = u16::from_be_bytes(len_buf) as usize;
        if len == 0 {
            continue;
        }

        let mut payload = vec![0u8; len];
        stream
            .read_exact(&mut payload)
            .await
            .context("Failed to read DNS message payload")?;

        // A dropped query produces no bytes on TCP either; the peer sees
        // the silence and gives up on its own.
        if let Some(reply) = responder.handle(&payload, peer) {
            if reply.len() > u16::MAX as usize {
                anyhow::bail!("DNS response exceeds TCP frame size limit");
            }
            stream
                .write_u16(reply.len() as u16)
                .await
                .context("Failed to write DNS message length")?;
            stream
                .write_all(&reply)
                .await
                .context("Failed to write DNS message payload")?;
            stream.flush().await.context("Failed to flush DNS message")?;
        }
    }
    Ok(())
}
