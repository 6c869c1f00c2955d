//! # Common network utilities.
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;

use anyhow::{format_err, Context as _, Result};
use tokio::io::BufWriter;
use tokio::net::{lookup_host, TcpStream};
use tokio::time::timeout;
use tokio_io_timeout::TimeoutStream;

pub(crate) mod session;
pub(crate) mod tls;

use session::SessionStream;
use tls::wrap_tls;

/// Connection, write and read timeout.
///
/// This constant should be more than the largest expected RTT.
pub(crate) const TIMEOUT: Duration = Duration::from_secs(60);

/// Returns a TCP connection stream with read/write timeouts set
/// and Nagle's algorithm disabled with `TCP_NODELAY`.
pub(crate) async fn connect_tcp_inner(
    addr: SocketAddr,
) -> Result<Pin<Box<TimeoutStream<TcpStream>>>> {
    let tcp_stream = timeout(TIMEOUT, TcpStream::connect(addr))
        .await
        .context("connection timeout")?
        .context("connection failure")?;

    // Disable Nagle's algorithm.
    tcp_stream.set_nodelay(true)?;

    let mut timeout_stream = TimeoutStream::new(tcp_stream);
    timeout_stream.set_write_timeout(Some(TIMEOUT));
    timeout_stream.set_read_timeout(Some(TIMEOUT));

    Ok(Box::pin(timeout_stream))
}

/// Resolves `host` and connects to the first address accepting the connection.
///
/// If all connection attempts fail, returns the first error.
pub(crate) async fn connect_tcp(
    host: &str,
    port: u16,
) -> Result<Pin<Box<TimeoutStream<TcpStream>>>> {
    let addrs = timeout(TIMEOUT, lookup_host((host, port)))
        .await
        .context("DNS lookup timeout")?
        .with_context(|| format!("failed to resolve {host:?}"))?;

    let mut first_error = None;
    for addr in addrs {
        match connect_tcp_inner(addr).await {
            Ok(stream) => {
                log::debug!("Connected to {host} ({addr}).");
                return Ok(stream);
            }
            Err(err) => {
                log::info!("Failed to connect to {host} ({addr}): {err:#}.");
                first_error.get_or_insert(err);
            }
        }
    }
    Err(first_error.unwrap_or_else(|| format_err!("no DNS resolution results for {host:?}")))
}

/// Opens a buffered TLS connection to `host`.
pub(crate) async fn connect_tls(host: &str, port: u16) -> Result<Box<dyn SessionStream>> {
    let tcp_stream = connect_tcp(host, port).await?;
    let tls_stream = wrap_tls(host, tcp_stream)
        .await
        .with_context(|| format!("TLS handshake with {host} failed"))?;
    Ok(Box::new(BufWriter::new(tls_stream)))
}
