//! TLS support.
use anyhow::Result;
use async_native_tls::{Protocol, TlsConnector, TlsStream};
use tokio::io::{AsyncRead, AsyncWrite};

/// Performs a TLS handshake on `stream`, verifying the certificate against `hostname`.
pub async fn wrap_tls<T: AsyncRead + AsyncWrite + Unpin>(
    hostname: &str,
    stream: T,
) -> Result<TlsStream<T>> {
    let tls = TlsConnector::new().min_protocol_version(Some(Protocol::Tlsv12));
    let tls_stream = tls.connect(hostname, stream).await?;
    Ok(tls_stream)
}
