use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream an IMAP session runs on.
///
/// Boxed as `Box<dyn SessionStream>` so the IMAP types don't depend
/// on the layering of TCP, timeouts, TLS and buffering below them.
pub(crate) trait SessionStream:
    AsyncRead + AsyncWrite + Unpin + Send + Sync + std::fmt::Debug
{
}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync + std::fmt::Debug> SessionStream for T {}
