use anyhow::{Context as _, Result};
use async_imap::Client as ImapClient;

use super::session::Session;
use crate::net::connect_tls;
use crate::net::session::SessionStream;

/// IMAP connection which has not been authenticated yet.
#[derive(Debug)]
pub(crate) struct Client {
    inner: ImapClient<Box<dyn SessionStream>>,
}

impl Client {
    pub(crate) async fn login(self, username: &str, password: &str) -> Result<Session> {
        let Client { inner } = self;
        let session = inner
            .login(username, password)
            .await
            .map_err(|(err, _client)| err)?;
        Ok(Session::new(session))
    }

    /// Connects with implicit TLS and reads the server greeting.
    pub async fn connect_secure(hostname: &str, port: u16) -> Result<Self> {
        let tls_stream = connect_tls(hostname, port).await?;
        Self::new(tls_stream).await
    }

    /// Starts an IMAP conversation on an established stream by reading the greeting.
    pub(crate) async fn new(stream: Box<dyn SessionStream>) -> Result<Self> {
        let mut client = ImapClient::new(stream);

        let _greeting = client
            .read_response()
            .await
            .context("failed to read greeting")?
            .context("failed to read greeting")?;

        Ok(Client { inner: client })
    }
}
