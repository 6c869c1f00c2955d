use async_imap::Session as ImapSession;
use log::info;

use super::client::Client;
use crate::config::ServerConfig;
use crate::net::session::SessionStream;
use crate::session::{Error, Result};

/// Authenticated IMAP session.
#[derive(Debug)]
pub struct Session {
    pub(super) inner: ImapSession<Box<dyn SessionStream>>,

    /// Selected mailbox name.
    pub(super) selected_mailbox: Option<String>,
}

impl Session {
    pub(crate) fn new(inner: ImapSession<Box<dyn SessionStream>>) -> Self {
        Self {
            inner,
            selected_mailbox: None,
        }
    }

    /// Connects to the server of `config` using implicit TLS and logs in.
    pub async fn connect(config: &ServerConfig) -> Result<Self> {
        let (host, port) = config
            .host_port()
            .map_err(|err| Error::Connection(config.address.clone(), format!("{err:#}")))?;

        let client = Client::connect_secure(host, port)
            .await
            .map_err(|err| Error::Connection(format!("{host}:{port}"), format!("{err:#}")))?;
        info!("Connected to {host}:{port}.");

        let session = client
            .login(&config.username, &config.password)
            .await
            .map_err(|err| Error::Auth(config.username.clone(), format!("{err:#}")))?;
        info!("Logged in to {host} as {}.", config.username);
        Ok(session)
    }

    /// Name of the currently selected mailbox, if any.
    pub fn selected_mailbox(&self) -> Option<&str> {
        self.selected_mailbox.as_deref()
    }
}
