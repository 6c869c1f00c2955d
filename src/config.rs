//! # Migration configuration.
//!
//! The configuration is a JSON file:
//!
//! ```json
//! {
//!   "from": {"server": "imap.old.example:993", "username": "me", "password": "secret"},
//!   "to": {"server": "imap.new.example", "username": "me", "password": "secret"},
//!   "mapping": {"Sent": "Archive/Sent"},
//!   "exclude": ["Drafts"],
//!   "include": []
//! }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context as _, Result};
use serde::Deserialize;

/// Environment variable naming the configuration file.
pub const CONFIG_FILE_ENV: &str = "CONFIG_FILE";

/// File name used in the working directory if [`CONFIG_FILE_ENV`] is not set.
pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Port used if the server address does not contain one.
pub const DEFAULT_IMAPS_PORT: u16 = 993;

/// Number of messages transferred per fetch/append/expunge cycle.
pub const DEFAULT_BATCH_SIZE: u32 = 10;

/// Login parameters of one account.
#[derive(Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    /// `host:port` of the IMAPS server.
    #[serde(rename = "server")]
    pub address: String,

    pub username: String,

    pub password: String,
}

impl fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerConfig")
            .field("address", &self.address)
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

impl ServerConfig {
    /// Splits the address into host name and port.
    ///
    /// IPv6 addresses must be enclosed in brackets if a port is given,
    /// e.g. `[::1]:993`.
    pub fn host_port(&self) -> Result<(&str, u16)> {
        let address = self.address.trim();
        ensure!(!address.is_empty(), "server address is empty");

        if let Some(rest) = address.strip_prefix('[') {
            let (host, tail) = rest
                .split_once(']')
                .with_context(|| format!("unterminated IPv6 address {address:?}"))?;
            let port = match tail.strip_prefix(':') {
                Some(port) => parse_port(address, port)?,
                None if tail.is_empty() => DEFAULT_IMAPS_PORT,
                None => anyhow::bail!("invalid server address {address:?}"),
            };
            return Ok((host, port));
        }

        match address.rsplit_once(':') {
            // More than one colon without brackets: bare IPv6 address.
            Some((host, _)) if host.contains(':') => Ok((address, DEFAULT_IMAPS_PORT)),
            Some((host, port)) => {
                ensure!(!host.is_empty(), "server address {address:?} has no host");
                Ok((host, parse_port(address, port)?))
            }
            None => Ok((address, DEFAULT_IMAPS_PORT)),
        }
    }
}

fn parse_port(address: &str, port: &str) -> Result<u16> {
    port.parse()
        .with_context(|| format!("invalid port in server address {address:?}"))
}

/// Everything needed for one migration run.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct MigrationConfig {
    /// Source account.
    pub from: ServerConfig,

    /// Destination account.
    pub to: ServerConfig,

    /// Destination names for source mailboxes which should be renamed.
    #[serde(default)]
    pub mapping: BTreeMap<String, String>,

    /// Source mailboxes which are never transferred.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// If not empty, only these source mailboxes are transferred
    /// and the mailbox list of the source account is not consulted.
    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
}

fn default_batch_size() -> u32 {
    DEFAULT_BATCH_SIZE
}

impl MigrationConfig {
    /// Parses and validates a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Reads the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read configuration file {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("cannot load {}", path.display()))
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch_size must be at least 1");
        self.from.host_port().context("invalid \"from\" server")?;
        self.to.host_port().context("invalid \"to\" server")?;
        Ok(())
    }
}

/// Returns the configuration file path:
/// the value of [`CONFIG_FILE_ENV`] if set and not empty,
/// otherwise [`DEFAULT_CONFIG_FILE`] in the current working directory.
pub fn config_path() -> Result<PathBuf> {
    match std::env::var_os(CONFIG_FILE_ENV) {
        Some(path) if !path.is_empty() => Ok(PathBuf::from(path)),
        _ => {
            let cwd = std::env::current_dir().context("cannot determine working directory")?;
            Ok(cwd.join(DEFAULT_CONFIG_FILE))
        }
    }
}
