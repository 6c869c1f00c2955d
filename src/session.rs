//! # Mail session capability
//!
//! The transfer engine only talks to mail accounts through [`MailSession`].
//! [`crate::imap::Session`] implements it on top of `async-imap`,
//! tests implement it with an in-memory mailbox store.

use std::fmt;

use async_channel::Sender;
use chrono::{DateTime, FixedOffset};

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot connect to {0}: {1}")]
    Connection(String, String),

    #[error("Cannot login as {0}: {1}")]
    Auth(String, String),

    #[error("Got a NO response when trying to select {0}, usually this means that it doesn't exist: {1}")]
    NoMailbox(String, String),

    #[error("Mailbox {0} already exists")]
    AlreadyExists(String),

    #[error("IMAP error: {0}")]
    Protocol(String),
}

/// Mailbox state reported by SELECT.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MailboxInfo {
    /// Number of messages in the mailbox.
    pub exists: u32,

    pub uid_validity: Option<u32>,
}

/// Inclusive range of message sequence numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceRange {
    pub first: u32,
    pub last: u32,
}

impl SequenceRange {
    /// Returns the range `1:n`, i.e. the first `n` messages of the selected mailbox.
    pub fn first_n(n: u32) -> Self {
        Self { first: 1, last: n }
    }

    pub fn len(&self) -> u32 {
        self.last.saturating_sub(self.first) + 1
    }
}

impl fmt::Display for SequenceRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.first == self.last {
            write!(f, "{}", self.first)
        } else {
            write!(f, "{}:{}", self.first, self.last)
        }
    }
}

/// A message fetched from the source mailbox.
#[derive(Clone, PartialEq, Eq)]
pub struct Message {
    /// Server UID, valid within the current UIDVALIDITY of the mailbox.
    pub uid: u32,

    /// Flags in IMAP syntax, e.g. `\Seen` or `$Forwarded`.
    pub flags: Vec<String>,

    /// INTERNALDATE of the message.
    pub internal_date: Option<DateTime<FixedOffset>>,

    /// RFC822.SIZE as reported by the server.
    pub size: Option<u32>,

    /// Subject from the envelope, only used for logging.
    pub subject: Option<String>,

    /// Raw RFC 822 message.
    pub body: Vec<u8>,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("uid", &self.uid)
            .field("flags", &self.flags)
            .field("internal_date", &self.internal_date)
            .field("size", &self.size)
            .field("subject", &self.subject)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Operations the migration needs from an authenticated mail account.
///
/// All methods are used by a single owner at a time,
/// so implementations don't need to support concurrent calls.
#[allow(async_fn_in_trait)]
pub trait MailSession {
    /// Lists the names of all mailboxes visible to the account.
    async fn list_mailboxes(&mut self) -> Result<Vec<String>>;

    /// Selects a mailbox, read-only if `read_only` is set.
    async fn select_mailbox(&mut self, name: &str, read_only: bool) -> Result<MailboxInfo>;

    /// Creates a mailbox.
    ///
    /// Returns [`Error::AlreadyExists`] if the server reports that the mailbox exists.
    async fn create_mailbox(&mut self, name: &str) -> Result<()>;

    /// Fetches the messages in `range` of the selected mailbox.
    ///
    /// Messages are sent to `sender` as soon as they arrive,
    /// not necessarily in sequence number order.
    /// Returns early without an error if the receiving side is closed.
    async fn fetch(&mut self, range: SequenceRange, sender: Sender<Message>) -> Result<()>;

    /// Appends `message` with its flags and internal date to `mailbox`.
    async fn append(&mut self, mailbox: &str, message: &Message) -> Result<()>;

    /// Adds the `\Deleted` flag to the messages with the given UIDs
    /// in the selected mailbox.
    async fn mark_deleted(&mut self, uids: &[u32]) -> Result<()>;

    /// Permanently removes messages flagged as `\Deleted` from the selected mailbox.
    async fn expunge(&mut self) -> Result<()>;

    /// Logs out and releases the connection.
    async fn close(&mut self) -> Result<()>;
}
