//! # IMAP handling module.
//!
//! Implements [`MailSession`] on top of `async-imap`.

use std::mem::take;

use async_channel::Sender;
use async_imap::error::Error as ImapError;
use async_imap::types::{Fetch, Flag, NameAttribute};
use chrono::{DateTime, FixedOffset};
use futures::TryStreamExt;
use log::{debug, info, warn};

use crate::session::{Error, MailSession, MailboxInfo, Message, Result, SequenceRange};

mod client;
mod session;

pub use session::Session;

/// Items fetched for every transferred message.
///
/// `BODY.PEEK[]` doesn't set the `\Seen` flag on the source message.
const FETCH_ITEMS: &str = "(UID FLAGS INTERNALDATE RFC822.SIZE ENVELOPE BODY.PEEK[])";

const DELETED_QUERY: &str = "+FLAGS.SILENT (\\Deleted)";

/// Format of INTERNALDATE as used by the APPEND command.
const INTERNALDATE_FORMAT: &str = "%d-%b-%Y %H:%M:%S %z";

impl From<ImapError> for Error {
    fn from(err: ImapError) -> Self {
        Error::Protocol(err.to_string())
    }
}

impl MailSession for Session {
    async fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        let names: Vec<_> = self
            .inner
            .list(Some(""), Some("*"))
            .await?
            .try_collect()
            .await?;

        let mut mailboxes = Vec::with_capacity(names.len());
        for name in names {
            if name.attributes().contains(&NameAttribute::NoSelect) {
                debug!("Skipping mailbox {:?} which cannot be selected.", name.name());
                continue;
            }
            mailboxes.push(name.name().to_string());
        }
        Ok(mailboxes)
    }

    async fn select_mailbox(&mut self, name: &str, read_only: bool) -> Result<MailboxInfo> {
        self.selected_mailbox = None;
        let res = if read_only {
            self.inner.examine(name).await
        } else {
            self.inner.select(name).await
        };
        match res {
            Ok(mailbox) => {
                self.selected_mailbox = Some(name.to_string());
                Ok(MailboxInfo {
                    exists: mailbox.exists,
                    uid_validity: mailbox.uid_validity,
                })
            }
            Err(ImapError::No(response)) => Err(Error::NoMailbox(name.to_string(), response)),
            Err(err) => Err(err.into()),
        }
    }

    async fn create_mailbox(&mut self, name: &str) -> Result<()> {
        match self.inner.create(name).await {
            Ok(()) => Ok(()),
            Err(ImapError::No(response)) if is_already_exists(&response) => {
                Err(Error::AlreadyExists(name.to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn fetch(&mut self, range: SequenceRange, sender: Sender<Message>) -> Result<()> {
        let set = range.to_string();
        let mut responses = std::pin::pin!(self.inner.fetch(&set, FETCH_ITEMS).await?);

        while let Some(fetch) = responses.try_next().await? {
            let Some(message) = message_from_fetch(&fetch) else {
                continue;
            };
            if sender.send(message).await.is_err() {
                debug!("Stopped fetching {set}, nobody is receiving messages.");
                // Read up to the tagged response so the next command starts on a clean connection.
                while responses.try_next().await?.is_some() {}
                return Ok(());
            }
        }
        Ok(())
    }

    async fn append(&mut self, mailbox: &str, message: &Message) -> Result<()> {
        let flags = append_flags(&message.flags);
        let internal_date = message.internal_date.as_ref().map(format_internal_date);
        // async-imap puts the mailbox name into quotes without escaping it.
        self.inner
            .append(
                escape_quoted(mailbox),
                flags.as_deref(),
                internal_date.as_deref(),
                &message.body,
            )
            .await?;
        Ok(())
    }

    async fn mark_deleted(&mut self, uids: &[u32]) -> Result<()> {
        for set in build_sequence_sets(uids) {
            let _responses: Vec<Fetch> = self
                .inner
                .uid_store(&set, DELETED_QUERY)
                .await?
                .try_collect()
                .await?;
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        let expunged: Vec<u32> = self.inner.expunge().await?.try_collect().await?;
        debug!(
            "Expunged {} messages from {:?}.",
            expunged.len(),
            self.selected_mailbox().unwrap_or_default()
        );
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.selected_mailbox = None;
        self.inner.logout().await?;
        info!("Logged out.");
        Ok(())
    }
}

/// Converts a FETCH response into a [`Message`].
///
/// Returns `None` for responses without UID or body, e.g. unsolicited flag updates.
fn message_from_fetch(fetch: &Fetch) -> Option<Message> {
    let Some(uid) = fetch.uid else {
        info!("Skipping FETCH response without UID.");
        return None;
    };
    let Some(body) = fetch.body() else {
        warn!("Skipping message UID {uid} without a body.");
        return None;
    };
    let subject = fetch
        .envelope()
        .and_then(|envelope| envelope.subject.as_ref())
        .map(|subject| String::from_utf8_lossy(subject).into_owned());

    Some(Message {
        uid,
        flags: fetch.flags().map(|flag| format_flag(&flag)).collect(),
        internal_date: fetch.internal_date(),
        size: fetch.size,
        subject,
        body: body.to_vec(),
    })
}

/// Returns the IMAP representation of a flag.
fn format_flag(flag: &Flag) -> String {
    match flag {
        Flag::Seen => "\\Seen".to_string(),
        Flag::Answered => "\\Answered".to_string(),
        Flag::Flagged => "\\Flagged".to_string(),
        Flag::Deleted => "\\Deleted".to_string(),
        Flag::Draft => "\\Draft".to_string(),
        Flag::Recent => "\\Recent".to_string(),
        Flag::MayCreate => "\\*".to_string(),
        Flag::Custom(name) => name.to_string(),
    }
}

/// Returns the parenthesized flag list for APPEND, e.g. `(\Seen $Forwarded)`.
///
/// `\Recent` is set by the server only and must not be appended.
fn append_flags(flags: &[String]) -> Option<String> {
    let flags: Vec<&str> = flags
        .iter()
        .map(String::as_str)
        .filter(|flag| !flag.eq_ignore_ascii_case("\\Recent"))
        .collect();
    if flags.is_empty() {
        None
    } else {
        Some(format!("({})", flags.join(" ")))
    }
}

/// Returns INTERNALDATE as the quoted `date-time` APPEND expects.
fn format_internal_date(date: &DateTime<FixedOffset>) -> String {
    format!("\"{}\"", date.format(INTERNALDATE_FORMAT))
}

/// Escapes `"` and `\` for use inside a quoted string.
fn escape_quoted(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Returns true if a NO response to CREATE says that the mailbox exists.
///
/// Checks for the `[ALREADYEXISTS]` response code of RFC 5530,
/// servers without it usually put "already exists" into the text.
fn is_already_exists(response: &str) -> bool {
    let response = response.to_ascii_lowercase();
    response.contains("[alreadyexists]") || response.contains("already exists")
}

/// Builds a list of UID sets. The returned sets have each no more than around 1000
/// characters because according to <https://tools.ietf.org/html/rfc2683#section-3.2.1.5>
/// command lines should not be much more than 1000 chars (servers should allow at least 8000 chars)
fn build_sequence_sets(uids: &[u32]) -> Vec<String> {
    // first, try to find consecutive ranges:
    let mut ranges: Vec<UidRange> = vec![];

    for &current in uids {
        if let Some(last) = ranges.last_mut() {
            if last.end.checked_add(1) == Some(current) {
                last.end = current;
                continue;
            }
        }

        ranges.push(UidRange {
            start: current,
            end: current,
        });
    }

    // Second, sort the uids into uid sets that are each below ~1000 characters
    let mut result = vec![];
    let mut last_str = String::new();
    for range in ranges {
        if !last_str.is_empty() {
            last_str.push(',');
        }
        last_str.push_str(&range.to_string());

        if last_str.len() > 990 {
            result.push(take(&mut last_str));
        }
    }
    result.push(last_str);

    result.retain(|s| !s.is_empty());
    result
}

struct UidRange {
    start: u32,
    end: u32,
    // If start == end, then this range represents a single number
}

impl std::fmt::Display for UidRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}:{}", self.start, self.end)
        }
    }
}
