//! Utilities to help writing tests.
//!
//! This module is only compiled for test runs.

use std::cmp::min;
use std::collections::BTreeMap;

use async_channel::Sender;
use chrono::{DateTime, TimeDelta};

use crate::session::{Error, MailSession, MailboxInfo, Message, Result, SequenceRange};

/// Operation recorded by [`MockSession`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    List,
    Select(String),
    Create(String),
    Fetch(String),
    Append(String, u32),
    Store(Vec<u32>),
    Expunge,
    Close,
}

/// In-memory mail account.
#[derive(Debug)]
pub(crate) struct MockSession {
    mailboxes: BTreeMap<String, Vec<Message>>,
    selected: Option<String>,
    next_uid: u32,
    uid_validity: u32,

    /// Every operation in the order it was called.
    pub calls: Vec<Call>,

    /// Number of appends which succeed before every further append fails.
    pub fail_append_after: Option<usize>,

    /// Create fails with an error other than "already exists".
    pub fail_create: bool,

    /// UID STORE fails.
    pub fail_store: bool,

    /// Number of upcoming EXPUNGE commands which fail.
    pub fail_expunge: usize,

    /// FETCH fails after delivering this many messages.
    pub fail_fetch_after: Option<usize>,

    /// FETCH returns no messages.
    pub fetch_nothing: bool,

    /// Messages appended to the selected mailbox after each EXPUNGE,
    /// taken from the front, one entry per EXPUNGE.
    pub arrivals: Vec<u32>,

    appends: usize,
}

impl MockSession {
    pub fn new() -> Self {
        Self {
            mailboxes: BTreeMap::new(),
            selected: None,
            next_uid: 1,
            uid_validity: 1,
            calls: Vec::new(),
            fail_append_after: None,
            fail_create: false,
            fail_store: false,
            fail_expunge: 0,
            fail_fetch_after: None,
            fetch_nothing: false,
            arrivals: Vec::new(),
            appends: 0,
        }
    }

    /// Adds a mailbox with `count` generated messages.
    pub fn with_mailbox(mut self, name: &str, count: u32) -> Self {
        self.mailboxes.entry(name.to_string()).or_default();
        self.add_messages(name, count);
        self
    }

    fn add_messages(&mut self, name: &str, count: u32) {
        for _ in 0..count {
            let uid = self.next_uid;
            self.next_uid += 1;
            let message = generate_message(uid);
            self.mailboxes
                .entry(name.to_string())
                .or_default()
                .push(message);
        }
    }

    pub fn messages(&self, name: &str) -> &[Message] {
        self.mailboxes.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_mailbox(&self, name: &str) -> bool {
        self.mailboxes.contains_key(name)
    }

    /// Counts recorded calls matching `pred`.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| pred(call)).count()
    }

    /// Returns the sequence sets of all FETCH commands.
    pub fn fetches(&self) -> Vec<&str> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Fetch(set) => Some(set.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Returns the UID sets of all STORE commands.
    pub fn stores(&self) -> Vec<&[u32]> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Store(uids) => Some(uids.as_slice()),
                _ => None,
            })
            .collect()
    }

    fn selected_mut(&mut self) -> Result<&mut Vec<Message>> {
        let name = self
            .selected
            .as_ref()
            .ok_or_else(|| Error::Protocol("No mailbox selected".to_string()))?;
        self.mailboxes
            .get_mut(name)
            .ok_or_else(|| Error::Protocol(format!("Mailbox {name} vanished")))
    }
}

/// Generates a message with UID `uid`.
///
/// Every second message is seen.
pub(crate) fn generate_message(uid: u32) -> Message {
    let date = DateTime::parse_from_rfc3339("2023-04-01T10:00:00+02:00").unwrap()
        + TimeDelta::minutes(i64::from(uid));
    let mut flags = Vec::new();
    if uid % 2 == 0 {
        flags.push("\\Seen".to_string());
    }
    let body = format!(
        "From: alice@example.org\r\nSubject: Message {uid}\r\n\r\nHello {uid}\r\n"
    )
    .into_bytes();
    Message {
        uid,
        flags,
        internal_date: Some(date),
        size: Some(body.len() as u32),
        subject: Some(format!("Message {uid}")),
        body,
    }
}

impl MailSession for MockSession {
    async fn list_mailboxes(&mut self) -> Result<Vec<String>> {
        self.calls.push(Call::List);
        Ok(self.mailboxes.keys().cloned().collect())
    }

    async fn select_mailbox(&mut self, name: &str, _read_only: bool) -> Result<MailboxInfo> {
        self.calls.push(Call::Select(name.to_string()));
        match self.mailboxes.get(name) {
            Some(messages) => {
                self.selected = Some(name.to_string());
                Ok(MailboxInfo {
                    exists: messages.len() as u32,
                    uid_validity: Some(self.uid_validity),
                })
            }
            None => {
                self.selected = None;
                Err(Error::NoMailbox(
                    name.to_string(),
                    "Mailbox doesn't exist".to_string(),
                ))
            }
        }
    }

    async fn create_mailbox(&mut self, name: &str) -> Result<()> {
        self.calls.push(Call::Create(name.to_string()));
        if self.fail_create {
            return Err(Error::Protocol("Permission denied".to_string()));
        }
        if self.mailboxes.contains_key(name) {
            return Err(Error::AlreadyExists(name.to_string()));
        }
        self.mailboxes.insert(name.to_string(), Vec::new());
        Ok(())
    }

    async fn fetch(&mut self, range: SequenceRange, sender: Sender<Message>) -> Result<()> {
        self.calls.push(Call::Fetch(range.to_string()));
        let fetch_nothing = self.fetch_nothing;
        let fail_after = self.fail_fetch_after;
        let messages = self.selected_mut()?;
        if fetch_nothing {
            return Ok(());
        }
        let first = range.first as usize - 1;
        let last = min(range.last as usize, messages.len());
        let batch: Vec<Message> = messages.get(first..last).unwrap_or(&[]).to_vec();

        // Deliver in reverse order, servers don't guarantee any order.
        for (i, message) in batch.into_iter().rev().enumerate() {
            if fail_after == Some(i) {
                return Err(Error::Protocol("Connection reset".to_string()));
            }
            if sender.send(message).await.is_err() {
                return Ok(());
            }
        }
        Ok(())
    }

    async fn append(&mut self, mailbox: &str, message: &Message) -> Result<()> {
        self.calls.push(Call::Append(mailbox.to_string(), message.uid));
        if self.fail_append_after == Some(self.appends) {
            return Err(Error::Protocol("Quota exceeded".to_string()));
        }
        self.appends += 1;

        let uid = self.next_uid;
        self.next_uid += 1;
        let messages = self
            .mailboxes
            .get_mut(mailbox)
            .ok_or_else(|| Error::Protocol("[TRYCREATE] No such mailbox".to_string()))?;
        messages.push(Message {
            uid,
            ..message.clone()
        });
        Ok(())
    }

    async fn mark_deleted(&mut self, uids: &[u32]) -> Result<()> {
        self.calls.push(Call::Store(uids.to_vec()));
        if self.fail_store {
            return Err(Error::Protocol("STORE failed".to_string()));
        }
        for message in self.selected_mut()? {
            if uids.contains(&message.uid) && !message.flags.iter().any(|f| f == "\\Deleted") {
                message.flags.push("\\Deleted".to_string());
            }
        }
        Ok(())
    }

    async fn expunge(&mut self) -> Result<()> {
        self.calls.push(Call::Expunge);
        if self.fail_expunge > 0 {
            self.fail_expunge -= 1;
            return Err(Error::Protocol("EXPUNGE failed".to_string()));
        }
        self.selected_mut()?
            .retain(|message| !message.flags.iter().any(|f| f == "\\Deleted"));

        if !self.arrivals.is_empty() {
            let count = self.arrivals.remove(0);
            if let Some(name) = self.selected.clone() {
                self.add_messages(&name, count);
            }
        }
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        self.calls.push(Call::Close);
        self.selected = None;
        Ok(())
    }
}
