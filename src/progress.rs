//! # Transfer progress.

use std::time::{Duration, Instant};

/// Receives progress updates from the transfer loop.
pub trait Progress {
    /// Starts accounting for a new mailbox with `total` messages.
    fn begin(&mut self, mailbox: &str, total: u32);

    /// Records one more transferred message.
    fn increment(&mut self);

    /// Time since the last [`Progress::begin`].
    fn elapsed(&self) -> Duration;
}

/// Per-mailbox counters which are reported to the log.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    mailbox: String,
    transferred: u32,
    total: u32,
    started: Instant,
}

impl Default for TransferProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferProgress {
    pub fn new() -> Self {
        Self {
            mailbox: String::new(),
            transferred: 0,
            total: 0,
            started: Instant::now(),
        }
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    pub fn transferred(&self) -> u32 {
        self.transferred
    }

    /// Number of messages the mailbox had when it was first selected.
    ///
    /// Messages arriving during the transfer are transferred as well,
    /// so `transferred` may end up larger than `total`.
    pub fn total(&self) -> u32 {
        self.total
    }
}

impl Progress for TransferProgress {
    fn begin(&mut self, mailbox: &str, total: u32) {
        self.mailbox = mailbox.to_string();
        self.transferred = 0;
        self.total = total;
        self.started = Instant::now();
        log::info!("{}: 0/{}", self.mailbox, self.total);
    }

    fn increment(&mut self) {
        self.transferred = self.transferred.saturating_add(1);
        log::debug!("{}: {}/{}", self.mailbox, self.transferred, self.total);
        if self.transferred == self.total {
            log::info!(
                "{}: {}/{} in {:.1?}",
                self.mailbox,
                self.transferred,
                self.total,
                self.elapsed()
            );
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}
