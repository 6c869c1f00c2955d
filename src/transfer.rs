//! # Mailbox transfer.
//!
//! Messages are moved from the source to the destination account in batches.
//! Each batch takes the first messages of the source mailbox,
//! appends them to the destination mailbox,
//! marks them as deleted on the source and expunges the source mailbox.
//! The source mailbox is selected again after every batch,
//! so messages arriving during the migration are transferred as well.
//!
//! Source messages are only marked as deleted after they have been appended,
//! so an interrupted migration may leave duplicates on the destination,
//! but never loses a message.

use std::cmp::min;
use std::time::Instant;

use log::{debug, info, warn};

use crate::log::LogExt;
use crate::mailbox_set::{MailboxPair, MailboxPlan};
use crate::progress::Progress;
use crate::session::{self, MailSession, MailboxInfo, SequenceRange};

/// Number of fetched messages which may wait for being appended.
pub const FETCH_CHANNEL_CAPACITY: usize = 10;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Cannot select source mailbox {mailbox:?}")]
    Select {
        mailbox: String,
        source: session::Error,
    },

    #[error("Cannot create destination mailbox {mailbox:?}")]
    Create {
        mailbox: String,
        source: session::Error,
    },

    #[error("Cannot fetch messages {range} from {mailbox:?}")]
    Fetch {
        mailbox: String,
        range: SequenceRange,
        source: session::Error,
    },

    #[error("Fetching messages {range} from {mailbox:?} returned nothing, although the mailbox has {exists} messages")]
    EmptyBatch {
        mailbox: String,
        range: SequenceRange,
        exists: u32,
    },

    #[error("Cannot append message with UID {uid} to {mailbox:?}")]
    Append {
        mailbox: String,
        uid: u32,
        source: session::Error,
    },

    #[error("Cannot mark messages {uids:?} in {mailbox:?} as deleted")]
    Store {
        mailbox: String,
        uids: Vec<u32>,
        source: session::Error,
    },
}

/// Result of a successful migration.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MigrationSummary {
    /// Number of processed mailboxes, including empty ones.
    pub mailboxes: usize,

    /// Number of transferred messages.
    pub messages: u64,
}

/// Transfers every mailbox of `plan`, one after another, in plan order.
///
/// Stops at the first error.
pub async fn migrate<S, D, P>(
    from: &mut S,
    to: &mut D,
    plan: &MailboxPlan,
    batch_size: u32,
    progress: &mut P,
) -> Result<MigrationSummary>
where
    S: MailSession,
    D: MailSession,
    P: Progress + ?Sized,
{
    let mut summary = MigrationSummary::default();
    for pair in plan {
        info!("Copying {pair}.");
        let started = Instant::now();
        let count = transfer_mailbox(from, to, pair, batch_size, progress).await?;
        info!(
            "Copied {count} messages {pair} in {:.1?}.",
            started.elapsed()
        );
        summary.mailboxes += 1;
        summary.messages += u64::from(count);
    }
    Ok(summary)
}

/// Moves all messages of `pair.source` on `from` to `pair.destination` on `to`.
///
/// Returns the number of appended messages.
/// The destination mailbox is only created if the source mailbox is not empty.
pub async fn transfer_mailbox<S, D, P>(
    from: &mut S,
    to: &mut D,
    pair: &MailboxPair,
    batch_size: u32,
    progress: &mut P,
) -> Result<u32>
where
    S: MailSession,
    D: MailSession,
    P: Progress + ?Sized,
{
    let mut mailbox = select(from, &pair.source).await?;
    if mailbox.exists == 0 {
        info!("{} is empty, nothing to copy.", pair.source);
        return Ok(0);
    }
    progress.begin(&pair.source, mailbox.exists);

    create_destination(to, &pair.destination).await?;

    let batch_size = batch_size.max(1);
    let mut transferred = 0u32;
    while mailbox.exists > 0 {
        let range = SequenceRange::first_n(min(batch_size, mailbox.exists));
        let uids = transfer_batch(from, to, pair, range, progress).await?;
        if uids.is_empty() {
            return Err(Error::EmptyBatch {
                mailbox: pair.source.clone(),
                range,
                exists: mailbox.exists,
            });
        }
        transferred = transferred.saturating_add(uids.len() as u32);

        let res = from.mark_deleted(&uids).await;
        res.map_err(|source| Error::Store {
            mailbox: pair.source.clone(),
            uids,
            source,
        })?;

        // Messages stay marked as deleted, the next expunge picks them up.
        from.expunge()
            .await
            .log_err(&format!("Failed to expunge {:?}", pair.source));

        let reselected = select(from, &pair.source).await?;
        if reselected.uid_validity != mailbox.uid_validity {
            warn!(
                "UIDVALIDITY of {:?} changed from {:?} to {:?} during the transfer.",
                pair.source, mailbox.uid_validity, reselected.uid_validity
            );
        }
        mailbox = reselected;
    }

    Ok(transferred)
}

async fn select<S: MailSession>(from: &mut S, name: &str) -> Result<MailboxInfo> {
    from.select_mailbox(name, false)
        .await
        .map_err(|source| Error::Select {
            mailbox: name.to_string(),
            source,
        })
}

async fn create_destination<D: MailSession>(to: &mut D, name: &str) -> Result<()> {
    match to.create_mailbox(name).await {
        Ok(()) => {
            info!("Created mailbox {name:?}.");
            Ok(())
        }
        Err(session::Error::AlreadyExists(_)) => {
            debug!("Mailbox {name:?} already exists.");
            Ok(())
        }
        Err(source) => Err(Error::Create {
            mailbox: name.to_string(),
            source,
        }),
    }
}

/// Fetches `range` from the selected source mailbox and appends the messages
/// to the destination while they are still being fetched.
///
/// Returns the UIDs of the appended messages.
async fn transfer_batch<S, D, P>(
    from: &mut S,
    to: &mut D,
    pair: &MailboxPair,
    range: SequenceRange,
    progress: &mut P,
) -> Result<Vec<u32>>
where
    S: MailSession,
    D: MailSession,
    P: Progress + ?Sized,
{
    debug!("Fetching messages {range} from {:?}.", pair.source);
    let (sender, receiver) = async_channel::bounded(FETCH_CHANNEL_CAPACITY);

    let fetch_future = async {
        from.fetch(range, sender)
            .await
            .map_err(|source| Error::Fetch {
                mailbox: pair.source.clone(),
                range,
                source,
            })
    };

    // The receiver is moved into the future,
    // so a failed append closes the channel and stops the fetch.
    let append_future = async move {
        let mut uids = Vec::with_capacity(range.len() as usize);
        while let Ok(message) = receiver.recv().await {
            debug!(
                "Appending message UID {} ({:?}) to {:?}.",
                message.uid, message.subject, pair.destination
            );
            to.append(&pair.destination, &message)
                .await
                .map_err(|source| Error::Append {
                    mailbox: pair.destination.clone(),
                    uid: message.uid,
                    source,
                })?;
            progress.increment();
            uids.push(message.uid);
        }
        Ok(uids)
    };

    let (fetch_res, append_res) = tokio::join!(fetch_future, append_future);
    let uids = append_res?;
    fetch_res?;
    Ok(uids)
}
