//! # mailcopy
//!
//! Moves the messages of one IMAP account into another,
//! mailbox by mailbox and batch by batch.
//!
//! [`mailbox_set::resolve`] decides which mailboxes are copied and how they are named
//! on the destination, [`transfer::migrate`] moves the messages.
//! Both only talk to the servers through [`session::MailSession`],
//! which is implemented for IMAP by [`imap::Session`].

#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::correctness,
    missing_debug_implementations,
    clippy::all,
    clippy::indexing_slicing,
    clippy::wildcard_imports,
    clippy::needless_borrow,
    clippy::cast_lossless,
    clippy::unused_async,
    clippy::explicit_iter_loop,
    clippy::explicit_into_iter_loop,
    clippy::cloned_instead_of_copied
)]

mod log;

pub mod config;
pub mod imap;
pub mod mailbox_set;
pub(crate) mod net;
pub mod progress;
pub mod session;
pub mod transfer;

#[cfg(test)]
mod test_utils;
