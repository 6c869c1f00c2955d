//! # Selection of mailboxes to migrate.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;

use anyhow::Result;

use crate::config::MigrationConfig;

/// Source mailbox and the destination mailbox its messages are appended to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailboxPair {
    pub source: String,
    pub destination: String,
}

impl fmt::Display for MailboxPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} -> {}", self.source, self.destination)
    }
}

/// Mailboxes to migrate, sorted by source name.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MailboxPlan {
    pairs: Vec<MailboxPair>,
}

impl MailboxPlan {
    pub fn pairs(&self) -> &[MailboxPair] {
        &self.pairs
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MailboxPair> {
        self.pairs.iter()
    }
}

impl<'a> IntoIterator for &'a MailboxPlan {
    type Item = &'a MailboxPair;
    type IntoIter = std::slice::Iter<'a, MailboxPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

/// Computes which mailboxes are migrated and where to.
///
/// If `config.include` is not empty, exactly these mailboxes are candidates
/// and `discover` is not called. Otherwise `discover` lists the candidates,
/// usually all mailboxes of the source account.
///
/// Candidates are renamed according to `config.mapping`,
/// then every candidate named in `config.exclude` is dropped.
/// Mapping entries for mailboxes which are not candidates are ignored.
pub async fn resolve<F, Fut>(config: &MigrationConfig, discover: F) -> Result<MailboxPlan>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Vec<String>>>,
{
    let candidates = if config.include.is_empty() {
        discover().await?
    } else {
        config.include.clone()
    };
    Ok(build_plan(config, candidates))
}

fn build_plan(config: &MigrationConfig, candidates: Vec<String>) -> MailboxPlan {
    // BTreeMap deduplicates and orders by source name.
    let mut mailboxes: BTreeMap<String, String> = candidates
        .into_iter()
        .map(|name| {
            let destination = config.mapping.get(&name).unwrap_or(&name).clone();
            (name, destination)
        })
        .collect();

    for name in &config.exclude {
        mailboxes.remove(name);
    }

    MailboxPlan {
        pairs: mailboxes
            .into_iter()
            .map(|(source, destination)| MailboxPair {
                source,
                destination,
            })
            .collect(),
    }
}
