//! Command line interface of mailcopy.
//!
//! Reads the configuration, connects to both accounts
//! and moves all selected mailboxes from the source to the destination.
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Parser;
use log::{error, info, warn};

use mailcopy::config::{self, MigrationConfig};
use mailcopy::imap::Session;
use mailcopy::mailbox_set;
use mailcopy::progress::TransferProgress;
use mailcopy::session::MailSession;
use mailcopy::transfer;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// List available mailboxes and then exit
    #[arg(long)]
    list: bool,

    /// Path to the configuration file [default: ./config.json]
    #[arg(short, long, env = config::CONFIG_FILE_ENV)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let r = main_impl(args).await;
    if let Err(err) = &r {
        error!("{err:#}");
    }
    std::process::exit(if r.is_ok() { 0 } else { 1 });
}

async fn main_impl(args: Args) -> Result<()> {
    let path = match args.config {
        Some(path) => path,
        None => config::config_path()?,
    };
    info!("Loading configuration from {}.", path.display());
    let config = MigrationConfig::load(&path)?;

    let mut from = Session::connect(&config.from)
        .await
        .context("cannot connect to the source account")?;

    let res = if args.list {
        list(&mut from).await
    } else {
        run(&config, &mut from).await
    };

    if let Err(err) = from.close().await {
        warn!("Failed to log out from the source account: {err:#}.");
    }
    res
}

/// Prints the names of all source mailboxes, one per line.
async fn list(from: &mut Session) -> Result<()> {
    let mailboxes = from
        .list_mailboxes()
        .await
        .context("cannot list source mailboxes")?;
    for name in mailboxes {
        println!("{name}");
    }
    Ok(())
}

async fn run(config: &MigrationConfig, from: &mut Session) -> Result<()> {
    let mut to = Session::connect(&config.to)
        .await
        .context("cannot connect to the destination account")?;

    let res = migrate(config, from, &mut to).await;

    if let Err(err) = to.close().await {
        warn!("Failed to log out from the destination account: {err:#}.");
    }
    res
}

async fn migrate(config: &MigrationConfig, from: &mut Session, to: &mut Session) -> Result<()> {
    let source = &mut *from;
    let plan = mailbox_set::resolve(config, move || async move {
        source
            .list_mailboxes()
            .await
            .context("cannot list source mailboxes")
    })
    .await?;

    if plan.is_empty() {
        info!("No mailboxes to copy.");
        return Ok(());
    }
    info!("Copying {} mailboxes:", plan.len());
    for pair in &plan {
        info!("  {pair}");
    }

    let mut progress = TransferProgress::new();
    let summary = transfer::migrate(from, to, &plan, config.batch_size, &mut progress).await?;
    info!(
        "Done, copied {} messages from {} mailboxes.",
        summary.messages, summary.mailboxes
    );
    Ok(())
}
