//! recall-sync - inspect and sync offline practice data
//!
//! Runs a file-backed sync session against a directory-backed remote store.
//! Without `--remote-dir` the session is offline; without `--user` nobody is
//! signed in and nothing leaves the device.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use local_store::FileStore;
use offline_sync::{
    Identity, OfflineRemote, PassStatus, RemoteStore, StaticIdentity, StoreRemote, SyncConfig,
    SyncSession, WriteOutcome,
};
use practice_model::{PoemId, Progress};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "recall-sync", version, about)]
struct Cli {
    /// Directory holding the local queue, progress mirror and sync.json
    #[arg(long, default_value = "recall-data")]
    data_dir: PathBuf,

    /// Directory of the remote store; the session is offline without it
    #[arg(long)]
    remote_dir: Option<PathBuf>,

    /// Signed-in user id
    #[arg(long)]
    user: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show connection state, pending changes and last sync time
    Status,
    /// List queued changes
    Pending,
    /// Show mirrored progress for every poem
    Progress,
    /// Record practice progress for a poem
    WriteProgress {
        poem: String,
        #[arg(long)]
        stage: u32,
        #[arg(long, default_value_t = 0)]
        repetition: u32,
        #[arg(long, default_value_t = 0)]
        reviews: u32,
        #[arg(long, default_value_t = 0)]
        hints: u32,
    },
    /// Remove a poem and its progress
    RemovePoem { poem: String },
    /// Replay queued changes and push mirrored progress
    Sync,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    tracing::debug!("Data directory: {:?}", cli.data_dir);

    let store = FileStore::open(&cli.data_dir)
        .with_context(|| format!("failed to open data directory {:?}", cli.data_dir))?;
    let config = SyncConfig::load_or_default(&cli.data_dir.join("sync.json"));
    let identity = match &cli.user {
        Some(user) => StaticIdentity::signed_in(Identity::new(user.as_str())),
        None => StaticIdentity::signed_out(),
    };

    match &cli.remote_dir {
        Some(dir) => {
            tracing::info!("Using remote store at {:?}", dir);
            let remote_store = FileStore::open(dir)
                .with_context(|| format!("failed to open remote directory {:?}", dir))?;
            let session = SyncSession::with_config(
                Arc::new(store),
                StoreRemote::new(remote_store),
                identity,
                config,
            );
            execute(session, true, cli.command).await
        }
        None => {
            tracing::info!("No remote store configured, running offline");
            let session =
                SyncSession::with_config(Arc::new(store), OfflineRemote, identity, config);
            execute(session, false, cli.command).await
        }
    }
}

async fn execute<R>(
    session: SyncSession<R, StaticIdentity>,
    reachable: bool,
    command: Command,
) -> Result<()>
where
    R: RemoteStore + 'static,
{
    let mut notices = session.subscribe();
    // One-shot commands run their own pass instead of the delayed startup one
    session.initialize(reachable).abort();

    match command {
        Command::Status => {
            let info = session.status_info();
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Command::Pending => {
            let items = session.pending_items();
            if items.is_empty() {
                println!("No pending changes");
            }
            for item in items {
                println!(
                    "{}  {:<12} retries={}  queued {}",
                    item.id,
                    item.action.as_str(),
                    item.retry_count,
                    item.enqueued_at.to_rfc3339()
                );
            }
        }
        Command::Progress => {
            for (poem_id, snapshot) in session.all_progress() {
                println!(
                    "{}  stage={} rep={} reviews={} hints={}  updated {}",
                    poem_id,
                    snapshot.stage,
                    snapshot.stage_repetition,
                    snapshot.successful_reviews,
                    snapshot.hints_used,
                    snapshot.updated_at.to_rfc3339()
                );
            }
        }
        Command::WriteProgress {
            poem,
            stage,
            repetition,
            reviews,
            hints,
        } => {
            let progress = Progress::new()
                .with_stage(stage, repetition)
                .with_reviews(reviews, hints)
                .practiced_at(Utc::now());
            let outcome = session.write_progress(&PoemId::from(poem), progress).await?;
            print_outcome(&outcome);
        }
        Command::RemovePoem { poem } => {
            let outcome = session.remove_poem(&PoemId::from(poem)).await?;
            print_outcome(&outcome);
        }
        Command::Sync => {
            if !session.is_online() {
                println!("Offline, nothing synced");
            } else {
                let report = session.reconcile().await?;
                match report.status {
                    PassStatus::SkippedSignedOut => println!("Not signed in, nothing synced"),
                    _ => println!(
                        "Synced {}, retrying {}, dropped {}, pushed progress for {} poems ({} pending)",
                        report.synced,
                        report.retried,
                        report.dropped,
                        report.progress_pushed,
                        session.pending_count()
                    ),
                }
            }
        }
    }

    while let Ok(notice) = notices.try_recv() {
        eprintln!("{}: {}", notice.title, notice.message);
    }
    Ok(())
}

fn print_outcome(outcome: &WriteOutcome) {
    match outcome {
        WriteOutcome::Synced => println!("Synced"),
        WriteOutcome::Queued { item_id } => println!("Queued as {}", item_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_write_progress() {
        let cli = Cli::try_parse_from([
            "recall-sync",
            "--user",
            "alice",
            "write-progress",
            "poem-1",
            "--stage",
            "3",
        ])
        .unwrap();

        assert_eq!(cli.user.as_deref(), Some("alice"));
        assert!(cli.remote_dir.is_none());
        assert!(matches!(
            cli.command,
            Command::WriteProgress {
                stage: 3,
                repetition: 0,
                ..
            }
        ));
    }
}
