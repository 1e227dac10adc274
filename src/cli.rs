use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use log::info;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::notifications::{NotificationEngine, NotificationSetting};
use crate::output::{muted, print_notifications, print_status, ConsolePresenter};
use crate::service::{self, ServiceHandle};
use crate::source::{FetchOutcome, SnapshotFileSource};
use crate::status::AiFixBadge;

#[derive(Parser)]
#[command(name = "cipewatch")]
#[command(author, version, about = "CI Pipeline Execution Watcher", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./cipewatch.{toml,json,yaml,yml})
    #[arg(short, long, global = true, env = "CIPEWATCH_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll a CIPE snapshot file and print notifications as they happen
    Watch {
        /// JSON feed document, re-read on every poll
        #[arg(short, long)]
        snapshot: Option<PathBuf>,

        /// Notifications to show: all, errors or none
        #[arg(short, long)]
        notifications: Option<NotificationSetting>,
    },
    /// Run one notification decision between two snapshot files
    Check {
        /// Previously observed snapshot
        #[arg(long)]
        old: PathBuf,

        /// Newly fetched snapshot
        #[arg(long)]
        new: PathBuf,

        /// Notifications to show: all, errors or none
        #[arg(short, long)]
        notifications: Option<NotificationSetting>,

        /// Evaluation time (RFC 3339), defaults to the current time
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },
    /// Show the CIPEs in a snapshot file with the polling tier they imply
    Status {
        /// JSON feed document
        #[arg(short, long)]
        snapshot: Option<PathBuf>,
    },
}

impl Cli {
    async fn execute_watch(
        &self,
        config: &Config,
        snapshot: Option<&Path>,
        notifications: Option<NotificationSetting>,
    ) -> Result<()> {
        let path = snapshot_path(config, snapshot)?;

        let mut options = config.service_options();
        if let Some(setting) = notifications {
            options.notification_setting = setting;
        }

        info!(
            "Watching CIPE snapshot {} (notifications: {})",
            path.display(),
            options.notification_setting
        );
        eprintln!("{}", muted("Press Enter to poll now, Ctrl-C to stop."));

        let (handle, task) = service::spawn(
            SnapshotFileSource::new(path),
            ConsolePresenter::new(),
            options,
        );
        spawn_stdin_poller(handle.clone());

        tokio::signal::ctrl_c()
            .await
            .context("Failed to listen for Ctrl-C")?;

        info!("Shutting down CIPE monitoring");
        handle.shutdown();
        task.await.context("Monitoring task failed")?;

        Ok(())
    }

    async fn execute_check(
        &self,
        config: &Config,
        old: &Path,
        new: &Path,
        notifications: Option<NotificationSetting>,
        now: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let old = load_snapshot(old).await?;
        let new = load_snapshot(new).await?;
        let setting = notifications.unwrap_or(config.notifications.setting);
        let now = now.unwrap_or_else(Utc::now);

        let notifications = if let Some(error) = &new.error {
            info!("New snapshot carries an error, skipping notifications: {error}");
            Vec::new()
        } else {
            let mut engine = NotificationEngine::new(config.notifications.ai_fix_wait());
            let mut badge = AiFixBadge::new();
            engine.compare(
                Some(old.cipes_or_empty()),
                new.cipes_or_empty(),
                setting,
                now,
                &mut badge,
            )
        };

        print_notifications(&notifications);
        println!();
        print_status(&new, &config.polling.tiers());

        Ok(())
    }

    async fn execute_status(&self, config: &Config, snapshot: Option<&Path>) -> Result<()> {
        let path = snapshot_path(config, snapshot)?;
        let outcome = load_snapshot(&path).await?;

        print_status(&outcome, &config.polling.tiers());

        Ok(())
    }

    pub async fn execute(&self) -> Result<()> {
        let config = Config::load(self.config.as_deref())?;

        match &self.command {
            Commands::Watch {
                snapshot,
                notifications,
            } => {
                self.execute_watch(&config, snapshot.as_deref(), *notifications)
                    .await
            }
            Commands::Check {
                old,
                new,
                notifications,
                now,
            } => {
                self.execute_check(&config, old, new, *notifications, *now)
                    .await
            }
            Commands::Status { snapshot } => {
                self.execute_status(&config, snapshot.as_deref()).await
            }
        }
    }
}

fn snapshot_path(config: &Config, snapshot: Option<&Path>) -> Result<PathBuf> {
    snapshot
        .map(Path::to_path_buf)
        .or_else(|| config.source.snapshot_path.clone())
        .context("No CIPE snapshot given: pass --snapshot or set source.snapshot-path")
}

async fn load_snapshot(path: &Path) -> Result<FetchOutcome> {
    SnapshotFileSource::new(path)
        .load()
        .await
        .with_context(|| format!("Failed to load CIPE snapshot: {}", path.display()))
}

/// Forces a poll on every line read from stdin.
///
/// Runs on a plain thread so a pending read never holds up runtime shutdown.
fn spawn_stdin_poller(handle: ServiceHandle) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            if line.is_err() || handle.force_poll().is_err() {
                break;
            }
        }
    });
}
