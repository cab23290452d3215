mod app;

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    sync::Mutex,
};

use chrono::Local;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};
use wmm_core::{
    config::{self, AppConfig},
    journal::{self, JournalDirectory},
    SharedTracker,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    info!(journal_dir = %config.journal_dir.display(), "starting wing mission tracker");

    let journals = JournalDirectory::new(&config.journal_dir);
    let tracker = SharedTracker::default();
    let replay = journal::replay_window(
        &tracker,
        &journals,
        Local::now().date_naive(),
        config.retention_days,
    )?;
    let tail = replay.tail(journals.clone())?;

    let (change_tx, change_rx) = mpsc::channel(16);
    let _watcher = match journal::watch(&journals, move || {
        let _ = change_tx.try_send(());
    }) {
        Ok(watcher) => Some(watcher),
        Err(err) => {
            warn!("journal watcher unavailable, polling only: {err:#}");
            None
        }
    };

    let mut app = app::StackApp::new(config, journals, tracker, tail);
    app.attach_journal_changes(change_rx);
    app.run().await
}

fn init_logging() -> Result<()> {
    let log_dir = std::env::current_dir()?.join("logs");
    fs::create_dir_all(&log_dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("wmm-stack.log"))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to the terminal UI, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .compact()
        .with_ansi(false)
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .init();

    Ok(())
}
