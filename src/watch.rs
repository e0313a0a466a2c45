//! Watch mode
//!
//! Keeps one [`RecomputeSession`] alive and recomputes it whenever the
//! record file or the tariff file changes, or when the refresh interval
//! elapses after a missed change. Each recompute issues fresh tickets for
//! both inputs, so only the newest fetch of each ever lands.

use crate::{
    data_loader::DataLoader,
    engine::{Breakdown, Engine, RecomputeSession},
    output::get_formatter,
};
use chrono::Local;
use meterbill_core::error::{MeterbillError, Result};
use meterbill_pricing::TariffLoader;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher as _};
use std::{
    collections::HashSet,
    ffi::OsString,
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tokio::{
    sync::mpsc,
    time::{MissedTickBehavior, interval},
};
use tracing::{debug, warn};

const WATCHER_POLL_INTERVAL: Duration = Duration::from_millis(100);
const WATCHER_SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(200);
const SETTLE_DELAY: Duration = Duration::from_millis(300);

/// Watches the input files of one stream and reprints its breakdown
pub struct Watcher {
    session: RecomputeSession,
    records: DataLoader,
    tariffs: TariffLoader,
    json_output: bool,
    color: bool,
    interval_secs: u64,
}

impl Watcher {
    /// Create a watcher
    pub fn new(
        session: RecomputeSession,
        records: DataLoader,
        tariffs: TariffLoader,
        interval_secs: u64,
    ) -> Self {
        Self {
            session,
            records,
            tariffs,
            json_output: false,
            color: false,
            interval_secs: interval_secs.max(1),
        }
    }

    /// Print JSON instead of tables
    pub fn with_json(mut self, json_output: bool) -> Self {
        self.json_output = json_output;
        self
    }

    /// Color threshold states in table output
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Files whose changes trigger a recompute
    pub fn watched_files(&self) -> Vec<PathBuf> {
        let mut files = vec![self.records.path().to_path_buf()];
        if let Some(tariff) = self.tariffs.path() {
            files.push(tariff.to_path_buf());
        }
        files
    }

    /// Run until Ctrl+C
    pub async fn run(mut self) -> Result<()> {
        let should_refresh = Arc::new(AtomicBool::new(false));
        let should_refresh_watcher = should_refresh.clone();

        let should_stop = Arc::new(AtomicBool::new(false));
        let should_stop_watcher = should_stop.clone();

        let (tx, mut rx) = mpsc::channel(10);
        let watched_files = self.watched_files();

        let mut watcher_handle = tokio::task::spawn_blocking(move || -> Result<()> {
            let names: HashSet<OsString> = watched_files
                .iter()
                .filter_map(|path| path.file_name().map(|name| name.to_os_string()))
                .collect();

            let mut watcher = RecommendedWatcher::new(
                move |result: notify::Result<Event>| {
                    if let Ok(event) = result
                        && matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        )
                        && event
                            .paths
                            .iter()
                            .any(|path| path.file_name().is_some_and(|n| names.contains(n)))
                    {
                        should_refresh_watcher.store(true, Ordering::Release);
                        let _ = tx.blocking_send(());
                    }
                },
                Config::default(),
            )
            .map_err(|e| MeterbillError::Watch(format!("Failed to create file watcher: {e}")))?;

            for dir in watch_dirs(&watched_files) {
                if dir.exists() {
                    watcher
                        .watch(&dir, RecursiveMode::NonRecursive)
                        .map_err(|e| {
                            MeterbillError::Watch(format!(
                                "Failed to watch directory {}: {e}",
                                dir.display()
                            ))
                        })?;
                } else {
                    warn!("Not watching missing directory {}", dir.display());
                }
            }

            while !should_stop_watcher.load(Ordering::Acquire) {
                std::thread::sleep(WATCHER_POLL_INTERVAL);
            }

            drop(watcher);
            Ok(())
        });

        let mut interval = interval(Duration::from_secs(self.interval_secs));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;

        let mut outcome = self.refresh().await;

        while outcome.is_ok() {
            tokio::select! {
                _ = interval.tick() => {
                    if should_refresh.swap(false, Ordering::AcqRel) {
                        outcome = self.refresh().await;
                    }
                }
                Some(()) = rx.recv() => {
                    // Let the writer finish before reading
                    tokio::time::sleep(SETTLE_DELAY).await;
                    while rx.try_recv().is_ok() {}
                    should_refresh.store(false, Ordering::Release);
                    outcome = self.refresh().await;
                }
                _ = tokio::signal::ctrl_c() => {
                    println!("\nStopped watching.");
                    break;
                }
            }
        }

        should_stop.store(true, Ordering::Release);

        tokio::select! {
            res = &mut watcher_handle => {
                match res {
                    Ok(Ok(())) => debug!("Watcher task exited gracefully"),
                    Ok(Err(e)) => warn!("Watcher task exited with an error: {}", e),
                    Err(e) if e.is_panic() => warn!("Watcher task panicked: {:?}", e),
                    Err(e) => warn!("Watcher task was cancelled: {}", e),
                }
            }
            _ = tokio::time::sleep(WATCHER_SHUTDOWN_TIMEOUT) => {
                watcher_handle.abort();
                if let Err(e) = watcher_handle.await
                    && e.is_panic()
                {
                    warn!("Watcher task panicked during forced shutdown: {:?}", e);
                }
                warn!("Watcher task did not shut down in time and was aborted");
            }
        }

        outcome
    }

    /// Re-read both inputs and print the newest breakdown
    ///
    /// A missing or unreadable record file is reported and the previous
    /// snapshot is kept; it does not stop the watch.
    pub async fn refresh(&mut self) -> Result<()> {
        self.tariffs.refresh().await;

        let latest = match self.recompute().await {
            Ok(latest) => latest,
            Err(e) => {
                warn!(
                    "Could not read {}: {}",
                    self.records.path().display(),
                    e
                );
                None
            }
        };

        if let Some(breakdown) = latest.or_else(|| {
            self.session
                .records()
                .is_some()
                .then(|| self.session.current())
        }) {
            self.print(&breakdown);
        }
        Ok(())
    }

    /// Drive one recompute and return the last breakdown it produced
    pub async fn recompute(&mut self) -> Result<Option<Breakdown>> {
        let (tx, mut rx) = mpsc::channel(4);
        let driven = Engine::drive(&mut self.session, &self.records, &self.tariffs, &tx).await;
        drop(tx);

        let mut latest = None;
        while let Some(breakdown) = rx.recv().await {
            latest = Some(breakdown);
        }

        driven.map(|()| latest)
    }

    fn print(&self, breakdown: &Breakdown) {
        let formatter = get_formatter(self.json_output, self.color);

        if !self.json_output {
            print!("\x1B[2J\x1B[1;1H");
            println!(
                "Watching {} - last updated: {}",
                self.session.stream(),
                Local::now().format("%Y-%m-%d %H:%M:%S")
            );
            println!(
                "Refresh interval: {}s | Press Ctrl+C to exit",
                self.interval_secs
            );
            println!("{}", "-".repeat(60));
        }

        println!("{}", formatter.format_breakdown(breakdown, &[]));
    }
}

fn watch_dirs(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = files
        .iter()
        .map(|file| match file.parent() {
            Some(parent) if parent != Path::new("") => parent.to_path_buf(),
            _ => PathBuf::from("."),
        })
        .collect();
    dirs.sort();
    dirs.dedup();
    dirs
}
