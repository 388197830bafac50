//! `--watch` support: rerun a command whenever one file changes.

use anyhow::Result;
use colored::Colorize;
use notify::{EventKind, RecursiveMode, Watcher};
use std::sync::mpsc;
use std::time::{Duration, Instant};

const DEBOUNCE: Duration = Duration::from_millis(200);
const SETTLE: Duration = Duration::from_millis(50);

/// Block until the watcher disconnects, calling `on_change` after each
/// write to `file`. Errors from `on_change` are printed and watching goes on.
pub fn watch_file(file: &str, mut on_change: impl FnMut() -> Result<()>) -> Result<()> {
    let file_path = std::fs::canonicalize(file)
        .map_err(|e| anyhow::anyhow!("Cannot resolve path '{}': {}", file, e))?;

    let watch_dir = file_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("Cannot determine parent directory of '{}'", file))?;

    eprintln!(
        "{} {} for changes (Ctrl+C to stop)",
        "Watching".cyan().bold(),
        file
    );

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        if let Ok(event) = res {
            let _ = tx.send(event);
        }
    })?;

    // Editors often replace the file instead of writing in place, so watch
    // the directory.
    watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;

    let mut last_run = Instant::now();

    loop {
        match rx.recv_timeout(Duration::from_secs(1)) {
            Ok(event) => {
                let is_write = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
                let affects_file = event
                    .paths
                    .iter()
                    .any(|p| p.canonicalize().ok().as_ref() == Some(&file_path));

                if is_write && affects_file && last_run.elapsed() > DEBOUNCE {
                    std::thread::sleep(SETTLE);
                    tracing::debug!(file, "change detected");

                    match on_change() {
                        Ok(()) => last_run = Instant::now(),
                        Err(e) => eprintln!("{} {}", "Render error:".red().bold(), e),
                    }
                }
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {}
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    Ok(())
}
