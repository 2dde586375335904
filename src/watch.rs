//! File system watcher for automatic rebuilds.
//!
//! Watches the project root recursively. Changes inside the output
//! directory, VCS metadata and editor artifacts are ignored, so a rebuild
//! never triggers another one.
//!
//! # Architecture
//!
//! ```text
//! notify events ──▶ Debouncer (300ms) ──▶ rebuild()
//!                                           │
//!                                           └── failure is logged, the
//!                                               watcher keeps running
//! ```

use crate::{config::SiteConfig, log};
use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use rustc_hash::FxHashSet;
use std::{
    path::{Component, Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, RecvTimeoutError},
    },
    time::{Duration, Instant},
};

// =============================================================================
// Constants
// =============================================================================

const DEBOUNCE_MS: u64 = 300;

/// How often an idle watcher checks the stop flag.
const IDLE_POLL_MS: u64 = 1000;

// =============================================================================
// Path Filtering
// =============================================================================

/// Check if path is a temp/backup file (editor artifacts).
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

fn is_ignored(path: &Path, config: &SiteConfig) -> bool {
    path.starts_with(&config.build.output)
        || path
            .components()
            .any(|c| matches!(c, Component::Normal(name) if name == ".git"))
        || is_temp_file(path)
}

/// `/proj/pages/usage.html` → `pages/usage.html`
fn rel_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root).unwrap_or(path).display().to_string()
}

// =============================================================================
// Debounce State
// =============================================================================

/// Batches rapid file events into one rebuild.
struct Debouncer {
    pending: FxHashSet<PathBuf>,
    last_event: Option<Instant>,
}

impl Debouncer {
    fn new() -> Self {
        Self {
            pending: FxHashSet::default(),
            last_event: None,
        }
    }

    fn add(&mut self, event: Event, config: &SiteConfig) {
        for path in event.paths {
            if !is_ignored(&path, config) {
                self.pending.insert(path);
            }
        }
        if !self.pending.is_empty() {
            self.last_event = Some(Instant::now());
        }
    }

    fn ready(&self) -> bool {
        !self.pending.is_empty()
            && self
                .last_event
                .is_some_and(|t| t.elapsed() >= Duration::from_millis(DEBOUNCE_MS))
    }

    /// Drain pending paths in a stable order for logging.
    fn take(&mut self) -> Vec<PathBuf> {
        self.last_event = None;
        let mut paths: Vec<_> = self.pending.drain().collect();
        paths.sort();
        paths
    }

    fn timeout(&self) -> Duration {
        if self.pending.is_empty() {
            Duration::from_millis(IDLE_POLL_MS)
        } else {
            Duration::from_millis(DEBOUNCE_MS)
        }
    }
}

const fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Modify(_) | EventKind::Create(_) | EventKind::Remove(_)
    )
}

// =============================================================================
// Event Handler
// =============================================================================

fn handle_changes<F>(paths: &[PathBuf], config: &SiteConfig, rebuild: &mut F)
where
    F: FnMut() -> Result<()>,
{
    let root = config.get_root();

    if paths.iter().any(|p| p == &config.config_path) {
        log!("warn"; "{} changed, restart to apply it", rel_path(&config.config_path, root));
    }

    let shown: Vec<_> = paths.iter().take(3).map(|p| rel_path(p, root)).collect();
    let more = paths.len().saturating_sub(shown.len());
    if more > 0 {
        log!("watch"; "{} (+{more} more) changed, rebuilding...", shown.join(", "));
    } else {
        log!("watch"; "{} changed, rebuilding...", shown.join(", "));
    }

    match rebuild() {
        Ok(()) => log!("watch"; "rebuilt"),
        Err(e) => {
            log!("watch"; "build failed");
            log!("error"; "{e:#}");
        }
    }
    eprintln!(); // Blank line to separate rebuild sessions
}

// =============================================================================
// Public API
// =============================================================================

/// Watch the project root until `stop` is set, calling `rebuild` after
/// every debounced batch of changes.
pub fn watch_for_changes_blocking<F>(config: &SiteConfig, stop: &AtomicBool, mut rebuild: F) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    let root = config.get_root();

    let (tx, rx) = mpsc::channel();
    let mut watcher = notify::recommended_watcher(tx).context("Failed to create file watcher")?;
    watcher
        .watch(root, RecursiveMode::Recursive)
        .with_context(|| format!("Failed to watch {}", root.display()))?;

    log!("watch"; "watching {}", root.display());

    let mut debouncer = Debouncer::new();

    while !stop.load(Ordering::Relaxed) {
        match rx.recv_timeout(debouncer.timeout()) {
            Ok(Ok(event)) if is_relevant(&event) => debouncer.add(event, config),
            Ok(Err(e)) => log!("watch"; "error: {e}"),
            Err(RecvTimeoutError::Timeout) if debouncer.ready() => {
                handle_changes(&debouncer.take(), config, &mut rebuild);
            }
            Err(RecvTimeoutError::Disconnected) => break,
            // Irrelevant events, or a timeout while still settling
            _ => {}
        }
    }

    Ok(())
}

/// Standalone watch task: runs until Ctrl+C.
pub fn watch_site<F>(config: &SiteConfig, rebuild: F) -> Result<()>
where
    F: FnMut() -> Result<()>,
{
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_signal = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        log!("watch"; "shutting down...");
        stop_for_signal.store(true, Ordering::Relaxed);
    })
    .context("Failed to set Ctrl+C handler")?;

    watch_for_changes_blocking(config, &stop, rebuild)
}
