// src/watch/watcher.rs

//! Filesystem watcher: retriggers a task when matching paths change.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::{Event, EventKind, RecursiveMode, Watcher as _};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::cancellation::CancellationToken;
use crate::config::model::WatcherDefinition;
use crate::errors::Result;
use crate::runner::TaskRunner;
use crate::task::Task;
use crate::variables::Variables;
use crate::watch::patterns::WatchPatterns;

pub const EVENT_CREATE: &str = "create";
pub const EVENT_WRITE: &str = "write";
pub const EVENT_REMOVE: &str = "remove";
pub const EVENT_RENAME: &str = "rename";
pub const EVENT_CHMOD: &str = "chmod";

/// A configured watcher bound to its task and runner.
pub struct Watcher {
    name: String,
    task: Arc<Task>,
    patterns: WatchPatterns,
    /// Event names the watcher reacts to; empty means all.
    events: HashSet<String>,
    root: PathBuf,
    runner: Arc<TaskRunner>,
}

impl Watcher {
    pub fn build(
        name: impl Into<String>,
        def: &WatcherDefinition,
        task: Arc<Task>,
        runner: Arc<TaskRunner>,
    ) -> Result<Self> {
        let include = def.watch.clone().into_vec();
        let exclude = def.exclude.clone().map(|e| e.into_vec()).unwrap_or_default();

        Ok(Self {
            name: name.into(),
            task,
            patterns: WatchPatterns::new(&include, &exclude)?,
            events: def.events.iter().cloned().collect(),
            root: PathBuf::from("."),
            runner,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Watch until cancelled, running the task once per matching event.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(64);

        let mut fs_watcher = notify::recommended_watcher(move |res| {
            let _ = tx.blocking_send(res);
        })?;
        fs_watcher.watch(&self.root, RecursiveMode::Recursive)?;

        info!(watcher = %self.name, task = %self.task.name, "watching for changes");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = rx.recv() => match received {
                    Some(Ok(event)) => self.handle(event).await,
                    Some(Err(err)) => error!(watcher = %self.name, error = %err, "watch error"),
                    None => break,
                },
            }
        }

        Ok(())
    }

    async fn handle(&self, event: Event) {
        let Some(event_name) = event_name(&event.kind) else {
            return;
        };
        if !self.events.is_empty() && !self.events.contains(event_name) {
            return;
        }

        for path in &event.paths {
            let relative = path.strip_prefix(&self.root).unwrap_or(path);
            let relative = normalize(relative);
            if !self.patterns.matches(&relative) {
                continue;
            }

            debug!(
                watcher = %self.name,
                event = %event_name,
                path = %relative.display(),
                "watch event matched"
            );

            let overlay = Variables::from_map([
                ("EVENT_NAME", event_name.to_string()),
                ("EVENT_PATH", relative.display().to_string()),
            ]);

            if let Err(err) = self
                .runner
                .run_with_overlays(&self.task, &overlay, &Variables::new(), None)
                .await
            {
                if err.is_cancelled() {
                    return;
                }
                error!(watcher = %self.name, task = %self.task.name, error = %err, "watched task failed");
            }
        }
    }
}

fn event_name(kind: &EventKind) -> Option<&'static str> {
    match kind {
        EventKind::Create(_) => Some(EVENT_CREATE),
        EventKind::Modify(notify::event::ModifyKind::Name(_)) => Some(EVENT_RENAME),
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => Some(EVENT_CHMOD),
        EventKind::Modify(_) => Some(EVENT_WRITE),
        EventKind::Remove(_) => Some(EVENT_REMOVE),
        _ => None,
    }
}

/// Notify reports absolute paths on some platforms; globs are written
/// relative to the project root.
fn normalize(path: &Path) -> PathBuf {
    match std::env::current_dir()
        .ok()
        .and_then(|cwd| path.strip_prefix(cwd).ok())
    {
        Some(stripped) => stripped.to_path_buf(),
        None => path.to_path_buf(),
    }
}
