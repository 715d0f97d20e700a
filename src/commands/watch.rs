// src/commands/watch.rs

//! `taskctl watch` — run named watchers until interrupted.

use tracing::error;

use crate::commands::App;
use crate::errors::{Result, TaskctlError};
use crate::watch::Watcher;

/// Run the named watchers (all configured watchers when none are named)
/// until Ctrl-C.
pub async fn run(app: &App, names: &[String]) -> Result<i32> {
    let selected: Vec<String> = if names.is_empty() {
        app.built.watchers.keys().cloned().collect()
    } else {
        names.to_vec()
    };

    if selected.is_empty() {
        return Err(TaskctlError::Config("no watchers configured".into()));
    }

    let mut watchers = Vec::new();
    for name in &selected {
        let def = app.built.watchers.get(name).ok_or_else(|| {
            TaskctlError::Config(format!("unknown watcher: {name}"))
        })?;
        let task = app
            .built
            .tasks
            .get(&def.task)
            .cloned()
            .ok_or_else(|| TaskctlError::Config(format!("unknown task {}", def.task)))?;
        watchers.push(Watcher::build(name.clone(), def, task, app.runner.clone())?);
    }

    let cancel = app.runner.cancel_token();
    {
        let runner = app.runner.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                runner.cancel().await;
            }
        });
    }

    let mut handles = Vec::new();
    for watcher in watchers {
        let cancel = cancel.clone();
        handles.push(tokio::spawn(async move {
            if let Err(err) = watcher.run(cancel).await {
                error!(watcher = %watcher.name(), error = %err, "watcher failed");
            }
        }));
    }
    for handle in handles {
        let _ = handle.await;
    }

    app.runner.finish().await;
    Ok(0)
}
