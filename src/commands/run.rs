// src/commands/run.rs

//! `taskctl run` — the default command: run pipelines and tasks by name.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use tracing::error;

use crate::commands::App;
use crate::errors::{Result, TaskctlError};
use crate::output::summary::print_summary;
use crate::scheduler::Scheduler;

/// Run each target in order; a failing target stops the sequence.
///
/// Returns the process exit code: 0 on success, 1 on failure, 128+signal
/// after cancellation by signal.
pub async fn run(app: &App, targets: &[String]) -> Result<i32> {
    let signal_code = install_signal_handlers(app.scheduler.clone());

    let mut failed = false;
    for target in targets {
        if let Some(graph) = app.built.pipelines.get(target) {
            let result = app.scheduler.schedule(graph).await;
            if app.summary {
                print_summary(graph, &app.runner.output_factory().stdout());
            }
            if let Err(err) = result {
                error!(pipeline = %target, error = %err, "pipeline failed");
                failed = true;
                break;
            }
        } else if let Some(task) = app.built.tasks.get(target) {
            if let Err(err) = app.runner.run(task).await {
                if !err.is_cancelled() {
                    error!(task = %target, error = %err, "task failed");
                }
                failed = true;
                break;
            }
        } else {
            app.scheduler.finish().await;
            return Err(TaskctlError::Config(format!(
                "unknown pipeline or task: {target}"
            )));
        }
    }

    app.scheduler.finish().await;

    let signal = signal_code.load(Ordering::SeqCst);
    if signal != 0 {
        return Ok(128 + signal);
    }
    Ok(if failed { 1 } else { 0 })
}

/// SIGINT/SIGTERM cancel the scheduler; the main loop drains in-flight
/// work and exits with the conventional 128+signal code.
fn install_signal_handlers(scheduler: Scheduler) -> Arc<AtomicI32> {
    let signal_code = Arc::new(AtomicI32::new(0));

    {
        let scheduler = scheduler.clone();
        let signal_code = signal_code.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                signal_code.store(2, Ordering::SeqCst);
                scheduler.cancel().await;
            }
        });
    }

    #[cfg(unix)]
    {
        let signal_code = signal_code.clone();
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            let Ok(mut term) = signal(SignalKind::terminate()) else {
                return;
            };
            if term.recv().await.is_some() {
                signal_code.store(15, Ordering::SeqCst);
                scheduler.cancel().await;
            }
        });
    }

    signal_code
}
