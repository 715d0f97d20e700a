// src/scheduler/scheduler.rs

//! Concurrent DAG traversal: picks stages whose dependencies are satisfied
//! and dispatches them to workers, cascading cancellation on failure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, error};

use crate::errors::{Result, TaskctlError};
use crate::executor::{Job, ShellExecutor};
use crate::output::DiscardSink;
use crate::runner::TaskRunner;
use crate::scheduler::graph::ExecutionGraph;
use crate::scheduler::stage::{Stage, StageStatus};

/// Pause between scheduling passes.
const SCHEDULE_PAUSE: Duration = Duration::from_millis(50);

enum Readiness {
    Ready,
    NotReady,
    Cancel,
}

struct SchedulerInner {
    runner: Arc<TaskRunner>,
    pause: Duration,
    cancelled: AtomicBool,
}

/// Drives execution graphs to completion on parallel workers.
///
/// Decision-making is single-threaded (the polling loop below); stages
/// execute on spawned workers. Status mutations are atomic and each stage's
/// timestamps are written only by the worker that owns it, so the graph
/// needs no global lock. The handle is cheap to clone; clones share the
/// cancellation latch.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

impl Scheduler {
    pub fn new(runner: Arc<TaskRunner>) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                runner,
                pause: SCHEDULE_PAUSE,
                cancelled: AtomicBool::new(false),
            }),
        }
    }

    pub fn runner(&self) -> &Arc<TaskRunner> {
        &self.inner.runner
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Request cancellation without waiting for in-flight work.
    pub fn request_cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::SeqCst) {
            debug!("scheduler cancellation requested");
            self.inner.runner.cancel_token().cancel();
        }
    }

    /// Cancel and wait for in-flight tasks to drain. Idempotent.
    pub async fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.runner.cancel().await;
    }

    /// Tear down contexts via the runner.
    pub async fn finish(&self) {
        self.inner.runner.finish().await;
    }

    /// Execute the graph until every stage reaches a terminal status or
    /// cancellation is requested. Returns the graph's last error.
    pub async fn schedule(&self, graph: &Arc<ExecutionGraph>) -> Result<()> {
        graph.set_started();
        let mut workers: JoinSet<()> = JoinSet::new();

        loop {
            if self.is_cancelled() {
                break;
            }
            if graph.stages().all(|s| s.status().is_terminal()) {
                break;
            }

            for stage in graph.stages() {
                if stage.status() != StageStatus::Waiting {
                    continue;
                }

                if let Some(condition) = &stage.condition {
                    match self.check_stage_condition(condition).await {
                        Ok(true) => {}
                        Ok(false) => {
                            stage.set_status(StageStatus::Skipped);
                            continue;
                        }
                        Err(err) => {
                            error!(stage = %stage.name, error = %err, "stage condition failed");
                            stage.set_status(StageStatus::Error);
                            graph.record_error(&stage.name, err.to_string());
                            self.request_cancel();
                            continue;
                        }
                    }
                }

                match readiness(graph, stage) {
                    Readiness::NotReady => {}
                    Readiness::Cancel => stage.set_status(StageStatus::Cancelled),
                    Readiness::Ready => {
                        stage.set_status(StageStatus::Running);
                        workers.spawn(run_stage_worker(
                            self.clone(),
                            graph.clone(),
                            stage.clone(),
                        ));
                    }
                }
            }

            tokio::time::sleep(self.inner.pause).await;
        }

        if self.is_cancelled() {
            for stage in graph.stages() {
                if stage.status() == StageStatus::Waiting {
                    stage.set_status(StageStatus::Cancelled);
                }
            }
        }

        while workers.join_next().await.is_some() {}
        graph.set_finished();

        match graph.last_error() {
            Some(message) => Err(TaskctlError::TaskRun(message)),
            None => Ok(()),
        }
    }

    async fn check_stage_condition(&self, condition: &str) -> Result<bool> {
        let executor = ShellExecutor::new();
        let job = Job::from_command(condition);
        match executor
            .execute(&self.inner.runner.cancel_token(), &job, Arc::new(DiscardSink))
            .await
        {
            Ok(_) => Ok(true),
            Err(err) if err.exit_status().is_some() => Ok(false),
            Err(err) => Err(err),
        }
    }
}

/// A stage is ready iff every dependency reached `done` or `skipped`
/// (an errored dependency with `allow_failure` counts as `done`). An
/// errored or cancelled dependency cancels the stage instead.
fn readiness(graph: &ExecutionGraph, stage: &Stage) -> Readiness {
    for parent in graph.parents_of(&stage.name) {
        match parent.status() {
            StageStatus::Done | StageStatus::Skipped => {}
            StageStatus::Error | StageStatus::Cancelled => return Readiness::Cancel,
            StageStatus::Waiting | StageStatus::Running => return Readiness::NotReady,
        }
    }
    Readiness::Ready
}

/// Runs one stage to a terminal status: nested pipelines recurse into the
/// scheduler, task stages go through the runner with the stage's overlays.
async fn run_stage_worker(scheduler: Scheduler, graph: Arc<ExecutionGraph>, stage: Arc<Stage>) {
    stage.set_started();

    let result = match (&stage.pipeline, &stage.task) {
        (Some(sub), _) => schedule_boxed(scheduler.clone(), sub.clone()).await,
        (None, Some(task)) => {
            scheduler
                .inner
                .runner
                .run_with_overlays(task, &stage.env, &stage.variables, stage.dir.as_deref())
                .await
        }
        (None, None) => Ok(()),
    };

    let status = match result {
        Ok(()) => StageStatus::Done,
        Err(err) => {
            if stage.allow_failure {
                debug!(stage = %stage.name, error = %err, "stage failed but failure is allowed");
                StageStatus::Done
            } else {
                graph.record_error(&stage.name, err.to_string());
                StageStatus::Error
            }
        }
    };

    // The end timestamp must be visible before the terminal status is,
    // so dependents always observe a fully-finished dependency.
    stage.set_finished();
    stage.set_status(status);
}

/// Type-erased recursion point: the worker future must not contain the
/// concrete `schedule` future of the nested graph.
fn schedule_boxed(
    scheduler: Scheduler,
    graph: Arc<ExecutionGraph>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send>> {
    Box::pin(async move { scheduler.schedule(&graph).await })
}
