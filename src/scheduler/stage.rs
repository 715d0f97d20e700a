// src/scheduler/stage.rs

//! A stage: one node of an execution graph, wrapping either a task or a
//! nested pipeline.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::scheduler::graph::ExecutionGraph;
use crate::task::Task;
use crate::utils;
use crate::variables::Variables;

/// Stage lifecycle status, stored as an atomic integer so the scheduler
/// loop and the stage worker can read/write it without a graph-wide lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StageStatus {
    Waiting = 0,
    Running = 1,
    Done = 2,
    Error = 3,
    Skipped = 4,
    Cancelled = 5,
}

impl StageStatus {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => StageStatus::Waiting,
            1 => StageStatus::Running,
            2 => StageStatus::Done,
            3 => StageStatus::Error,
            4 => StageStatus::Skipped,
            _ => StageStatus::Cancelled,
        }
    }

    /// Whether this status ends the stage's lifecycle.
    pub fn is_terminal(self) -> bool {
        !matches!(self, StageStatus::Waiting | StageStatus::Running)
    }
}

/// A named node in an execution graph.
///
/// Exactly one of `task` / `pipeline` is set. The stage carries its own
/// env/vars overlays, which the runner layers between the context's and the
/// task's own.
#[derive(Debug)]
pub struct Stage {
    pub name: String,
    pub condition: Option<String>,
    pub task: Option<Arc<Task>>,
    pub pipeline: Option<Arc<ExecutionGraph>>,
    pub depends_on: Vec<String>,
    pub dir: Option<String>,
    pub allow_failure: bool,
    pub env: Variables,
    pub variables: Variables,
    /// Opaque metadata carried through for CI generation.
    pub generator: Option<serde_json::Value>,

    status: AtomicU8,
    start: Mutex<Option<Instant>>,
    end: Mutex<Option<Instant>>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            condition: None,
            task: None,
            pipeline: None,
            depends_on: Vec::new(),
            dir: None,
            allow_failure: false,
            env: Variables::new(),
            variables: Variables::new(),
            generator: None,
            status: AtomicU8::new(StageStatus::Waiting as u8),
            start: Mutex::new(None),
            end: Mutex::new(None),
        }
    }

    pub fn from_task(task: Arc<Task>) -> Self {
        let mut stage = Self::new(task.name.clone());
        stage.task = Some(task);
        stage
    }

    pub fn status(&self) -> StageStatus {
        StageStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    pub fn set_status(&self, status: StageStatus) {
        self.status.store(status as u8, Ordering::SeqCst);
    }

    pub fn set_started(&self) {
        *self.start.lock() = Some(Instant::now());
    }

    pub fn set_finished(&self) {
        *self.end.lock() = Some(Instant::now());
    }

    pub fn start(&self) -> Option<Instant> {
        *self.start.lock()
    }

    pub fn end(&self) -> Option<Instant> {
        *self.end.lock()
    }

    pub fn duration(&self) -> Duration {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Clone for denormalization: fresh run state, path-qualified name,
    /// dependencies remapped into the same ancestor namespace, and an
    /// independent copy of the task.
    pub fn clone_for_denormalize(&self, unique_name: &str, ancestors: &[String]) -> Stage {
        let mut stage = Stage::new(unique_name);
        stage.condition = self.condition.clone();
        stage.task = self
            .task
            .as_ref()
            .map(|task| Arc::new(task.clone_fresh()));
        stage.pipeline = self.pipeline.clone();
        stage.depends_on = self
            .depends_on
            .iter()
            .map(|dep| utils::cascade_name(ancestors, dep))
            .collect();
        stage.dir = self.dir.clone();
        stage.allow_failure = self.allow_failure;
        stage.env = self.env.clone();
        stage.variables = self.variables.clone();
        stage.generator = self.generator.clone();
        stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_stage_starts_waiting() {
        let stage = Stage::new("s");
        assert_eq!(stage.status(), StageStatus::Waiting);
        assert!(!stage.status().is_terminal());
    }

    #[test]
    fn terminal_statuses() {
        for status in [
            StageStatus::Done,
            StageStatus::Error,
            StageStatus::Skipped,
            StageStatus::Cancelled,
        ] {
            assert!(status.is_terminal());
        }
        assert!(!StageStatus::Running.is_terminal());
    }

    #[test]
    fn clone_for_denormalize_cascades_dependencies() {
        let mut stage = Stage::from_task(Arc::new(Task::new("leaf")));
        stage.depends_on = vec!["other".to_string()];
        stage.set_status(StageStatus::Done);

        let ancestors = vec!["p".to_string(), "sub".to_string()];
        let clone = stage.clone_for_denormalize("p->sub->leaf", &ancestors);

        assert_eq!(clone.name, "p->sub->leaf");
        assert_eq!(clone.depends_on, vec!["p->sub->other"]);
        assert_eq!(clone.status(), StageStatus::Waiting);
        assert_ne!(
            clone.task.as_ref().unwrap().index,
            stage.task.as_ref().unwrap().index
        );
    }
}
