// src/task.rs

//! The unit of work: an ordered command list plus captured run state.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;

use crate::utils;
use crate::variables::Variables;

static NEXT_TASK_INDEX: AtomicU64 = AtomicU64::new(0);

/// What kind of artifact a task publishes after a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    File,
    /// A `KEY=VALUE` file merged back into the runner environment.
    Dotenv,
}

#[derive(Debug, Clone)]
pub struct Artifact {
    pub name: String,
    pub path: String,
    pub kind: ArtifactKind,
}

/// Mutable run state, written only by the task's runner.
#[derive(Debug, Default)]
struct TaskState {
    errored: bool,
    skipped: bool,
    exit_code: i32,
    error: Option<String>,
    start: Option<Instant>,
    end: Option<Instant>,
}

/// Append-only per-task log buffers.
///
/// Buffers are private to the task, so concurrent sibling tasks never
/// interleave inside them.
#[derive(Debug, Default)]
pub struct TaskLog {
    stdout: Mutex<String>,
    stderr: Mutex<String>,
}

/// A task: ordered commands executed under one context, with captured
/// output, status and timing.
#[derive(Debug)]
pub struct Task {
    /// Unique per process, monotonically assigned.
    pub index: u64,
    pub name: String,
    pub description: String,
    pub commands: Vec<String>,
    /// Context name; empty means the default local context.
    pub context: String,
    pub env: Variables,
    pub variables: Variables,
    /// Env overlays; the command list runs once per overlay.
    pub variations: Vec<IndexMap<String, String>>,
    pub dir: Option<String>,
    pub timeout: Option<Duration>,
    pub allow_failure: bool,
    pub before: Vec<String>,
    pub after: Vec<String>,
    pub interactive: bool,
    pub condition: Option<String>,
    pub export_as: Option<String>,
    pub artifacts: Option<Artifact>,

    state: Mutex<TaskState>,
    log: TaskLog,
}

impl Task {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            index: NEXT_TASK_INDEX.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            description: String::new(),
            commands: Vec::new(),
            context: String::new(),
            env: Variables::new(),
            variables: Variables::new(),
            variations: Vec::new(),
            dir: None,
            timeout: None,
            allow_failure: false,
            before: Vec::new(),
            after: Vec::new(),
            interactive: false,
            condition: None,
            export_as: None,
            artifacts: None,
            state: Mutex::new(TaskState {
                exit_code: -1,
                ..TaskState::default()
            }),
            log: TaskLog::default(),
        }
    }

    pub fn from_commands<I, S>(name: impl Into<String>, commands: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut t = Self::new(name);
        t.commands = commands.into_iter().map(Into::into).collect();
        t
    }

    /// Independent copy with fresh run state and a new unique index.
    ///
    /// Used by the denormalizer so every flattened stage owns its own task.
    pub fn clone_fresh(&self) -> Task {
        let mut t = Task::new(self.name.clone());
        t.description = self.description.clone();
        t.commands = self.commands.clone();
        t.context = self.context.clone();
        t.env = self.env.clone();
        t.variables = self.variables.clone();
        t.variations = self.variations.clone();
        t.dir = self.dir.clone();
        t.timeout = self.timeout;
        t.allow_failure = self.allow_failure;
        t.before = self.before.clone();
        t.after = self.after.clone();
        t.interactive = self.interactive;
        t.condition = self.condition.clone();
        t.export_as = self.export_as.clone();
        t.artifacts = self.artifacts.clone();
        t
    }

    /// The variation overlays to run; a task without variations runs once
    /// with an empty overlay.
    pub fn effective_variations(&self) -> Vec<IndexMap<String, String>> {
        if self.variations.is_empty() {
            vec![IndexMap::new()]
        } else {
            self.variations.clone()
        }
    }

    // --- run state -------------------------------------------------------

    pub fn set_started(&self) {
        self.state.lock().start = Some(Instant::now());
    }

    pub fn set_finished(&self) {
        self.state.lock().end = Some(Instant::now());
    }

    pub fn start(&self) -> Option<Instant> {
        self.state.lock().start
    }

    pub fn end(&self) -> Option<Instant> {
        self.state.lock().end
    }

    pub fn duration(&self) -> Duration {
        let state = self.state.lock();
        match (state.start, state.end) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn mark_errored(&self, message: impl Into<String>) {
        let mut state = self.state.lock();
        state.errored = true;
        state.error = Some(message.into());
    }

    pub fn mark_skipped(&self) {
        self.state.lock().skipped = true;
    }

    pub fn is_errored(&self) -> bool {
        self.state.lock().errored
    }

    pub fn is_skipped(&self) -> bool {
        self.state.lock().skipped
    }

    pub fn set_exit_code(&self, code: i32) {
        self.state.lock().exit_code = code;
    }

    pub fn exit_code(&self) -> i32 {
        self.state.lock().exit_code
    }

    pub fn error(&self) -> Option<String> {
        self.state.lock().error.clone()
    }

    // --- log buffers -----------------------------------------------------

    pub fn log_stdout_line(&self, line: &str) {
        let mut buf = self.log.stdout.lock();
        buf.push_str(line);
        buf.push('\n');
    }

    pub fn log_stderr_line(&self, line: &str) {
        let mut buf = self.log.stderr.lock();
        buf.push_str(line);
        buf.push('\n');
    }

    /// Captured stdout of the last run.
    pub fn output(&self) -> String {
        self.log.stdout.lock().clone()
    }

    pub fn stderr_output(&self) -> String {
        self.log.stderr.lock().clone()
    }

    /// Last non-empty line of stderr, falling back to stdout; empty when the
    /// task has not errored.
    pub fn error_message(&self) -> String {
        if !self.is_errored() {
            return String::new();
        }

        let stderr = self.log.stderr.lock();
        if !stderr.trim().is_empty() {
            return utils::last_nonempty_line(&stderr).to_string();
        }
        drop(stderr);

        utils::last_nonempty_line(&self.log.stdout.lock()).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indexes_are_unique_and_monotonic() {
        let a = Task::new("a");
        let b = Task::new("b");
        assert!(b.index > a.index);
    }

    #[test]
    fn default_variation_is_a_single_empty_overlay() {
        let t = Task::new("t");
        assert_eq!(t.effective_variations(), vec![IndexMap::<String, String>::new()]);

        let mut t = Task::new("t");
        t.variations = vec![IndexMap::from([("A".to_string(), "1".to_string())])];
        assert_eq!(t.effective_variations().len(), 1);
        assert_eq!(t.effective_variations()[0]["A"], "1");
    }

    #[test]
    fn error_message_prefers_stderr_and_skips_blank_lines() {
        let t = Task::new("t");
        t.log_stdout_line("stdout line");
        t.log_stderr_line("first");
        t.log_stderr_line("last");
        t.log_stderr_line("");
        t.mark_errored("boom");

        assert_eq!(t.error_message(), "last");
    }

    #[test]
    fn error_message_falls_back_to_stdout() {
        let t = Task::new("t");
        t.log_stdout_line("only stdout");
        t.mark_errored("boom");

        assert_eq!(t.error_message(), "only stdout");
    }

    #[test]
    fn error_message_is_empty_when_not_errored() {
        let t = Task::new("t");
        t.log_stderr_line("noise");
        assert_eq!(t.error_message(), "");
    }

    #[test]
    fn clone_fresh_resets_state_and_assigns_new_index() {
        let t = Task::from_commands("t", ["echo hi"]);
        t.mark_errored("boom");
        t.log_stdout_line("old output");

        let fresh = t.clone_fresh();
        assert_ne!(fresh.index, t.index);
        assert!(!fresh.is_errored());
        assert_eq!(fresh.output(), "");
        assert_eq!(fresh.commands, t.commands);
    }

    #[test]
    fn duration_requires_start_and_end_ordering() {
        let t = Task::new("t");
        t.set_started();
        t.set_finished();
        assert!(t.start().unwrap() <= t.end().unwrap());
    }
}
