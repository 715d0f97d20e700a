// src/output/mod.rs

//! Per-task output decoration.
//!
//! - [`raw`] passes lines straight through.
//! - [`prefixed`] strips ANSI escapes and prefixes each line with the task
//!   name.
//! - [`cockpit`] renders a single shared spinner with the currently running
//!   task names.
//!
//! Whatever the decorator, every line is also teed into the task's own log
//! buffers so `task.output()` / `task.error_message()` observe the captured
//! content. Terminal-facing writers are lock-guarded ([`SafeWriter`])
//! because a task's stdout and stderr pipes are drained concurrently.

pub mod cockpit;
pub mod prefixed;
pub mod raw;
pub mod summary;

use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::errors::{Result, TaskctlError};
use crate::task::Task;

pub use cockpit::CockpitState;

/// Output decoration formats selectable per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Raw,
    Prefixed,
    Cockpit,
}

impl FromStr for OutputFormat {
    type Err = TaskctlError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(OutputFormat::Raw),
            "prefixed" => Ok(OutputFormat::Prefixed),
            "cockpit" => Ok(OutputFormat::Cockpit),
            other => Err(TaskctlError::Config(format!(
                "unknown output format: {other}"
            ))),
        }
    }
}

/// Which of the two process pipes a line arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

/// Lock-guarded writer shared between concurrently running tasks.
pub struct SafeWriter {
    inner: Mutex<Box<dyn Write + Send>>,
}

impl SafeWriter {
    pub fn new(w: Box<dyn Write + Send>) -> Self {
        Self {
            inner: Mutex::new(w),
        }
    }

    pub fn stdout() -> SharedWriter {
        Arc::new(Self::new(Box::new(std::io::stdout())))
    }

    pub fn stderr() -> SharedWriter {
        Arc::new(Self::new(Box::new(std::io::stderr())))
    }

    /// Write a chunk atomically with respect to other writers.
    pub fn write_raw(&self, s: &str) {
        let mut w = self.inner.lock();
        if let Err(err) = w.write_all(s.as_bytes()) {
            debug!(error = %err, "terminal write failed");
        }
        let _ = w.flush();
    }

    pub fn write_line(&self, s: &str) {
        let mut w = self.inner.lock();
        if let Err(err) = w.write_all(s.as_bytes()).and_then(|_| w.write_all(b"\n")) {
            debug!(error = %err, "terminal write failed");
        }
        let _ = w.flush();
    }

    pub fn flush(&self) {
        let _ = self.inner.lock().flush();
    }

    /// Run `f` against the underlying writer while holding the lock.
    ///
    /// Used by the cockpit spinner to issue terminal control sequences
    /// atomically with the text that follows them.
    pub fn with_writer<F>(&self, f: F)
    where
        F: FnOnce(&mut dyn Write) -> std::io::Result<()>,
    {
        let mut w = self.inner.lock();
        if let Err(err) = f(&mut **w) {
            debug!(error = %err, "terminal write failed");
        }
        let _ = w.flush();
    }
}

pub type SharedWriter = Arc<SafeWriter>;

/// Sink for the executor's line-streamed process output.
pub trait JobSink: Send + Sync {
    fn stdout_line(&self, line: &str);
    fn stderr_line(&self, line: &str);
}

/// Sink used for service commands (context up/down, conditions): output is
/// only surfaced in debug logs.
pub struct DiscardSink;

impl JobSink for DiscardSink {
    fn stdout_line(&self, line: &str) {
        debug!("service command stdout: {line}");
    }

    fn stderr_line(&self, line: &str) {
        debug!("service command stderr: {line}");
    }
}

/// Sink that forwards lines to the terminal without decoration or capture;
/// used for task before/after hooks.
pub struct ForwardSink {
    stdout: SharedWriter,
    stderr: SharedWriter,
}

impl ForwardSink {
    pub fn new(stdout: SharedWriter, stderr: SharedWriter) -> Self {
        Self { stdout, stderr }
    }
}

impl JobSink for ForwardSink {
    fn stdout_line(&self, line: &str) {
        self.stdout.write_line(line);
    }

    fn stderr_line(&self, line: &str) {
        self.stderr.write_line(line);
    }
}

/// One decorator implementation per output format.
pub trait OutputDecorator: Send + Sync {
    fn write_header(&self, task: &Task);
    fn write_line(&self, task: &Task, stream: StreamKind, line: &str);
    fn write_footer(&self, task: &Task);
    /// Flush buffered state; called once per task when streaming ends.
    fn close(&self);
}

/// Factory for per-task outputs, owned by the runner.
pub struct OutputFactory {
    format: OutputFormat,
    stdout: SharedWriter,
    stderr: SharedWriter,
    cockpit: Arc<CockpitState>,
}

impl OutputFactory {
    pub fn new(format: OutputFormat, stdout: SharedWriter, stderr: SharedWriter) -> Self {
        let cockpit = CockpitState::new(stderr.clone());
        Self {
            format,
            stdout,
            stderr,
            cockpit,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    pub fn stdout(&self) -> SharedWriter {
        self.stdout.clone()
    }

    pub fn stderr(&self) -> SharedWriter {
        self.stderr.clone()
    }

    /// Build the decorated output for one task run. Interactive tasks force
    /// the raw format so the terminal stays usable.
    pub fn task_output(&self, task: Arc<Task>) -> TaskOutput {
        let format = if task.interactive {
            OutputFormat::Raw
        } else {
            self.format
        };

        let decorator: Box<dyn OutputDecorator> = match format {
            OutputFormat::Raw => Box::new(raw::RawDecorator::new(
                self.stdout.clone(),
                self.stderr.clone(),
            )),
            OutputFormat::Prefixed => Box::new(prefixed::PrefixedDecorator::new(
                self.stdout.clone(),
                self.stderr.clone(),
            )),
            OutputFormat::Cockpit => Box::new(cockpit::CockpitDecorator::new(self.cockpit.clone())),
        };

        TaskOutput { task, decorator }
    }

    /// Tear down shared decoration state (stops the cockpit spinner).
    pub fn close(&self) {
        self.cockpit.close();
    }
}

/// Decorated output of one task run, teeing every line into the task's own
/// log buffers.
pub struct TaskOutput {
    task: Arc<Task>,
    decorator: Box<dyn OutputDecorator>,
}

impl TaskOutput {
    pub fn write_header(&self) {
        self.decorator.write_header(&self.task);
    }

    pub fn write_footer(&self) {
        self.decorator.write_footer(&self.task);
    }

    pub fn close(&self) {
        self.decorator.close();
    }

    pub fn task(&self) -> &Arc<Task> {
        &self.task
    }
}

impl JobSink for TaskOutput {
    fn stdout_line(&self, line: &str) {
        self.decorator.write_line(&self.task, StreamKind::Stdout, line);
        self.task.log_stdout_line(line);
    }

    fn stderr_line(&self, line: &str) {
        self.decorator.write_line(&self.task, StreamKind::Stderr, line);
        self.task.log_stderr_line(line);
    }
}
