// src/executor/job.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::variables::Variables;

/// One fully-compiled command, ready for the executor.
///
/// The compiler produces an ordered list of jobs per task (variations ×
/// commands); the runner consumes them sequentially, threading each job's
/// captured output into the next via the `Output` variable.
#[derive(Debug)]
pub struct Job {
    /// Command template; rendered against `vars` at execution time.
    pub command: String,
    pub dir: Option<PathBuf>,
    pub env: Variables,
    /// Template model for `command` (fully rendered at compile time).
    pub vars: Variables,
    pub timeout: Option<Duration>,
    /// Inherit the caller's stdin instead of closing it.
    pub interactive: bool,
}

impl Job {
    pub fn from_command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            dir: None,
            env: Variables::new(),
            vars: Variables::new(),
            timeout: None,
            interactive: false,
        }
    }
}
