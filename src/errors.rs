// src/errors.rs

//! Crate-wide error type and `Result` alias.

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskctlError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("pipeline ({pipeline}) already contains [{child}] -> [{parent}] - reversing it would create a cyclical dependency")]
    CycleDetected {
        pipeline: String,
        parent: String,
        child: String,
    },

    #[error("stage not found: {0}")]
    StageNotFound(String),

    #[error("no such context: {0}")]
    ContextNotFound(String),

    #[error("context startup error: {0}")]
    ContextStartup(String),

    /// The spawned command ran to completion but exited non-zero.
    ///
    /// Kept distinct from every other executor failure so that
    /// `allow_failure` and condition evaluation can recognise it.
    #[error("command exited with status {0}")]
    ExitStatus(i32),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("execution cancelled")]
    Cancelled,

    #[error("template error: {0}")]
    Template(String),

    #[error("task execution fault: {0}")]
    TaskRun(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl TaskctlError {
    /// Exit code carried by an [`TaskctlError::ExitStatus`] error, if that is
    /// what this error is.
    pub fn exit_status(&self) -> Option<i32> {
        match self {
            TaskctlError::ExitStatus(code) => Some(*code),
            _ => None,
        }
    }

    /// Whether this error represents cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskctlError::Cancelled)
    }
}

pub type Result<T> = std::result::Result<T, TaskctlError>;
