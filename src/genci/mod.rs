// src/genci/mod.rs

//! CI definition generation from denormalized execution graphs.

pub mod github;
pub mod gitlab;

use crate::errors::{Result, TaskctlError};
use crate::scheduler::ExecutionGraph;

/// Supported CI targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CiTarget {
    Github,
    Gitlab,
}

impl CiTarget {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "github" => Ok(CiTarget::Github),
            "gitlab" => Ok(CiTarget::Gitlab),
            other => Err(TaskctlError::Config(format!(
                "unknown CI target: {other} (expected github or gitlab)"
            ))),
        }
    }
}

/// Generate the CI definition for a pipeline.
///
/// The graph is denormalized first so every job sees the flat env union of
/// its ancestor chain.
pub fn generate(target: CiTarget, graph: &ExecutionGraph) -> Result<String> {
    let denormalized = graph.denormalize()?;
    match target {
        CiTarget::Github => github::generate(&denormalized),
        CiTarget::Gitlab => gitlab::generate(&denormalized),
    }
}
