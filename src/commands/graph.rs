// src/commands/graph.rs

//! `taskctl graph` — emit a pipeline's dependency graph as GraphViz DOT.

use crate::commands::App;
use crate::errors::{Result, TaskctlError};

pub fn run(app: &App, pipeline: &str, denormalized: bool) -> Result<i32> {
    let graph = app
        .built
        .pipelines
        .get(pipeline)
        .ok_or_else(|| TaskctlError::Config(format!("unknown pipeline: {pipeline}")))?;

    let rendered = if denormalized {
        graph.denormalize()?.dot()
    } else {
        graph.dot()
    };

    app.runner.output_factory().stdout().write_raw(&rendered);
    Ok(0)
}
