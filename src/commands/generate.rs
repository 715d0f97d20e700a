// src/commands/generate.rs

//! `taskctl generate` — emit a CI definition for a pipeline.

use crate::commands::App;
use crate::errors::{Result, TaskctlError};
use crate::genci::{self, CiTarget};

pub fn run(app: &App, pipeline: &str, target: &str) -> Result<i32> {
    let graph = app
        .built
        .pipelines
        .get(pipeline)
        .ok_or_else(|| TaskctlError::Config(format!("unknown pipeline: {pipeline}")))?;

    let target = CiTarget::parse(target)?;
    let rendered = genci::generate(target, graph)?;
    app.runner.output_factory().stdout().write_raw(&rendered);
    Ok(0)
}
