// src/commands/mod.rs

//! CLI subcommand implementations.

pub mod completion;
pub mod generate;
pub mod graph;
pub mod init;
pub mod list;
pub mod run;
pub mod show;
pub mod watch;

use std::sync::Arc;

use crate::cli::Cli;
use crate::config::{self, BuiltConfig};
use crate::errors::{Result, TaskctlError};
use crate::output::{OutputFactory, OutputFormat, SafeWriter};
use crate::runner::TaskRunner;
use crate::scheduler::Scheduler;

/// Everything a subcommand needs: the built config plus a wired
/// runner/scheduler pair.
pub struct App {
    pub built: BuiltConfig,
    pub runner: Arc<TaskRunner>,
    pub scheduler: Scheduler,
    pub summary: bool,
}

impl App {
    /// Load config, apply CLI overrides and wire up the engine.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let path = config::discover(cli.config.as_deref())?;
        let cfg = config::load(&path)?;
        let built = config::build(&cfg)?;

        for pair in &cli.set {
            let (key, value) = pair.split_once('=').ok_or_else(|| {
                TaskctlError::Config(format!("--set expects key=value, got {pair:?}"))
            })?;
            built.variables.set(key, value);
        }

        let format: OutputFormat = cli.output.map(Into::into).unwrap_or(built.output);
        let factory = OutputFactory::new(format, SafeWriter::stdout(), SafeWriter::stderr());

        let runner = Arc::new(
            TaskRunner::new(factory)
                .with_contexts(built.contexts.clone())
                .with_variables(built.variables.clone())
                .with_dry_run(cli.dry_run),
        );
        let scheduler = Scheduler::new(runner.clone());

        let summary = cli.summary || built.summary;
        Ok(Self {
            built,
            runner,
            scheduler,
            summary,
        })
    }
}
