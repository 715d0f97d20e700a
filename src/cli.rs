// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::output::OutputFormat;

/// Command-line arguments for `taskctl`.
#[derive(Debug, Parser)]
#[command(
    name = "taskctl",
    version,
    about = "Concurrent task runner and pipeline orchestrator with pluggable contexts.",
    args_conflicts_with_subcommands = false
)]
pub struct Cli {
    /// Path to the config file (YAML, TOML or JSON).
    #[arg(short = 'c', long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short = 'd', long, global = true)]
    pub debug: bool,

    /// Silence all logging.
    #[arg(short = 'q', long, global = true, visible_alias = "silent")]
    pub quiet: bool,

    /// Output decoration for task logs.
    #[arg(short = 'o', long, global = true, value_enum, value_name = "FORMAT")]
    pub output: Option<OutputFormatArg>,

    /// Variable overrides, `key=value`; may repeat.
    #[arg(long = "set", global = true, value_name = "KEY=VALUE")]
    pub set: Vec<String>,

    /// Compile and print commands without executing anything.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Print the per-stage summary after pipelines finish.
    #[arg(long, global = true)]
    pub summary: bool,

    #[command(subcommand)]
    pub command: Option<Command>,

    /// Pipelines or tasks to run when no subcommand is given.
    #[arg(value_name = "PIPELINE|TASK")]
    pub targets: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run pipelines or tasks by name.
    Run {
        #[arg(value_name = "PIPELINE|TASK", required = true)]
        targets: Vec<String>,
    },

    /// List defined tasks, pipelines or watchers.
    List {
        #[arg(value_enum, default_value = "all")]
        scope: ListScope,
    },

    /// Show one task's full definition.
    Show {
        task: String,
    },

    /// Run named watchers until interrupted.
    Watch {
        #[arg(value_name = "WATCHER")]
        watchers: Vec<String>,
    },

    /// Write a starter config file into the current directory.
    Init,

    /// Generate a CI definition from a pipeline.
    Generate {
        pipeline: String,

        /// CI target: github or gitlab.
        #[arg(short = 't', long, default_value = "github")]
        target: String,
    },

    /// Emit the pipeline's dependency graph as GraphViz DOT.
    Graph {
        pipeline: String,

        /// Flatten nested pipelines before rendering.
        #[arg(long)]
        denormalized: bool,
    },

    /// Emit shell completion scripts.
    Completion {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormatArg {
    Raw,
    Prefixed,
    Cockpit,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Raw => OutputFormat::Raw,
            OutputFormatArg::Prefixed => OutputFormat::Prefixed,
            OutputFormatArg::Cockpit => OutputFormat::Cockpit,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum ListScope {
    All,
    Tasks,
    Pipelines,
    Watchers,
}

/// Convenience wrapper around `Cli::parse()`.
pub fn parse() -> Cli {
    Cli::parse()
}
