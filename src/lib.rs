// src/lib.rs

pub mod cancellation;
pub mod cli;
pub mod commands;
pub mod config;
pub mod errors;
pub mod executor;
pub mod genci;
pub mod logging;
pub mod output;
pub mod runner;
pub mod scheduler;
pub mod task;
pub mod template;
pub mod utils;
pub mod variables;
pub mod watch;

use crate::cli::{Cli, Command};
use crate::commands::App;
use crate::errors::Result;

/// High-level entry point used by `main.rs`: dispatch the parsed CLI to a
/// subcommand and return the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    match &cli.command {
        Some(Command::Init) => return commands::init::run(),
        Some(Command::Completion { shell }) => return commands::completion::run(*shell),
        _ => {}
    }

    let app = App::from_cli(&cli)?;

    match &cli.command {
        Some(Command::Run { targets }) => commands::run::run(&app, targets).await,
        Some(Command::List { scope }) => commands::list::run(&app, *scope),
        Some(Command::Show { task }) => commands::show::run(&app, task),
        Some(Command::Watch { watchers }) => commands::watch::run(&app, watchers).await,
        Some(Command::Generate { pipeline, target }) => {
            commands::generate::run(&app, pipeline, target)
        }
        Some(Command::Graph {
            pipeline,
            denormalized,
        }) => commands::graph::run(&app, pipeline, *denormalized),
        Some(Command::Init) | Some(Command::Completion { .. }) => unreachable!(),
        None => {
            if cli.targets.is_empty() {
                commands::list::run(&app, cli::ListScope::All)
            } else {
                commands::run::run(&app, &cli.targets).await
            }
        }
    }
}
