// src/commands/show.rs

//! `taskctl show` — print one task's full definition.

use crate::commands::App;
use crate::errors::{Result, TaskctlError};

pub fn run(app: &App, name: &str) -> Result<i32> {
    let task = app
        .built
        .tasks
        .get(name)
        .ok_or_else(|| TaskctlError::Config(format!("unknown task: {name}")))?;
    let out = app.runner.output_factory().stdout();

    out.write_line(&format!("Name: {}", task.name));
    if !task.description.is_empty() {
        out.write_line(&format!("Description: {}", task.description));
    }
    if !task.context.is_empty() {
        out.write_line(&format!("Context: {}", task.context));
    }
    out.write_line("Commands:");
    for command in &task.commands {
        out.write_line(&format!("  - {command}"));
    }
    if let Some(dir) = &task.dir {
        out.write_line(&format!("Dir: {dir}"));
    }
    if let Some(timeout) = task.timeout {
        out.write_line(&format!("Timeout: {timeout:?}"));
    }
    if let Some(condition) = &task.condition {
        out.write_line(&format!("Condition: {condition}"));
    }
    out.write_line(&format!("AllowFailure: {}", task.allow_failure));
    if !task.env.is_empty() {
        out.write_line("Env:");
        for (key, value) in task.env.map() {
            out.write_line(&format!("  {key}={value}"));
        }
    }
    if !task.variables.is_empty() {
        out.write_line("Variables:");
        for (key, value) in task.variables.map() {
            out.write_line(&format!("  {key}={value}"));
        }
    }

    Ok(0)
}
