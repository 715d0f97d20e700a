// src/commands/list.rs

//! `taskctl list` — print configured tasks, pipelines and watchers.

use crate::cli::ListScope;
use crate::commands::App;
use crate::errors::Result;

pub fn run(app: &App, scope: ListScope) -> Result<i32> {
    let out = app.runner.output_factory().stdout();

    if matches!(scope, ListScope::All | ListScope::Tasks) {
        out.write_line("Tasks:");
        for (name, task) in &app.built.tasks {
            if task.description.is_empty() {
                out.write_line(&format!("  - {name}"));
            } else {
                out.write_line(&format!("  - {name} - {}", task.description));
            }
        }
    }

    if matches!(scope, ListScope::All | ListScope::Pipelines) {
        out.write_line("Pipelines:");
        for name in app.built.pipelines.keys() {
            out.write_line(&format!("  - {name}"));
        }
    }

    if matches!(scope, ListScope::All | ListScope::Watchers) {
        out.write_line("Watchers:");
        for (name, watcher) in &app.built.watchers {
            out.write_line(&format!("  - {name} (task: {})", watcher.task));
        }
    }

    Ok(0)
}
