// src/runner/compiler.rs

//! Compilation of tasks into executor jobs.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::errors::Result;
use crate::executor::Job;
use crate::runner::context::ExecutionContext;
use crate::task::Task;
use crate::template;
use crate::variables::Variables;

/// Turns a task plus its context and variable environment into the ordered
/// job list the runner feeds to the executor.
#[derive(Debug, Default)]
pub struct TaskCompiler {
    variables: Variables,
}

impl TaskCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variables(variables: Variables) -> Self {
        Self { variables }
    }

    /// Compile every variation × command pair of `task` in declaration
    /// order.
    ///
    /// Task-level variables win over the caller's, and every variable value
    /// is rendered against the merged container itself, so values may
    /// reference other keys. `dir` is the effective working directory (the
    /// task's own, or the stage's when the task has none).
    pub fn compile_task(
        &self,
        task: &Task,
        context: &ExecutionContext,
        dir: Option<&str>,
        env: &Variables,
        vars: &Variables,
    ) -> Result<Vec<Job>> {
        let vars = vars.merge(&task.variables);

        for (key, value) in vars.map() {
            let rendered = template::render(&value, &vars.map())?;
            vars.set(key, rendered);
        }

        let mut jobs = Vec::new();
        for variation in task.effective_variations() {
            let variation_env = env.merge(&Variables::from_map(variation));
            for command in &task.commands {
                jobs.push(self.compile_command(
                    &task.name,
                    command,
                    context,
                    dir,
                    task.timeout,
                    task.interactive,
                    &variation_env,
                    &vars,
                )?);
            }
        }

        Ok(jobs)
    }

    /// Compile a single command against a context.
    ///
    /// Generates the context envfile when the context asks for one, renders
    /// the working directory template, and prefixes the context executable.
    #[allow(clippy::too_many_arguments)]
    pub fn compile_command(
        &self,
        task_name: &str,
        command: &str,
        context: &ExecutionContext,
        dir: Option<&str>,
        timeout: Option<Duration>,
        interactive: bool,
        env: &Variables,
        vars: &Variables,
    ) -> Result<Job> {
        let vars = self.variables.merge(vars);

        let envfile_path = match context.envfile() {
            Some(envfile) => {
                let path = envfile.generated_path(task_name);
                envfile.write(&path, &env.map())?;
                Some(path)
            }
            None => None,
        };

        let command = context.command_line(command, envfile_path.as_deref());
        debug!(command = %command, "compiled command");

        let dir = match dir {
            Some(d) => Some(PathBuf::from(template::render(d, &vars.map())?)),
            None => match context.dir() {
                Some(d) => Some(PathBuf::from(template::render(
                    &d.to_string_lossy(),
                    &vars.map(),
                )?)),
                None => None,
            },
        };

        Ok(Job {
            command,
            dir,
            env: env.clone(),
            vars,
            timeout,
            interactive,
        })
    }
}
