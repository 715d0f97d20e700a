// src/runner/runner.rs

//! Runs single tasks end to end: context lifecycle, condition check,
//! compilation, sequential job execution, output export and hooks.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

use crate::cancellation::CancellationToken;
use crate::errors::{Result, TaskctlError};
use crate::executor::ShellExecutor;
use crate::output::{DiscardSink, ForwardSink, JobSink, OutputFactory};
use crate::runner::compiler::TaskCompiler;
use crate::runner::context::ExecutionContext;
use crate::task::{ArtifactKind, Task};
use crate::utils;
use crate::variables::Variables;

/// Executes tasks against their contexts.
///
/// The runner owns the shared variable/env containers that exported task
/// outputs land in, the shared cancellation token, and the registry of
/// contexts that need tearing down at the end of the run.
pub struct TaskRunner {
    contexts: HashMap<String, Arc<ExecutionContext>>,
    default_context: Arc<ExecutionContext>,
    variables: Variables,
    env: Variables,
    compiler: TaskCompiler,
    output: OutputFactory,
    dry_run: bool,

    cancel: CancellationToken,
    canceling: AtomicBool,
    inflight: AtomicUsize,
    idle: Notify,
    cleanup: Mutex<IndexMap<String, Arc<ExecutionContext>>>,
}

impl TaskRunner {
    pub fn new(output: OutputFactory) -> Self {
        Self {
            contexts: HashMap::new(),
            default_context: ExecutionContext::default_local(),
            variables: Variables::new(),
            env: Variables::new(),
            compiler: TaskCompiler::new(),
            output,
            dry_run: false,
            cancel: CancellationToken::new(),
            canceling: AtomicBool::new(false),
            inflight: AtomicUsize::new(0),
            idle: Notify::new(),
            cleanup: Mutex::new(IndexMap::new()),
        }
    }

    pub fn with_contexts(mut self, contexts: HashMap<String, Arc<ExecutionContext>>) -> Self {
        self.contexts = contexts;
        self
    }

    pub fn with_variables(mut self, variables: Variables) -> Self {
        self.compiler = TaskCompiler::with_variables(variables.clone());
        self.variables = variables;
        self
    }

    pub fn with_env(mut self, env: Variables) -> Self {
        self.env = env;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Shared token cancelled by [`TaskRunner::cancel`].
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Exported variables container (`Tasks.<Name>.Output` namespace).
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Exported environment container.
    pub fn env(&self) -> &Variables {
        &self.env
    }

    pub fn output_factory(&self) -> &OutputFactory {
        &self.output
    }

    /// Run `task` with no stage overlays.
    pub async fn run(&self, task: &Arc<Task>) -> Result<()> {
        self.run_with_overlays(task, &Variables::new(), &Variables::new(), None)
            .await
    }

    /// Run one task end to end with stage-level env/vars/dir overlaid.
    ///
    /// Effective precedence, later wins: runner < context < TASK_NAME <
    /// stage < task.
    pub async fn run_with_overlays(
        &self,
        task: &Arc<Task>,
        stage_env: &Variables,
        stage_vars: &Variables,
        stage_dir: Option<&str>,
    ) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(TaskctlError::Cancelled);
        }
        let _guard = InflightGuard::enter(self);

        let context = self.context_for_task(task)?;

        if let Err(err) = context.up().await {
            task.mark_errored(err.to_string());
            task.set_exit_code(-1);
            return Err(err);
        }
        if let Err(err) = context.before().await {
            task.mark_errored(err.to_string());
            task.set_exit_code(-1);
            return Err(err);
        }

        let env = self
            .env
            .merge(context.env())
            .with("TASK_NAME", task.name.clone())
            .merge(stage_env)
            .merge(&task.env);
        let vars = self.variables.merge(stage_vars);
        let dir = task.dir.clone().or_else(|| stage_dir.map(String::from));

        task.set_started();

        if let Some(condition) = &task.condition {
            match self.check_condition(task, condition, &context, &env, &vars).await {
                Ok(true) => {}
                Ok(false) => {
                    info!(task = %task.name, "task was skipped");
                    task.mark_skipped();
                    task.set_finished();
                    return Ok(());
                }
                Err(err) => {
                    task.mark_errored(err.to_string());
                    task.set_finished();
                    return Err(err);
                }
            }
        }

        if let Err(err) = self
            .run_hooks(task, &task.before, &context, &env, &vars, true)
            .await
        {
            task.mark_errored(err.to_string());
            task.set_finished();
            return Err(err);
        }

        let output = Arc::new(self.output.task_output(task.clone()));
        output.write_header();

        let result = self
            .execute_jobs(task, &context, dir.as_deref(), &env, &vars, output.clone())
            .await;
        task.set_finished();

        if result.is_ok() && !task.is_errored() && !task.is_skipped() {
            if task.exit_code() == -1 {
                task.set_exit_code(0);
            }
            self.export_task_output(task);
            self.apply_artifact(task);
        }

        // After hooks are best-effort on both success and failure paths.
        if let Err(err) = self
            .run_hooks(task, &task.after, &context, &env, &vars, false)
            .await
        {
            warn!(task = %task.name, error = %err, "after hook failed");
        }

        output.write_footer();
        output.close();

        if let Err(err) = context.after().await {
            error!(context = %task.context, error = %err, "context after hook failed");
        }

        result
    }

    async fn execute_jobs(
        &self,
        task: &Arc<Task>,
        context: &Arc<ExecutionContext>,
        dir: Option<&str>,
        env: &Variables,
        vars: &Variables,
        output: Arc<crate::output::TaskOutput>,
    ) -> Result<()> {
        let jobs = match self.compiler.compile_task(task, context, dir, env, vars) {
            Ok(jobs) => jobs,
            Err(err) => {
                task.mark_errored(err.to_string());
                return Err(err);
            }
        };

        if self.dry_run {
            for job in &jobs {
                info!(task = %task.name, command = %job.command, "dry-run");
            }
            return Ok(());
        }

        let executor = ShellExecutor::new();
        let sink: Arc<dyn JobSink> = output;
        let mut prev_output: Vec<u8> = Vec::new();

        for job in &jobs {
            job.vars
                .set("Output", String::from_utf8_lossy(&prev_output).to_string());

            match executor.execute(&self.cancel, job, sink.clone()).await {
                Ok(captured) => prev_output = captured,
                Err(err) => {
                    debug!(task = %task.name, error = %err, "job failed");
                    if let Some(code) = err.exit_status() {
                        task.set_exit_code(code);
                        if task.allow_failure {
                            prev_output = executor.captured();
                            continue;
                        }
                    }
                    task.mark_errored(err.to_string());
                    return Err(err);
                }
            }
        }

        Ok(())
    }

    /// Cancel execution: idempotently flip the latch, cancel the shared
    /// token, and wait for in-flight runs to drain.
    pub async fn cancel(&self) {
        if !self.canceling.swap(true, Ordering::SeqCst) {
            debug!("runner has been cancelled");
            self.cancel.cancel();
        }

        while self.inflight.load(Ordering::SeqCst) > 0 {
            let notified = self.idle.notified();
            if self.inflight.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
    }

    /// Tear down every context touched during the run, once each.
    pub async fn finish(&self) {
        let contexts: Vec<Arc<ExecutionContext>> =
            self.cleanup.lock().drain(..).map(|(_, c)| c).collect();
        for context in contexts {
            context.down().await;
        }
        self.output.close();
    }

    fn context_for_task(&self, task: &Task) -> Result<Arc<ExecutionContext>> {
        if task.context.is_empty() {
            return Ok(self.default_context.clone());
        }

        let context = self
            .contexts
            .get(&task.context)
            .cloned()
            .ok_or_else(|| TaskctlError::ContextNotFound(task.context.clone()))?;

        self.cleanup
            .lock()
            .entry(task.context.clone())
            .or_insert_with(|| context.clone());
        Ok(context)
    }

    async fn check_condition(
        &self,
        task: &Task,
        condition: &str,
        context: &Arc<ExecutionContext>,
        env: &Variables,
        vars: &Variables,
    ) -> Result<bool> {
        let job = self.compiler.compile_command(
            &task.name,
            condition,
            context,
            task.dir.as_deref(),
            task.timeout,
            false,
            env,
            vars,
        )?;

        let executor = ShellExecutor::new();
        match executor.execute(&self.cancel, &job, Arc::new(DiscardSink)).await {
            Ok(_) => Ok(true),
            Err(err) if err.exit_status().is_some() => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn run_hooks(
        &self,
        task: &Task,
        commands: &[String],
        context: &Arc<ExecutionContext>,
        env: &Variables,
        vars: &Variables,
        propagate: bool,
    ) -> Result<()> {
        if commands.is_empty() {
            return Ok(());
        }

        let sink: Arc<dyn JobSink> = Arc::new(ForwardSink::new(
            self.output.stdout(),
            self.output.stderr(),
        ));

        for command in commands {
            let job = self.compiler.compile_command(
                &task.name,
                command,
                context,
                task.dir.as_deref(),
                task.timeout,
                false,
                env,
                vars,
            )?;

            let executor = ShellExecutor::new();
            if let Err(err) = executor.execute(&self.cancel, &job, sink.clone()).await {
                if propagate {
                    return Err(err);
                }
                warn!(task = %task.name, command = %command, error = %err, "hook command failed");
            }
        }

        Ok(())
    }

    fn export_task_output(&self, task: &Task) {
        let output = task.output();
        let env_name = task
            .export_as
            .clone()
            .unwrap_or_else(|| utils::export_env_name(&task.name));

        self.env.set(env_name, output.clone());
        self.variables.set(
            format!("Tasks.{}.Output", utils::title_case(&task.name)),
            output,
        );
    }

    /// Merge a successful task's dotenv artifact back into the runner env.
    fn apply_artifact(&self, task: &Task) {
        let Some(artifact) = &task.artifacts else { return };
        if artifact.kind != ArtifactKind::Dotenv {
            return;
        }

        match std::fs::read_to_string(&artifact.path) {
            Ok(content) => {
                for line in content.lines() {
                    if let Some((key, value)) = line.split_once('=') {
                        self.env.set(key, value);
                    }
                }
            }
            Err(err) => {
                warn!(task = %task.name, path = %artifact.path, error = %err, "unable to read dotenv artifact");
            }
        }
    }
}

/// RAII in-flight counter; lets `cancel()` wait for running tasks to drain.
struct InflightGuard<'a> {
    runner: &'a TaskRunner,
}

impl<'a> InflightGuard<'a> {
    fn enter(runner: &'a TaskRunner) -> Self {
        runner.inflight.fetch_add(1, Ordering::SeqCst);
        Self { runner }
    }
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        if self.runner.inflight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.runner.idle.notify_waiters();
        }
    }
}
