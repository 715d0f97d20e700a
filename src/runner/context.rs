// src/runner/context.rs

//! Execution contexts: the configured environments commands are spawned in.
//!
//! A context is one of a closed set of kinds (local shell, container
//! runtime, remote host over ssh). It owns lifecycle hooks (`up`/`down`
//! run at most once per process, `before`/`after` run around every task)
//! and, for container kinds, the envfile passed to the runtime.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::OnceCell;
use tracing::{debug, error};

use crate::cancellation::CancellationToken;
use crate::errors::{Result, TaskctlError};
use crate::executor::{Job, ShellExecutor};
use crate::output::DiscardSink;
use crate::runner::container::{self, ContainerConfig};
use crate::runner::envfile::EnvfileConfig;
use crate::runner::remote::{self, SshConfig};
use crate::variables::Variables;

/// An executable with the arguments it is always invoked with.
#[derive(Debug, Clone, Default)]
pub struct Binary {
    pub bin: String,
    pub args: Vec<String>,
}

impl Binary {
    pub fn new(bin: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            bin: bin.into(),
            args,
        }
    }
}

/// Closed enumeration of context kinds.
#[derive(Debug, Clone)]
pub enum ContextKind {
    Local,
    Container(ContainerConfig),
    Remote(SshConfig),
}

/// A configured command-spawn environment.
#[derive(Debug)]
pub struct ExecutionContext {
    name: String,
    kind: ContextKind,
    /// Command prefix for local/remote kinds; container kinds build their
    /// prefix per command (the envfile path varies).
    executable: Option<Binary>,
    dir: Option<PathBuf>,
    env: Variables,
    envfile: Option<EnvfileConfig>,
    quote: Option<String>,

    up: Vec<String>,
    down: Vec<String>,
    before: Vec<String>,
    after: Vec<String>,

    once_up: OnceCell<()>,
    once_down: OnceCell<()>,
    startup_error: Mutex<Option<String>>,
}

impl ExecutionContext {
    pub fn builder(name: impl Into<String>) -> ExecutionContextBuilder {
        ExecutionContextBuilder {
            name: name.into(),
            kind: ContextKind::Local,
            executable: None,
            dir: None,
            env: Variables::new(),
            envfile: None,
            quote: None,
            up: Vec::new(),
            down: Vec::new(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// The default context: the local shell with the process environment.
    pub fn default_local() -> Arc<Self> {
        Arc::new(
            Self::builder("local")
                .env(Variables::from_os_env())
                .build()
                .expect("default local context always builds"),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ContextKind {
        &self.kind
    }

    pub fn env(&self) -> &Variables {
        &self.env
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn quote(&self) -> Option<&str> {
        self.quote.as_deref()
    }

    /// Envfile configuration when this context wants one generated.
    pub fn envfile(&self) -> Option<&EnvfileConfig> {
        self.envfile.as_ref().filter(|e| e.generate)
    }

    /// Stored startup error, if `up` failed earlier in the process.
    pub fn startup_error(&self) -> Option<String> {
        self.startup_error.lock().clone()
    }

    /// Build the full command line for one rendered command.
    ///
    /// Local contexts without an executable run the command directly; any
    /// configured executable prefixes it, with the command wrapped in the
    /// context quote char.
    pub fn command_line(&self, command: &str, envfile_path: Option<&Path>) -> String {
        match &self.kind {
            ContextKind::Container(cfg) => {
                let mut parts = container::build_command_args(cfg, envfile_path);
                parts.push(self.quoted(&container::wrap_command(cfg, command)));
                parts.join(" ")
            }
            ContextKind::Local | ContextKind::Remote(_) => match &self.executable {
                None => command.to_string(),
                Some(binary) => {
                    let mut parts = vec![binary.bin.clone()];
                    parts.extend(binary.args.iter().cloned());
                    parts.push(self.quoted(command));
                    parts.join(" ")
                }
            },
        }
    }

    fn quoted(&self, command: &str) -> String {
        match &self.quote {
            Some(q) => format!("{q}{command}{q}"),
            None => command.to_string(),
        }
    }

    // --- lifecycle -------------------------------------------------------

    /// Run the `up` commands, at most once per process.
    ///
    /// A failure is stored and returned again to every later caller, so a
    /// broken context fails each task that uses it without re-running the
    /// side effects.
    pub async fn up(&self) -> Result<()> {
        self.once_up
            .get_or_init(|| async {
                for command in &self.up {
                    if let Err(err) = self.run_service_command(command).await {
                        error!(context = %self.name, error = %err, "context startup error");
                        *self.startup_error.lock() = Some(err.to_string());
                        break;
                    }
                }
            })
            .await;

        match self.startup_error() {
            Some(message) => Err(TaskctlError::ContextStartup(message)),
            None => Ok(()),
        }
    }

    /// Run the `down` commands, at most once per process. Errors are logged.
    pub async fn down(&self) {
        self.once_down
            .get_or_init(|| async {
                for command in &self.down {
                    if let Err(err) = self.run_service_command(command).await {
                        error!(context = %self.name, error = %err, "context cleanup error");
                    }
                }
            })
            .await;
    }

    /// Run the `before` commands; not latched, they run for every task.
    pub async fn before(&self) -> Result<()> {
        for command in &self.before {
            self.run_service_command(command).await?;
        }
        Ok(())
    }

    /// Run the `after` commands; not latched.
    pub async fn after(&self) -> Result<()> {
        for command in &self.after {
            self.run_service_command(command).await?;
        }
        Ok(())
    }

    async fn run_service_command(&self, command: &str) -> Result<()> {
        debug!(context = %self.name, command = %command, "running context service command");
        let executor = ShellExecutor::new();
        let job = Job {
            command: command.to_string(),
            dir: self.dir.clone(),
            env: self.env.clone(),
            vars: Variables::new(),
            timeout: None,
            interactive: false,
        };
        executor
            .execute(&CancellationToken::new(), &job, Arc::new(DiscardSink))
            .await
            .map(|_| ())
    }
}

/// Builder for [`ExecutionContext`], used by the configuration layer.
pub struct ExecutionContextBuilder {
    name: String,
    kind: ContextKind,
    executable: Option<Binary>,
    dir: Option<PathBuf>,
    env: Variables,
    envfile: Option<EnvfileConfig>,
    quote: Option<String>,
    up: Vec<String>,
    down: Vec<String>,
    before: Vec<String>,
    after: Vec<String>,
}

impl ExecutionContextBuilder {
    pub fn kind(mut self, kind: ContextKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn executable(mut self, executable: Binary) -> Self {
        self.executable = Some(executable);
        self
    }

    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn env(mut self, env: Variables) -> Self {
        self.env = env;
        self
    }

    pub fn envfile(mut self, envfile: EnvfileConfig) -> Self {
        self.envfile = Some(envfile);
        self
    }

    pub fn quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = Some(quote.into());
        self
    }

    pub fn up(mut self, commands: Vec<String>) -> Self {
        self.up = commands;
        self
    }

    pub fn down(mut self, commands: Vec<String>) -> Self {
        self.down = commands;
        self
    }

    pub fn before(mut self, commands: Vec<String>) -> Self {
        self.before = commands;
        self
    }

    pub fn after(mut self, commands: Vec<String>) -> Self {
        self.after = commands;
        self
    }

    pub fn build(self) -> Result<ExecutionContext> {
        let mut envfile = self.envfile;
        let mut executable = self.executable;
        let mut quote = self.quote;

        match &self.kind {
            ContextKind::Container(_) => {
                // Container runtimes always consume a generated envfile.
                let mut ef = envfile.unwrap_or_default();
                ef.generate = true;
                // Host-specific variables must not leak into the container.
                if ef.include.is_empty() {
                    for key in ["PATH", "HOME", "TMPDIR"] {
                        if !ef.exclude.iter().any(|e| e == key) {
                            ef.exclude.push(key.to_string());
                        }
                    }
                }
                ef.validate()?;
                envfile = Some(ef);
                if quote.is_none() {
                    quote = Some("'".to_string());
                }
            }
            ContextKind::Remote(ssh) => {
                executable = Some(remote::build_executable(ssh, executable.as_ref()));
                if quote.is_none() {
                    quote = Some("'".to_string());
                }
            }
            ContextKind::Local => {
                if let Some(ef) = &envfile {
                    ef.validate()?;
                }
                if executable.is_some() && quote.is_none() {
                    quote = Some("'".to_string());
                }
            }
        }

        Ok(ExecutionContext {
            name: self.name,
            kind: self.kind,
            executable,
            dir: self.dir,
            env: self.env,
            envfile,
            quote,
            up: self.up,
            down: self.down,
            before: self.before,
            after: self.after,
            once_up: OnceCell::new(),
            once_down: OnceCell::new(),
            startup_error: Mutex::new(None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_context_without_executable_runs_command_directly() {
        let ctx = ExecutionContext::builder("local").build().unwrap();
        assert_eq!(ctx.command_line("echo hi", None), "echo hi");
    }

    #[test]
    fn executable_prefix_wraps_command_in_quote() {
        let ctx = ExecutionContext::builder("bash")
            .executable(Binary::new("bash", vec!["-c".into()]))
            .build()
            .unwrap();
        assert_eq!(ctx.command_line("echo hi", None), "bash -c 'echo hi'");
    }

    #[tokio::test]
    async fn up_runs_once_and_stores_failures() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("up-ran");
        let ctx = ExecutionContext::builder("ctx")
            .up(vec![
                format!("touch {}", marker.display()),
                "exit 1".to_string(),
            ])
            .build()
            .unwrap();

        let first = ctx.up().await;
        assert!(matches!(first, Err(TaskctlError::ContextStartup(_))));
        assert!(marker.exists());

        // A later call must not re-run the side effects, just re-report.
        std::fs::remove_file(&marker).unwrap();
        let second = ctx.up().await;
        assert!(matches!(second, Err(TaskctlError::ContextStartup(_))));
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn down_runs_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let counter = dir.path().join("downs");
        let ctx = ExecutionContext::builder("ctx")
            .down(vec![format!("echo x >> {}", counter.display())])
            .build()
            .unwrap();

        ctx.down().await;
        ctx.down().await;

        let content = std::fs::read_to_string(&counter).unwrap();
        assert_eq!(content.lines().count(), 1);
    }
}
