// src/executor/shell.rs

//! Runs compiled jobs through the platform shell with streamed, captured
//! output.

use std::process::Stdio;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::cancellation::CancellationToken;
use crate::errors::{Result, TaskctlError};
use crate::executor::Job;
use crate::output::{JobSink, StreamKind};
use crate::template;

/// Executes jobs one at a time, accumulating captured output across calls
/// so later jobs of the same task can observe what earlier ones printed.
pub struct ShellExecutor {
    captured: Arc<Mutex<Vec<u8>>>,
}

impl Default for ShellExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl ShellExecutor {
    pub fn new() -> Self {
        Self {
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Everything captured so far, including output of failed jobs.
    pub fn captured(&self) -> Vec<u8> {
        self.captured.lock().clone()
    }

    /// Execute a single job: render its command, spawn the shell, stream
    /// stdout/stderr into `sink` while capturing, and wait for completion,
    /// cancellation or timeout.
    ///
    /// A process that exits non-zero yields [`TaskctlError::ExitStatus`];
    /// every other failure mode keeps its own error kind.
    pub async fn execute(
        &self,
        cancel: &CancellationToken,
        job: &Job,
        sink: Arc<dyn JobSink>,
    ) -> Result<Vec<u8>> {
        if cancel.is_cancelled() {
            return Err(TaskctlError::Cancelled);
        }

        let command = template::render(&job.command, &job.vars.map())?;
        debug!(command = %command, "executing");

        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&command);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&command);
            c
        };

        cmd.envs(job.env.map())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(if job.interactive {
                Stdio::inherit()
            } else {
                Stdio::null()
            })
            .kill_on_drop(true);

        if let Some(dir) = &job.dir {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn()?;

        let stdout_reader = child
            .stdout
            .take()
            .map(|s| self.spawn_reader(s, StreamKind::Stdout, sink.clone()));
        let stderr_reader = child
            .stderr
            .take()
            .map(|s| self.spawn_reader(s, StreamKind::Stderr, sink.clone()));

        let timeout = async {
            match job.timeout {
                Some(t) => tokio::time::sleep(t).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(timeout);

        let status = tokio::select! {
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                let _ = child.kill().await;
                Self::join_readers(stdout_reader, stderr_reader).await;
                return Err(TaskctlError::Cancelled);
            }
            _ = &mut timeout => {
                let _ = child.kill().await;
                Self::join_readers(stdout_reader, stderr_reader).await;
                return Err(TaskctlError::Timeout(job.timeout.unwrap_or_default()));
            }
        };

        Self::join_readers(stdout_reader, stderr_reader).await;

        if !status.success() {
            return Err(TaskctlError::ExitStatus(status.code().unwrap_or(-1)));
        }

        Ok(self.captured())
    }

    fn spawn_reader<R>(
        &self,
        reader: R,
        kind: StreamKind,
        sink: Arc<dyn JobSink>,
    ) -> JoinHandle<()>
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let captured = self.captured.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match kind {
                    StreamKind::Stdout => sink.stdout_line(&line),
                    StreamKind::Stderr => sink.stderr_line(&line),
                }
                let mut buf = captured.lock();
                buf.extend_from_slice(line.as_bytes());
                buf.push(b'\n');
            }
        })
    }

    async fn join_readers(stdout: Option<JoinHandle<()>>, stderr: Option<JoinHandle<()>>) {
        if let Some(h) = stdout {
            let _ = h.await;
        }
        if let Some(h) = stderr {
            let _ = h.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::DiscardSink;
    use crate::variables::Variables;
    use std::time::Duration;

    fn job(command: &str) -> Job {
        Job::from_command(command)
    }

    #[tokio::test]
    async fn captures_stdout_with_trailing_newline() {
        let executor = ShellExecutor::new();
        let out = executor
            .execute(&CancellationToken::new(), &job("echo hello"), Arc::new(DiscardSink))
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hello\n");
    }

    #[tokio::test]
    async fn capture_accumulates_across_jobs() {
        let executor = ShellExecutor::new();
        let cancel = CancellationToken::new();
        executor
            .execute(&cancel, &job("echo one"), Arc::new(DiscardSink))
            .await
            .unwrap();
        let out = executor
            .execute(&cancel, &job("echo two"), Arc::new(DiscardSink))
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "one\ntwo\n");
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_distinguishable_error() {
        let executor = ShellExecutor::new();
        let err = executor
            .execute(&CancellationToken::new(), &job("exit 3"), Arc::new(DiscardSink))
            .await
            .unwrap_err();
        assert_eq!(err.exit_status(), Some(3));
    }

    #[tokio::test]
    async fn commands_are_rendered_against_job_vars() {
        let executor = ShellExecutor::new();
        let mut j = job("echo {{ .Greeting }}");
        j.vars = Variables::from_map([("Greeting", "hi")]);
        let out = executor
            .execute(&CancellationToken::new(), &j, Arc::new(DiscardSink))
            .await
            .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "hi\n");
    }

    #[tokio::test]
    async fn missing_template_key_fails_before_spawning() {
        let executor = ShellExecutor::new();
        let err = executor
            .execute(
                &CancellationToken::new(),
                &job("echo {{ .Missing }}"),
                Arc::new(DiscardSink),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TaskctlError::Template(_)));
    }

    #[tokio::test]
    async fn timeout_kills_the_command() {
        let executor = ShellExecutor::new();
        let mut j = job("sleep 5");
        j.timeout = Some(Duration::from_millis(100));
        let err = executor
            .execute(&CancellationToken::new(), &j, Arc::new(DiscardSink))
            .await
            .unwrap_err();
        assert!(matches!(err, TaskctlError::Timeout(_)));
    }

    #[tokio::test]
    async fn cancellation_aborts_a_running_command() {
        let executor = ShellExecutor::new();
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let err = executor
            .execute(&cancel, &job("sleep 5"), Arc::new(DiscardSink))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn already_cancelled_token_short_circuits() {
        let executor = ShellExecutor::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = executor
            .execute(&cancel, &job("echo nope"), Arc::new(DiscardSink))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn runs_in_the_requested_directory() {
        let executor = ShellExecutor::new();
        let dir = tempfile::tempdir().unwrap();
        let mut j = job("pwd");
        j.dir = Some(dir.path().to_path_buf());
        let out = executor
            .execute(&CancellationToken::new(), &j, Arc::new(DiscardSink))
            .await
            .unwrap();
        let printed = String::from_utf8(out).unwrap();
        let canonical = dir.path().canonicalize().unwrap();
        assert_eq!(
            std::path::Path::new(printed.trim()).canonicalize().unwrap(),
            canonical
        );
    }
}
