#![allow(dead_code)]

use std::sync::Arc;

use indexmap::IndexMap;
use taskctl::output::{OutputFactory, OutputFormat, SafeWriter};
use taskctl::runner::TaskRunner;
use taskctl::scheduler::{ExecutionGraph, Scheduler, Stage};
use taskctl::task::Task;
use taskctl::variables::Variables;

/// Builder for [`Task`] to simplify test setup.
pub struct TaskBuilder {
    task: Task,
}

impl TaskBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            task: Task::new(name),
        }
    }

    pub fn command(mut self, command: &str) -> Self {
        self.task.commands.push(command.to_string());
        self
    }

    pub fn condition(mut self, condition: &str) -> Self {
        self.task.condition = Some(condition.to_string());
        self
    }

    pub fn allow_failure(mut self) -> Self {
        self.task.allow_failure = true;
        self
    }

    pub fn env(self, key: &str, value: &str) -> Self {
        self.task.env.set(key, value);
        self
    }

    pub fn var(self, key: &str, value: &str) -> Self {
        self.task.variables.set(key, value);
        self
    }

    pub fn variation(mut self, overlay: &[(&str, &str)]) -> Self {
        self.task.variations.push(
            overlay
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<IndexMap<String, String>>(),
        );
        self
    }

    pub fn export_as(mut self, name: &str) -> Self {
        self.task.export_as = Some(name.to_string());
        self
    }

    pub fn timeout_ms(mut self, ms: u64) -> Self {
        self.task.timeout = Some(std::time::Duration::from_millis(ms));
        self
    }

    pub fn build(self) -> Arc<Task> {
        Arc::new(self.task)
    }
}

/// Builder for [`Stage`].
pub struct StageBuilder {
    stage: Stage,
}

impl StageBuilder {
    pub fn task(task: Arc<Task>) -> Self {
        Self {
            stage: Stage::from_task(task),
        }
    }

    pub fn pipeline(name: &str, graph: ExecutionGraph) -> Self {
        let mut stage = Stage::new(name);
        stage.pipeline = Some(Arc::new(graph));
        Self { stage }
    }

    pub fn named(mut self, name: &str) -> Self {
        self.stage.name = name.to_string();
        self
    }

    pub fn depends_on(mut self, deps: &[&str]) -> Self {
        self.stage.depends_on = deps.iter().map(|d| d.to_string()).collect();
        self
    }

    pub fn condition(mut self, condition: &str) -> Self {
        self.stage.condition = Some(condition.to_string());
        self
    }

    pub fn allow_failure(mut self) -> Self {
        self.stage.allow_failure = true;
        self
    }

    pub fn env(self, key: &str, value: &str) -> Self {
        self.stage.env.set(key, value);
        self
    }

    pub fn build(self) -> Stage {
        self.stage
    }
}

/// A runner wired to buffered writers, suitable for asserting on output.
pub fn test_runner() -> Arc<TaskRunner> {
    test_runner_with_format(OutputFormat::Raw)
}

pub fn test_runner_with_format(format: OutputFormat) -> Arc<TaskRunner> {
    let factory = OutputFactory::new(
        format,
        Arc::new(SafeWriter::new(Box::new(std::io::sink()))),
        Arc::new(SafeWriter::new(Box::new(std::io::sink()))),
    );
    Arc::new(TaskRunner::new(factory).with_variables(Variables::new()))
}

/// Runner plus scheduler, sharing the same cancellation plumbing.
pub fn test_scheduler() -> (Arc<TaskRunner>, Scheduler) {
    let runner = test_runner();
    let scheduler = Scheduler::new(runner.clone());
    (runner, scheduler)
}
