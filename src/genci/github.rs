// src/genci/github.rs

//! GitHub Actions workflow emission.

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::Result;
use crate::scheduler::graph::ROOT_NODE_NAME;
use crate::scheduler::{ExecutionGraph, Stage};

#[derive(Debug, Serialize)]
struct Workflow {
    name: String,
    on: WorkflowOn,
    jobs: IndexMap<String, serde_yaml::Value>,
}

#[derive(Debug, Serialize)]
struct WorkflowOn {
    push: PushTrigger,
}

#[derive(Debug, Serialize)]
struct PushTrigger {
    branches: Vec<String>,
}

#[derive(Debug, Serialize)]
struct Job {
    name: String,
    #[serde(rename = "runs-on")]
    runs_on: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    needs: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    env: IndexMap<String, String>,
    steps: Vec<Step>,
}

#[derive(Debug, Serialize)]
struct Step {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    uses: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    run: Option<String>,
    #[serde(rename = "working-directory", skip_serializing_if = "Option::is_none")]
    working_directory: Option<String>,
}

impl Step {
    fn checkout() -> Self {
        Self {
            name: None,
            uses: Some("actions/checkout@v4".to_string()),
            run: None,
            working_directory: None,
        }
    }

    fn run(name: &str, command: &str, dir: Option<&str>) -> Self {
        Self {
            name: Some(name.to_string()),
            uses: None,
            run: Some(command.to_string()),
            working_directory: dir.map(String::from),
        }
    }
}

/// Generate a GitHub Actions workflow from a denormalized graph: one job
/// per top-level stage with `needs` derived from the reverse adjacency.
pub fn generate(graph: &ExecutionGraph) -> Result<String> {
    let mut jobs = IndexMap::new();

    for stage in graph.children_of(ROOT_NODE_NAME) {
        let job = Job {
            name: display_name(graph.name(), &stage.name).to_string(),
            runs_on: "ubuntu-latest".to_string(),
            needs: stage
                .depends_on
                .iter()
                .map(|dep| job_id(graph.name(), dep))
                .collect(),
            env: stage.env.map(),
            steps: job_steps(&stage),
        };

        let mut value = serde_yaml::to_value(&job)?;
        apply_generator_metadata(&stage, &mut value);
        jobs.insert(job_id(graph.name(), &stage.name), value);
    }

    let workflow = Workflow {
        name: graph.name().to_string(),
        on: WorkflowOn {
            push: PushTrigger {
                branches: vec!["main".to_string()],
            },
        },
        jobs,
    };

    Ok(serde_yaml::to_string(&workflow)?)
}

/// Steps of one job: the stage's own task commands, or every leaf task of
/// its nested pipeline in dependency order.
fn job_steps(stage: &Stage) -> Vec<Step> {
    let mut steps = vec![Step::checkout()];

    match (&stage.task, &stage.pipeline) {
        (Some(task), _) => {
            for command in &task.commands {
                steps.push(Step::run(&task.name, command, task.dir.as_deref()));
            }
        }
        (None, Some(pipeline)) => {
            for leaf in pipeline.bfs_flattened(ROOT_NODE_NAME) {
                collect_leaf_steps(&leaf, &mut steps);
            }
        }
        (None, None) => {}
    }

    steps
}

fn collect_leaf_steps(stage: &Stage, steps: &mut Vec<Step>) {
    if let Some(task) = &stage.task {
        for command in &task.commands {
            steps.push(Step::run(&task.name, command, task.dir.as_deref()));
        }
    }
    if let Some(pipeline) = &stage.pipeline {
        for nested in pipeline.bfs_flattened(ROOT_NODE_NAME) {
            collect_leaf_steps(&nested, steps);
        }
    }
}

/// Merge opaque `generator` metadata into the serialized job, letting the
/// configuration override keys like `runs-on`.
fn apply_generator_metadata(stage: &Stage, job: &mut serde_yaml::Value) {
    let Some(metadata) = &stage.generator else { return };
    let Some(overrides) = metadata.get("github").and_then(|v| v.as_object()) else {
        return;
    };
    let Some(mapping) = job.as_mapping_mut() else { return };

    for (key, value) in overrides {
        if let Ok(yaml_value) = serde_yaml::to_value(value) {
            mapping.insert(serde_yaml::Value::String(key.clone()), yaml_value);
        }
    }
}

fn display_name<'a>(graph_name: &str, stage_name: &'a str) -> &'a str {
    stage_name
        .strip_prefix(&format!("{graph_name}->"))
        .unwrap_or(stage_name)
}

/// GitHub job ids allow only alphanumerics, `-` and `_`.
fn job_id(graph_name: &str, stage_name: &str) -> String {
    display_name(graph_name, stage_name)
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;
    use crate::variables::Variables;
    use std::sync::Arc;

    fn graph() -> ExecutionGraph {
        let mut build = Stage::from_task(Arc::new(Task::from_commands(
            "build",
            ["cargo build"],
        )));
        build.env = Variables::from_map([("PROFILE", "release")]);

        let mut test = Stage::from_task(Arc::new(Task::from_commands("test", ["cargo test"])));
        test.depends_on = vec!["build".to_string()];

        ExecutionGraph::with_stages("ci", vec![build, test]).unwrap()
    }

    #[test]
    fn emits_one_job_per_stage_with_needs_and_env() {
        let yaml = generate(&graph().denormalize().unwrap()).unwrap();

        assert!(yaml.contains("name: ci"));
        assert!(yaml.contains("build:"));
        assert!(yaml.contains("test:"));
        assert!(yaml.contains("- build"));
        assert!(yaml.contains("PROFILE: release"));
        assert!(yaml.contains("cargo test"));
        assert!(yaml.contains("actions/checkout@v4"));
    }

    #[test]
    fn generator_metadata_overrides_job_keys() {
        let mut stage = Stage::from_task(Arc::new(Task::from_commands("lint", ["cargo clippy"])));
        stage.generator = Some(serde_json::json!({
            "github": { "runs-on": "macos-latest" }
        }));
        let graph = ExecutionGraph::with_stages("ci", vec![stage]).unwrap();

        let yaml = generate(&graph.denormalize().unwrap()).unwrap();
        assert!(yaml.contains("runs-on: macos-latest"));
    }
}
