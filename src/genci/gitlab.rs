// src/genci/gitlab.rs

//! GitLab CI pipeline emission.

use indexmap::IndexMap;
use serde::Serialize;

use crate::errors::Result;
use crate::scheduler::graph::ROOT_NODE_NAME;
use crate::scheduler::{ExecutionGraph, Stage};

#[derive(Debug, Serialize)]
struct GitlabJob {
    script: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    needs: Vec<String>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    variables: IndexMap<String, String>,
}

/// Generate a GitLab CI definition: one job per top-level stage, `needs`
/// from the dependency edges, per-job `variables` from the flattened env.
pub fn generate(graph: &ExecutionGraph) -> Result<String> {
    let mut jobs: IndexMap<String, GitlabJob> = IndexMap::new();

    for stage in graph.children_of(ROOT_NODE_NAME) {
        let job = GitlabJob {
            script: collect_script(&stage),
            needs: stage
                .depends_on
                .iter()
                .map(|dep| display_name(graph.name(), dep).to_string())
                .collect(),
            variables: stage.env.map(),
        };
        jobs.insert(display_name(graph.name(), &stage.name).to_string(), job);
    }

    Ok(serde_yaml::to_string(&jobs)?)
}

fn collect_script(stage: &Stage) -> Vec<String> {
    let mut script = Vec::new();
    if let Some(task) = &stage.task {
        script.extend(task.commands.iter().cloned());
    }
    if let Some(pipeline) = &stage.pipeline {
        for nested in pipeline.bfs_flattened(ROOT_NODE_NAME) {
            script.extend(collect_script(&nested));
        }
    }
    script
}

fn display_name<'a>(graph_name: &str, stage_name: &'a str) -> &'a str {
    stage_name
        .strip_prefix(&format!("{graph_name}->"))
        .unwrap_or(stage_name)
}
