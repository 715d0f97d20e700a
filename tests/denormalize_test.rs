//! Denormalization: flattened naming, ancestor env inheritance, and
//! leaf-set preservation.

use std::sync::Arc;

use taskctl::scheduler::{ExecutionGraph, Stage, ROOT_NODE_NAME};
use taskctl::task::Task;
use taskctl::variables::Variables;
use taskctl_test_utils::builders::TaskBuilder;

fn task_stage(name: &str, deps: &[&str]) -> Stage {
    let mut stage = Stage::from_task(TaskBuilder::new(name).command("echo x").build());
    stage.depends_on = deps.iter().map(|d| d.to_string()).collect();
    stage
}

fn pipeline_stage(name: &str, graph: ExecutionGraph, env: &[(&str, &str)]) -> Stage {
    let mut stage = Stage::new(name);
    stage.pipeline = Some(Arc::new(graph));
    stage.env = Variables::from_map(env.to_vec());
    stage
}

/// Leaf task names reachable through nested pipelines.
fn leaf_names(graph: &ExecutionGraph) -> Vec<String> {
    let mut names = Vec::new();
    collect_leaves(graph, &mut names);
    names.sort();
    names
}

fn collect_leaves(graph: &ExecutionGraph, out: &mut Vec<String>) {
    for stage in graph.bfs_flattened(ROOT_NODE_NAME) {
        if let Some(task) = &stage.task {
            out.push(task.name.clone());
        }
        if let Some(pipeline) = &stage.pipeline {
            collect_leaves(pipeline, out);
        }
    }
}

#[test]
fn nested_stage_env_overrides_follow_the_ancestor_chain() {
    // Inner pipeline: two tasks, the first carrying its own env override.
    let leaf_task = TaskBuilder::new("task-p2:1")
        .command("echo one")
        .env("GLOBAL_VAR", "overwrittenInTask")
        .build();
    let mut leaf = Stage::from_task(leaf_task);
    leaf.name = "task-p2:1".to_string();

    let inner = ExecutionGraph::with_stages(
        "I",
        vec![leaf, task_stage("task-p2:2", &["task-p2:1"])],
    )
    .unwrap();

    let outer = ExecutionGraph::with_stages(
        "O",
        vec![pipeline_stage(
            "prod",
            inner,
            &[("ENV_NAME", "prod"), ("GLOBAL_VAR", "prodPipeline")],
        )],
    )
    .unwrap();

    let denormalized = outer.denormalize().unwrap();

    let flattened = denormalized
        .node("O->prod")
        .unwrap()
        .pipeline
        .as_ref()
        .unwrap()
        .node("O->prod->task-p2:1")
        .unwrap();

    assert_eq!(flattened.env.get("ENV_NAME"), "prod");
    assert_eq!(flattened.env.get("GLOBAL_VAR"), "overwrittenInTask");

    let sibling = denormalized
        .node("O->prod")
        .unwrap()
        .pipeline
        .as_ref()
        .unwrap()
        .node("O->prod->task-p2:2")
        .unwrap();
    assert_eq!(sibling.env.get("GLOBAL_VAR"), "prodPipeline");
}

#[test]
fn denormalization_preserves_the_leaf_task_multiset() {
    let inner_a = ExecutionGraph::with_stages(
        "inner-a",
        vec![task_stage("one", &[]), task_stage("two", &["one"])],
    )
    .unwrap();
    let inner_b =
        ExecutionGraph::with_stages("inner-b", vec![task_stage("one", &[])]).unwrap();

    let outer = ExecutionGraph::with_stages(
        "outer",
        vec![
            pipeline_stage("first", inner_a, &[]),
            pipeline_stage("second", inner_b, &[]),
            task_stage("top", &[]),
        ],
    )
    .unwrap();

    let denormalized = outer.denormalize().unwrap();

    assert_eq!(leaf_names(&outer), leaf_names(&denormalized));
    assert_eq!(leaf_names(&denormalized), vec!["one", "one", "top", "two"]);
}

#[test]
fn denormalized_stages_share_nothing_with_the_original() {
    let inner =
        ExecutionGraph::with_stages("inner", vec![task_stage("leaf", &[])]).unwrap();
    let outer = ExecutionGraph::with_stages(
        "outer",
        vec![pipeline_stage("sub", inner, &[("KEY", "original")])],
    )
    .unwrap();

    let denormalized = outer.denormalize().unwrap();

    // Mutating the clone's env must not leak back.
    let clone_stage = denormalized.node("outer->sub").unwrap();
    clone_stage.env.set("KEY", "mutated");

    let original_stage = outer.node("sub").unwrap();
    assert_eq!(original_stage.env.get("KEY"), "original");
}

#[test]
fn depends_on_is_rewritten_to_cascaded_names() {
    let inner = ExecutionGraph::with_stages(
        "inner",
        vec![task_stage("build", &[]), task_stage("test", &["build"])],
    )
    .unwrap();
    let outer =
        ExecutionGraph::with_stages("ci", vec![pipeline_stage("all", inner, &[])]).unwrap();

    let denormalized = outer.denormalize().unwrap();
    let nested = denormalized.node("ci->all").unwrap();
    let test_stage = nested
        .pipeline
        .as_ref()
        .unwrap()
        .node("ci->all->test")
        .unwrap();

    assert_eq!(test_stage.depends_on, vec!["ci->all->build"]);
}

#[test]
fn task_stage_at_top_level_keeps_its_task() {
    let graph = ExecutionGraph::with_stages("p", vec![task_stage("solo", &[])]).unwrap();
    let denormalized = graph.denormalize().unwrap();

    let stage = denormalized.node("p->solo").unwrap();
    let task: &Arc<Task> = stage.task.as_ref().unwrap();
    assert_eq!(task.name, "solo");
    assert_eq!(task.commands, vec!["echo x"]);
}
