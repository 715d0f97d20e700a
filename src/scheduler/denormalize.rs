// src/scheduler/denormalize.rs

//! Graph denormalization: clone a graph so every stage reachable through
//! nested pipelines becomes a uniquely-named stage carrying the env/vars
//! union of its ancestor chain.
//!
//! Used by the CI generator, which needs flat per-stage environments; the
//! scheduler runs the original graph.

use std::sync::Arc;

use indexmap::IndexMap;

use crate::errors::Result;
use crate::scheduler::graph::ExecutionGraph;
use crate::scheduler::stage::Stage;
use crate::utils::{self, PIPELINE_DIRECTION_CHAR};
use crate::variables::Variables;

impl ExecutionGraph {
    /// Produce a new graph with the same shape in which every reachable
    /// stage appears once under a `->`-cascaded unique name, with fresh
    /// run state and an independent task copy.
    pub fn denormalize(&self) -> Result<ExecutionGraph> {
        let mut table: IndexMap<String, Stage> = IndexMap::new();
        self.flatten_into(&[self.name().to_string()], &mut table);

        fold_ancestor_environments(&mut table);

        let mut out = ExecutionGraph::new(self.name());
        rebuild(&mut out, &mut table)?;
        Ok(out)
    }

    /// DFS clone of every stage into `table`, keyed by cascaded name.
    fn flatten_into(&self, ancestors: &[String], table: &mut IndexMap<String, Stage>) {
        for stage in self.stages() {
            // Pipeline-of-single-pipeline wrappers collapse into the inner
            // pipeline; the clone keeps the wrapper's name and adopts the
            // inner stage's env/vars on top of its own.
            let env = stage.env.clone();
            let vars = stage.variables.clone();
            let mut effective: Arc<Stage> = stage.clone();
            loop {
                let inner = match &effective.pipeline {
                    Some(sub) => {
                        let real: Vec<Arc<Stage>> = sub.stages().cloned().collect();
                        match real.as_slice() {
                            [only] if only.pipeline.is_some() => Some(only.clone()),
                            _ => None,
                        }
                    }
                    None => None,
                };
                match inner {
                    Some(inner) => {
                        env.merge_in_place(&inner.env);
                        vars.merge_in_place(&inner.variables);
                        effective = inner;
                    }
                    None => break,
                }
            }

            let unique = utils::cascade_name(ancestors, &stage.name);
            let mut clone = stage.clone_for_denormalize(&unique, ancestors);
            clone.pipeline = effective.pipeline.clone();
            clone.env = env;
            clone.variables = vars;

            let sub = clone.pipeline.clone();
            table.insert(unique, clone);

            if let Some(sub) = sub {
                let mut next = ancestors.to_vec();
                next.push(stage.name.clone());
                sub.flatten_into(&next, table);
            }
        }
    }
}

/// For every leaf (task) stage, overlay the env/vars of its ancestor chain:
/// outermost ancestor first, the stage's own layer next, the task's own env
/// last, so descendants overwrite ancestors on conflict.
fn fold_ancestor_environments(table: &mut IndexMap<String, Stage>) {
    let folded: Vec<(String, Variables, Variables)> = table
        .iter()
        .filter(|(_, stage)| stage.pipeline.is_none())
        .map(|(name, stage)| {
            let env = Variables::new();
            let vars = Variables::new();
            for ancestor in recurse_parents(table, name) {
                env.merge_in_place(&ancestor.env);
                vars.merge_in_place(&ancestor.variables);
            }
            env.merge_in_place(&stage.env);
            vars.merge_in_place(&stage.variables);
            if let Some(task) = &stage.task {
                env.merge_in_place(&task.env);
            }
            (name.clone(), env, vars)
        })
        .collect();

    for (name, env, vars) in folded {
        if let Some(stage) = table.get_mut(&name) {
            stage.env = env;
            stage.variables = vars;
        }
    }
}

/// Rebuild a graph level by level, consuming the flat table.
fn rebuild(graph: &mut ExecutionGraph, table: &mut IndexMap<String, Stage>) -> Result<()> {
    for name in nth_level_children(table, graph.name(), 1) {
        let Some(mut stage) = table.shift_remove(&name) else {
            continue;
        };

        if stage.pipeline.is_some() {
            let mut sub = ExecutionGraph::new(stage.name.clone());
            rebuild(&mut sub, table)?;
            stage.pipeline = Some(Arc::new(sub));
        }

        graph.add_stage(stage)?;
    }
    Ok(())
}

/// Keys in `table` exactly `depth` path segments below `prefix`.
fn nth_level_children(table: &IndexMap<String, Stage>, prefix: &str, depth: usize) -> Vec<String> {
    let prefix_parts: Vec<&str> = prefix.split(PIPELINE_DIRECTION_CHAR).collect();
    table
        .keys()
        .filter(|key| {
            let parts: Vec<&str> = key.split(PIPELINE_DIRECTION_CHAR).collect();
            parts.len() == prefix_parts.len() + depth && parts[..prefix_parts.len()] == prefix_parts[..]
        })
        .cloned()
        .collect()
}

/// Ancestor stages of `name`, outermost first.
fn recurse_parents<'a>(table: &'a IndexMap<String, Stage>, name: &str) -> Vec<&'a Stage> {
    let parts: Vec<&str> = name.split(PIPELINE_DIRECTION_CHAR).collect();
    let mut ancestors = Vec::new();
    for i in 1..parts.len() {
        let key = parts[..parts.len() - i].join(PIPELINE_DIRECTION_CHAR);
        if let Some(stage) = table.get(&key) {
            ancestors.push(stage);
        }
    }
    ancestors.reverse();
    ancestors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Task;

    fn task_stage(name: &str, deps: &[&str], env: &[(&str, &str)]) -> Stage {
        let mut stage = Stage::from_task(Arc::new(Task::from_commands(name, ["echo hi"])));
        stage.name = name.to_string();
        stage.depends_on = deps.iter().map(|d| d.to_string()).collect();
        stage.env = Variables::from_map(env.to_vec());
        stage
    }

    fn pipeline_stage(name: &str, graph: ExecutionGraph, env: &[(&str, &str)]) -> Stage {
        let mut stage = Stage::new(name);
        stage.pipeline = Some(Arc::new(graph));
        stage.env = Variables::from_map(env.to_vec());
        stage
    }

    #[test]
    fn flattens_nested_pipelines_under_cascaded_names() {
        let inner = ExecutionGraph::with_stages(
            "inner",
            vec![
                task_stage("one", &[], &[]),
                task_stage("two", &["one"], &[]),
            ],
        )
        .unwrap();

        let outer = ExecutionGraph::with_stages(
            "outer",
            vec![pipeline_stage("sub", inner, &[])],
        )
        .unwrap();

        let denormalized = outer.denormalize().unwrap();

        let sub = denormalized.node("outer->sub").unwrap();
        let nested = sub.pipeline.as_ref().unwrap();
        assert!(nested.node("outer->sub->one").is_ok());
        let two = nested.node("outer->sub->two").unwrap();
        assert_eq!(two.depends_on, vec!["outer->sub->one"]);
    }

    #[test]
    fn leaf_env_is_the_union_of_the_ancestor_chain() {
        let mut leaf = task_stage("task-p2:1", &[], &[]);
        if let Some(task) = leaf.task.take() {
            let fresh = task.clone_fresh();
            fresh.env.set("GLOBAL_VAR", "overwrittenInTask");
            leaf.task = Some(Arc::new(fresh));
        }

        let inner = ExecutionGraph::with_stages(
            "inner",
            vec![leaf, task_stage("task-p2:2", &["task-p2:1"], &[])],
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
        let prod = denormalized.node("O->prod").unwrap();
        let leaf = prod
            .pipeline
            .as_ref()
            .unwrap()
            .node("O->prod->task-p2:1")
            .unwrap();

        assert_eq!(leaf.env.get("ENV_NAME"), "prod");
        assert_eq!(leaf.env.get("GLOBAL_VAR"), "overwrittenInTask");
    }

    #[test]
    fn denormalized_tasks_are_independent_copies() {
        let inner = ExecutionGraph::with_stages("inner", vec![task_stage("leaf", &[], &[])])
            .unwrap();
        let outer =
            ExecutionGraph::with_stages("outer", vec![pipeline_stage("sub", inner, &[])])
                .unwrap();

        let original_index = outer
            .node("sub")
            .unwrap()
            .pipeline
            .as_ref()
            .unwrap()
            .node("leaf")
            .unwrap()
            .task
            .as_ref()
            .unwrap()
            .index;

        let denormalized = outer.denormalize().unwrap();
        let cloned_index = denormalized
            .node("outer->sub")
            .unwrap()
            .pipeline
            .as_ref()
            .unwrap()
            .node("outer->sub->leaf")
            .unwrap()
            .task
            .as_ref()
            .unwrap()
            .index;

        assert_ne!(original_index, cloned_index);
    }

    #[test]
    fn pipeline_of_single_pipeline_is_hoisted() {
        let innermost = ExecutionGraph::with_stages(
            "innermost",
            vec![task_stage("leaf", &[], &[])],
        )
        .unwrap();

        let wrapper_inner = ExecutionGraph::with_stages(
            "wrapper-inner",
            vec![pipeline_stage("hop", innermost, &[("INNER", "1")])],
        )
        .unwrap();

        let outer = ExecutionGraph::with_stages(
            "outer",
            vec![pipeline_stage("wrapped", wrapper_inner, &[("OUTER", "1")])],
        )
        .unwrap();

        let denormalized = outer.denormalize().unwrap();

        // The wrapper collapses: `wrapped` directly owns the innermost
        // pipeline's stages, and carries both env layers.
        let wrapped = denormalized.node("outer->wrapped").unwrap();
        assert_eq!(wrapped.env.get("OUTER"), "1");
        assert_eq!(wrapped.env.get("INNER"), "1");

        let leaf = wrapped
            .pipeline
            .as_ref()
            .unwrap()
            .node("outer->wrapped->leaf")
            .unwrap();
        assert_eq!(leaf.env.get("OUTER"), "1");
        assert_eq!(leaf.env.get("INNER"), "1");
    }
}
