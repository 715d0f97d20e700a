// src/scheduler/graph.rs

//! The execution graph: a DAG of stages keyed by name, with forward and
//! reverse adjacency and cycle detection on every edge insertion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};

use crate::errors::{Result, TaskctlError};
use crate::scheduler::stage::{Stage, StageStatus};

/// Name of the synthetic root every graph hangs off.
pub const ROOT_NODE_NAME: &str = "root";

/// A DAG whose nodes are stages and whose edges are their dependencies.
///
/// The structure is mutable only while the graph is being built (or
/// rebuilt by the denormalizer); once scheduling begins, the only mutable
/// state is per-stage status and the graph-level error/timing cells.
#[derive(Debug)]
pub struct ExecutionGraph {
    name: String,
    nodes: IndexMap<String, Arc<Stage>>,
    /// Forward adjacency: dependency name -> dependent names.
    children: HashMap<String, Vec<String>>,
    /// Reverse adjacency: dependent name -> dependency names.
    parents: HashMap<String, Vec<String>>,

    errors: Mutex<Vec<(String, String)>>,
    start: Mutex<Option<Instant>>,
    end: Mutex<Option<Instant>>,
}

impl ExecutionGraph {
    /// Create an empty graph containing only the synthetic (already done)
    /// root node.
    pub fn new(name: impl Into<String>) -> Self {
        let root = Arc::new(Stage::new(ROOT_NODE_NAME));
        root.set_status(StageStatus::Done);

        let mut nodes = IndexMap::new();
        nodes.insert(ROOT_NODE_NAME.to_string(), root);

        Self {
            name: name.into(),
            nodes,
            children: HashMap::new(),
            parents: HashMap::new(),
            errors: Mutex::new(Vec::new()),
            start: Mutex::new(None),
            end: Mutex::new(None),
        }
    }

    /// Build a graph from a list of stages, failing on duplicate names or
    /// cycles.
    pub fn with_stages(name: impl Into<String>, stages: Vec<Stage>) -> Result<Self> {
        let mut graph = Self::new(name);
        for stage in stages {
            graph.add_stage(stage)?;
        }
        Ok(graph)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add a stage and its dependency edges.
    ///
    /// Stages without dependencies are attached to the root. An edge that
    /// would close a cycle is rejected with
    /// [`TaskctlError::CycleDetected`]; every node added so far remains
    /// reachable via [`ExecutionGraph::node`].
    pub fn add_stage(&mut self, stage: Stage) -> Result<()> {
        if stage.name.is_empty() {
            return Err(TaskctlError::Config(
                "stage must have a name".to_string(),
            ));
        }
        if stage.name != ROOT_NODE_NAME && self.nodes.contains_key(&stage.name) {
            return Err(TaskctlError::Config(format!(
                "stage with same name {} already exists",
                stage.name
            )));
        }

        let name = stage.name.clone();
        let depends_on = stage.depends_on.clone();
        self.nodes.insert(name.clone(), Arc::new(stage));

        if depends_on.is_empty() {
            return self.add_edge(ROOT_NODE_NAME, &name);
        }
        for dep in &depends_on {
            self.add_edge(dep, &name)?;
        }
        Ok(())
    }

    fn add_edge(&mut self, parent: &str, child: &str) -> Result<()> {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push(child.to_string());
        self.parents
            .entry(child.to_string())
            .or_default()
            .push(parent.to_string());

        self.cycle_dfs(parent, &mut HashSet::new(), &mut HashSet::new())
    }

    /// DFS from `node` looking for a back-edge.
    fn cycle_dfs(
        &self,
        node: &str,
        visited: &mut HashSet<String>,
        in_stack: &mut HashSet<String>,
    ) -> Result<()> {
        visited.insert(node.to_string());
        in_stack.insert(node.to_string());

        if let Some(children) = self.children.get(node) {
            for child in children {
                if !visited.contains(child) {
                    self.cycle_dfs(child, visited, in_stack)?;
                }
                if in_stack.contains(child) {
                    return Err(TaskctlError::CycleDetected {
                        pipeline: self.name.clone(),
                        parent: node.to_string(),
                        child: child.clone(),
                    });
                }
            }
        }

        in_stack.remove(node);
        Ok(())
    }

    /// All stages, including the synthetic root.
    pub fn nodes(&self) -> impl Iterator<Item = &Arc<Stage>> {
        self.nodes.values()
    }

    /// All stages except the root, in insertion order.
    pub fn stages(&self) -> impl Iterator<Item = &Arc<Stage>> {
        self.nodes
            .values()
            .filter(|s| s.name != ROOT_NODE_NAME)
    }

    pub fn node(&self, name: &str) -> Result<Arc<Stage>> {
        self.nodes
            .get(name)
            .cloned()
            .ok_or_else(|| TaskctlError::StageNotFound(name.to_string()))
    }

    /// Stages the given stage depends on.
    pub fn parents_of(&self, name: &str) -> Vec<Arc<Stage>> {
        self.adjacent(&self.parents, name)
    }

    /// Stages depending on the given stage.
    pub fn children_of(&self, name: &str) -> Vec<Arc<Stage>> {
        self.adjacent(&self.children, name)
    }

    fn adjacent(&self, table: &HashMap<String, Vec<String>>, name: &str) -> Vec<Arc<Stage>> {
        table
            .get(name)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| self.nodes.get(n).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Breadth-first flattening from `from`, excluding the root.
    ///
    /// Stages that run in parallel on the same level appear before the
    /// level below them, which is the order the summary wants.
    pub fn bfs_flattened(&self, from: &str) -> Vec<Arc<Stage>> {
        let mut out = Vec::new();
        let mut queue = VecDeque::from([from.to_string()]);
        let mut visited = HashSet::from([from.to_string()]);

        while let Some(current) = queue.pop_front() {
            if current != ROOT_NODE_NAME {
                if let Some(stage) = self.nodes.get(&current) {
                    out.push(stage.clone());
                }
            }
            if let Some(children) = self.children.get(&current) {
                for child in children {
                    if visited.insert(child.clone()) {
                        queue.push_back(child.clone());
                    }
                }
            }
        }
        out
    }

    // --- run state -------------------------------------------------------

    pub fn record_error(&self, stage: &str, message: impl Into<String>) {
        self.errors.lock().push((stage.to_string(), message.into()));
    }

    /// Message of the latest stage error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.errors.lock().last().map(|(_, msg)| msg.clone())
    }

    /// All stage errors joined into one message.
    pub fn error_summary(&self) -> Option<String> {
        let errors = self.errors.lock();
        if errors.is_empty() {
            return None;
        }
        Some(
            errors
                .iter()
                .map(|(stage, err)| format!("stage: {stage}\nerror: {err}"))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }

    pub fn set_started(&self) {
        *self.start.lock() = Some(Instant::now());
    }

    pub fn set_finished(&self) {
        *self.end.lock() = Some(Instant::now());
    }

    pub fn start(&self) -> Option<Instant> {
        *self.start.lock()
    }

    pub fn end(&self) -> Option<Instant> {
        *self.end.lock()
    }

    pub fn duration(&self) -> Duration {
        match (self.start(), self.end()) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// GraphViz DOT rendering of the dependency edges.
    pub fn dot(&self) -> String {
        let mut out = format!("digraph \"{}\" {{\n", self.name);
        for stage in self.stages() {
            if stage.depends_on.is_empty() {
                out.push_str(&format!("  \"{}\";\n", stage.name));
            }
            for dep in &stage.depends_on {
                out.push_str(&format!("  \"{dep}\" -> \"{}\";\n", stage.name));
            }
        }
        out.push_str("}\n");
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(name: &str, deps: &[&str]) -> Stage {
        let mut s = Stage::new(name);
        s.depends_on = deps.iter().map(|d| d.to_string()).collect();
        s
    }

    #[test]
    fn stages_without_deps_hang_off_the_root() {
        let graph = ExecutionGraph::with_stages("p", vec![stage("a", &[])]).unwrap();
        let parents = graph.parents_of("a");
        assert_eq!(parents.len(), 1);
        assert_eq!(parents[0].name, ROOT_NODE_NAME);
        assert_eq!(parents[0].status(), StageStatus::Done);
    }

    #[test]
    fn adjacency_is_tracked_both_ways() {
        let graph =
            ExecutionGraph::with_stages("p", vec![stage("a", &[]), stage("b", &["a"])]).unwrap();

        let children: Vec<_> = graph.children_of("a").iter().map(|s| s.name.clone()).collect();
        assert_eq!(children, vec!["b"]);
        let parents: Vec<_> = graph.parents_of("b").iter().map(|s| s.name.clone()).collect();
        assert_eq!(parents, vec!["a"]);
    }

    #[test]
    fn cycle_is_rejected_on_edge_insertion() {
        let err = ExecutionGraph::with_stages(
            "p",
            vec![stage("a", &["b"]), stage("b", &["a"])],
        )
        .unwrap_err();
        assert!(matches!(err, TaskctlError::CycleDetected { .. }));
    }

    #[test]
    fn nodes_remain_reachable_after_a_rejected_edge() {
        let mut graph = ExecutionGraph::new("p");
        graph.add_stage(stage("a", &["b"])).unwrap();
        let err = graph.add_stage(stage("b", &["a"])).unwrap_err();
        assert!(matches!(err, TaskctlError::CycleDetected { .. }));

        assert!(graph.node("a").is_ok());
        assert!(graph.node("b").is_ok());
    }

    #[test]
    fn duplicate_stage_names_are_rejected() {
        let err = ExecutionGraph::with_stages("p", vec![stage("a", &[]), stage("a", &[])])
            .unwrap_err();
        assert!(matches!(err, TaskctlError::Config(_)));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let err = ExecutionGraph::with_stages("p", vec![stage("a", &["a"])]).unwrap_err();
        assert!(matches!(err, TaskctlError::CycleDetected { .. }));
    }

    #[test]
    fn bfs_flattening_visits_levels_in_order() {
        let graph = ExecutionGraph::with_stages(
            "p",
            vec![
                stage("a", &[]),
                stage("b", &[]),
                stage("c", &["a", "b"]),
                stage("d", &["c"]),
            ],
        )
        .unwrap();

        let order: Vec<_> = graph
            .bfs_flattened(ROOT_NODE_NAME)
            .iter()
            .map(|s| s.name.clone())
            .collect();
        assert_eq!(order, vec!["a", "b", "c", "d"]);
    }

    #[test]
    fn last_error_returns_the_latest_recorded() {
        let graph = ExecutionGraph::new("p");
        assert!(graph.last_error().is_none());
        graph.record_error("a", "first");
        graph.record_error("b", "second");
        assert_eq!(graph.last_error().unwrap(), "second");
        assert!(graph.error_summary().unwrap().contains("stage: a"));
    }
}
