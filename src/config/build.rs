// src/config/build.rs

//! Turns raw config definitions into engine objects: contexts, tasks,
//! pipelines and the root variables container.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{
    ConfigFile, ContextDefinition, StageDefinition, TaskDefinition, WatcherDefinition,
};
use crate::errors::{Result, TaskctlError};
use crate::output::OutputFormat;
use crate::runner::{
    Binary, ContainerConfig, ContainerProvider, ContextKind, EnvfileConfig, ExecutionContext,
    ModifyEnvRule, ModifyOperation, SshConfig,
};
use crate::scheduler::{ExecutionGraph, Stage};
use crate::task::{Artifact, ArtifactKind, Task};
use crate::variables::Variables;

/// Fully-built, validated configuration.
#[derive(Debug)]
pub struct BuiltConfig {
    pub contexts: HashMap<String, Arc<ExecutionContext>>,
    pub tasks: IndexMap<String, Arc<Task>>,
    pub pipelines: IndexMap<String, Arc<ExecutionGraph>>,
    pub watchers: IndexMap<String, WatcherDefinition>,
    pub output: OutputFormat,
    pub debug: bool,
    pub summary: bool,
    /// Root variables: `Root`, `TempDir`, plus the config's own.
    pub variables: Variables,
}

/// Build and validate every definition in `cfg`.
pub fn build(cfg: &ConfigFile) -> Result<BuiltConfig> {
    let mut contexts = HashMap::new();
    for (name, def) in &cfg.contexts {
        contexts.insert(name.clone(), Arc::new(build_context(name, def)?));
    }

    let mut tasks = IndexMap::new();
    for (name, def) in &cfg.tasks {
        if let Some(context) = &def.context {
            if !contexts.contains_key(context) {
                return Err(TaskctlError::Config(format!(
                    "task {name} references unknown context {context}"
                )));
            }
        }
        tasks.insert(name.clone(), Arc::new(build_task(name, def)?));
    }

    let mut pipelines = IndexMap::new();
    let mut visiting = Vec::new();
    for name in cfg.pipelines.keys() {
        build_pipeline(name, cfg, &tasks, &mut pipelines, &mut visiting)?;
    }

    for (name, watcher) in &cfg.watchers {
        if !tasks.contains_key(&watcher.task) {
            return Err(TaskctlError::Config(format!(
                "watcher {name} references unknown task {}",
                watcher.task
            )));
        }
    }

    let output = match &cfg.output {
        Some(format) => format.parse()?,
        None => OutputFormat::default(),
    };

    let variables = root_variables(cfg);

    Ok(BuiltConfig {
        contexts,
        tasks,
        pipelines,
        watchers: cfg.watchers.clone(),
        output,
        debug: cfg.debug,
        summary: cfg.summary,
        variables,
    })
}

fn root_variables(cfg: &ConfigFile) -> Variables {
    let variables = Variables::from_map(cfg.variables.clone());
    if !variables.has("Root") {
        if let Ok(cwd) = std::env::current_dir() {
            variables.set("Root", cwd.to_string_lossy().to_string());
        }
    }
    if !variables.has("TempDir") {
        variables.set("TempDir", std::env::temp_dir().to_string_lossy().to_string());
    }
    variables
}

fn build_context(name: &str, def: &ContextDefinition) -> Result<ExecutionContext> {
    if def.container.is_some() && def.ssh.is_some() {
        return Err(TaskctlError::Config(format!(
            "context {name} cannot be both container and ssh"
        )));
    }

    let kind = if let Some(container) = &def.container {
        let provider = ContainerProvider::parse(&container.provider).ok_or_else(|| {
            TaskctlError::Config(format!(
                "context {name} has unknown container provider {}",
                container.provider
            ))
        })?;
        if container.name.is_none() && container.image.is_none() {
            return Err(TaskctlError::Config(format!(
                "context {name} must set a container name or image"
            )));
        }

        let mut cfg = ContainerConfig::new(provider);
        cfg.name = container.name.clone();
        cfg.image = container.image.clone();
        cfg.exec = container.exec;
        cfg.options = container.options.clone();
        cfg.env = container.env.clone();
        cfg.bin = container.bin.clone();
        cfg.entrypoint = container.entrypoint.clone();
        cfg.shell = container
            .shell
            .as_ref()
            .map(|shell| Binary::new(shell.clone(), container.shell_args.clone()));
        ContextKind::Container(cfg)
    } else if let Some(ssh) = &def.ssh {
        ContextKind::Remote(SshConfig {
            user: ssh.user.clone(),
            host: ssh.host.clone(),
            bin: ssh.bin.clone(),
            options: ssh.options.clone(),
        })
    } else {
        ContextKind::Local
    };

    // The context env overlays the process environment; user values win.
    let env = Variables::from_os_env().merge(&Variables::from_map(def.env.clone()));

    let mut builder = ExecutionContext::builder(name).kind(kind).env(env);

    if let Some(executable) = &def.executable {
        builder = builder.executable(Binary::new(
            executable.bin.clone(),
            executable.args.clone(),
        ));
    }
    if let Some(dir) = &def.dir {
        builder = builder.dir(dir.clone());
    }
    if let Some(quote) = &def.quote {
        builder = builder.quote(quote.clone());
    }
    if let Some(envfile) = &def.envfile {
        let mut cfg = EnvfileConfig {
            generate: envfile.generate,
            exclude: envfile.exclude.clone(),
            include: envfile.include.clone(),
            quote: envfile.quote,
            ..EnvfileConfig::default()
        };
        if let Some(dir) = &envfile.generated_dir {
            cfg.generated_dir = dir.into();
        }
        for modify in &envfile.modify {
            let operation = ModifyOperation::parse(&modify.operation).ok_or_else(|| {
                TaskctlError::Config(format!(
                    "envfile modify operation must be upper or lower, got {}",
                    modify.operation
                ))
            })?;
            cfg.modify.push(ModifyEnvRule {
                pattern: modify.pattern.clone(),
                operation,
            });
        }
        builder = builder.envfile(cfg);
    }

    builder = builder
        .up(def.up.clone().map(|c| c.into_vec()).unwrap_or_default())
        .down(def.down.clone().map(|c| c.into_vec()).unwrap_or_default())
        .before(def.before.clone().map(|c| c.into_vec()).unwrap_or_default())
        .after(def.after.clone().map(|c| c.into_vec()).unwrap_or_default());

    builder.build()
}

fn build_task(name: &str, def: &TaskDefinition) -> Result<Task> {
    let mut task = Task::from_commands(name, def.command.clone().into_vec());
    task.context = def.context.clone().unwrap_or_default();
    task.description = def.description.clone().unwrap_or_default();
    task.env = Variables::from_map(def.env.clone());
    task.variables = Variables::from_map(def.variables.clone());
    task.variations = def.variations.clone();
    task.dir = def.dir.clone();
    task.allow_failure = def.allow_failure;
    task.before = def.before.clone().map(|c| c.into_vec()).unwrap_or_default();
    task.after = def.after.clone().map(|c| c.into_vec()).unwrap_or_default();
    task.interactive = def.interactive;
    task.condition = def.condition.clone();
    task.export_as = def.export_as.clone();

    if let Some(timeout) = &def.timeout {
        task.timeout = Some(parse_duration(timeout)?);
    }

    if let Some(artifact) = &def.artifacts {
        let kind = match artifact.r#type.as_deref() {
            None | Some("file") => ArtifactKind::File,
            Some("dotenv") => ArtifactKind::Dotenv,
            Some(other) => {
                return Err(TaskctlError::Config(format!(
                    "task {name} has unknown artifact type {other}"
                )))
            }
        };
        task.artifacts = Some(Artifact {
            name: artifact.name.clone().unwrap_or_default(),
            path: artifact.path.clone(),
            kind,
        });
    }

    Ok(task)
}

fn build_pipeline(
    name: &str,
    cfg: &ConfigFile,
    tasks: &IndexMap<String, Arc<Task>>,
    built: &mut IndexMap<String, Arc<ExecutionGraph>>,
    visiting: &mut Vec<String>,
) -> Result<Arc<ExecutionGraph>> {
    if let Some(graph) = built.get(name) {
        return Ok(graph.clone());
    }
    if visiting.iter().any(|n| n == name) {
        return Err(TaskctlError::Config(format!(
            "pipeline {name} references itself through {}",
            visiting.join(" -> ")
        )));
    }

    let defs = cfg
        .pipelines
        .get(name)
        .ok_or_else(|| TaskctlError::Config(format!("unknown pipeline {name}")))?;

    validate_stage_dag(name, defs)?;

    visiting.push(name.to_string());
    let mut stages = Vec::new();
    for def in defs {
        stages.push(build_stage(def, cfg, tasks, built, visiting)?);
    }
    visiting.pop();

    let graph = Arc::new(ExecutionGraph::with_stages(name, stages)?);
    built.insert(name.to_string(), graph.clone());
    Ok(graph)
}

/// Config-time DAG sanity for one pipeline definition: every `depends_on`
/// must name another stage of the same pipeline, and the edges must be
/// acyclic (a topological sort fails on a cycle).
///
/// The graph re-checks cycles on every edge insertion; this pass exists to
/// reject broken definitions with a config error before anything is built.
fn validate_stage_dag(pipeline: &str, defs: &[StageDefinition]) -> Result<()> {
    let names: Vec<String> = defs.iter().map(stage_name).collect();

    let mut graph: DiGraphMap<usize, ()> = DiGraphMap::new();
    for index in 0..names.len() {
        graph.add_node(index);
    }

    for (index, def) in defs.iter().enumerate() {
        let deps = def.depends_on.clone().map(|d| d.into_vec()).unwrap_or_default();
        for dep in deps {
            let Some(dep_index) = names.iter().position(|n| *n == dep) else {
                return Err(TaskctlError::Config(format!(
                    "pipeline {pipeline}: stage {} depends on unknown stage {dep}",
                    names[index]
                )));
            };
            graph.add_edge(dep_index, index, ());
        }
    }

    if let Err(cycle) = toposort(&graph, None) {
        return Err(TaskctlError::Config(format!(
            "pipeline {pipeline}: dependency cycle involving stage {}",
            names[cycle.node_id()]
        )));
    }
    Ok(())
}

fn stage_name(def: &StageDefinition) -> String {
    def.name
        .clone()
        .or_else(|| def.task.clone())
        .or_else(|| def.pipeline.clone())
        .unwrap_or_default()
}

fn build_stage(
    def: &StageDefinition,
    cfg: &ConfigFile,
    tasks: &IndexMap<String, Arc<Task>>,
    built: &mut IndexMap<String, Arc<ExecutionGraph>>,
    visiting: &mut Vec<String>,
) -> Result<Stage> {
    match (&def.task, &def.pipeline) {
        (Some(_), Some(_)) | (None, None) => {
            return Err(TaskctlError::Config(
                "stage must reference exactly one of task or pipeline".into(),
            ))
        }
        _ => {}
    }

    let mut stage = Stage::new(stage_name(def));

    if let Some(task_name) = &def.task {
        stage.task = Some(
            tasks
                .get(task_name)
                .cloned()
                .ok_or_else(|| TaskctlError::Config(format!("unknown task {task_name}")))?,
        );
    }
    if let Some(pipeline_name) = &def.pipeline {
        stage.pipeline = Some(build_pipeline(pipeline_name, cfg, tasks, built, visiting)?);
    }

    stage.depends_on = def
        .depends_on
        .clone()
        .map(|d| d.into_vec())
        .unwrap_or_default();
    stage.condition = def.condition.clone();
    stage.env = Variables::from_map(def.env.clone());
    stage.variables = Variables::from_map(def.variables.clone());
    stage.dir = def.dir.clone();
    stage.allow_failure = def.allow_failure;

    Ok(stage)
}

/// Parse durations like `30s`, `500ms`, `2m`, `1h` or a bare number of
/// seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    let parse = |value: &str, scale_ms: u64| -> Result<Duration> {
        value
            .parse::<f64>()
            .map(|v| Duration::from_millis((v * scale_ms as f64) as u64))
            .map_err(|_| TaskctlError::Config(format!("invalid duration: {s}")))
    };

    if let Some(value) = s.strip_suffix("ms") {
        parse(value, 1)
    } else if let Some(value) = s.strip_suffix('s') {
        parse(value, 1_000)
    } else if let Some(value) = s.strip_suffix('m') {
        parse(value, 60_000)
    } else if let Some(value) = s.strip_suffix('h') {
        parse(value, 3_600_000)
    } else {
        parse(s, 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_yaml(yaml: &str) -> ConfigFile {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn builds_tasks_and_pipelines() {
        let cfg = parse_yaml(
            r#"
tasks:
  build:
    command: echo build
  test:
    command: [echo unit, echo integration]
pipelines:
  ci:
    - task: build
    - task: test
      depends_on: build
"#,
        );
        let built = build(&cfg).unwrap();

        assert_eq!(built.tasks["test"].commands.len(), 2);
        let ci = &built.pipelines["ci"];
        let test = ci.node("test").unwrap();
        assert_eq!(test.depends_on, vec!["build"]);
    }

    #[test]
    fn nested_pipeline_references_resolve_in_any_order() {
        let cfg = parse_yaml(
            r#"
tasks:
  t:
    command: echo t
pipelines:
  outer:
    - pipeline: inner
  inner:
    - task: t
"#,
        );
        let built = build(&cfg).unwrap();
        let outer = &built.pipelines["outer"];
        assert!(outer.node("inner").unwrap().pipeline.is_some());
    }

    #[test]
    fn stage_requires_task_xor_pipeline() {
        let cfg = parse_yaml(
            r#"
tasks:
  t:
    command: echo t
pipelines:
  broken:
    - name: s1
"#,
        );
        assert!(build(&cfg).is_err());
    }

    #[test]
    fn unknown_task_reference_fails() {
        let cfg = parse_yaml(
            r#"
pipelines:
  p:
    - task: missing
"#,
        );
        assert!(build(&cfg).is_err());
    }

    #[test]
    fn self_referencing_pipeline_fails() {
        let cfg = parse_yaml(
            r#"
pipelines:
  p:
    - pipeline: p
"#,
        );
        assert!(build(&cfg).is_err());
    }

    #[test]
    fn cyclic_stage_dependencies_fail() {
        let cfg = parse_yaml(
            r#"
tasks:
  a:
    command: echo a
  b:
    command: echo b
pipelines:
  p:
    - task: a
      depends_on: b
    - task: b
      depends_on: a
"#,
        );
        let err = build(&cfg).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }

    #[test]
    fn root_variables_include_root_and_tempdir() {
        let built = build(&ConfigFile::default()).unwrap();
        assert!(built.variables.has("Root"));
        assert!(built.variables.has("TempDir"));
    }

    #[test]
    fn durations_parse_with_units() {
        assert_eq!(parse_duration("30s").unwrap(), Duration::from_secs(30));
        assert_eq!(parse_duration("500ms").unwrap(), Duration::from_millis(500));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("10").unwrap(), Duration::from_secs(10));
        assert!(parse_duration("nope").is_err());
    }

    #[test]
    fn container_context_builds() {
        let cfg = parse_yaml(
            r#"
contexts:
  dock:
    container:
      provider: docker
      image: alpine:latest
tasks:
  t:
    command: echo hi
    context: dock
"#,
        );
        let built = build(&cfg).unwrap();
        let ctx = &built.contexts["dock"];
        let line = ctx.command_line("echo hi", None);
        assert!(line.starts_with("docker run --rm alpine:latest sh -c"));
    }

    #[test]
    fn unknown_context_reference_fails() {
        let cfg = parse_yaml(
            r#"
tasks:
  t:
    command: echo hi
    context: nope
"#,
        );
        assert!(build(&cfg).is_err());
    }
}
