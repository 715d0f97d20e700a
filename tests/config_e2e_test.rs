//! Config-to-execution round trips: load a file, build the engine objects
//! and run them.

use std::sync::Arc;

use taskctl::config;
use taskctl::genci::{self, CiTarget};
use taskctl::output::{OutputFactory, OutputFormat, SafeWriter};
use taskctl::runner::TaskRunner;
use taskctl::scheduler::{Scheduler, StageStatus};
use taskctl_test_utils::{init_tracing, with_timeout};

fn runner_for(built: &config::BuiltConfig) -> Arc<TaskRunner> {
    let factory = OutputFactory::new(
        OutputFormat::Raw,
        Arc::new(SafeWriter::new(Box::new(std::io::sink()))),
        Arc::new(SafeWriter::new(Box::new(std::io::sink()))),
    );
    Arc::new(
        TaskRunner::new(factory)
            .with_contexts(built.contexts.clone())
            .with_variables(built.variables.clone()),
    )
}

#[tokio::test]
async fn yaml_pipeline_runs_end_to_end() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskctl.yaml");
    std::fs::write(
        &path,
        r#"
tasks:
  greet:
    command: echo "hello, {{ .Who }}"
    variables:
      Who: "{{ default \"world\" .Name }}"
  shout:
    command: echo "LOUD"

pipelines:
  p:
    - task: greet
    - task: shout
      depends_on: greet
"#,
    )
    .unwrap();

    let cfg = config::load(&path).unwrap();
    let built = config::build(&cfg).unwrap();
    let runner = runner_for(&built);
    let scheduler = Scheduler::new(runner.clone());

    let graph = built.pipelines.get("p").unwrap();
    with_timeout(scheduler.schedule(graph)).await.unwrap();

    let greet = graph.node("greet").unwrap();
    assert_eq!(greet.status(), StageStatus::Done);
    assert_eq!(greet.task.as_ref().unwrap().output(), "hello, world\n");
    assert_eq!(graph.node("shout").unwrap().status(), StageStatus::Done);

    scheduler.finish().await;
}

#[tokio::test]
async fn stage_env_from_config_reaches_the_command() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskctl.yaml");
    std::fs::write(
        &path,
        r#"
tasks:
  show:
    command: echo "env is $STAGE_ENV"

pipelines:
  p:
    - task: show
      env:
        STAGE_ENV: from-stage
"#,
    )
    .unwrap();

    let built = config::build(&config::load(&path).unwrap()).unwrap();
    let runner = runner_for(&built);
    let scheduler = Scheduler::new(runner.clone());

    let graph = built.pipelines.get("p").unwrap();
    with_timeout(scheduler.schedule(graph)).await.unwrap();

    let show = graph.node("show").unwrap();
    assert_eq!(show.task.as_ref().unwrap().output(), "env is from-stage\n");
}

#[test]
fn generate_github_ci_from_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskctl.yaml");
    std::fs::write(
        &path,
        r#"
tasks:
  build:
    command: make build
  test:
    command: make test

pipelines:
  ci:
    - task: build
    - task: test
      depends_on: build
      env:
        RUST_BACKTRACE: "1"
"#,
    )
    .unwrap();

    let built = config::build(&config::load(&path).unwrap()).unwrap();
    let graph = built.pipelines.get("ci").unwrap();
    let yaml = genci::generate(CiTarget::Github, graph).unwrap();

    assert!(yaml.contains("make build"));
    assert!(yaml.contains("RUST_BACKTRACE"));
    assert!(yaml.contains("needs:"));
}

#[test]
fn graph_dot_contains_edges() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskctl.yaml");
    std::fs::write(
        &path,
        r#"
tasks:
  a:
    command: echo a
  b:
    command: echo b

pipelines:
  p:
    - task: a
    - task: b
      depends_on: a
"#,
    )
    .unwrap();

    let built = config::build(&config::load(&path).unwrap()).unwrap();
    let dot = built.pipelines.get("p").unwrap().dot();

    assert!(dot.contains("digraph \"p\""));
    assert!(dot.contains("\"a\" -> \"b\";"));
}
