// src/commands/init.rs

//! `taskctl init` — write a starter config into the current directory.

use std::path::Path;

use tracing::info;

use crate::errors::{Result, TaskctlError};

const STARTER_CONFIG: &str = r#"# taskctl configuration
tasks:
  hello:
    command: echo "hello from taskctl"
    description: Example task

  lint:
    command:
      - echo "linting..."
    description: Example lint step

pipelines:
  default:
    - task: lint
    - task: hello
      depends_on: lint

watchers:
  sources:
    watch:
      - "src/**/*"
    events: [create, write]
    task: hello
"#;

pub fn run() -> Result<i32> {
    let path = Path::new("taskctl.yaml");
    if path.exists() {
        return Err(TaskctlError::Config(
            "taskctl.yaml already exists in this directory".into(),
        ));
    }

    std::fs::write(path, STARTER_CONFIG)?;
    info!("created taskctl.yaml");
    Ok(0)
}
