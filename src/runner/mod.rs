// src/runner/mod.rs

//! Task execution: the runner, the task-to-job compiler and the execution
//! contexts commands are spawned in.

pub mod compiler;
pub mod container;
pub mod context;
pub mod envfile;
pub mod remote;
#[allow(clippy::module_inception)]
pub mod runner;

pub use compiler::TaskCompiler;
pub use container::{ContainerConfig, ContainerProvider};
pub use context::{Binary, ContextKind, ExecutionContext, ExecutionContextBuilder};
pub use envfile::{EnvfileConfig, ModifyEnvRule, ModifyOperation};
pub use remote::SshConfig;
pub use runner::TaskRunner;
