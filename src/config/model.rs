// src/config/model.rs

//! Raw configuration structures as deserialized from YAML/TOML/JSON.
//!
//! All sections are optional with defaults, and everything command-shaped
//! accepts either a single string or a list.

use indexmap::IndexMap;
use serde::Deserialize;

/// Top-level configuration file.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Additional config files merged into this one (relative paths are
    /// resolved against the importing file).
    #[serde(default)]
    pub import: Vec<String>,

    #[serde(default)]
    pub contexts: IndexMap<String, ContextDefinition>,

    #[serde(default)]
    pub tasks: IndexMap<String, TaskDefinition>,

    #[serde(default)]
    pub pipelines: IndexMap<String, Vec<StageDefinition>>,

    #[serde(default)]
    pub watchers: IndexMap<String, WatcherDefinition>,

    /// Default output format: `raw`, `prefixed` or `cockpit`.
    #[serde(default)]
    pub output: Option<String>,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub summary: bool,

    /// Root variables, available to every task template.
    #[serde(default)]
    pub variables: IndexMap<String, String>,
}

/// One or many strings; commands and globs accept both shapes.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StringOrList {
    One(String),
    Many(Vec<String>),
}

impl StringOrList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StringOrList::One(s) => vec![s],
            StringOrList::Many(v) => v,
        }
    }
}

impl Default for StringOrList {
    fn default() -> Self {
        StringOrList::Many(Vec::new())
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ExecutableDefinition {
    pub bin: String,
    #[serde(default)]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ContextDefinition {
    #[serde(default)]
    pub executable: Option<ExecutableDefinition>,

    #[serde(default)]
    pub container: Option<ContainerDefinition>,

    #[serde(default)]
    pub ssh: Option<SshDefinition>,

    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default)]
    pub env: IndexMap<String, String>,

    #[serde(default)]
    pub envfile: Option<EnvfileDefinition>,

    #[serde(default)]
    pub quote: Option<String>,

    #[serde(default)]
    pub up: Option<StringOrList>,
    #[serde(default)]
    pub down: Option<StringOrList>,
    #[serde(default)]
    pub before: Option<StringOrList>,
    #[serde(default)]
    pub after: Option<StringOrList>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerDefinition {
    /// `docker`, `podman`, `docker-compose` or `kubectl`.
    pub provider: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub image: Option<String>,

    /// `exec` into a running container instead of `run --rm`.
    #[serde(default)]
    pub exec: bool,

    #[serde(default)]
    pub options: Vec<String>,

    #[serde(default)]
    pub env: IndexMap<String, String>,

    /// Override for the runtime binary.
    #[serde(default)]
    pub bin: Option<String>,

    /// Shell run inside the container; defaults to `sh -c`.
    #[serde(default)]
    pub shell: Option<String>,

    #[serde(default)]
    pub shell_args: Vec<String>,

    #[serde(default)]
    pub entrypoint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshDefinition {
    pub host: String,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub bin: Option<String>,

    #[serde(default)]
    pub options: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct EnvfileDefinition {
    #[serde(default)]
    pub generate: bool,

    #[serde(default)]
    pub exclude: Vec<String>,

    #[serde(default)]
    pub include: Vec<String>,

    #[serde(default)]
    pub modify: Vec<ModifyDefinition>,

    #[serde(default)]
    pub quote: bool,

    #[serde(default)]
    pub generated_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModifyDefinition {
    pub pattern: String,
    /// `upper` or `lower`.
    pub operation: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct TaskDefinition {
    #[serde(default)]
    pub command: StringOrList,

    #[serde(default)]
    pub context: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub env: IndexMap<String, String>,

    #[serde(default, alias = "vars")]
    pub variables: IndexMap<String, String>,

    /// Env overlays; the command list runs once per entry.
    #[serde(default)]
    pub variations: Vec<IndexMap<String, String>>,

    #[serde(default)]
    pub dir: Option<String>,

    /// Timeout such as `30s`, `500ms` or `2m`.
    #[serde(default)]
    pub timeout: Option<String>,

    #[serde(default)]
    pub allow_failure: bool,

    #[serde(default)]
    pub before: Option<StringOrList>,

    #[serde(default)]
    pub after: Option<StringOrList>,

    #[serde(default)]
    pub interactive: bool,

    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub export_as: Option<String>,

    #[serde(default)]
    pub artifacts: Option<ArtifactDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ArtifactDefinition {
    #[serde(default)]
    pub name: Option<String>,

    pub path: String,

    /// `file` or `dotenv`.
    #[serde(default)]
    pub r#type: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct StageDefinition {
    /// Stage name; defaults to the task or pipeline name.
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub task: Option<String>,

    #[serde(default)]
    pub pipeline: Option<String>,

    #[serde(default)]
    pub depends_on: Option<StringOrList>,

    #[serde(default)]
    pub condition: Option<String>,

    #[serde(default)]
    pub env: IndexMap<String, String>,

    #[serde(default, alias = "vars")]
    pub variables: IndexMap<String, String>,

    #[serde(default)]
    pub dir: Option<String>,

    #[serde(default)]
    pub allow_failure: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct WatcherDefinition {
    #[serde(default)]
    pub watch: StringOrList,

    #[serde(default)]
    pub exclude: Option<StringOrList>,

    /// Event names: `create`, `write`, `remove`, `rename`, `chmod`.
    #[serde(default)]
    pub events: Vec<String>,

    pub task: String,
}
