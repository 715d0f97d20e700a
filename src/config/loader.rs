// src/config/loader.rs

//! Configuration discovery, parsing and import resolution.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::errors::{Result, TaskctlError};

/// File names probed, in order, when no explicit `-c` path is given.
pub const DEFAULT_CONFIG_NAMES: [&str; 4] =
    ["taskctl.yaml", "taskctl.yml", "taskctl.toml", "taskctl.json"];

/// Resolve the config path: an explicit path wins, otherwise the default
/// names are probed in the current directory.
pub fn discover(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        return Err(TaskctlError::Config(format!(
            "config file {} does not exist",
            path.display()
        )));
    }

    for name in DEFAULT_CONFIG_NAMES {
        let candidate = PathBuf::from(name);
        if candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(TaskctlError::Config(
        "no config file found; create taskctl.yaml or pass one with -c".into(),
    ))
}

/// Load a config file, resolving `import` entries recursively.
///
/// Definitions from the importing file win over imported ones on name
/// collisions. Import cycles are detected and rejected.
pub fn load(path: &Path) -> Result<ConfigFile> {
    let mut visited = HashSet::new();
    load_inner(path, &mut visited)
}

fn load_inner(path: &Path, visited: &mut HashSet<PathBuf>) -> Result<ConfigFile> {
    let canonical = path
        .canonicalize()
        .map_err(|err| TaskctlError::Config(format!("{}: {err}", path.display())))?;
    if !visited.insert(canonical.clone()) {
        return Err(TaskctlError::Config(format!(
            "import cycle detected at {}",
            path.display()
        )));
    }

    debug!(path = %path.display(), "loading config file");
    let own = parse_file(path)?;

    let mut merged = ConfigFile::default();
    let base_dir = path.parent().unwrap_or(Path::new("."));
    for import in &own.import {
        let import_path = base_dir.join(import);
        let imported = load_inner(&import_path, visited)?;
        merge_into(&mut merged, imported);
    }
    merge_into(&mut merged, own);

    Ok(merged)
}

fn parse_file(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default();

    match extension {
        "yaml" | "yml" => Ok(serde_yaml::from_str(&contents)?),
        "toml" => Ok(toml::from_str(&contents)?),
        "json" => Ok(serde_json::from_str(&contents)?),
        other => Err(TaskctlError::Config(format!(
            "unsupported config format: {other:?} ({})",
            path.display()
        ))),
    }
}

/// Overlay `src` onto `dst`; `src` wins on name collisions.
fn merge_into(dst: &mut ConfigFile, src: ConfigFile) {
    dst.contexts.extend(src.contexts);
    dst.tasks.extend(src.tasks);
    dst.pipelines.extend(src.pipelines);
    dst.watchers.extend(src.watchers);
    dst.variables.extend(src.variables);
    if src.output.is_some() {
        dst.output = src.output;
    }
    dst.debug |= src.debug;
    dst.summary |= src.summary;
}
