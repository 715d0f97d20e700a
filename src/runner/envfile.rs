// src/runner/envfile.rs

//! Generation of the per-task envfile consumed by container runtimes.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::errors::{Result, TaskctlError};
use crate::utils;

/// Default directory for generated envfiles, relative to the working dir.
pub const GENERATED_DIR: &str = ".taskctl";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModifyOperation {
    Upper,
    Lower,
}

impl ModifyOperation {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upper" => Some(ModifyOperation::Upper),
            "lower" => Some(ModifyOperation::Lower),
            _ => None,
        }
    }
}

/// Key rewrite rule: a regex with named captures `keyword` and `varname`;
/// matching keys are rebuilt as `keyword + op(varname)`.
#[derive(Debug, Clone)]
pub struct ModifyEnvRule {
    pub pattern: String,
    pub operation: ModifyOperation,
}

impl ModifyEnvRule {
    fn compile(&self) -> Result<Regex> {
        Regex::new(&self.pattern)
            .map_err(|err| TaskctlError::Config(format!("invalid modify pattern: {err}")))
    }

    pub fn validate(&self) -> Result<()> {
        if !self.pattern.contains("keyword") || !self.pattern.contains("varname") {
            return Err(TaskctlError::Config(format!(
                "modify pattern {:?} must define 'keyword' and 'varname' capture groups",
                self.pattern
            )));
        }
        self.compile().map(|_| ())
    }

    fn apply(&self, key: &str) -> Option<String> {
        let re = self.compile().ok()?;
        let caps = re.captures(key)?;
        let keyword = caps.name("keyword")?.as_str();
        let varname = caps.name("varname")?.as_str();
        let varname = match self.operation {
            ModifyOperation::Upper => varname.to_uppercase(),
            ModifyOperation::Lower => varname.to_lowercase(),
        };
        Some(format!("{keyword}{varname}"))
    }
}

/// Envfile configuration attached to a context.
#[derive(Debug, Clone)]
pub struct EnvfileConfig {
    pub generate: bool,
    /// Case-insensitive name prefixes to drop.
    pub exclude: Vec<String>,
    /// Case-insensitive name prefixes to keep; when non-empty, only
    /// matching keys survive.
    pub include: Vec<String>,
    pub modify: Vec<ModifyEnvRule>,
    pub quote: bool,
    pub generated_dir: PathBuf,
}

impl Default for EnvfileConfig {
    fn default() -> Self {
        Self {
            generate: false,
            exclude: Vec::new(),
            include: Vec::new(),
            modify: Vec::new(),
            quote: false,
            generated_dir: PathBuf::from(GENERATED_DIR),
        }
    }
}

impl EnvfileConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.exclude.is_empty() && !self.include.is_empty() {
            return Err(TaskctlError::Config(
                "envfile include and exclude lists are mutually exclusive".into(),
            ));
        }
        for rule in &self.modify {
            rule.validate()?;
        }
        Ok(())
    }

    /// Deterministic per-task path: task name (filesystem-encoded) plus a
    /// nanosecond timestamp, under the generated dir.
    pub fn generated_path(&self, task_name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        self.generated_dir.join(format!(
            "generated_{}_{nanos}.env",
            utils::encode_filesystem_safe(task_name)
        ))
    }

    /// Write the filtered `KEY=VALUE` lines derived from `env` to `path`.
    pub fn write(&self, path: &Path, env: &IndexMap<String, String>) -> Result<()> {
        let mut lines = Vec::with_capacity(env.len());

        for (name, value) in env {
            let Some(name) = self.filter_key(name) else {
                continue;
            };
            // Multiline values would break the `KEY=VALUE` line format.
            let value = value.replace(['\n', '\r'], " ");
            let line = if self.quote {
                format!("{name}=\"{value}\"")
            } else {
                format!("{name}={value}")
            };
            debug!(envfile_line = %line, "envfile entry");
            lines.push(line);
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, lines.join("\n"))?;
        Ok(())
    }

    fn filter_key(&self, name: &str) -> Option<String> {
        if !is_valid_env_key(name) {
            warn!(key = %name, "skipping invalid env var key");
            return None;
        }

        let lowered = name.to_lowercase();
        if !self.include.is_empty() {
            if !self
                .include
                .iter()
                .any(|i| lowered.starts_with(&i.to_lowercase()))
            {
                return None;
            }
        } else if self
            .exclude
            .iter()
            .any(|e| lowered.starts_with(&e.to_lowercase()))
        {
            return None;
        }

        let mut name = name.to_string();
        for rule in &self.modify {
            if let Some(rewritten) = rule.apply(&name) {
                name = rewritten;
                break;
            }
        }
        Some(name)
    }
}

fn is_valid_env_key(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn read_lines(path: &Path) -> Vec<String> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(String::from)
            .collect()
    }

    #[test]
    fn drops_invalid_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.env");
        EnvfileConfig::default()
            .write(&path, &env(&[("GOOD", "1"), ("", "x"), ("1BAD", "y"), ("A-B", "z")]))
            .unwrap();
        assert_eq!(read_lines(&path), vec!["GOOD=1"]);
    }

    #[test]
    fn include_keeps_only_matching_keys_case_insensitively() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.env");
        let cfg = EnvfileConfig {
            include: vec!["tf_".into()],
            ..EnvfileConfig::default()
        };
        cfg.write(&path, &env(&[("TF_VAR_x", "1"), ("HOME", "/root")]))
            .unwrap();
        assert_eq!(read_lines(&path), vec!["TF_VAR_x=1"]);
    }

    #[test]
    fn exclude_drops_matching_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.env");
        let cfg = EnvfileConfig {
            exclude: vec!["home".into()],
            ..EnvfileConfig::default()
        };
        cfg.write(&path, &env(&[("HOME", "/root"), ("HOMELAB", "x"), ("USER", "u")]))
            .unwrap();
        assert_eq!(read_lines(&path), vec!["USER=u"]);
    }

    #[test]
    fn modify_rewrites_the_varname_portion() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.env");
        let cfg = EnvfileConfig {
            modify: vec![ModifyEnvRule {
                pattern: "^(?P<keyword>TF_VAR_)(?P<varname>.*)".into(),
                operation: ModifyOperation::Lower,
            }],
            ..EnvfileConfig::default()
        };
        cfg.write(&path, &env(&[("TF_VAR_Region", "eu"), ("OTHER", "1")]))
            .unwrap();
        assert_eq!(read_lines(&path), vec!["TF_VAR_region=eu", "OTHER=1"]);
    }

    #[test]
    fn quotes_values_and_flattens_newlines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.env");
        let cfg = EnvfileConfig {
            quote: true,
            ..EnvfileConfig::default()
        };
        cfg.write(&path, &env(&[("KEY", "line1\nline2")])).unwrap();
        assert_eq!(read_lines(&path), vec!["KEY=\"line1 line2\""]);
    }

    #[test]
    fn include_and_exclude_are_mutually_exclusive() {
        let cfg = EnvfileConfig {
            include: vec!["a".into()],
            exclude: vec!["b".into()],
            ..EnvfileConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn modify_rule_requires_named_groups() {
        let rule = ModifyEnvRule {
            pattern: "^(TF_VAR_)(.*)".into(),
            operation: ModifyOperation::Upper,
        };
        assert!(rule.validate().is_err());
    }

    #[test]
    fn generated_path_encodes_the_task_name() {
        let cfg = EnvfileConfig::default();
        let path = cfg.generated_path("deploy:prod stage");
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with("generated_deploy__e__prod__f__stage_"));
        assert!(name.ends_with(".env"));
        assert!(path.starts_with(GENERATED_DIR));
    }
}
