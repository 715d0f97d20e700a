// src/watch/patterns.rs

//! Glob matching for watcher definitions.

use std::path::Path;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{Result, TaskctlError};

/// Compiled include/exclude globs for one watcher.
#[derive(Debug)]
pub struct WatchPatterns {
    include: GlobSet,
    exclude: GlobSet,
}

impl WatchPatterns {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    /// Whether `path` is watched: it must match an include pattern and no
    /// exclude pattern.
    pub fn matches(&self, path: &Path) -> bool {
        self.include.is_match(path) && !self.exclude.is_match(path)
    }
}

fn compile(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|err| {
            TaskctlError::Config(format!("invalid watch pattern {pattern:?}: {err}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|err| TaskctlError::Config(format!("invalid watch patterns: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn include_and_exclude_combine() {
        let patterns = WatchPatterns::new(
            &["src/**/*.rs".to_string()],
            &["src/**/generated_*.rs".to_string()],
        )
        .unwrap();

        assert!(patterns.matches(Path::new("src/lib.rs")));
        assert!(patterns.matches(Path::new("src/nested/mod.rs")));
        assert!(!patterns.matches(Path::new("src/generated_schema.rs")));
        assert!(!patterns.matches(Path::new("docs/readme.md")));
    }

    #[test]
    fn invalid_patterns_are_config_errors() {
        let err = WatchPatterns::new(&["{broken".to_string()], &[]).unwrap_err();
        assert!(matches!(err, TaskctlError::Config(_)));
    }
}
