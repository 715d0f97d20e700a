// src/output/prefixed.rs

use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::output::{OutputDecorator, SharedWriter, StreamKind};
use crate::task::Task;

const ANSI_PATTERN: &str = "[\u{1b}\u{9b}][\\[\\]()#;?]*(?:(?:(?:[a-zA-Z\\d]*(?:;[a-zA-Z\\d]*)*)?\u{7})|(?:(?:\\d{1,4}(?:;\\d{0,4})*)?[\\dA-PRZcf-ntqry=><~]))";

fn ansi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ANSI_PATTERN).expect("ANSI pattern is valid"))
}

/// Prefixes every line with the cyan task name so interleaved concurrent
/// output stays attributable. ANSI escapes from the command itself are
/// stripped first.
pub struct PrefixedDecorator {
    stdout: SharedWriter,
    stderr: SharedWriter,
}

impl PrefixedDecorator {
    pub fn new(stdout: SharedWriter, stderr: SharedWriter) -> Self {
        Self { stdout, stderr }
    }

    fn prefixed(task: &Task, line: &str) -> String {
        let clean = ansi_regex().replace_all(line, "");
        format!("\x1b[36m{}\x1b[0m: {}", task.name, clean)
    }
}

impl OutputDecorator for PrefixedDecorator {
    fn write_header(&self, task: &Task) {
        info!("Running task {}...", task.name);
    }

    fn write_line(&self, task: &Task, stream: StreamKind, line: &str) {
        let decorated = Self::prefixed(task, line);
        match stream {
            StreamKind::Stdout => self.stdout.write_line(&decorated),
            StreamKind::Stderr => self.stderr.write_line(&decorated),
        }
    }

    fn write_footer(&self, task: &Task) {
        info!("{} finished. Duration {:?}", task.name, task.duration());
    }

    fn close(&self) {
        self.stdout.flush();
        self.stderr.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_ansi_sequences_and_prefixes_with_task_name() {
        let task = Task::new("build");
        let line = PrefixedDecorator::prefixed(&task, "\x1b[31mred text\x1b[0m");
        assert_eq!(line, "\x1b[36mbuild\x1b[0m: red text");
    }
}
