// src/output/raw.rs

use crate::output::{OutputDecorator, SharedWriter, StreamKind};
use crate::task::Task;

/// Pass-through decorator: lines go to the terminal untouched.
pub struct RawDecorator {
    stdout: SharedWriter,
    stderr: SharedWriter,
}

impl RawDecorator {
    pub fn new(stdout: SharedWriter, stderr: SharedWriter) -> Self {
        Self { stdout, stderr }
    }
}

impl OutputDecorator for RawDecorator {
    fn write_header(&self, _task: &Task) {}

    fn write_line(&self, _task: &Task, stream: StreamKind, line: &str) {
        match stream {
            StreamKind::Stdout => self.stdout.write_line(line),
            StreamKind::Stderr => self.stderr.write_line(line),
        }
    }

    fn write_footer(&self, _task: &Task) {
        self.stdout.write_raw("\n");
    }

    fn close(&self) {
        self.stdout.flush();
        self.stderr.flush();
    }
}
