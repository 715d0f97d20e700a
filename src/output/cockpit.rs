// src/output/cockpit.rs

//! Cockpit output: a single spinner line naming the tasks currently in
//! flight, plus a one-line summary as each task finishes.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossterm::cursor::MoveToColumn;
use crossterm::terminal::{Clear, ClearType};
use crossterm::QueueableCommand;
use parking_lot::Mutex;
use tokio::task::JoinHandle;

use crate::output::{OutputDecorator, SharedWriter, StreamKind};
use crate::task::Task;

const FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];
const REDRAW_INTERVAL: Duration = Duration::from_millis(100);

fn clear_line(mut w: impl Write) -> std::io::Result<()> {
    w.queue(MoveToColumn(0))?;
    w.queue(Clear(ClearType::CurrentLine))?;
    Ok(())
}

/// Spinner state shared by every cockpit decorator of a run.
///
/// The spinner task is restarted under the lock on every add/remove so the
/// live set never renders stale names.
pub struct CockpitState {
    writer: SharedWriter,
    active: Mutex<Vec<String>>,
    spinner: Mutex<Option<JoinHandle<()>>>,
    frame: AtomicUsize,
}

impl CockpitState {
    pub fn new(writer: SharedWriter) -> Arc<Self> {
        Arc::new(Self {
            writer,
            active: Mutex::new(Vec::new()),
            spinner: Mutex::new(None),
            frame: AtomicUsize::new(0),
        })
    }

    fn add(self: &Arc<Self>, name: &str) {
        self.active.lock().push(name.to_string());
        self.restart();
    }

    fn remove(self: &Arc<Self>, task: &Task) {
        self.active.lock().retain(|n| n != &task.name);
        let summary = format!("Finished {} in {:?}\n", task.name, task.duration());
        self.writer.with_writer(|w| {
            clear_line(&mut *w)?;
            w.write_all(summary.as_bytes())
        });
        self.restart();
    }

    fn restart(self: &Arc<Self>) {
        let mut spinner = self.spinner.lock();
        if let Some(handle) = spinner.take() {
            handle.abort();
        }

        if self.active.lock().is_empty() {
            self.writer.with_writer(|w| clear_line(w));
            return;
        }

        let state = self.clone();
        *spinner = Some(tokio::spawn(async move {
            loop {
                state.redraw();
                tokio::time::sleep(REDRAW_INTERVAL).await;
            }
        }));
    }

    fn redraw(&self) {
        let names = self.active.lock().join(", ");
        if names.is_empty() {
            return;
        }
        let frame = FRAMES[self.frame.fetch_add(1, Ordering::Relaxed) % FRAMES.len()];
        let line = format!("{frame} Running: {names}");
        self.writer.with_writer(|w| {
            clear_line(&mut *w)?;
            w.write_all(line.as_bytes())
        });
    }

    /// Stop the spinner and clear its line.
    pub fn close(&self) {
        if let Some(handle) = self.spinner.lock().take() {
            handle.abort();
        }
        self.writer.with_writer(|w| clear_line(w));
    }
}

/// Per-task view over the shared [`CockpitState`].
pub struct CockpitDecorator {
    state: Arc<CockpitState>,
}

impl CockpitDecorator {
    pub fn new(state: Arc<CockpitState>) -> Self {
        Self { state }
    }
}

impl OutputDecorator for CockpitDecorator {
    fn write_header(&self, task: &Task) {
        self.state.add(&task.name);
    }

    fn write_line(&self, _task: &Task, _stream: StreamKind, _line: &str) {
        // Command output stays in the task log buffers; the cockpit surface
        // only shows the live set and the per-task finish line.
    }

    fn write_footer(&self, task: &Task) {
        self.state.remove(task);
    }

    fn close(&self) {}
}
