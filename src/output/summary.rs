// src/output/summary.rs

//! The end-of-run summary block: one color-coded line per stage with its
//! duration, plus the graph total.

use crate::output::SharedWriter;
use crate::scheduler::{ExecutionGraph, StageStatus, ROOT_NODE_NAME};

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const GREY: &str = "\x1b[90m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

/// Print the per-stage summary for a finished graph.
pub fn print_summary(graph: &ExecutionGraph, out: &SharedWriter) {
    out.write_line(&format!("{BOLD}Summary:{RESET}"));

    for stage in graph.bfs_flattened(ROOT_NODE_NAME) {
        let name = strip_root_prefix(graph.name(), &stage.name);
        match stage.status() {
            StageStatus::Done => out.write_line(&format!(
                "{GREEN}- Stage {name} was completed in {:?}{RESET}",
                stage.duration()
            )),
            StageStatus::Skipped => {
                out.write_line(&format!("{GREEN}- Stage {name} was skipped{RESET}"))
            }
            StageStatus::Error => {
                out.write_line(&format!(
                    "{RED}- Stage {name} failed in {:?}{RESET}",
                    stage.duration()
                ));
                let last_line = stage
                    .task
                    .as_ref()
                    .map(|t| t.error_message())
                    .unwrap_or_default();
                if !last_line.trim().is_empty() {
                    out.write_line(&format!("{RED}  > {}{RESET}", last_line.trim()));
                }
            }
            StageStatus::Cancelled => {
                out.write_line(&format!("{GREY}- Stage {name} was cancelled{RESET}"))
            }
            other => out.write_line(&format!(
                "{RED}- Unexpected status {other:?} for stage {name}{RESET}"
            )),
        }
    }

    out.write_line(&format!(
        "{BOLD}Total duration{RESET}: {GREEN}{:?}{RESET}",
        graph.duration()
    ));
}

/// Stage names inside a graph are not prefixed, but denormalized graphs
/// cascade the pipeline name in front; strip it for display.
fn strip_root_prefix<'a>(graph_name: &str, stage_name: &'a str) -> &'a str {
    stage_name
        .strip_prefix(&format!("{graph_name}->"))
        .unwrap_or(stage_name)
}
