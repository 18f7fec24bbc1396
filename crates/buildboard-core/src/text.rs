//! Plain-text rendering of the registry, used by headless snapshots.
//!
//! ```text
//! Nightly build (5)
//!   Compile [manual/running]
//!     [deploy] <SELECT 1> cc main.c (stalled)
//!       compiling 12 files
//!       [##########..........]  50%
//!       - linking
//!   I Started
//! ```

use std::fmt::Write as _;

use crate::model::{Execution, Slot};
use crate::registry::ExecutionRegistry;
use crate::render::{Fragment, OperationFragment, Part, render_operation};

const BAR_WIDTH: usize = 20;

pub fn render_registry(registry: &ExecutionRegistry) -> String {
    if registry.is_empty() {
        return "(no executions)\n".to_string();
    }
    let mut out = String::new();
    for execution in registry.iter() {
        write_execution(&mut out, execution);
    }
    out
}

pub fn write_execution(out: &mut String, execution: &Execution) {
    let _ = writeln!(out, "{} ({})", execution.title, execution.id);
    for slot in execution.slots() {
        let tags = slot_tags(slot);
        if tags.is_empty() {
            let _ = writeln!(out, "  {}", slot.title);
        } else {
            let _ = writeln!(out, "  {} [{tags}]", slot.title);
        }
        if let Fragment::Visible(fragment) = render_operation(slot.operation.as_ref()) {
            write_fragment(out, &fragment, "    ", "");
        }
    }
    for entry in execution.logs() {
        let _ = writeln!(out, "  {} {}", entry.level.marker(), entry.message);
    }
}

fn write_fragment(out: &mut String, fragment: &OperationFragment, indent: &str, bullet: &str) {
    let _ = writeln!(out, "{indent}{bullet}{}", leading_line(fragment));
    let detail = format!("{indent}{}", " ".repeat(bullet.len() + 2));
    for part in &fragment.parts {
        match part {
            Part::Secondary(text) => {
                let _ = writeln!(out, "{detail}{text}");
            }
            Part::Progress(percent) => {
                let _ = writeln!(out, "{detail}{}", progress_bar(*percent, BAR_WIDTH));
            }
            Part::Background(children) => {
                for child in children {
                    write_fragment(out, child, &detail, "- ");
                }
            }
            Part::AsyncTitle(_) | Part::StatementMessage(_) | Part::Primary(_) => {}
        }
    }
}

/// Badges plus primary text on one line, with the stalled marker.
pub fn leading_line(fragment: &OperationFragment) -> String {
    let mut line = String::new();
    for part in fragment.leading() {
        match part {
            Part::AsyncTitle(title) => {
                let _ = write!(line, "[{title}] ");
            }
            Part::StatementMessage(message) => {
                let _ = write!(line, "<{message}> ");
            }
            Part::Primary(text) => line.push_str(text),
            _ => {}
        }
    }
    if fragment.stalled {
        line.push_str(" (stalled)");
    }
    line
}

/// `[#####.....]  50%` style bar.
pub fn progress_bar(percent: u8, width: usize) -> String {
    let percent = percent.min(100);
    let filled = usize::from(percent) * width / 100;
    format!(
        "[{}{}] {percent:>3}%",
        "#".repeat(filled),
        ".".repeat(width - filled)
    )
}

/// Non-empty classification tags joined with `/`.
pub fn slot_tags(slot: &Slot) -> String {
    [&slot.mode, &slot.status, &slot.run_state]
        .into_iter()
        .filter(|tag| !tag.is_empty())
        .map(|tag| tag.as_str())
        .collect::<Vec<_>>()
        .join("/")
}
