//! Execution list as ratatui lines.
//!
//! Walks the registry and turns each slot's rendered [`Fragment`] into styled
//! lines. Badges, primary text and the stalled marker share one line; long
//! descriptions, progress bars and background operations get their own,
//! indented under their parent.

use buildboard_core::model::{Execution, LogEntry, LogLevel, Slot};
use buildboard_core::registry::ExecutionRegistry;
use buildboard_core::render::{Fragment, OperationFragment, Part, render_operation};
use buildboard_core::text::{progress_bar, slot_tags};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};

const BAR_WIDTH: usize = 24;
const INDENT: &str = "  ";

pub fn dashboard_lines(registry: &ExecutionRegistry) -> Vec<Line<'static>> {
    if registry.is_empty() {
        return vec![Line::from(Span::styled(
            "No running executions.",
            Style::default().fg(Color::DarkGray),
        ))];
    }

    let mut lines = Vec::new();
    for (idx, execution) in registry.iter().enumerate() {
        if idx > 0 {
            lines.push(Line::default());
        }
        push_execution(&mut lines, execution);
    }
    lines
}

fn push_execution(lines: &mut Vec<Line<'static>>, execution: &Execution) {
    lines.push(Line::from(vec![
        Span::styled(
            execution.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("  #{}", execution.id),
            Style::default().fg(Color::DarkGray),
        ),
    ]));

    for slot in execution.slots() {
        lines.push(slot_line(slot));
        if let Fragment::Visible(fragment) = render_operation(slot.operation.as_ref()) {
            push_fragment(lines, &fragment, 2, false);
        }
    }

    for entry in execution.logs() {
        lines.push(log_line(entry));
    }
}

fn slot_line(slot: &Slot) -> Line<'static> {
    let mut spans = vec![
        Span::raw(INDENT),
        Span::styled(slot.title.clone(), Style::default().fg(Color::White)),
    ];
    let tags = slot_tags(slot);
    if !tags.is_empty() {
        spans.push(Span::styled(
            format!(" [{tags}]"),
            Style::default().fg(Color::DarkGray),
        ));
    }
    Line::from(spans)
}

fn push_fragment(
    lines: &mut Vec<Line<'static>>,
    fragment: &OperationFragment,
    depth: usize,
    background: bool,
) {
    let indent = INDENT.repeat(depth);
    let mut leading = vec![Span::raw(indent.clone())];
    if background {
        leading.push(Span::styled("↳ ", Style::default().fg(Color::DarkGray)));
    }
    leading.extend(leading_spans(fragment));
    lines.push(Line::from(leading));

    let detail = INDENT.repeat(depth + 1);
    for part in &fragment.parts {
        match part {
            Part::Secondary(text) => lines.push(Line::from(vec![
                Span::raw(detail.clone()),
                Span::styled(text.clone(), Style::default().fg(Color::Gray)),
            ])),
            Part::Progress(percent) => lines.push(Line::from(vec![
                Span::raw(detail.clone()),
                Span::styled(
                    progress_bar(*percent, BAR_WIDTH),
                    Style::default().fg(Color::Green),
                ),
            ])),
            Part::Background(children) => {
                for child in children {
                    push_fragment(lines, child, depth + 1, true);
                }
            }
            Part::AsyncTitle(_) | Part::StatementMessage(_) | Part::Primary(_) => {}
        }
    }
}

/// Badges, primary text and the stalled marker.
pub fn leading_spans(fragment: &OperationFragment) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    for part in fragment.leading() {
        match part {
            Part::AsyncTitle(title) => {
                spans.push(Span::styled(
                    format!(" {title} "),
                    Style::default().fg(Color::Black).bg(Color::Magenta),
                ));
                spans.push(Span::raw(" "));
            }
            Part::StatementMessage(message) => {
                spans.push(Span::styled(
                    format!(" {message} "),
                    Style::default().fg(Color::Black).bg(Color::Cyan),
                ));
                spans.push(Span::raw(" "));
            }
            Part::Primary(text) => spans.push(Span::raw(text.clone())),
            _ => {}
        }
    }
    if fragment.stalled {
        spans.push(Span::styled(
            " ⏸ stalled",
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        ));
    }
    spans
}

fn log_line(entry: &LogEntry) -> Line<'static> {
    let color = match entry.level {
        LogLevel::Debug => Color::DarkGray,
        LogLevel::Info => Color::Blue,
        LogLevel::Warning => Color::Yellow,
        LogLevel::Error => Color::Red,
        LogLevel::Other(_) => Color::Gray,
    };
    Line::from(vec![
        Span::raw(INDENT),
        Span::styled(
            entry.received_at.format("%H:%M:%S ").to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(entry.level.marker().to_string(), Style::default().fg(color)),
        Span::raw(" "),
        Span::raw(entry.message.clone()),
    ])
}
