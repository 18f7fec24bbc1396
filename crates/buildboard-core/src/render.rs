//! Operation renderer.
//!
//! Maps an [`Operation`] onto a UI-agnostic [`Fragment`]. The same algorithm
//! applies at every nesting depth:
//!
//! 1. No operation, or no short description: hidden.
//! 2. Primary text is the short description; the stalled marker follows
//!    `statement_stalled`.
//! 3. A long description is appended as secondary text.
//! 4. A statement message is prepended as a badge.
//! 5. An async title is prepended before that, so it ends up first.
//! 6. and 7. Each non-null percentage appends its own progress bar.
//! 8. Visible background operations are appended as a group, in order.
//!
//! Front-ends (terminal view, plain-text snapshot) translate fragments into
//! their own primitives.

use crate::protocol::Operation;
use crate::richtext;

/// Rendered form of an optional operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Hidden,
    Visible(OperationFragment),
}

impl Fragment {
    pub fn is_hidden(&self) -> bool {
        matches!(self, Fragment::Hidden)
    }

    pub fn as_visible(&self) -> Option<&OperationFragment> {
        match self {
            Fragment::Visible(op) => Some(op),
            Fragment::Hidden => None,
        }
    }
}

/// A visible operation: ordered content parts plus the stalled marker.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationFragment {
    pub stalled: bool,
    pub parts: Vec<Part>,
}

impl OperationFragment {
    /// Badges and primary text, in display order, up to the first line break.
    pub fn leading(&self) -> impl Iterator<Item = &Part> {
        self.parts.iter().take_while(|part| part.is_inline())
    }

    /// Visible background operations, if any were rendered.
    pub fn background(&self) -> &[OperationFragment] {
        self.parts
            .iter()
            .find_map(|part| match part {
                Part::Background(children) => Some(children.as_slice()),
                _ => None,
            })
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    /// Badge for the async title.
    AsyncTitle(String),
    /// Badge for the current statement message.
    StatementMessage(String),
    /// Short description, as display text.
    Primary(String),
    /// Long description on its own line.
    Secondary(String),
    /// Progress bar, clamped to 0..=100.
    Progress(u8),
    /// Grouped list of visible background operations.
    Background(Vec<OperationFragment>),
}

impl Part {
    fn is_inline(&self) -> bool {
        matches!(
            self,
            Part::AsyncTitle(_) | Part::StatementMessage(_) | Part::Primary(_)
        )
    }
}

/// Renders an operation (or its absence).
pub fn render_operation(op: Option<&Operation>) -> Fragment {
    let Some(op) = op.filter(|op| op.is_visible()) else {
        return Fragment::Hidden;
    };
    let short = op.short_description.as_deref().unwrap_or_default();

    let mut parts = vec![Part::Primary(richtext::to_plain(short))];

    if let Some(long) = op.long_description.as_deref().filter(|s| !s.is_empty()) {
        parts.push(Part::Secondary(richtext::to_plain(long)));
    }
    if let Some(message) = op.statement_message.as_deref().filter(|s| !s.is_empty()) {
        parts.insert(0, Part::StatementMessage(message.to_string()));
    }
    if let Some(title) = op.async_title.as_deref().filter(|s| !s.is_empty()) {
        parts.insert(0, Part::AsyncTitle(title.to_string()));
    }
    if let Some(percent) = op.percent_complete {
        parts.push(Part::Progress(clamp_percent(percent)));
    }
    if let Some(percent) = op.statement_percent_complete {
        parts.push(Part::Progress(clamp_percent(percent)));
    }

    let background: Vec<OperationFragment> = op
        .background_operations
        .iter()
        .filter_map(|child| match render_operation(child.as_ref()) {
            Fragment::Visible(fragment) => Some(fragment),
            Fragment::Hidden => None,
        })
        .collect();
    if !background.is_empty() {
        parts.push(Part::Background(background));
    }

    Fragment::Visible(OperationFragment {
        stalled: op.statement_stalled,
        parts,
    })
}

fn clamp_percent(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.round().clamp(0.0, 100.0) as u8
}
