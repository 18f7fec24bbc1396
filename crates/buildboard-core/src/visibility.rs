//! Visibility oracle.
//!
//! Tracks whether the dashboard is in front of the user. In the terminal this
//! follows focus reporting; a terminal that never reports focus leaves the
//! state unknown, which counts as backgrounded.

use serde::{Deserialize, Serialize};

/// Where visibility information comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VisibilitySource {
    /// Terminal focus events.
    #[default]
    Focus,
    /// Always treated as foregrounded.
    Always,
    /// Always treated as backgrounded.
    Never,
}

impl std::str::FromStr for VisibilitySource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "focus" => Ok(VisibilitySource::Focus),
            "always" => Ok(VisibilitySource::Always),
            "never" => Ok(VisibilitySource::Never),
            other => Err(format!(
                "unknown visibility source '{other}' (expected focus, always or never)"
            )),
        }
    }
}

/// A change in effective visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityChange {
    Foregrounded,
    Backgrounded,
}

#[derive(Debug, Clone)]
pub struct VisibilityOracle {
    source: VisibilitySource,
    /// Last focus report; `None` until the terminal reports anything.
    focused: Option<bool>,
}

impl VisibilityOracle {
    pub fn new(source: VisibilitySource) -> Self {
        Self {
            source,
            focused: None,
        }
    }

    pub fn source(&self) -> VisibilitySource {
        self.source
    }

    /// Whether the dashboard currently counts as foregrounded.
    pub fn is_visible(&self) -> bool {
        match self.source {
            VisibilitySource::Always => true,
            VisibilitySource::Never => false,
            VisibilitySource::Focus => self.focused.unwrap_or(false),
        }
    }

    /// Records a focus report and returns the effective change, if any.
    pub fn set_focused(&mut self, focused: bool) -> Option<VisibilityChange> {
        let before = self.is_visible();
        self.focused = Some(focused);
        match (before, self.is_visible()) {
            (false, true) => Some(VisibilityChange::Foregrounded),
            (true, false) => Some(VisibilityChange::Backgrounded),
            _ => None,
        }
    }
}
