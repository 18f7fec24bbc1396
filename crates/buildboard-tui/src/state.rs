//! Dashboard state.

use std::time::Instant;

use buildboard_core::config::Config;
use buildboard_core::controller::{Indicator, StreamController};
use buildboard_core::visibility::VisibilityOracle;

/// Rows taken by the status line.
pub const STATUS_HEIGHT: u16 = 1;
/// Rows taken by the disconnected banner when shown.
pub const BANNER_HEIGHT: u16 = 1;

#[derive(Debug)]
pub struct AppState {
    pub controller: StreamController,
    pub visibility: VisibilityOracle,
    /// Endpoint shown in the status line.
    pub endpoint: String,
    pub scroll: ScrollState,
    pub width: u16,
    pub height: u16,
    pub spinner_frame: usize,
    pub should_quit: bool,
}

impl AppState {
    pub fn new(config: &Config, now: Instant) -> Self {
        Self {
            controller: StreamController::with_cooldown(config.reconnect_cooldown(), now),
            visibility: VisibilityOracle::new(config.visibility),
            endpoint: config.url.clone(),
            scroll: ScrollState::default(),
            width: 0,
            height: 0,
            spinner_frame: 0,
            should_quit: false,
        }
    }

    pub fn banner_visible(&self) -> bool {
        self.controller.indicator() != Indicator::Hidden
    }

    /// Rows available for the execution list.
    pub fn body_height(&self) -> usize {
        let banner = if self.banner_visible() {
            BANNER_HEIGHT
        } else {
            0
        };
        usize::from(self.height.saturating_sub(STATUS_HEIGHT + banner))
    }
}

/// Vertical scroll position of the execution list (0 = top).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScrollState {
    pub offset: usize,
}

impl ScrollState {
    pub fn scroll_up(&mut self, lines: usize) {
        self.offset = self.offset.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: usize, max: usize) {
        self.offset = self.offset.saturating_add(lines).min(max);
    }

    pub fn to_top(&mut self) {
        self.offset = 0;
    }

    pub fn to_bottom(&mut self, max: usize) {
        self.offset = max;
    }

    /// Effective offset for content that can scroll at most `max` lines.
    pub fn clamped(self, max: usize) -> usize {
        self.offset.min(max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_bounds() {
        let mut scroll = ScrollState::default();
        scroll.scroll_up(3);
        assert_eq!(scroll.offset, 0);
        scroll.scroll_down(10, 4);
        assert_eq!(scroll.offset, 4);
        scroll.to_top();
        assert_eq!(scroll.offset, 0);
        scroll.to_bottom(7);
        assert_eq!(scroll.clamped(5), 5);
    }

    #[test]
    fn test_body_height_accounts_for_banner() {
        let mut app = AppState::new(&Config::default(), Instant::now());
        app.height = 20;
        // Connecting shows the reconnecting banner.
        assert_eq!(app.body_height(), 18);
    }
}
