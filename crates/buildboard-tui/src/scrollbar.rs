//! Scrollbar with a fixed thumb size.
//!
//! ratatui's built-in scrollbar rounds the thumb start and end separately, so
//! the thumb grows and shrinks while scrolling. This one computes the thumb
//! length once and positions it so it touches the bottom at max scroll.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::Widget;

const THUMB_SYMBOL: &str = "█";
const TRACK_SYMBOL: &str = "│";

#[derive(Debug, Clone)]
pub struct Scrollbar {
    total_lines: usize,
    viewport_height: usize,
    scroll_offset: usize,
}

impl Scrollbar {
    pub fn new(total_lines: usize, viewport_height: usize, scroll_offset: usize) -> Self {
        Self {
            total_lines,
            viewport_height,
            scroll_offset,
        }
    }

    fn should_display(&self) -> bool {
        self.total_lines > self.viewport_height
    }

    /// Returns `(thumb_start, thumb_len)` for a track of `track_len` rows.
    fn thumb(&self, track_len: usize) -> Option<(usize, usize)> {
        let max_scroll = self.total_lines.saturating_sub(self.viewport_height);
        if !self.should_display() || track_len == 0 || max_scroll == 0 {
            return None;
        }

        let viewport_len = self.viewport_height.min(track_len);
        let denom = self
            .total_lines
            .saturating_sub(1)
            .saturating_add(viewport_len)
            .max(1);
        let thumb_len = ((track_len * viewport_len + denom / 2) / denom).clamp(1, track_len);

        let available = track_len - thumb_len;
        let offset = self.scroll_offset.min(max_scroll);
        Some((offset * available / max_scroll, thumb_len))
    }
}

impl Widget for Scrollbar {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some((thumb_start, thumb_len)) = self.thumb(usize::from(area.height)) else {
            return;
        };

        let x = area.x + area.width.saturating_sub(1);
        let style = Style::default().fg(Color::DarkGray);
        for (idx, y) in (area.y..area.y + area.height).enumerate() {
            let symbol = if idx >= thumb_start && idx < thumb_start + thumb_len {
                THUMB_SYMBOL
            } else {
                TRACK_SYMBOL
            };
            buf.set_string(x, y, symbol, style);
        }
    }
}
