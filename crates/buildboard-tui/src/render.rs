//! Pure view/render functions for the TUI.
//!
//! Functions here take `&AppState`, draw to a ratatui `Frame` and never
//! mutate state or return effects.

use buildboard_core::controller::{ConnectionState, Indicator};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Paragraph;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::scrollbar::Scrollbar;
use crate::state::{AppState, BANNER_HEIGHT, STATUS_HEIGHT};
use crate::{update, view};

/// Width reserved for the scrollbar on the right side.
const SCROLLBAR_WIDTH: u16 = 1;

const SPINNER_FRAMES: &[&str] = &["◐", "◓", "◑", "◒"];

const KEY_HINTS: &str = " q quit ";
const RECONNECT_HINTS: &str = " r reconnect · q quit ";

pub fn render(app: &AppState, frame: &mut Frame) {
    let area = frame.area();
    let banner_height = if app.banner_visible() {
        BANNER_HEIGHT
    } else {
        0
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(banner_height),
            Constraint::Min(0),
            Constraint::Length(STATUS_HEIGHT),
        ])
        .split(area);

    if banner_height > 0 {
        render_banner(app, frame, chunks[0]);
    }
    render_body(app, frame, chunks[1]);
    render_status_line(app, frame, chunks[2]);
}

fn render_banner(app: &AppState, frame: &mut Frame, area: Rect) {
    let (text, style) = match app.controller.indicator() {
        Indicator::Hidden => return,
        Indicator::Reconnecting => {
            let spinner = SPINNER_FRAMES[app.spinner_frame % SPINNER_FRAMES.len()];
            (
                format!(" {spinner} Disconnected, reconnecting…"),
                Style::default().fg(Color::Black).bg(Color::Yellow),
            )
        }
        Indicator::ReconnectAction => (
            " Disconnected. Press r to reconnect".to_string(),
            Style::default()
                .fg(Color::White)
                .bg(Color::Red)
                .add_modifier(Modifier::BOLD),
        ),
    };

    let mut spans = vec![Span::styled(text, style)];
    if let Some(error) = app.controller.last_error() {
        spans.push(Span::styled(
            format!("  {}", error.message),
            Style::default().fg(Color::DarkGray),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_body(app: &AppState, frame: &mut Frame, area: Rect) {
    let lines = view::dashboard_lines(app.controller.registry());
    let total = lines.len();
    let offset = app.scroll.clamped(update::max_scroll(app, total));

    let content_area = Rect {
        width: area.width.saturating_sub(SCROLLBAR_WIDTH),
        ..area
    };
    let scroll_y = u16::try_from(offset).unwrap_or(u16::MAX);
    frame.render_widget(Paragraph::new(lines).scroll((scroll_y, 0)), content_area);
    frame.render_widget(
        Scrollbar::new(total, usize::from(area.height), offset),
        area,
    );
}

fn render_status_line(app: &AppState, frame: &mut Frame, area: Rect) {
    let count = app.controller.registry().len();
    let plural = if count == 1 { "" } else { "s" };
    let dropped = match app.controller.malformed_frames() {
        0 => String::new(),
        n => format!(" · {n} dropped"),
    };
    let hints = if app.controller.indicator() == Indicator::ReconnectAction {
        RECONNECT_HINTS
    } else {
        KEY_HINTS
    };
    let right = format!(
        " {count} execution{plural}{dropped} · {} ·{hints}",
        state_label(app.controller.state())
    );

    let left_width = usize::from(area.width).saturating_sub(right.width());
    let left = truncate_with_ellipsis(&format!(" buildboard  {}", app.endpoint), left_width);
    let padding = left_width.saturating_sub(left.width());

    let dim = Style::default().fg(Color::DarkGray);
    let line = Line::from(vec![
        Span::styled(left, dim),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, dim),
    ]);
    frame.render_widget(Paragraph::new(line), area);
}

fn state_label(state: ConnectionState) -> &'static str {
    match state {
        ConnectionState::Connecting => "connecting",
        ConnectionState::Open => "live",
        ConnectionState::DisconnectedVisible => "retrying",
        ConnectionState::DisconnectedHidden => "paused",
        ConnectionState::DisconnectedRateLimited => "disconnected",
    }
}

/// Truncates to `max_width` terminal columns, ending with `…` when cut.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    if max_width == 0 {
        return String::new();
    }
    let mut truncated = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let ch_width = ch.width().unwrap_or(0);
        if width + ch_width + 1 > max_width {
            break;
        }
        width += ch_width;
        truncated.push(ch);
    }
    truncated.push('…');
    truncated
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use buildboard_core::config::Config;
    use buildboard_core::transport::{StreamEvent, StreamMessage, TransportError};
    use buildboard_core::visibility::VisibilitySource;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    use super::*;
    use crate::events::UiEvent;

    fn draw(app: &AppState, width: u16, height: u16) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(width, height)).unwrap();
        terminal.draw(|frame| render(app, frame)).unwrap();
        let buffer = terminal.backend().buffer();
        (0..height)
            .map(|y| {
                (0..width)
                    .map(|x| buffer[(x, y)].symbol().to_string())
                    .collect::<String>()
            })
            .collect()
    }

    fn app(visibility: VisibilitySource) -> AppState {
        let config = Config {
            visibility,
            ..Config::default()
        };
        let mut app = AppState::new(&config, Instant::now());
        app.controller.connect();
        app.height = 8;
        app
    }

    fn send(app: &mut AppState, event: StreamEvent) {
        let generation = app.controller.generation();
        update::update(app, UiEvent::Stream(StreamMessage { generation, event }));
    }

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate_with_ellipsis("hello", 10), "hello");
        assert_eq!(truncate_with_ellipsis("hello world", 6), "hello…");
        assert_eq!(truncate_with_ellipsis("hello", 0), "");
    }

    #[test]
    fn test_connecting_shows_reconnecting_banner() {
        let app = app(VisibilitySource::Always);
        let rows = draw(&app, 60, 8);
        assert!(rows[0].contains("reconnecting"));
        assert!(rows[7].contains("connecting"));
    }

    #[test]
    fn test_open_hides_banner_and_lists_executions() {
        let mut app = app(VisibilitySource::Always);
        send(&mut app, StreamEvent::Opened);
        send(
            &mut app,
            StreamEvent::Message("execution_create\n9\nNightly".to_string()),
        );
        let rows = draw(&app, 60, 8);
        assert!(rows[0].starts_with("Nightly  #9"));
        assert!(rows[7].contains("1 execution · live"));
        assert!(!rows[7].contains("reconnect"));
    }

    #[test]
    fn test_rate_limited_shows_reconnect_action() {
        let mut app = app(VisibilitySource::Always);
        send(
            &mut app,
            StreamEvent::Error(TransportError::terminal("unexpected HTTP status 502")),
        );
        let rows = draw(&app, 80, 8);
        assert!(rows[0].contains("Press r to reconnect"));
        assert!(rows[0].contains("502"));
        assert!(rows[7].contains("r reconnect"));
    }
}
