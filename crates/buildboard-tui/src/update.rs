//! TUI reducer (update function).
//!
//! All state mutations happen here. The runtime calls `update(app, event)`
//! and executes the returned effects.

use std::time::Instant;

use buildboard_core::controller::Indicator;
use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseEventKind};

use crate::effects::{UiEffect, from_connection};
use crate::events::UiEvent;
use crate::state::AppState;
use crate::view;

/// Lines moved per mouse wheel notch.
const WHEEL_LINES: usize = 3;

pub fn update(app: &mut AppState, event: UiEvent) -> Vec<UiEffect> {
    match event {
        UiEvent::Tick => {
            app.spinner_frame = app.spinner_frame.wrapping_add(1);
            vec![]
        }
        UiEvent::Frame { width, height } => {
            app.width = width;
            app.height = height;
            vec![]
        }
        UiEvent::Terminal(term_event) => handle_terminal_event(app, term_event),
        UiEvent::Stream(message) => {
            let visible = app.visibility.is_visible();
            let effects = app.controller.handle_stream(message, visible, Instant::now());
            from_connection(effects)
        }
    }
}

fn handle_terminal_event(app: &mut AppState, event: Event) -> Vec<UiEffect> {
    match event {
        Event::Key(key) => handle_key(app, key),
        Event::FocusGained => handle_focus(app, true),
        Event::FocusLost => handle_focus(app, false),
        Event::Mouse(mouse) => {
            match mouse.kind {
                MouseEventKind::ScrollUp => app.scroll.scroll_up(WHEEL_LINES),
                MouseEventKind::ScrollDown => {
                    let max = max_scroll(app, content_lines(app));
                    app.scroll.scroll_down(WHEEL_LINES, max);
                }
                _ => {}
            }
            vec![]
        }
        _ => vec![],
    }
}

fn handle_focus(app: &mut AppState, focused: bool) -> Vec<UiEffect> {
    let Some(change) = app.visibility.set_focused(focused) else {
        return vec![];
    };
    tracing::debug!(?change, "visibility changed");
    from_connection(app.controller.on_visibility_change(change, Instant::now()))
}

fn handle_key(app: &mut AppState, key: KeyEvent) -> Vec<UiEffect> {
    if key.kind != KeyEventKind::Press {
        return vec![];
    }

    let page = app.body_height().max(1);
    match (key.code, key.modifiers) {
        (KeyCode::Char('c'), KeyModifiers::CONTROL) | (KeyCode::Char('q') | KeyCode::Esc, _) => {
            app.should_quit = true;
            vec![]
        }
        // Only offered while disconnected without an automatic retry pending.
        (KeyCode::Char('r' | 'R'), _) => {
            if app.controller.indicator() == Indicator::ReconnectAction {
                from_connection(app.controller.manual_reconnect(Instant::now()))
            } else {
                vec![]
            }
        }
        (KeyCode::Up | KeyCode::Char('k'), _) => {
            app.scroll.scroll_up(1);
            vec![]
        }
        (KeyCode::Down | KeyCode::Char('j'), _) => {
            let max = max_scroll(app, content_lines(app));
            app.scroll.scroll_down(1, max);
            vec![]
        }
        (KeyCode::PageUp, _) => {
            app.scroll.scroll_up(page);
            vec![]
        }
        (KeyCode::PageDown, _) => {
            let max = max_scroll(app, content_lines(app));
            app.scroll.scroll_down(page, max);
            vec![]
        }
        (KeyCode::Home, _) => {
            app.scroll.to_top();
            vec![]
        }
        (KeyCode::End, _) => {
            let max = max_scroll(app, content_lines(app));
            app.scroll.to_bottom(max);
            vec![]
        }
        _ => vec![],
    }
}

/// Largest scroll offset that still fills the body with `content` lines.
pub fn max_scroll(app: &AppState, content: usize) -> usize {
    content.saturating_sub(app.body_height())
}

fn content_lines(app: &AppState) -> usize {
    view::dashboard_lines(app.controller.registry()).len()
}

#[cfg(test)]
mod tests {
    use buildboard_core::config::Config;
    use buildboard_core::controller::ConnectionState;
    use buildboard_core::transport::{StreamEvent, StreamMessage, TransportError};
    use buildboard_core::visibility::VisibilitySource;
    use crossterm::event::{KeyEventState, MouseEvent};

    use super::*;

    fn app_with(visibility: VisibilitySource, cooldown_secs: u64) -> AppState {
        let config = Config {
            visibility,
            reconnect_cooldown_secs: cooldown_secs,
            ..Config::default()
        };
        let mut app = AppState::new(&config, Instant::now());
        app.controller.connect();
        app.height = 10;
        app
    }

    fn key(code: KeyCode) -> UiEvent {
        key_with(code, KeyModifiers::NONE)
    }

    fn key_with(code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        UiEvent::Terminal(Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }))
    }

    fn stream(app: &AppState, event: StreamEvent) -> UiEvent {
        UiEvent::Stream(StreamMessage {
            generation: app.controller.generation(),
            event,
        })
    }

    fn frame(app: &AppState, text: &str) -> UiEvent {
        stream(app, StreamEvent::Message(text.to_string()))
    }

    #[test]
    fn test_quit_keys() {
        for event in [
            key(KeyCode::Char('q')),
            key(KeyCode::Esc),
            key_with(KeyCode::Char('c'), KeyModifiers::CONTROL),
        ] {
            let mut app = app_with(VisibilitySource::Focus, 60);
            assert!(update(&mut app, event).is_empty());
            assert!(app.should_quit);
        }
    }

    #[test]
    fn test_plain_c_does_not_quit() {
        let mut app = app_with(VisibilitySource::Focus, 60);
        update(&mut app, key(KeyCode::Char('c')));
        assert!(!app.should_quit);
    }

    #[test]
    fn test_reconnect_key_ignored_while_connecting() {
        let mut app = app_with(VisibilitySource::Focus, 60);
        assert!(update(&mut app, key(KeyCode::Char('r'))).is_empty());
        assert_eq!(app.controller.generation(), 1);
    }

    #[test]
    fn test_reconnect_key_keeps_live_connection() {
        let mut app = app_with(VisibilitySource::Always, 60);
        let opened = stream(&app, StreamEvent::Opened);
        update(&mut app, opened);
        let create = frame(&app, "execution_create\n1\nNightly");
        update(&mut app, create);

        assert!(update(&mut app, key(KeyCode::Char('r'))).is_empty());
        assert_eq!(app.controller.state(), ConnectionState::Open);
        assert!(app.controller.registry().contains("1"));
    }

    #[test]
    fn test_reconnect_key_replaces_lost_connection() {
        let mut app = app_with(VisibilitySource::Focus, 60);
        let lost = stream(&app, StreamEvent::Error(TransportError::terminal("HTTP 500")));
        update(&mut app, lost);

        let effects = update(&mut app, key(KeyCode::Char('R')));
        assert_eq!(
            effects,
            vec![
                UiEffect::CloseConnection { generation: 1 },
                UiEffect::OpenConnection { generation: 2 },
            ]
        );
        assert_eq!(app.controller.state(), ConnectionState::Connecting);
    }

    #[test]
    fn test_stream_frames_reach_registry() {
        let mut app = app_with(VisibilitySource::Always, 60);
        let opened = stream(&app, StreamEvent::Opened);
        update(&mut app, opened);
        let create = frame(&app, "execution_create\n3\nNightly");
        update(&mut app, create);
        assert!(app.controller.registry().contains("3"));
        assert!(!app.banner_visible());
    }

    #[test]
    fn test_focus_gain_runs_deferred_reconnect() {
        let mut app = app_with(VisibilitySource::Focus, 60);
        let opened = stream(&app, StreamEvent::Opened);
        update(&mut app, opened);

        // Focus never reported: counts as hidden.
        let lost = stream(&app, StreamEvent::Error(TransportError::terminal("HTTP 500")));
        assert!(update(&mut app, lost).is_empty());
        assert_eq!(app.controller.state(), ConnectionState::DisconnectedHidden);
        assert_eq!(app.controller.indicator(), Indicator::ReconnectAction);

        let effects = update(&mut app, UiEvent::Terminal(Event::FocusGained));
        assert_eq!(
            effects,
            vec![
                UiEffect::CloseConnection { generation: 1 },
                UiEffect::OpenConnection { generation: 2 },
            ]
        );
        assert!(update(&mut app, UiEvent::Terminal(Event::FocusLost)).is_empty());
    }

    #[test]
    fn test_visible_loss_within_cooldown_waits_for_key() {
        let mut app = app_with(VisibilitySource::Always, 3600);
        let lost = stream(&app, StreamEvent::Error(TransportError::terminal("HTTP 500")));
        assert!(update(&mut app, lost).is_empty());
        assert_eq!(
            app.controller.state(),
            ConnectionState::DisconnectedRateLimited
        );
        assert_eq!(update(&mut app, key(KeyCode::Char('r'))).len(), 2);
    }

    #[test]
    fn test_scroll_is_clamped_to_content() {
        let mut app = app_with(VisibilitySource::Always, 60);
        let opened = stream(&app, StreamEvent::Opened);
        update(&mut app, opened);
        for id in 0..12 {
            let create = frame(&app, &format!("execution_create\n{id}\nJob {id}"));
            update(&mut app, create);
        }
        // 12 headers + 11 separators in a 9-row body.
        update(&mut app, key(KeyCode::End));
        assert_eq!(app.scroll.offset, 23 - 9);
        update(&mut app, key(KeyCode::PageDown));
        assert_eq!(app.scroll.offset, 23 - 9);
        update(&mut app, key(KeyCode::Home));
        assert_eq!(app.scroll.offset, 0);

        let wheel = UiEvent::Terminal(Event::Mouse(MouseEvent {
            kind: MouseEventKind::ScrollDown,
            column: 0,
            row: 0,
            modifiers: KeyModifiers::NONE,
        }));
        update(&mut app, wheel);
        assert_eq!(app.scroll.offset, WHEEL_LINES);
    }

    #[test]
    fn test_key_release_is_ignored() {
        let mut app = app_with(VisibilitySource::Focus, 60);
        let release = UiEvent::Terminal(Event::Key(KeyEvent {
            code: KeyCode::Char('q'),
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Release,
            state: KeyEventState::NONE,
        }));
        update(&mut app, release);
        assert!(!app.should_quit);
    }

    #[test]
    fn test_frame_records_size() {
        let mut app = app_with(VisibilitySource::Focus, 60);
        update(
            &mut app,
            UiEvent::Frame {
                width: 100,
                height: 40,
            },
        );
        assert_eq!((app.width, app.height), (100, 40));
    }
}
