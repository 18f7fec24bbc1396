//! TUI runtime: owns the terminal, runs the event loop, executes effects.
//!
//! This is the Elm runtime boundary. The reducer stays pure and returns
//! effects; opening and cancelling the push connection happens here.
//!
//! The transport task sends `StreamMessage`s into `stream_rx`, which is
//! drained each loop iteration alongside terminal input.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use buildboard_core::config::Config;
use buildboard_core::transport::{EventSource, StreamReceiver, StreamSender};
use crossterm::event;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::effects::{UiEffect, from_connection};
use crate::events::UiEvent;
use crate::state::AppState;
use crate::terminal::{self, DashboardTerminal};
use crate::{render, update};

/// Tick cadence while something animates (the reconnecting spinner).
pub const FRAME_DURATION: Duration = Duration::from_millis(100);

/// Tick cadence when idle.
pub const IDLE_POLL_DURATION: Duration = Duration::from_millis(250);

/// The live transport task.
struct Connection {
    generation: u64,
    cancel: CancellationToken,
}

pub struct TuiRuntime {
    terminal: DashboardTerminal,
    pub state: AppState,
    source: EventSource,
    stream_tx: StreamSender,
    stream_rx: StreamReceiver,
    connection: Option<Connection>,
    last_tick: Instant,
}

impl TuiRuntime {
    /// Enters the alternate screen and prepares the event source.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: &Config) -> Result<Self> {
        let url = config.endpoint()?;
        let source = EventSource::new(url, config.retry_delay())?;

        let terminal = terminal::enter().context("Failed to setup terminal")?;

        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let now = Instant::now();
        Ok(Self {
            terminal,
            state: AppState::new(config, now),
            source,
            stream_tx,
            stream_rx,
            connection: None,
            last_tick: now,
        })
    }

    /// Connects and runs the event loop until the user quits.
    pub fn run(&mut self) -> Result<()> {
        let effects = from_connection(self.state.controller.connect());
        self.execute_effects(effects);
        self.event_loop()
    }

    fn event_loop(&mut self) -> Result<()> {
        let mut dirty = true;

        while !self.state.should_quit {
            let mut events = self.collect_events()?;

            let size = self.terminal.size()?;
            events.insert(
                0,
                UiEvent::Frame {
                    width: size.width,
                    height: size.height,
                },
            );

            for event in events {
                // Frame events alone never require a redraw.
                if !matches!(event, UiEvent::Frame { .. }) {
                    dirty = true;
                }
                let effects = update::update(&mut self.state, event);
                self.execute_effects(effects);
            }

            if dirty {
                self.terminal.draw(|frame| {
                    render::render(&self.state, frame);
                })?;
                dirty = false;
            }
        }

        Ok(())
    }

    /// Collects stream and terminal events, plus a Tick when one is due.
    fn collect_events(&mut self) -> Result<Vec<UiEvent>> {
        let mut events = Vec::new();

        let tick_interval = if self.state.banner_visible() {
            FRAME_DURATION
        } else {
            IDLE_POLL_DURATION
        };

        while let Ok(message) = self.stream_rx.try_recv() {
            events.push(UiEvent::Stream(message));
        }

        // Block until the next tick unless there is already work queued.
        let poll_duration = if events.is_empty() {
            tick_interval.saturating_sub(self.last_tick.elapsed())
        } else {
            Duration::ZERO
        };

        if event::poll(poll_duration)? {
            events.push(UiEvent::Terminal(event::read()?));
            while event::poll(Duration::ZERO)? {
                events.push(UiEvent::Terminal(event::read()?));
            }
        }

        if self.last_tick.elapsed() >= tick_interval {
            events.push(UiEvent::Tick);
            self.last_tick = Instant::now();
        }

        Ok(events)
    }

    fn execute_effects(&mut self, effects: Vec<UiEffect>) {
        for effect in effects {
            self.execute_effect(effect);
        }
    }

    fn execute_effect(&mut self, effect: UiEffect) {
        match effect {
            UiEffect::CloseConnection { generation } => {
                if let Some(connection) = self
                    .connection
                    .take_if(|connection| connection.generation == generation)
                {
                    tracing::debug!(generation, "closing connection");
                    connection.cancel.cancel();
                }
            }
            UiEffect::OpenConnection { generation } => {
                if let Some(previous) = self.connection.take() {
                    previous.cancel.cancel();
                }
                tracing::debug!(generation, url = %self.source.url(), "opening connection");
                let cancel = self.source.spawn(generation, self.stream_tx.clone());
                self.connection = Some(Connection { generation, cancel });
            }
        }
    }
}

impl Drop for TuiRuntime {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.cancel.cancel();
        }
        let _ = terminal::restore();
    }
}
