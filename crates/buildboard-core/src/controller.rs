//! Stream controller.
//!
//! Owns the execution registry and the logical push connection. The
//! controller is a pure state machine: it consumes connection events, frames,
//! visibility changes and manual reconnect requests, and returns
//! [`ConnectionEffect`]s for the runtime to execute against the transport.
//!
//! ## Reconnection
//!
//! ```text
//!              connect()                 Opened
//!   ──────► Connecting ─────────────────────────► Open
//!              ▲   ▲  transient error (native retry) │
//!              │   └─────────────────────────────────┤
//!              │                         terminal error
//!              │       ┌─────────────────────────────┼──────────────────────┐
//!              │   visible, cooled down      visible, in cooldown        hidden
//!              │       ▼                             ▼                      ▼
//!              └── DisconnectedVisible   DisconnectedRateLimited   DisconnectedHidden
//!                  (connect() issued)    (manual reconnect only)   (connect() on foreground)
//! ```
//!
//! Every `connect()` wipes the registry and bumps the connection generation;
//! events carrying an older generation are dropped, so a superseded
//! connection can never touch the registry.

use std::time::{Duration, Instant};

use crate::protocol::{Frame, FrameError, decode_slot_updates};
use crate::registry::ExecutionRegistry;
use crate::transport::{StreamEvent, StreamMessage, TransportError};
use crate::visibility::VisibilityChange;

/// Minimum spacing between automatic reconnects.
pub const RECONNECT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    /// Terminal loss while visible; a new connection was issued immediately.
    DisconnectedVisible,
    /// Terminal loss while hidden; reconnects when foregrounded.
    DisconnectedHidden,
    /// Terminal loss within the cooldown; waits for the user.
    DisconnectedRateLimited,
}

impl ConnectionState {
    pub fn indicator(self) -> Indicator {
        match self {
            ConnectionState::Open => Indicator::Hidden,
            ConnectionState::Connecting | ConnectionState::DisconnectedVisible => {
                Indicator::Reconnecting
            }
            ConnectionState::DisconnectedHidden | ConnectionState::DisconnectedRateLimited => {
                Indicator::ReconnectAction
            }
        }
    }
}

/// What the "disconnected" banner shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    Hidden,
    Reconnecting,
    ReconnectAction,
}

/// Work for the runtime that owns the transport handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEffect {
    /// Cancel the connection task of `generation`.
    Close { generation: u64 },
    /// Start a connection task tagged with `generation`.
    Open { generation: u64 },
}

#[derive(Debug)]
pub struct StreamController {
    registry: ExecutionRegistry,
    state: ConnectionState,
    /// Generation of the current connection; 0 before the first connect.
    generation: u64,
    last_reconnect: Instant,
    cooldown: Duration,
    reconnect_when_visible: bool,
    last_error: Option<TransportError>,
    malformed_frames: u64,
}

impl StreamController {
    /// Creates a controller. The cooldown clock starts at `now`, so the
    /// initial connection counts as an automatic attempt.
    pub fn new(now: Instant) -> Self {
        Self::with_cooldown(RECONNECT_COOLDOWN, now)
    }

    pub fn with_cooldown(cooldown: Duration, now: Instant) -> Self {
        Self {
            registry: ExecutionRegistry::new(),
            state: ConnectionState::Connecting,
            generation: 0,
            last_reconnect: now,
            cooldown,
            reconnect_when_visible: false,
            last_error: None,
            malformed_frames: 0,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn indicator(&self) -> Indicator {
        self.state.indicator()
    }

    pub fn registry(&self) -> &ExecutionRegistry {
        &self.registry
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the next foregrounding will reconnect.
    pub fn reconnect_when_visible(&self) -> bool {
        self.reconnect_when_visible
    }

    /// Most recent connection error since the last successful open.
    pub fn last_error(&self) -> Option<&TransportError> {
        self.last_error.as_ref()
    }

    pub fn malformed_frames(&self) -> u64 {
        self.malformed_frames
    }

    /// Tears down the current connection, wipes the registry and opens a new
    /// connection.
    pub fn connect(&mut self) -> Vec<ConnectionEffect> {
        let mut effects = Vec::with_capacity(2);
        if self.generation > 0 {
            effects.push(ConnectionEffect::Close {
                generation: self.generation,
            });
        }
        self.generation = self.generation.wrapping_add(1).max(1);
        let removed = self.registry.clear();
        self.state = ConnectionState::Connecting;
        self.reconnect_when_visible = false;
        tracing::info!(generation = self.generation, removed, "connecting");
        effects.push(ConnectionEffect::Open {
            generation: self.generation,
        });
        effects
    }

    /// User-requested reconnect. Bypasses the cooldown and restarts it.
    pub fn manual_reconnect(&mut self, now: Instant) -> Vec<ConnectionEffect> {
        tracing::info!("manual reconnect");
        self.last_reconnect = now;
        self.connect()
    }

    /// Reacts to a visibility change. A pending deferred reconnect fires when
    /// the dashboard is foregrounded, and restarts the cooldown.
    pub fn on_visibility_change(
        &mut self,
        change: VisibilityChange,
        now: Instant,
    ) -> Vec<ConnectionEffect> {
        if change == VisibilityChange::Foregrounded && self.reconnect_when_visible {
            tracing::info!("foregrounded, running deferred reconnect");
            self.last_reconnect = now;
            return self.connect();
        }
        Vec::new()
    }

    /// Handles one event from the transport.
    ///
    /// `visible` is the oracle's answer at the time the event is processed.
    pub fn handle_stream(
        &mut self,
        message: StreamMessage,
        visible: bool,
        now: Instant,
    ) -> Vec<ConnectionEffect> {
        if message.generation != self.generation {
            tracing::debug!(
                stale = message.generation,
                current = self.generation,
                "dropping event from superseded connection"
            );
            return Vec::new();
        }

        match message.event {
            StreamEvent::Opened => {
                self.on_open();
                Vec::new()
            }
            StreamEvent::Message(data) => {
                self.handle_message(&data);
                Vec::new()
            }
            StreamEvent::Error(error) if error.is_terminal() => {
                self.on_connection_closed(error, visible, now)
            }
            StreamEvent::Error(error) => {
                self.on_connection_interrupted(error);
                Vec::new()
            }
        }
    }

    fn on_open(&mut self) {
        let removed = self.registry.clear();
        self.state = ConnectionState::Open;
        self.last_error = None;
        tracing::info!(generation = self.generation, removed, "connection open");
    }

    fn on_connection_interrupted(&mut self, error: TransportError) {
        tracing::warn!(%error, "connection interrupted, transport retrying");
        if self.state == ConnectionState::Open {
            self.state = ConnectionState::Connecting;
        }
        self.last_error = Some(error);
    }

    fn on_connection_closed(
        &mut self,
        error: TransportError,
        visible: bool,
        now: Instant,
    ) -> Vec<ConnectionEffect> {
        tracing::warn!(%error, visible, "connection closed");
        self.last_error = Some(error);

        let cooled_down = now.saturating_duration_since(self.last_reconnect) >= self.cooldown;
        if visible && cooled_down {
            self.last_reconnect = now;
            let effects = self.connect();
            self.state = ConnectionState::DisconnectedVisible;
            return effects;
        }

        if visible {
            tracing::info!("reconnect cooldown active, waiting for user");
            self.state = ConnectionState::DisconnectedRateLimited;
        } else {
            tracing::info!("hidden, deferring reconnect until foregrounded");
            self.state = ConnectionState::DisconnectedHidden;
            self.reconnect_when_visible = true;
        }
        Vec::new()
    }

    /// Parses and applies one message. Malformed frames are logged and
    /// dropped without touching the registry.
    pub fn handle_message(&mut self, data: &str) {
        if let Err(error) = self.apply_frame(Frame::parse(data)) {
            self.malformed_frames += 1;
            tracing::warn!(%error, "dropping frame");
        }
    }

    /// Applies a decoded frame to the registry.
    ///
    /// # Errors
    /// Returns `FrameError` if an update payload for a known execution is
    /// malformed; the registry is left unchanged in that case.
    pub fn apply_frame(&mut self, frame: Frame) -> Result<(), FrameError> {
        match frame {
            Frame::ExecutionCreate { id, title } => {
                if !self.registry.create(&id, &title) {
                    tracing::debug!(id, "execution already exists");
                }
            }
            Frame::ExecutionDestroy { id } => {
                self.registry.destroy(&id);
            }
            Frame::ExecutionLog { id, level, message } => {
                if !self.registry.push_log(&id, level, &message) {
                    tracing::debug!(id, "log for unknown execution");
                }
            }
            Frame::EmptyLog { id } => {
                tracing::debug!(id, "empty log payload");
            }
            Frame::ExecutionUpdate { id, payload } => {
                if !self.registry.contains(&id) {
                    tracing::debug!(id, "update for unknown execution");
                    return Ok(());
                }
                let records = decode_slot_updates(&id, &payload)?;
                self.registry.apply_update(&id, records);
            }
            Frame::Unknown { kind } => {
                tracing::debug!(kind, "ignoring unknown frame type");
            }
        }
        Ok(())
    }
}
