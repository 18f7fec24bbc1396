//! Events consumed by the reducer.

use buildboard_core::transport::StreamMessage;
use crossterm::event::Event;

#[derive(Debug, Clone)]
pub enum UiEvent {
    /// Animation/redraw cadence.
    Tick,
    /// Current terminal size, emitted before each batch of events.
    Frame { width: u16, height: u16 },
    Terminal(Event),
    /// Event from the push connection.
    Stream(StreamMessage),
}
