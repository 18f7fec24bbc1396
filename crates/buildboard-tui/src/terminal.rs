//! Terminal session for the dashboard.
//!
//! Focus reporting is part of the session because it is the visibility
//! signal. `restore` undoes everything `enter` did, and the panic hook calls
//! it too so a crash never leaves the shell in raw mode.

use std::io::{self, Stdout};
use std::panic;

use anyhow::{Context, Result};
use crossterm::event::{
    DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

pub type DashboardTerminal = Terminal<CrosstermBackend<Stdout>>;

/// Switches to raw mode on the alternate screen with focus and mouse events on.
///
/// Restores whatever was already changed if a later step fails.
///
/// # Errors
/// Returns an error if the terminal rejects any of the mode changes.
pub fn enter() -> Result<DashboardTerminal> {
    install_panic_hook();
    enable_raw_mode().context("Failed to enable raw mode")?;
    open_screen().inspect_err(|_| {
        let _ = restore();
    })
}

fn open_screen() -> Result<DashboardTerminal> {
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableFocusChange,
        EnableMouseCapture
    )
    .context("Failed to prepare dashboard screen")?;
    Terminal::new(CrosstermBackend::new(stdout)).context("Failed to create terminal")
}

/// Leaves the dashboard session. Safe to call more than once.
///
/// # Errors
/// Returns an error if the screen or raw mode cannot be restored.
pub fn restore() -> Result<()> {
    // Input modes go first, while still in raw mode.
    let _ = execute!(io::stdout(), DisableMouseCapture, DisableFocusChange);
    execute!(io::stdout(), LeaveAlternateScreen).context("Failed to leave alternate screen")?;
    disable_raw_mode().context("Failed to disable raw mode")
}

fn install_panic_hook() {
    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let _ = restore();
        previous(info);
    }));
}
