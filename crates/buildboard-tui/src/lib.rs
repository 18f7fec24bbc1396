//! Full-screen live dashboard for build executions.

pub mod effects;
pub mod events;
pub mod render;
pub mod runtime;
pub mod scrollbar;
pub mod state;
pub mod terminal;
pub mod update;
pub mod view;

use std::io::{IsTerminal, stdout};

use anyhow::Result;
use buildboard_core::config::Config;
pub use runtime::TuiRuntime;

/// Runs the dashboard until the user quits.
///
/// Must be called from within a multi-threaded tokio runtime; the event loop
/// blocks the calling thread while the transport runs on the workers.
pub fn run_dashboard(config: &Config) -> Result<()> {
    if !stdout().is_terminal() {
        anyhow::bail!(
            "The dashboard requires a terminal.\n\
             Use `buildboard snapshot` for non-interactive output."
        );
    }

    tracing::info!(url = %config.url, visibility = ?config.visibility, "starting dashboard");
    let mut runtime = TuiRuntime::new(config)?;
    runtime.run()
}
