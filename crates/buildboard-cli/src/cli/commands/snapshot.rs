//! Headless snapshot: connect once, apply frames, print the tree.
//!
//! Collection stops when the server ends the stream or the timeout elapses,
//! whichever comes first. Failing to connect, or a terminal connection error,
//! is an error.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use buildboard_core::config::Config;
use buildboard_core::controller::{ConnectionEffect, StreamController};
use buildboard_core::transport::{EventSource, StreamEvent};
use buildboard_core::{logging, text};
use tokio::sync::mpsc;

pub async fn run(config: &Config, timeout: Duration) -> Result<()> {
    if let Err(err) = logging::init_stderr(config.log_level.as_deref()) {
        eprintln!("Warning: logging disabled: {err:#}");
    }

    let url = config.endpoint()?;
    let source = EventSource::new(url.clone(), config.retry_delay())?;
    let mut controller =
        StreamController::with_cooldown(config.reconnect_cooldown(), Instant::now());

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut connection = None;
    for effect in controller.connect() {
        if let ConnectionEffect::Open { generation } = effect {
            connection = Some(source.spawn(generation, tx.clone()));
        }
    }
    drop(tx);

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    let mut opened = false;

    let outcome = loop {
        let message = tokio::select! {
            () = &mut deadline => {
                tracing::info!(?timeout, "snapshot timeout reached");
                break Ok(());
            }
            message = rx.recv() => message,
        };
        let Some(message) = message else {
            break Ok(());
        };

        match &message.event {
            StreamEvent::Opened => opened = true,
            StreamEvent::Error(error) if error.is_terminal() || !opened => {
                break Err(anyhow::Error::new(error.clone()))
                    .with_context(|| format!("Failed to read events from {url}"));
            }
            // Stream ended after a successful open: the snapshot is complete.
            StreamEvent::Error(_) => break Ok(()),
            StreamEvent::Message(_) => {}
        }
        controller.handle_stream(message, false, Instant::now());
    };

    if let Some(cancel) = connection {
        cancel.cancel();
    }
    outcome?;

    print!("{}", text::render_registry(controller.registry()));
    Ok(())
}
