//! Live progress lines printed while a question is being answered.

use std::sync::Arc;

use agentrelay_core::event::{DomainEvent, EventBus};
use nu_ansi_term::Color;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

/// One line per delegation and per finished capability, on stderr.
pub fn describe(event: &DomainEvent, colored: bool) -> Option<String> {
    let paint = |color: Color, text: String| {
        if colored {
            color.paint(text).to_string()
        } else {
            text
        }
    };
    match event {
        DomainEvent::AgentDelegated {
            agent, task_preview, ..
        } => Some(paint(
            Color::Cyan,
            format!("  → delegating to {agent}: \"{task_preview}\""),
        )),
        DomainEvent::CapabilityFinished {
            capability,
            success,
            status_message,
            duration_ms,
            ..
        } => {
            let (symbol, color) = if *success {
                ("✓", Color::Green)
            } else {
                ("✗", Color::Red)
            };
            Some(paint(
                color,
                format!("  {symbol} {capability} ({duration_ms} ms): {status_message}"),
            ))
        }
        _ => None,
    }
}

/// Print progress until the bus is dropped or the task is aborted.
pub fn spawn(events: Arc<EventBus>, colored: bool) -> JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(line) = describe(&event, colored) {
                        eprintln!("{line}");
                    }
                }
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    })
}
