//! Notification sinks and the dispatcher that feeds them.
//!
//! Each sink call is isolated: a failing sink is logged and never blocks the
//! other sink or aborts the poll cycle. Delivery is at-most-once — by the
//! time the dispatcher runs, the state store has already committed the diff,
//! so a lost message is lost (see DESIGN.md for the tradeoff).

pub mod chat;
pub mod format;
pub mod social;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::types::NotificationEvent;

#[derive(Debug, Error)]
pub enum SinkError {
    /// Transport-level delivery failure (after internal retries).
    #[error("delivery failed: {0}")]
    Delivery(String),

    /// The configured channel does not resolve (deleted, no permission).
    /// Non-fatal: logged and the cycle continues.
    #[error("channel unavailable: {0}")]
    Channel(String),

    /// The social sink has no usable persisted session.
    #[error("no authenticated session: {0}")]
    Session(String),
}

/// A delivery target for disruption events.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    fn name(&self) -> &'static str;
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), SinkError>;
}

/// Fans each event out to every configured sink, isolating failures.
pub struct Dispatcher {
    sinks: Vec<std::sync::Arc<dyn NotificationSink>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    pub fn push(&mut self, sink: std::sync::Arc<dyn NotificationSink>) {
        self.sinks.push(sink);
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Deliver `events` in order to every sink. Sink errors are logged and
    /// swallowed here — the cycle result does not depend on delivery.
    pub async fn dispatch(&self, events: &[NotificationEvent]) {
        if events.is_empty() || self.sinks.is_empty() {
            return;
        }
        info!(
            "dispatcher: delivering {} event(s) to {} sink(s)",
            events.len(),
            self.sinks.len()
        );
        for event in events {
            for sink in &self.sinks {
                if let Err(e) = sink.deliver(event).await {
                    warn!(
                        "dispatcher: {} failed for '{}': {}",
                        sink.name(),
                        event.record.id,
                        e
                    );
                }
            }
        }
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}
