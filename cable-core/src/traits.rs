// ABOUTME: Pumper contract - the read/write capabilities a backend adapter implements
// ABOUTME: Provides the read and write loops that move updates between a backend and its Pump

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::error::ConversionError;
use crate::pump::{Pump, Queue};
use crate::update::Update;

// =============================================================================
// Pump access
// =============================================================================

/// Anything owning a [`Pump`]. Adapters hold their Pump by composition and
/// expose it here.
pub trait HasPump: Send + Sync + 'static {
    /// Platform identifier used in logs (e.g., "slack", "telegram")
    fn platform_id(&self) -> &'static str;

    fn pump(&self) -> &Pump;

    fn inbox(&self) -> &Queue {
        self.pump().inbox()
    }

    fn outbox(&self) -> &Queue {
        self.pump().outbox()
    }
}

// =============================================================================
// Read side
// =============================================================================

/// Read capability: pulls events from a backend and feeds the inbox.
#[async_trait]
pub trait ReadPumper: HasPump {
    /// Backend event as decoded at the adapter boundary
    type Event: Send + 'static;

    /// Wait for the next backend event. May block indefinitely on backend I/O.
    /// `None` means the event source is gone for good.
    async fn next_event(&self) -> Option<Self::Event>;

    /// Convert a backend event into a canonical update
    async fn to_inbox_update(&self, event: Self::Event) -> Result<Update, ConversionError>;

    /// Spawn the read loop on the current tokio runtime
    fn start_read(self: Arc<Self>)
    where
        Self: Sized,
    {
        tokio::spawn(run_read_loop(self));
    }

    /// Ask the read loop to stop before its next event
    fn stop_read(&self) {
        self.pump().stop_read();
    }
}

// =============================================================================
// Write side
// =============================================================================

/// Write capability: drains the outbox and delivers updates to a backend.
#[async_trait]
pub trait WritePumper: HasPump {
    /// Backend-specific payload ready to be sent
    type Outgoing: Send + 'static;

    /// Convert a canonical update into something this backend can send
    async fn from_outbox_update(&self, update: Update) -> Result<Self::Outgoing, ConversionError>;

    /// Deliver a converted update to the backend
    async fn send(&self, outgoing: Self::Outgoing) -> Result<()>;

    /// Spawn the write loop on the current tokio runtime
    fn start_write(self: Arc<Self>)
    where
        Self: Sized,
    {
        tokio::spawn(run_write_loop(self));
    }

    /// Ask the write loop to stop before its next update
    fn stop_write(&self) {
        self.pump().stop_write();
    }
}

/// A backend adapter that can be attached to a bidirectional connection
pub trait Pumper: ReadPumper + WritePumper {}

impl<T: ReadPumper + WritePumper> Pumper for T {}

// =============================================================================
// Loops
// =============================================================================

/// Read loop: next event -> convert -> inbox, until the read stop signal.
///
/// The stop signal is observed while waiting for an event. A push blocked on a
/// full inbox completes before the loop notices a stop.
pub async fn run_read_loop<P: ReadPumper>(pumper: Arc<P>) {
    let platform = pumper.platform_id();
    tracing::debug!(platform, "Read loop started");

    loop {
        let event = tokio::select! {
            biased;
            _ = pumper.pump().read_stopper().stopped() => {
                tracing::debug!(platform, "Read loop stopped");
                return;
            }
            event = pumper.next_event() => event,
        };

        let Some(event) = event else {
            tracing::warn!(platform, "Event source closed, read loop exiting");
            return;
        };

        match pumper.to_inbox_update(event).await {
            Ok(update) => {
                tracing::debug!(platform, update = %update, "Update received");
                if let Err(e) = pumper.inbox().push(update).await {
                    tracing::error!(platform, error = %e, "Inbox closed, read loop exiting");
                    return;
                }
            }
            Err(e) => log_discarded(platform, "inbound", &e),
        }
    }
}

/// Write loop: outbox -> convert -> send, until the write stop signal.
///
/// A failed conversion or send drops that one update; the loop keeps going.
pub async fn run_write_loop<P: WritePumper>(pumper: Arc<P>) {
    let platform = pumper.platform_id();
    tracing::debug!(platform, "Write loop started");

    loop {
        let update = tokio::select! {
            biased;
            _ = pumper.pump().write_stopper().stopped() => {
                tracing::debug!(platform, "Write loop stopped");
                return;
            }
            update = pumper.outbox().pop() => update,
        };

        let Some(update) = update else {
            tracing::warn!(platform, "Outbox closed, write loop exiting");
            return;
        };

        let outgoing = match pumper.from_outbox_update(update).await {
            Ok(outgoing) => outgoing,
            Err(e) => {
                log_discarded(platform, "outbound", &e);
                continue;
            }
        };

        if let Err(e) = pumper.send(outgoing).await {
            tracing::error!(platform, error = %e, "Failed to send update");
        }
    }
}

fn log_discarded(platform: &str, direction: &str, err: &ConversionError) {
    match err {
        ConversionError::Ignored(_) => {
            tracing::debug!(platform, direction, reason = %err, "Update discarded");
        }
        ConversionError::Unsupported(_) => {
            tracing::warn!(platform, direction, reason = %err, "Update discarded");
        }
    }
}
