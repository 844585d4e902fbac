// ABOUTME: Bidirectional connection that relays updates between two pumpers
// ABOUTME: One routing task forwards left inbox -> right outbox and right inbox -> left outbox

use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::pump::Queue;
use crate::traits::{HasPump, Pumper};
use crate::update::Update;

/// Lifecycle of a [`BidirectionalPumpConnection`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, nothing started
    Idle,
    /// Read, write and routing loops are active
    Running,
    /// Terminal: every loop has been told to stop and the router has exited
    Stopped,
}

/// Connects two pumpers so that whatever one reads, the other writes.
///
/// The routing task is the only place that moves updates between the two
/// pumps, so each side's ordering is preserved. Between sides no order is
/// guaranteed: whichever inbox has an update ready is served, with no priority.
pub struct BidirectionalPumpConnection<L: Pumper, R: Pumper> {
    left: Arc<L>,
    right: Arc<R>,
    state: ConnectionState,
    cancel: CancellationToken,
    router: Option<JoinHandle<()>>,
}

impl<L: Pumper, R: Pumper> BidirectionalPumpConnection<L, R> {
    /// Bind two pumpers without starting anything
    pub fn new(left: Arc<L>, right: Arc<R>) -> Self {
        Self {
            left,
            right,
            state: ConnectionState::Idle,
            cancel: CancellationToken::new(),
            router: None,
        }
    }

    /// Alias of [`new`](Self::new)
    pub fn connect(left: Arc<L>, right: Arc<R>) -> Self {
        Self::new(left, right)
    }

    pub fn left(&self) -> &Arc<L> {
        &self.left
    }

    pub fn right(&self) -> &Arc<R> {
        &self.right
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Start both pumpers' read and write loops and the routing task.
    ///
    /// Returns immediately. Must be called from within a tokio runtime and
    /// only while the connection is idle.
    pub fn go(&mut self) -> Result<()> {
        if self.state != ConnectionState::Idle {
            anyhow::bail!("cannot start a connection that is {:?}", self.state);
        }

        Arc::clone(&self.left).start_read();
        Arc::clone(&self.left).start_write();
        Arc::clone(&self.right).start_read();
        Arc::clone(&self.right).start_write();

        self.router = Some(tokio::spawn(route(
            Arc::clone(&self.left),
            Arc::clone(&self.right),
            self.cancel.clone(),
        )));
        self.state = ConnectionState::Running;

        tracing::info!(
            left = self.left.platform_id(),
            right = self.right.platform_id(),
            "Pumps connected"
        );
        Ok(())
    }

    /// Stop both pumpers' loops and the routing task.
    ///
    /// Waits for the routing task to exit, so nothing is forwarded once this
    /// returns. Read and write loops blocked inside backend I/O finish that
    /// call before they observe the stop. Only valid while running.
    pub async fn stop(&mut self) -> Result<()> {
        if self.state != ConnectionState::Running {
            anyhow::bail!("cannot stop a connection that is {:?}", self.state);
        }
        self.state = ConnectionState::Stopped;

        self.left.stop_read();
        self.left.stop_write();
        self.right.stop_read();
        self.right.stop_write();
        self.cancel.cancel();

        if let Some(router) = self.router.take() {
            router.await.context("Routing task failed")?;
        }

        tracing::info!(
            left = self.left.platform_id(),
            right = self.right.platform_id(),
            "Pumps disconnected"
        );
        Ok(())
    }
}

impl<L: Pumper, R: Pumper> Drop for BidirectionalPumpConnection<L, R> {
    fn drop(&mut self) {
        if self.state == ConnectionState::Running {
            self.left.stop_read();
            self.left.stop_write();
            self.right.stop_read();
            self.right.stop_write();
            self.cancel.cancel();
        }
    }
}

/// Routing loop. Exits only when cancelled.
async fn route<L: HasPump, R: HasPump>(left: Arc<L>, right: Arc<R>, cancel: CancellationToken) {
    let (left_id, right_id) = (left.platform_id(), right.platform_id());
    tracing::debug!(left = left_id, right = right_id, "Routing loop started");

    loop {
        let forwarded = tokio::select! {
            _ = cancel.cancelled() => break,
            Some(update) = left.inbox().pop() => {
                forward(update, right.outbox(), &cancel, left_id, right_id).await
            }
            Some(update) = right.inbox().pop() => {
                forward(update, left.outbox(), &cancel, right_id, left_id).await
            }
        };
        if !forwarded {
            break;
        }
    }

    tracing::debug!(left = left_id, right = right_id, "Routing loop exited");
}

/// Push onto the destination outbox unless cancelled first. Returns whether the
/// routing loop should keep going.
async fn forward(
    update: Update,
    outbox: &Queue,
    cancel: &CancellationToken,
    from: &'static str,
    to: &'static str,
) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        pushed = outbox.push(update) => match pushed {
            Ok(()) => {
                tracing::trace!(from, to, "Update forwarded");
                true
            }
            Err(e) => {
                tracing::error!(from, to, error = %e, "Outbox closed, routing loop exiting");
                false
            }
        },
    }
}
