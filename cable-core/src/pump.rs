// ABOUTME: Pump - the inbox/outbox queue pair and stop signals of one backend connection
// ABOUTME: Queues are bounded FIFOs that apply backpressure instead of dropping updates

use anyhow::{anyhow, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify};

use crate::update::Update;

/// Number of updates that can be enqueued in an inbox or outbox
pub const DEFAULT_BUFFER_SIZE: usize = 100;

/// Bounded FIFO queue of updates.
///
/// Cloning a `Queue` yields another handle to the same queue. Any handle can
/// push; consumers take turns on the receiving end, so each update is popped
/// exactly once.
#[derive(Debug, Clone)]
pub struct Queue {
    tx: mpsc::Sender<Update>,
    rx: Arc<Mutex<mpsc::Receiver<Update>>>,
}

impl Queue {
    /// Create a queue holding at most `capacity` updates (at least one)
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    /// Enqueue an update, waiting while the queue is full
    pub async fn push(&self, update: Update) -> Result<()> {
        self.tx
            .send(update)
            .await
            .map_err(|_| anyhow!("queue receiver dropped"))
    }

    /// Dequeue the oldest update, waiting while the queue is empty.
    ///
    /// Cancel safe: if the future is dropped before completing, no update is lost.
    pub async fn pop(&self) -> Option<Update> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }

    /// Dequeue the oldest update if one is ready and no other consumer is waiting
    pub fn try_pop(&self) -> Option<Update> {
        let mut rx = self.rx.try_lock().ok()?;
        rx.try_recv().ok()
    }

    /// Number of updates currently enqueued
    pub fn len(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.tx.max_capacity()
    }
}

/// Single-shot stop request for one loop.
///
/// A signal sent while nobody waits is kept and consumed by the next waiter, so
/// a loop that starts after `signal()` stops on its first iteration.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<Notify>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the waiting (or next) loop to stop
    pub fn signal(&self) {
        self.0.notify_one();
    }

    /// Resolves once a stop has been requested
    pub async fn stopped(&self) {
        self.0.notified().await;
    }
}

/// Inbox and outbox of one backend connection, plus the stop signals of its
/// read and write loops. A Pump does no processing on its own.
#[derive(Debug)]
pub struct Pump {
    inbox: Queue,
    outbox: Queue,
    read_stopper: StopSignal,
    write_stopper: StopSignal,
}

impl Pump {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inbox: Queue::new(capacity),
            outbox: Queue::new(capacity),
            read_stopper: StopSignal::new(),
            write_stopper: StopSignal::new(),
        }
    }

    /// Updates read from the backend, waiting to be routed
    pub fn inbox(&self) -> &Queue {
        &self.inbox
    }

    /// Updates routed from the counterpart, waiting to be written to the backend
    pub fn outbox(&self) -> &Queue {
        &self.outbox
    }

    pub fn read_stopper(&self) -> &StopSignal {
        &self.read_stopper
    }

    pub fn write_stopper(&self) -> &StopSignal {
        &self.write_stopper
    }

    /// Stop the read loop. Call at most once per running loop.
    pub fn stop_read(&self) {
        self.read_stopper.signal();
    }

    /// Stop the write loop. Call at most once per running loop.
    pub fn stop_write(&self) {
        self.write_stopper.signal();
    }
}

impl Default for Pump {
    fn default() -> Self {
        Self::new()
    }
}
