// ABOUTME: Tests for BidirectionalPumpConnection routing and lifecycle
// ABOUTME: Uses fake pumpers whose read/write loops are no-ops so queues can be inspected

use async_trait::async_trait;
use cable_core::{
    Author, BidirectionalPumpConnection, ConnectionState, Contents, ConversionError, HasPump,
    Message, Pump, ReadPumper, Update, WritePumper,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Pumper that never touches a backend. Starting its loops only counts calls,
/// so everything routed to its outbox stays there for the test to read.
struct FakePumper {
    id: &'static str,
    pump: Pump,
    read_starts: AtomicUsize,
    write_starts: AtomicUsize,
}

impl FakePumper {
    fn new(id: &'static str) -> Arc<Self> {
        Arc::new(Self {
            id,
            pump: Pump::new(),
            read_starts: AtomicUsize::new(0),
            write_starts: AtomicUsize::new(0),
        })
    }
}

impl HasPump for FakePumper {
    fn platform_id(&self) -> &'static str {
        self.id
    }

    fn pump(&self) -> &Pump {
        &self.pump
    }
}

#[async_trait]
impl ReadPumper for FakePumper {
    type Event = Update;

    async fn next_event(&self) -> Option<Update> {
        std::future::pending().await
    }

    async fn to_inbox_update(&self, event: Update) -> Result<Update, ConversionError> {
        Ok(event)
    }

    fn start_read(self: Arc<Self>) {
        self.read_starts.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl WritePumper for FakePumper {
    type Outgoing = Update;

    async fn from_outbox_update(&self, update: Update) -> Result<Update, ConversionError> {
        Ok(update)
    }

    async fn send(&self, _outgoing: Update) -> anyhow::Result<()> {
        Ok(())
    }

    fn start_write(self: Arc<Self>) {
        self.write_starts.fetch_add(1, Ordering::SeqCst);
    }
}

fn message(alias: &str, text: &str) -> Update {
    Update::Message(Message::new(Author::new("", alias), Contents::new(text)))
}

fn raw(update: &Update) -> String {
    update
        .as_message()
        .map(|m| m.contents().raw().to_string())
        .unwrap_or_default()
}

async fn next(queue: &cable_core::Queue) -> Update {
    tokio::time::timeout(Duration::from_secs(2), queue.pop())
        .await
        .expect("timed out waiting for a routed update")
        .expect("queue closed")
}

#[tokio::test]
async fn test_new_connection_is_idle() {
    let conn = BidirectionalPumpConnection::new(FakePumper::new("left"), FakePumper::new("right"));
    assert_eq!(conn.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_relays_in_both_directions() {
    let left = FakePumper::new("left");
    let right = FakePumper::new("right");
    let mut conn = BidirectionalPumpConnection::connect(left.clone(), right.clone());
    conn.go().unwrap();

    left.inbox().push(message("left-side", "Fed into left")).await.unwrap();
    right.inbox().push(message("right-side", "Fed into right")).await.unwrap();

    let from_left = next(right.outbox()).await;
    assert_eq!(raw(&from_left), "Fed into left");
    assert_eq!(from_left.to_string(), "left-side: Fed into left");

    let from_right = next(left.outbox()).await;
    assert_eq!(raw(&from_right), "Fed into right");

    conn.stop().await.unwrap();
}

#[tokio::test]
async fn test_go_starts_both_loops_on_both_sides() {
    let left = FakePumper::new("left");
    let right = FakePumper::new("right");
    let mut conn = BidirectionalPumpConnection::new(left.clone(), right.clone());
    conn.go().unwrap();

    assert_eq!(conn.state(), ConnectionState::Running);
    for side in [&left, &right] {
        assert_eq!(side.read_starts.load(Ordering::SeqCst), 1);
        assert_eq!(side.write_starts.load(Ordering::SeqCst), 1);
    }

    conn.stop().await.unwrap();
}

#[tokio::test]
async fn test_preserves_order_per_side() {
    let left = FakePumper::new("left");
    let right = FakePumper::new("right");
    let mut conn = BidirectionalPumpConnection::new(left.clone(), right.clone());
    conn.go().unwrap();

    left.inbox().push(message("a", "m1")).await.unwrap();
    left.inbox().push(message("a", "m2")).await.unwrap();
    left.inbox().push(message("a", "m3")).await.unwrap();

    assert_eq!(raw(&next(right.outbox()).await), "m1");
    assert_eq!(raw(&next(right.outbox()).await), "m2");
    assert_eq!(raw(&next(right.outbox()).await), "m3");

    conn.stop().await.unwrap();
}

#[tokio::test]
async fn test_nothing_is_forwarded_after_stop() {
    let left = FakePumper::new("left");
    let right = FakePumper::new("right");
    let mut conn = BidirectionalPumpConnection::new(left.clone(), right.clone());
    conn.go().unwrap();
    conn.stop().await.unwrap();
    assert_eq!(conn.state(), ConnectionState::Stopped);

    left.inbox().push(message("late", "after stop")).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(right.outbox().try_pop().is_none());
    assert_eq!(left.inbox().len(), 1, "update should remain unrouted in the inbox");
}

#[tokio::test]
async fn test_stop_signals_both_pumpers() {
    let left = FakePumper::new("left");
    let right = FakePumper::new("right");
    let mut conn = BidirectionalPumpConnection::new(left.clone(), right.clone());
    conn.go().unwrap();
    conn.stop().await.unwrap();

    for side in [&left, &right] {
        for stopper in [side.pump().read_stopper(), side.pump().write_stopper()] {
            tokio::time::timeout(Duration::from_secs(1), stopper.stopped())
                .await
                .expect("stop signal should have been sent");
        }
    }
}

#[tokio::test]
async fn test_second_stop_is_rejected() {
    let mut conn = BidirectionalPumpConnection::new(FakePumper::new("l"), FakePumper::new("r"));
    conn.go().unwrap();
    conn.stop().await.unwrap();
    assert!(conn.stop().await.is_err());
    assert_eq!(conn.state(), ConnectionState::Stopped);
}

#[tokio::test]
async fn test_stop_before_go_is_rejected() {
    let mut conn = BidirectionalPumpConnection::new(FakePumper::new("l"), FakePumper::new("r"));
    assert!(conn.stop().await.is_err());
    assert_eq!(conn.state(), ConnectionState::Idle);
}

#[tokio::test]
async fn test_go_twice_is_rejected() {
    let left = FakePumper::new("l");
    let mut conn = BidirectionalPumpConnection::new(left.clone(), FakePumper::new("r"));
    conn.go().unwrap();
    assert!(conn.go().is_err());
    assert_eq!(left.read_starts.load(Ordering::SeqCst), 1);
    conn.stop().await.unwrap();
    assert!(conn.go().is_err(), "a stopped connection cannot be restarted");
}

#[tokio::test]
async fn test_router_keeps_routing_when_one_outbox_is_full() {
    let left = FakePumper::new("left");
    let right = FakePumper::new("right");
    let mut conn = BidirectionalPumpConnection::new(left.clone(), right.clone());
    conn.go().unwrap();

    // Fill right's outbox without draining it, then stop: stop must still return.
    for i in 0..(cable_core::DEFAULT_BUFFER_SIZE + 5) {
        left.inbox().push(message("flood", &i.to_string())).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(right.outbox().len(), cable_core::DEFAULT_BUFFER_SIZE);

    tokio::time::timeout(Duration::from_secs(2), conn.stop())
        .await
        .expect("stop should not hang on a full outbox")
        .unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_traffic_is_split_and_ordered() {
    const TOTAL: usize = 1000;
    let left = FakePumper::new("left");
    let right = FakePumper::new("right");
    let mut conn = BidirectionalPumpConnection::new(left.clone(), right.clone());
    conn.go().unwrap();

    let drain = |queue: cable_core::Queue| {
        tokio::spawn(async move {
            let mut received = Vec::with_capacity(TOTAL / 2);
            for _ in 0..TOTAL / 2 {
                received.push(raw(&next(&queue).await));
            }
            received
        })
    };
    let right_drain = drain(right.outbox().clone());
    let left_drain = drain(left.outbox().clone());

    let (left_in, right_in) = (left.inbox().clone(), right.inbox().clone());
    let producer = tokio::spawn(async move {
        for i in 0..TOTAL {
            if i % 2 == 0 {
                left_in.push(message("left", &format!("left-{}", i))).await.unwrap();
            } else {
                right_in.push(message("right", &format!("right-{}", i))).await.unwrap();
            }
        }
    });

    tokio::time::timeout(Duration::from_secs(10), producer)
        .await
        .expect("producer timed out")
        .unwrap();
    let at_right = right_drain.await.unwrap();
    let at_left = left_drain.await.unwrap();

    let expected_right: Vec<String> = (0..TOTAL).step_by(2).map(|i| format!("left-{}", i)).collect();
    let expected_left: Vec<String> = (1..TOTAL).step_by(2).map(|i| format!("right-{}", i)).collect();
    assert_eq!(at_right, expected_right);
    assert_eq!(at_left, expected_left);
    assert!(right.outbox().is_empty());
    assert!(left.outbox().is_empty());

    conn.stop().await.unwrap();
}
