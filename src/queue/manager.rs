//! Queue Manager / Dispatcher (spec.md §4.4, component C4).
//!
//! Three priority lanes guarded by a single mutex, plus a long-lived
//! periodic tick task that forms batches and hands them to a
//! [`BatchHandler`] without ever awaiting it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::priority::Priority;
use crate::queue::item::{CompletionReceiver, QueueItem};
use crate::queue::lane::{Batch, Lane};

/// Tick period for the dispatcher loop (spec.md §4.4): a refinement
/// granularity, not a correctness bound — actual dispatch latency is
/// bounded above by `window + tick + queuing jitter`.
pub const DISPATCH_TICK: Duration = Duration::from_millis(50);

/// Receives a ready batch and settles every item in it. Never allowed to
/// panic the dispatcher task; implementations must themselves guarantee
/// every handle is settled before returning (spec.md §4.3).
#[async_trait]
pub trait BatchHandler: Send + Sync + 'static {
    async fn process(&self, batch: Batch);
}

struct Lanes {
    high: Lane,
    medium: Lane,
    low: Lane,
}

impl Lanes {
    fn new() -> Self {
        Self {
            high: Lane::new(Priority::High),
            medium: Lane::new(Priority::Medium),
            low: Lane::new(Priority::Low),
        }
    }

    fn lane_mut(&mut self, priority: Priority) -> &mut Lane {
        match priority {
            Priority::High => &mut self.high,
            Priority::Medium => &mut self.medium,
            Priority::Low => &mut self.low,
        }
    }
}

/// Entry point for new requests; owns the dispatcher's background task.
pub struct QueueManager {
    lanes: Arc<Mutex<Lanes>>,
    dispatcher: JoinHandle<()>,
}

impl QueueManager {
    /// Start the dispatcher loop against `handler`, ticking every
    /// [`DISPATCH_TICK`].
    pub fn new(handler: Arc<dyn BatchHandler>) -> Self {
        Self::with_tick(handler, DISPATCH_TICK)
    }

    /// Start the dispatcher loop with an overridden tick period — for tests
    /// that need tighter bounds than the production 50ms tick.
    pub fn with_tick(handler: Arc<dyn BatchHandler>, tick: Duration) -> Self {
        let lanes = Arc::new(Mutex::new(Lanes::new()));
        let dispatcher = tokio::spawn(dispatcher_loop(Arc::clone(&lanes), handler, tick));
        Self { lanes, dispatcher }
    }

    /// Park `request` on its lane and return a receiver the caller awaits.
    /// Never suspends while holding the lane mutex.
    pub async fn enqueue(&self, request: crate::model::GenerationRequest) -> CompletionReceiver {
        let priority = request.priority;
        let request_id = request.request_id.clone();
        let (item, rx) = QueueItem::new(request);

        let mut lanes = self.lanes.lock().await;
        lanes.lane_mut(priority).push(item);
        let lane_len = lanes.lane_mut(priority).len();
        drop(lanes);

        debug!(request_id, %priority, lane_len, "request added to lane queue");

        rx
    }
}

impl Drop for QueueManager {
    fn drop(&mut self) {
        // The core has no flush-on-shutdown obligation (spec.md §5); outstanding
        // handles may remain unsettled. We do stop the dispatcher task itself so
        // it doesn't keep running past the manager's lifetime.
        self.dispatcher.abort();
    }
}

async fn dispatcher_loop(lanes: Arc<Mutex<Lanes>>, handler: Arc<dyn BatchHandler>, tick: Duration) {
    let mut interval = tokio::time::interval(tick);
    loop {
        interval.tick().await;
        dispatch_once(&lanes, &handler).await;
    }
}

async fn dispatch_once(lanes: &Arc<Mutex<Lanes>>, handler: &Arc<dyn BatchHandler>) {
    let now = Utc::now();
    let mut ready: Vec<Batch> = Vec::new();

    {
        let mut lanes = lanes.lock().await;
        // HIGH before MEDIUM before LOW is a soft bias only — no real
        // priority-inversion guarantee across lanes (spec.md §4.4).
        for priority in [Priority::High, Priority::Medium, Priority::Low] {
            if let Some(batch) = lanes.lane_mut(priority).try_dispatch(now) {
                ready.push(batch);
            }
        }
    } // mutex released before any processing or spawn — never held across I/O.

    for batch in ready {
        let priority = batch[0].request.priority;
        info!(n = batch.len(), %priority, "dispatching batch");
        let handler = Arc::clone(handler);
        tokio::spawn(async move { handler.process(batch).await });
    }
}
