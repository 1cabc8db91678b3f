//! A single in-flight request parked on a lane, plus its completion handle.

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::error::Error;
use crate::model::{GenerationRequest, GenerationResponse};

/// The caller's single-shot rendezvous: settled exactly once, with either a
/// response or an error. Dropping the receiver marks the request cancelled;
/// the processor checks for that before settling and never treats it as an
/// error (spec.md §5, Cancellation).
pub type CompletionHandle = oneshot::Sender<Result<GenerationResponse, Error>>;

/// What the caller awaits after `enqueue`.
pub type CompletionReceiver = oneshot::Receiver<Result<GenerationResponse, Error>>;

/// One in-flight request, owned by exactly one lane until dequeued into a batch.
pub struct QueueItem {
    pub request: GenerationRequest,
    pub completion: CompletionHandle,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(request: GenerationRequest) -> (Self, CompletionReceiver) {
        let (tx, rx) = oneshot::channel();
        let item = Self {
            request,
            completion: tx,
            enqueued_at: Utc::now(),
        };
        (item, rx)
    }

    /// Settle the handle, silently skipping if the caller already cancelled
    /// (dropped the receiver) or if it was otherwise already settled.
    pub fn settle(self, outcome: Result<GenerationResponse, Error>) {
        let _ = self.completion.send(outcome);
    }
}
