//! Priority lanes and the dispatcher that drains them into batches.

mod item;
mod lane;
mod manager;

pub use item::{CompletionHandle, CompletionReceiver, QueueItem};
pub use lane::{Batch, Lane};
pub use manager::{BatchHandler, QueueManager, DISPATCH_TICK};
