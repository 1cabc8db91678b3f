//! A single priority lane: a FIFO of [`QueueItem`]s plus the age-or-size
//! dispatch rule (spec.md §4.4).

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::priority::Priority;
use crate::queue::item::QueueItem;

/// An ordered, same-priority prefix drained from one lane. Position *i* is the
/// authoritative index mapping to and from the upstream call, regardless of
/// any `index` field the upstream echoes back (spec.md §3 invariants).
pub type Batch = Vec<QueueItem>;

/// One priority's FIFO queue and its dispatch bookkeeping.
pub struct Lane {
    priority: Priority,
    items: VecDeque<QueueItem>,
}

impl Lane {
    pub fn new(priority: Priority) -> Self {
        Self {
            priority,
            items: VecDeque::new(),
        }
    }

    pub fn push(&mut self, item: QueueItem) {
        self.items.push_back(item);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Pop a batch if the lane's head has aged past its window, or the lane
    /// has reached its size cap — whichever comes first. Returns `None` if
    /// neither condition holds (or the lane is empty).
    pub fn try_dispatch(&mut self, now: DateTime<Utc>) -> Option<Batch> {
        let head = self.items.front()?;
        let params = self.priority.lane_params();
        let age = age_of(head.enqueued_at, now);

        if age >= params.window || self.items.len() >= params.max_batch {
            let take = params.max_batch.min(self.items.len());
            let batch: Batch = self.items.drain(..take).collect();
            Some(batch)
        } else {
            None
        }
    }
}

fn age_of(enqueued_at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (now - enqueued_at)
        .to_std()
        .unwrap_or(Duration::from_secs(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GenerationRequest;

    fn push_request(lane: &mut Lane, priority: Priority) {
        let req = GenerationRequest::new("u", "r", "p", priority);
        let (item, _rx) = QueueItem::new(req);
        lane.push(item);
    }

    #[test]
    fn empty_lane_never_dispatches() {
        let mut lane = Lane::new(Priority::High);
        assert!(lane.try_dispatch(Utc::now()).is_none());
    }

    #[test]
    fn single_old_head_dispatches_size_one_batch() {
        let mut lane = Lane::new(Priority::High);
        push_request(&mut lane, Priority::High);
        let future = Utc::now() + chrono::Duration::milliseconds(250);
        let batch = lane.try_dispatch(future).expect("should dispatch");
        assert_eq!(batch.len(), 1);
        assert!(lane.is_empty());
    }

    #[test]
    fn fresh_head_below_cap_does_not_dispatch() {
        let mut lane = Lane::new(Priority::Medium);
        push_request(&mut lane, Priority::Medium);
        assert!(lane.try_dispatch(Utc::now()).is_none());
    }

    #[test]
    fn reaching_cap_dispatches_immediately_regardless_of_age() {
        let mut lane = Lane::new(Priority::High);
        for _ in 0..6 {
            push_request(&mut lane, Priority::High);
        }
        let batch = lane.try_dispatch(Utc::now()).expect("cap reached");
        assert_eq!(batch.len(), 6);
    }

    #[test]
    fn burst_beyond_cap_leaves_remainder_queued() {
        let mut lane = Lane::new(Priority::High);
        for _ in 0..9 {
            push_request(&mut lane, Priority::High);
        }
        let batch = lane.try_dispatch(Utc::now()).expect("cap reached");
        assert_eq!(batch.len(), 6);
        assert_eq!(lane.len(), 3);
    }
}
