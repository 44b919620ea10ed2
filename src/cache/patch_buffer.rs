//! Buffered write-back queue for locally patched entries.
//!
//! `add_patch` publishes one batch per call; whatever flush policy the
//! embedding application runs drains the queue in FIFO order. A full buffer
//! refuses new batches instead of dropping queued ones, so every patch shown
//! locally is eventually offered to the server.

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use metrics::gauge;
use tracing::{info, warn};

use crate::domain::PatchBatch;

use super::lock;

const SOURCE: &str = "cache::patch_buffer";
pub(crate) const METRIC_PATCH_BUFFER_LEN: &str = "hypercache_patch_buffer_len";

/// Result of [`PatchBuffer::publish_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Publish {
    Queued { key: String, seq: u64 },
    /// The batch builder produced nothing.
    Skipped,
    /// The buffer is at its limit; the batch builder was not run.
    Full,
}

pub struct PatchBuffer {
    queue: Mutex<VecDeque<PatchBatch>>,
    limit: NonZeroUsize,
}

impl PatchBuffer {
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            limit,
        }
    }

    /// Enqueue a batch if there is room.
    pub fn publish(&self, batch: PatchBatch) -> bool {
        matches!(self.publish_with(|| Some(batch)), Publish::Queued { .. })
    }

    /// Reserve a slot, then build the batch with `make` and enqueue it.
    ///
    /// `make` runs under the queue lock, so no other publisher can take the
    /// slot in between. It must not touch this buffer.
    pub fn publish_with(&self, make: impl FnOnce() -> Option<PatchBatch>) -> Publish {
        let mut queue = lock::lock(&self.queue, SOURCE, "publish");
        if queue.len() >= self.limit.get() {
            warn!(
                queued = queue.len(),
                limit = self.limit.get(),
                "patch buffer full; refusing batch"
            );
            return Publish::Full;
        }
        let Some(batch) = make() else {
            return Publish::Skipped;
        };
        info!(
            key = %batch.key,
            seq = batch.seq,
            operations = batch.operations.len(),
            "patch batch buffered"
        );
        let outcome = Publish::Queued {
            key: batch.key.clone(),
            seq: batch.seq,
        };
        queue.push_back(batch);
        gauge!(METRIC_PATCH_BUFFER_LEN).set(queue.len() as f64);
        outcome
    }

    /// Take up to `limit` batches, oldest first.
    pub fn drain(&self, limit: usize) -> Vec<PatchBatch> {
        let mut queue = lock::lock(&self.queue, SOURCE, "drain");
        let count = limit.min(queue.len());
        let drained: Vec<PatchBatch> = queue.drain(..count).collect();
        gauge!(METRIC_PATCH_BUFFER_LEN).set(queue.len() as f64);
        drained
    }

    /// Put batches back at the front, keeping their order. Used when a
    /// write-back attempt fails.
    ///
    /// Nothing is dropped, even if batches published meanwhile leave the
    /// queue over its limit; `publish` refuses until it drains again.
    pub fn requeue(&self, batches: Vec<PatchBatch>) {
        let mut queue = lock::lock(&self.queue, SOURCE, "requeue");
        for batch in batches.into_iter().rev() {
            queue.push_front(batch);
        }
        gauge!(METRIC_PATCH_BUFFER_LEN).set(queue.len() as f64);
    }

    pub fn len(&self) -> usize {
        lock::lock(&self.queue, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::panic::{AssertUnwindSafe, catch_unwind};

    use super::*;

    fn batch(key: &str, seq: u64) -> PatchBatch {
        PatchBatch {
            key: key.to_string(),
            seq,
            operations: Vec::new(),
            queued_at: 0,
        }
    }

    fn buffer(limit: usize) -> PatchBuffer {
        PatchBuffer::new(NonZeroUsize::new(limit).expect("non-zero"))
    }

    #[test]
    fn drains_in_fifo_order() {
        let buffer = buffer(8);
        buffer.publish(batch("/a", 1));
        buffer.publish(batch("/b", 2));
        buffer.publish(batch("/a", 3));

        let drained = buffer.drain(2);
        assert_eq!(drained.iter().map(|b| b.seq).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn full_buffer_refuses_new_batches() {
        let buffer = buffer(2);
        assert!(buffer.publish(batch("/a", 1)));
        assert!(buffer.publish(batch("/a", 2)));
        assert!(!buffer.publish(batch("/a", 3)));

        let mut built = false;
        let outcome = buffer.publish_with(|| {
            built = true;
            Some(batch("/b", 4))
        });
        assert_eq!(outcome, Publish::Full);
        assert!(!built);

        let drained = buffer.drain(10);
        assert_eq!(drained.iter().map(|b| b.seq).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn skipped_batch_takes_no_slot() {
        let buffer = buffer(1);
        assert_eq!(buffer.publish_with(|| None), Publish::Skipped);
        assert_eq!(
            buffer.publish_with(|| Some(batch("/a", 1))),
            Publish::Queued {
                key: "/a".to_string(),
                seq: 1
            }
        );
    }

    #[test]
    fn requeue_restores_front() {
        let buffer = buffer(8);
        buffer.publish(batch("/a", 1));
        buffer.publish(batch("/b", 2));
        buffer.publish(batch("/c", 3));

        let first_two = buffer.drain(2);
        buffer.requeue(first_two);
        let all = buffer.drain(10);
        assert_eq!(all.iter().map(|b| b.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn requeue_never_drops_batches() {
        let buffer = buffer(2);
        buffer.publish(batch("/a", 1));
        buffer.publish(batch("/a", 2));
        let failed = buffer.drain(2);
        buffer.publish(batch("/b", 3));
        buffer.publish(batch("/b", 4));

        buffer.requeue(failed);
        assert_eq!(buffer.len(), 4);
        assert!(!buffer.publish(batch("/c", 5)));
        let all = buffer.drain(10);
        assert_eq!(all.iter().map(|b| b.seq).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn recovers_from_poisoned_lock() {
        let buffer = buffer(4);
        let _ = catch_unwind(AssertUnwindSafe(|| {
            let _guard = buffer.queue.lock().expect("queue lock");
            panic!("poison queue lock");
        }));

        buffer.publish(batch("/a", 1));
        assert_eq!(buffer.len(), 1);
    }
}
