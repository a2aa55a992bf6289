use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use ario_gateway_primitives::{Id, NormalizedDataItem};
use parking_lot::Mutex;

use crate::error::BundlesError;

/// A bundle admitted for download, waiting in the admission-controlled
/// download queue (spec §4.5 "Queueing").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleQueueItem {
    pub id: Id,
    pub root_transaction_id: Id,
}

/// A downloaded bundle spooled to `path`, waiting for an unbundle worker.
/// Download and unbundle run as two separate worker pools (spec §4.5
/// "Processing"), so they get independently back-pressured queues.
#[derive(Debug, Clone)]
pub struct ReadyBundle {
    pub id: Id,
    pub root_transaction_id: Id,
    pub path: camino::Utf8PathBuf,
}

/// Back-pressured FIFO: admission pauses once `len >= cap`, and only
/// resumes once `len` falls back to `cap / 2` (spec §4.5 "Back-pressure"),
/// so a brief burst above capacity doesn't flap the admin path between
/// accepting and rejecting bundles.
pub struct BoundedQueue<T> {
    cap: usize,
    inner: Mutex<VecDeque<T>>,
    paused: AtomicBool,
}

impl<T> BoundedQueue<T> {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            inner: Mutex::new(VecDeque::new()),
            paused: AtomicBool::new(false),
        }
    }

    /// Admits `item`, or rejects it with `QueueFull` if at capacity or
    /// still paused from a prior overflow.
    pub fn try_enqueue(&self, item: T) -> Result<(), BundlesError> {
        let mut inner = self.inner.lock();
        if self.paused.load(Ordering::Relaxed) || inner.len() >= self.cap {
            self.paused.store(true, Ordering::Relaxed);
            return Err(BundlesError::QueueFull);
        }
        inner.push_back(item);
        if inner.len() >= self.cap {
            self.paused.store(true, Ordering::Relaxed);
        }
        Ok(())
    }

    pub fn dequeue(&self) -> Option<T> {
        let mut inner = self.inner.lock();
        let item = inner.pop_front();
        if self.paused.load(Ordering::Relaxed) && inner.len() <= self.cap / 2 {
            self.paused.store(false, Ordering::Relaxed);
        }
        item
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }
}

pub type BundleQueue = BoundedQueue<BundleQueueItem>;
pub type ReadyQueue = BoundedQueue<ReadyBundle>;
/// Items that passed `index_filter`, waiting for a batch write to the
/// data-item table (spec §4.5 "Indexing").
pub type DataItemIndexQueue = BoundedQueue<NormalizedDataItem>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pauses_at_cap_and_resumes_at_half_cap() {
        let queue: BoundedQueue<u32> = BoundedQueue::new(4);
        for i in 0..4 {
            queue.try_enqueue(i).unwrap();
        }
        assert!(queue.is_paused());
        assert!(matches!(queue.try_enqueue(4), Err(BundlesError::QueueFull)));

        queue.dequeue();
        assert!(queue.is_paused(), "3 items remain, still above half-cap (2)");

        queue.dequeue();
        assert!(!queue.is_paused(), "resumes exactly at half-cap");
        queue.try_enqueue(5).unwrap();
    }

    #[test]
    fn dequeue_returns_items_in_fifo_order() {
        let queue: BoundedQueue<u32> = BoundedQueue::new(8);
        queue.try_enqueue(1).unwrap();
        queue.try_enqueue(2).unwrap();
        assert_eq!(queue.dequeue(), Some(1));
        assert_eq!(queue.dequeue(), Some(2));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn empty_queue_never_reports_paused_after_a_dequeue() {
        let queue: BoundedQueue<u32> = BoundedQueue::new(2);
        assert!(queue.dequeue().is_none());
        assert!(!queue.is_paused());
    }
}
