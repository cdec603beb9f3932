//! Bounded handoff queues between producer and render threads
//!
//! Each queue carries whole owned values; a failed push returns the
//! value so the caller keeps ownership and can route it elsewhere.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

/// Bounded FIFO with blocking and timed operations on both ends
pub struct HandoffQueue<T> {
    inner: Mutex<VecDeque<T>>,
    capacity: usize,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> HandoffQueue<T> {
    /// Create a queue holding at most `capacity` items
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "handoff queue capacity must be positive");
        Self {
            inner: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Push without waiting; returns the item back if the queue is full
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut queue = self.inner.lock().unwrap();
        if queue.len() >= self.capacity {
            return Err(item);
        }
        queue.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Push, waiting until space is available
    pub fn push_blocking(&self, item: T) {
        let mut queue = self.inner.lock().unwrap();
        while queue.len() >= self.capacity {
            queue = self.not_full.wait(queue).unwrap();
        }
        queue.push_back(item);
        self.not_empty.notify_one();
    }

    /// Push, waiting up to `timeout` for space; returns the item back on
    /// timeout
    pub fn push_timeout(&self, item: T, timeout: Duration) -> Result<(), T> {
        let mut queue = self.inner.lock().unwrap();
        while queue.len() >= self.capacity {
            let (guard, result) = self.not_full.wait_timeout(queue, timeout).unwrap();
            queue = guard;
            if result.timed_out() && queue.len() >= self.capacity {
                return Err(item);
            }
        }
        queue.push_back(item);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Pop without waiting
    pub fn try_pop(&self) -> Option<T> {
        let mut queue = self.inner.lock().unwrap();
        let item = queue.pop_front();
        if item.is_some() {
            self.not_full.notify_one();
        }
        item
    }

    /// Pop, waiting until an item arrives
    pub fn pop_blocking(&self) -> T {
        let mut queue = self.inner.lock().unwrap();
        loop {
            if let Some(item) = queue.pop_front() {
                self.not_full.notify_one();
                return item;
            }
            queue = self.not_empty.wait(queue).unwrap();
        }
    }

    /// Pop, waiting up to `timeout` for an item
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut queue = self.inner.lock().unwrap();
        loop {
            if let Some(item) = queue.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            let (guard, result) = self.not_empty.wait_timeout(queue, timeout).unwrap();
            queue = guard;
            if result.timed_out() {
                let item = queue.pop_front();
                if item.is_some() {
                    self.not_full.notify_one();
                }
                return item;
            }
        }
    }

    /// Current number of queued items
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    /// Whether the queue holds no items
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn preserves_fifo_order() {
        let queue = HandoffQueue::new(4);
        for i in 0..4 {
            queue.try_push(i).unwrap();
        }
        for i in 0..4 {
            assert_eq!(queue.try_pop(), Some(i));
        }
        assert!(queue.try_pop().is_none());
    }

    #[test]
    fn try_push_returns_item_when_full() {
        let queue = HandoffQueue::new(1);
        queue.try_push("a").unwrap();
        assert_eq!(queue.try_push("b"), Err("b"));
        assert_eq!(queue.try_pop(), Some("a"));
        queue.try_push("b").unwrap();
    }

    #[test]
    fn push_timeout_times_out_when_full() {
        let queue = HandoffQueue::new(1);
        queue.try_push(1).unwrap();
        let result = queue.push_timeout(2, Duration::from_millis(1));
        assert_eq!(result, Err(2));
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn pop_timeout_returns_none_on_empty() {
        let queue: HandoffQueue<u32> = HandoffQueue::new(2);
        assert!(queue.pop_timeout(Duration::from_millis(1)).is_none());
    }

    #[test]
    fn blocking_push_unblocks_when_consumer_drains() {
        let queue = Arc::new(HandoffQueue::new(1));
        queue.try_push(0u32).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push_blocking(1))
        };
        // Drain the head; the blocked producer must complete.
        assert_eq!(queue.pop_blocking(), 0);
        producer.join().unwrap();
        assert_eq!(queue.pop_blocking(), 1);
    }

    #[test]
    fn pop_blocking_receives_cross_thread_items() {
        let queue = Arc::new(HandoffQueue::new(2));
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                for i in 0..8u32 {
                    queue.push_blocking(i);
                }
            })
        };
        for i in 0..8u32 {
            assert_eq!(queue.pop_blocking(), i);
        }
        producer.join().unwrap();
    }
}
