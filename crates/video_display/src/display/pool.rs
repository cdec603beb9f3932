//! Slot pool: reuse first, wait briefly, then grow
//!
//! Acquisition order is a local free list, then a timed wait on the
//! queue of slots the render thread has released, then a grow-by-one
//! allocation. Under a steady frame rate the pool size converges: once
//! enough slots circulate, the timed wait succeeds before growth is
//! ever reached again.

use std::time::Duration;

use log::debug;

use crate::display::backend::SlotImage;
use crate::display::queue::HandoffQueue;
use crate::display::slot::FrameSlot;

/// Pool of frame slots owned by the producer side
pub struct SlotPool<I: SlotImage> {
    local_free: Vec<FrameSlot<I>>,
    next_id: u32,
    total: usize,
}

impl<I: SlotImage> SlotPool<I> {
    /// Create a pool with `initial` empty slots on the local free list
    pub fn new(initial: usize) -> Self {
        let local_free = (0..initial as u32).map(FrameSlot::empty).collect();
        Self {
            local_free,
            next_id: initial as u32,
            total: initial,
        }
    }

    /// Acquire a slot: local free list, then a timed wait on `released`,
    /// then growth
    pub fn take(
        &mut self,
        released: &HandoffQueue<FrameSlot<I>>,
        wait: Duration,
    ) -> FrameSlot<I> {
        if let Some(slot) = self.local_free.pop() {
            return slot;
        }
        if let Some(slot) = released.pop_timeout(wait) {
            return slot;
        }
        self.grow()
    }

    /// Return a slot to the local free list without crossing threads
    pub fn release_local(&mut self, slot: FrameSlot<I>) {
        self.local_free.push(slot);
    }

    /// Allocate one new empty slot
    fn grow(&mut self) -> FrameSlot<I> {
        let slot = FrameSlot::empty(self.next_id);
        self.next_id += 1;
        self.total += 1;
        debug!("slot pool grown to {} slots", self.total);
        slot
    }

    /// Total slots ever allocated and still owned somewhere
    pub fn total(&self) -> usize {
        self.total
    }

    /// Drain the local free list for teardown
    pub fn drain_local(&mut self) -> Vec<FrameSlot<I>> {
        std::mem::take(&mut self.local_free)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::mock::MockSlotImage;

    fn queue() -> HandoffQueue<FrameSlot<MockSlotImage>> {
        HandoffQueue::new(8)
    }

    const NO_WAIT: Duration = Duration::from_millis(1);

    #[test]
    fn prefers_local_free_list() {
        let released = queue();
        let mut pool: SlotPool<MockSlotImage> = SlotPool::new(2);
        let a = pool.take(&released, NO_WAIT);
        let b = pool.take(&released, NO_WAIT);
        assert_eq!(pool.total(), 2);
        pool.release_local(a);
        pool.release_local(b);
        let _ = pool.take(&released, NO_WAIT);
        assert_eq!(pool.total(), 2);
    }

    #[test]
    fn takes_released_slot_before_growing() {
        let released = queue();
        let mut pool: SlotPool<MockSlotImage> = SlotPool::new(1);
        let held = pool.take(&released, NO_WAIT);
        released.try_push(held).map_err(|_| ()).unwrap();
        let reused = pool.take(&released, NO_WAIT);
        assert_eq!(reused.id(), 0);
        assert_eq!(pool.total(), 1);
    }

    #[test]
    fn pool_size_converges_under_reuse() {
        let released = queue();
        let mut pool: SlotPool<MockSlotImage> = SlotPool::new(1);

        // First rounds grow because nothing has been released yet.
        let a = pool.take(&released, NO_WAIT);
        let b = pool.take(&released, NO_WAIT);
        assert_eq!(pool.total(), 2);

        // Once slots circulate through the released queue, many more
        // acquisitions cause no further growth.
        released.try_push(a).map_err(|_| ()).unwrap();
        released.try_push(b).map_err(|_| ()).unwrap();
        for _ in 0..32 {
            let slot = pool.take(&released, NO_WAIT);
            released.try_push(slot).map_err(|_| ()).unwrap();
        }
        assert_eq!(pool.total(), 2);
    }

    #[test]
    fn grown_slots_have_fresh_ids() {
        let released = queue();
        let mut pool: SlotPool<MockSlotImage> = SlotPool::new(2);
        let _a = pool.take(&released, NO_WAIT);
        let _b = pool.take(&released, NO_WAIT);
        let c = pool.take(&released, NO_WAIT);
        assert_eq!(c.id(), 2);
        assert_eq!(pool.total(), 3);
    }
}
