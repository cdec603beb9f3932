//! Frame-resource ring and in-flight frame tracking
//!
//! A fixed set of per-frame resource tokens cycles between a free list
//! and a FIFO of frames the GPU may still be reading. Reclamation is
//! non-blocking: in-flight entries are released front-to-back while
//! their slot fences report signaled, and stop at the first busy one.

use std::collections::VecDeque;

use crate::display::error::DisplayResult;

/// Ring of per-frame GPU resources paired with in-flight slots
pub struct FrameRing<S, R> {
    free: Vec<R>,
    in_flight: VecDeque<(S, R)>,
}

impl<S, R> FrameRing<S, R> {
    /// Create a ring from the initial set of resource tokens
    pub fn new(resources: Vec<R>) -> Self {
        let capacity = resources.len();
        Self {
            free: resources,
            in_flight: VecDeque::with_capacity(capacity),
        }
    }

    /// Take a free resource token, if any
    pub fn take_free(&mut self) -> Option<R> {
        self.free.pop()
    }

    /// Return an unused token to the free list
    pub fn put_free(&mut self, resources: R) {
        self.free.push(resources);
    }

    /// Record a submitted frame; its token stays out until reclaimed
    pub fn push_in_flight(&mut self, slot: S, resources: R) {
        self.in_flight.push_back((slot, resources));
    }

    /// Release completed in-flight frames without blocking
    ///
    /// `is_done` polls a frame's completion; `release` receives the
    /// finished slot (typically to push it onto the released queue).
    /// Entries are FIFO, so the scan stops at the first busy frame.
    pub fn reclaim(
        &mut self,
        mut is_done: impl FnMut(&S) -> DisplayResult<bool>,
        mut release: impl FnMut(S),
    ) -> DisplayResult<()> {
        while let Some((slot, _)) = self.in_flight.front() {
            if !is_done(slot)? {
                break;
            }
            let (slot, resources) = self.in_flight.pop_front().unwrap();
            self.free.push(resources);
            release(slot);
        }
        Ok(())
    }

    /// Number of frames the GPU may still be reading
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Remove every in-flight entry for teardown; tokens return to the
    /// free list and slots are handed back to the caller
    pub fn drain_in_flight(&mut self) -> Vec<S> {
        let mut slots = Vec::with_capacity(self.in_flight.len());
        while let Some((slot, resources)) = self.in_flight.pop_front() {
            self.free.push(resources);
            slots.push(slot);
        }
        slots
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_cycle_through_free_list() {
        let mut ring: FrameRing<u32, &str> = FrameRing::new(vec!["a", "b"]);
        let first = ring.take_free().unwrap();
        let second = ring.take_free().unwrap();
        assert!(ring.take_free().is_none());
        ring.push_in_flight(10, first);
        ring.push_in_flight(11, second);

        ring.reclaim(|_| Ok(true), |_| ()).unwrap();
        assert!(ring.take_free().is_some());
        assert!(ring.take_free().is_some());
    }

    #[test]
    fn reclaim_stops_at_first_busy_frame() {
        let mut ring: FrameRing<u32, u8> = FrameRing::new(vec![0, 1, 2]);
        for slot in 10..13 {
            let token = ring.take_free().unwrap();
            ring.push_in_flight(slot, token);
        }

        let mut released = Vec::new();
        ring.reclaim(|slot| Ok(*slot == 10), |slot| released.push(slot))
            .unwrap();
        assert_eq!(released, vec![10]);
        assert_eq!(ring.in_flight_len(), 2);
        // Exactly one token came back.
        assert!(ring.take_free().is_some());
        assert!(ring.take_free().is_none());
    }

    #[test]
    fn releases_in_submission_order() {
        let mut ring: FrameRing<u32, u8> = FrameRing::new(vec![0, 1, 2]);
        for slot in [7, 8, 9] {
            let token = ring.take_free().unwrap();
            ring.push_in_flight(slot, token);
        }
        let mut released = Vec::new();
        ring.reclaim(|_| Ok(true), |slot| released.push(slot))
            .unwrap();
        assert_eq!(released, vec![7, 8, 9]);
    }

    #[test]
    fn drain_returns_all_slots_and_tokens() {
        let mut ring: FrameRing<u32, u8> = FrameRing::new(vec![0, 1]);
        let a = ring.take_free().unwrap();
        let b = ring.take_free().unwrap();
        ring.push_in_flight(1, a);
        ring.push_in_flight(2, b);

        let slots = ring.drain_in_flight();
        assert_eq!(slots, vec![1, 2]);
        assert!(ring.take_free().is_some());
        assert!(ring.take_free().is_some());
    }
}
