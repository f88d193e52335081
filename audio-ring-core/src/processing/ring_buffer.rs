use crate::models::format::Direction;
use crate::processing::buffer_sizing::BufferLayout;
use crate::traits::segment_queue::{Segment, SegmentQueue};

/// Fixed-size segment queue shared between the application and the
/// transfer thread.
///
/// Wrap in `Arc<parking_lot::Mutex<SegmentRing>>` for cross-thread access;
/// the session hands out exactly that.
///
/// Playback: the application `commit`s segments; the engine plays them in
/// order and plays silence (counting an underrun) when none is queued.
/// Capture: the engine fills segments; the application `take`s them. When
/// the application falls behind, the oldest unread segment is dropped and
/// counted as an overrun.
#[derive(Debug)]
pub struct SegmentRing {
    data: Vec<u8>,
    direction: Direction,
    segment_size: usize,
    segment_count: usize,
    /// Storage slots. Capture keeps one extra slot for the segment being filled.
    slots: usize,
    /// Slot at the hardware end of the queue.
    hw_slot: usize,
    /// Committed (playback) or completed (capture) segments waiting.
    queued: usize,
    active: bool,
    segments_done: u64,
    underruns: u64,
    overruns: u64,
}

impl SegmentRing {
    pub fn new(direction: Direction, layout: &BufferLayout) -> Self {
        let slots = match direction {
            Direction::Playback => layout.segment_count,
            Direction::Capture => layout.segment_count + 1,
        };
        Self {
            data: vec![0; slots * layout.segment_size],
            direction,
            segment_size: layout.segment_size,
            segment_count: layout.segment_count,
            slots,
            hw_slot: 0,
            queued: 0,
            active: false,
            segments_done: 0,
            underruns: 0,
            overruns: 0,
        }
    }

    /// Queue one playback segment. Input shorter than a segment is padded
    /// with silence, longer input is truncated.
    ///
    /// Returns false when the ring is full, released, or not a playback ring.
    pub fn commit(&mut self, samples: &[u8]) -> bool {
        if self.direction != Direction::Playback || self.data.is_empty() || self.queued == self.slots {
            return false;
        }

        let slot = (self.hw_slot + self.queued) % self.slots;
        let segment = self.slot_mut(slot);
        let len = samples.len().min(segment.len());
        segment[..len].copy_from_slice(&samples[..len]);
        segment[len..].fill(0);

        self.queued += 1;
        true
    }

    /// Remove the oldest captured segment.
    pub fn take(&mut self) -> Option<Vec<u8>> {
        if self.direction != Direction::Capture || self.queued == 0 {
            return None;
        }

        let slot = (self.hw_slot + self.slots - self.queued) % self.slots;
        let start = slot * self.segment_size;
        let segment = self.data[start..start + self.segment_size].to_vec();
        self.queued -= 1;
        Some(segment)
    }

    /// Segments waiting for the other side.
    pub fn queued(&self) -> usize {
        self.queued
    }

    pub fn is_full(&self) -> bool {
        match self.direction {
            Direction::Playback => self.queued == self.slots,
            Direction::Capture => self.queued == self.segment_count,
        }
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    pub fn segment_count(&self) -> usize {
        self.segment_count
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Segments the engine has finished transferring.
    pub fn segments_done(&self) -> u64 {
        self.segments_done
    }

    pub fn underruns(&self) -> u64 {
        self.underruns
    }

    pub fn overruns(&self) -> u64 {
        self.overruns
    }

    pub(crate) fn activate(&mut self) {
        self.active = true;
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    /// Drop everything queued and silence the storage.
    pub fn clear_all(&mut self) {
        self.data.fill(0);
        self.queued = 0;
    }

    /// Free the storage. The ring stays inert afterwards.
    pub(crate) fn release(&mut self) {
        self.active = false;
        self.data = Vec::new();
        self.queued = 0;
    }

    fn slot_mut(&mut self, slot: usize) -> &mut [u8] {
        let start = slot * self.segment_size;
        &mut self.data[start..start + self.segment_size]
    }
}

impl SegmentQueue for SegmentRing {
    fn prepare_segment(&mut self) -> Option<Segment<'_>> {
        if !self.active || self.data.is_empty() {
            return None;
        }
        let index = self.hw_slot;
        Some(Segment {
            index,
            data: self.slot_mut(index),
        })
    }

    fn clear_segment(&mut self, index: usize) {
        if index < self.slots && !self.data.is_empty() {
            self.slot_mut(index).fill(0);
        }
    }

    fn advance(&mut self, count: usize) {
        for _ in 0..count {
            self.hw_slot = (self.hw_slot + 1) % self.slots;
            self.segments_done += 1;

            match self.direction {
                Direction::Playback => {
                    if self.queued > 0 {
                        self.queued -= 1;
                    } else {
                        self.underruns += 1;
                    }
                }
                Direction::Capture => {
                    if self.queued == self.segment_count {
                        // the oldest unread slot is now the one being filled
                        self.overruns += 1;
                    } else {
                        self.queued += 1;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn layout(segment_size: usize, segment_count: usize) -> BufferLayout {
        BufferLayout {
            segment_size,
            segment_count,
            total_size: segment_size * segment_count,
            latency: Duration::from_millis(20),
        }
    }

    fn transfer_one(ring: &mut SegmentRing) -> Vec<u8> {
        let segment = ring.prepare_segment().unwrap();
        let index = segment.index;
        let bytes = segment.data.to_vec();
        ring.clear_segment(index);
        ring.advance(1);
        bytes
    }

    #[test]
    fn playback_plays_committed_segments_in_order() {
        let mut ring = SegmentRing::new(Direction::Playback, &layout(4, 3));
        ring.activate();

        assert!(ring.commit(&[1, 1, 1, 1]));
        assert!(ring.commit(&[2, 2]));
        assert_eq!(ring.queued(), 2);

        assert_eq!(transfer_one(&mut ring), vec![1, 1, 1, 1]);
        // short commit padded with silence
        assert_eq!(transfer_one(&mut ring), vec![2, 2, 0, 0]);
        assert_eq!(ring.queued(), 0);
        assert_eq!(ring.underruns(), 0);
        assert_eq!(ring.segments_done(), 2);
    }

    #[test]
    fn playback_full_ring_rejects_commit() {
        let mut ring = SegmentRing::new(Direction::Playback, &layout(2, 2));
        assert!(ring.commit(&[1, 2]));
        assert!(ring.commit(&[3, 4]));
        assert!(ring.is_full());
        assert!(!ring.commit(&[5, 6]));
    }

    #[test]
    fn playback_underrun_plays_silence() {
        let mut ring = SegmentRing::new(Direction::Playback, &layout(2, 2));
        ring.activate();

        assert!(ring.commit(&[7, 7]));
        assert_eq!(transfer_one(&mut ring), vec![7, 7]);
        assert_eq!(transfer_one(&mut ring), vec![0, 0]);
        // the slot played earlier was cleared
        assert_eq!(transfer_one(&mut ring), vec![0, 0]);
        assert_eq!(ring.underruns(), 2);

        // committing after an underrun lands in the next slot played
        assert!(ring.commit(&[9, 9]));
        assert_eq!(transfer_one(&mut ring), vec![9, 9]);
    }

    #[test]
    fn capture_delivers_segments_in_order() {
        let mut ring = SegmentRing::new(Direction::Capture, &layout(2, 2));
        ring.activate();
        assert!(ring.take().is_none());

        for value in [1u8, 2] {
            let segment = ring.prepare_segment().unwrap();
            segment.data.fill(value);
            ring.advance(1);
        }

        assert_eq!(ring.take(), Some(vec![1, 1]));
        assert_eq!(ring.take(), Some(vec![2, 2]));
        assert_eq!(ring.take(), None);
    }

    #[test]
    fn capture_overrun_drops_oldest() {
        let mut ring = SegmentRing::new(Direction::Capture, &layout(1, 2));
        ring.activate();

        for value in [1u8, 2, 3, 4] {
            let segment = ring.prepare_segment().unwrap();
            segment.data[0] = value;
            ring.advance(1);
        }

        assert_eq!(ring.overruns(), 2);
        assert!(ring.is_full());
        assert_eq!(ring.take(), Some(vec![3]));
        assert_eq!(ring.take(), Some(vec![4]));
        assert_eq!(ring.take(), None);
    }

    #[test]
    fn single_segment_capture_keeps_latest() {
        let mut ring = SegmentRing::new(Direction::Capture, &layout(1, 1));
        ring.activate();

        for value in [5u8, 6] {
            ring.prepare_segment().unwrap().data[0] = value;
            ring.advance(1);
        }
        assert_eq!(ring.take(), Some(vec![6]));
    }

    #[test]
    fn inactive_ring_yields_no_segment() {
        let mut ring = SegmentRing::new(Direction::Playback, &layout(2, 2));
        assert!(ring.prepare_segment().is_none());

        ring.activate();
        assert!(ring.prepare_segment().is_some());

        ring.deactivate();
        assert!(ring.prepare_segment().is_none());
    }

    #[test]
    fn clear_all_discards_queued() {
        let mut ring = SegmentRing::new(Direction::Playback, &layout(2, 2));
        ring.activate();
        ring.commit(&[1, 1]);
        ring.clear_all();

        assert_eq!(ring.queued(), 0);
        assert_eq!(ring.prepare_segment().unwrap().data.to_vec(), vec![0, 0]);
    }

    #[test]
    fn release_frees_storage() {
        let mut ring = SegmentRing::new(Direction::Playback, &layout(2, 2));
        ring.activate();
        ring.release();

        assert!(!ring.is_active());
        assert!(!ring.commit(&[1, 1]));
        assert!(ring.prepare_segment().is_none());
        ring.clear_segment(0);
    }

    #[test]
    fn wrong_direction_is_rejected() {
        let mut playback = SegmentRing::new(Direction::Playback, &layout(2, 2));
        assert!(playback.take().is_none());

        let mut capture = SegmentRing::new(Direction::Capture, &layout(2, 2));
        assert!(!capture.commit(&[1, 1]));
    }
}
