use crate::models::format::Direction;
use crate::processing::buffer_sizing::BufferLayout;

/// Software-side position within the hardware ring.
///
/// `circular_offset` is where the next transfer lands in the hardware
/// buffer; `segment_offset` is how much of the current segment has already
/// been transferred. Pure state, mutated only under the session lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionTracker {
    circular_offset: usize,
    segment_offset: usize,
    buffer_size: usize,
    segment_size: usize,
}

impl PositionTracker {
    pub fn new(layout: &BufferLayout) -> Self {
        Self {
            circular_offset: 0,
            segment_offset: 0,
            buffer_size: layout.total_size,
            segment_size: layout.segment_size,
        }
    }

    pub fn circular_offset(&self) -> usize {
        self.circular_offset
    }

    pub fn segment_offset(&self) -> usize {
        self.segment_offset
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    /// Bytes that can be written ahead of the play cursor.
    ///
    /// A cursor equal to the write offset means the buffer is drained.
    pub fn playback_free(&self, play_cursor: usize) -> usize {
        let play = play_cursor % self.buffer_size;
        if play <= self.circular_offset {
            self.buffer_size - (self.circular_offset - play)
        } else {
            play - self.circular_offset
        }
    }

    /// Bytes captured behind the read cursor that have not been read yet.
    pub fn capture_available(&self, read_cursor: usize) -> usize {
        let read = read_cursor % self.buffer_size;
        if read >= self.circular_offset {
            read - self.circular_offset
        } else {
            self.buffer_size - (self.circular_offset - read)
        }
    }

    pub fn available(&self, direction: Direction, cursor: usize) -> usize {
        match direction {
            Direction::Playback => self.playback_free(cursor),
            Direction::Capture => self.capture_available(cursor),
        }
    }

    /// Bytes sitting in the hardware buffer between the device cursor and
    /// the software offset, used for delay reporting.
    pub fn queued(&self, direction: Direction, device_cursor: usize) -> usize {
        let cursor = device_cursor % self.buffer_size;
        match direction {
            Direction::Playback => (self.circular_offset + self.buffer_size - cursor) % self.buffer_size,
            Direction::Capture => (cursor + self.buffer_size - self.circular_offset) % self.buffer_size,
        }
    }

    /// Bytes of a segment of `segment_len` still to be transferred.
    pub fn remaining_in(&self, segment_len: usize) -> usize {
        segment_len.saturating_sub(self.segment_offset)
    }

    /// Record `bytes` transferred. Returns true when the current segment
    /// completed, in which case the segment offset is back at zero.
    pub fn advance(&mut self, bytes: usize) -> bool {
        self.circular_offset = (self.circular_offset + bytes) % self.buffer_size;
        self.segment_offset += bytes;
        if self.segment_offset >= self.segment_size {
            self.segment_offset = 0;
            true
        } else {
            false
        }
    }

    /// A recreated hardware buffer starts writing from its beginning.
    pub fn reset_circular(&mut self) {
        self.circular_offset = 0;
    }

    pub fn reset_segment(&mut self) {
        self.segment_offset = 0;
    }
}
