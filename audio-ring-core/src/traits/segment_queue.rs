/// A segment borrowed from the software queue for one transfer.
#[derive(Debug)]
pub struct Segment<'a> {
    pub index: usize,
    pub data: &'a mut [u8],
}

/// Software side of the ring: the queue of fixed-size segments the transfer
/// engine moves to or from the hardware buffer.
///
/// All methods are called from the transfer thread with the queue's lock
/// held. The engine may prepare the same segment several times while it
/// is partially transferred.
pub trait SegmentQueue: Send {
    /// The segment currently at the hardware end of the queue, or None when
    /// there is nothing to transfer.
    fn prepare_segment(&mut self) -> Option<Segment<'_>>;

    /// Playback only: the segment at `index` has been fully written and may
    /// be reused.
    fn clear_segment(&mut self, index: usize);

    /// Move the hardware end of the queue forward by `count` segments.
    fn advance(&mut self, count: usize);
}
