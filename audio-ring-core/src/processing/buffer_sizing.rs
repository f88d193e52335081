//! Hardware buffer sizing.
//!
//! Derives the segment geometry of the hardware ring from the stream
//! format and the requested timing targets. Identical inputs always
//! produce identical layouts.

use std::time::Duration;

use crate::models::error::RingError;
use crate::models::format::FormatSpec;

/// Segment geometry of an acquired hardware buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferLayout {
    /// Bytes per segment, always a multiple of the frame size.
    pub segment_size: usize,
    pub segment_count: usize,
    /// Exactly `segment_size * segment_count`.
    pub total_size: usize,
    /// Latency actually used after clamping to the sleep granularity.
    pub latency: Duration,
}

impl BufferLayout {
    /// Duration covered by one segment.
    pub fn segment_duration(&self, format: &FormatSpec) -> Duration {
        let micros = self.segment_size as u128 * 1_000_000 / format.avg_bytes_per_sec() as u128;
        Duration::from_micros(micros as u64)
    }

    pub fn frames_per_segment(&self, format: &FormatSpec) -> usize {
        self.segment_size / format.bytes_per_sample as usize
    }
}

/// Compute the hardware buffer layout.
///
/// 1. latency is raised to at least `2 * min_sleep`
/// 2. total = bytes/sec × buffer duration
/// 3. segment = bytes/sec × latency, rounded up to a whole frame
/// 4. count = total / segment (at least 1), total recomputed as segment × count
pub fn compute_layout(
    format: &FormatSpec,
    latency: Duration,
    buffer_duration: Duration,
    min_sleep: Duration,
) -> Result<BufferLayout, RingError> {
    format.validate().map_err(RingError::InvalidFormat)?;

    let latency = latency.max(min_sleep * 2);
    let avg = format.avg_bytes_per_sec();
    let frame = format.bytes_per_sample as u64;

    let requested_total = bytes_for(avg, buffer_duration);

    let mut segment_size = bytes_for(avg, latency);
    segment_size = (segment_size + frame - 1) / frame * frame;
    if segment_size == 0 {
        segment_size = frame;
    }

    let segment_count = (requested_total / segment_size).max(1);
    let total_size = segment_size
        .checked_mul(segment_count)
        .and_then(|total| usize::try_from(total).ok())
        .ok_or_else(|| RingError::ConfigurationFailed("buffer size overflows".into()))?;

    Ok(BufferLayout {
        segment_size: segment_size as usize,
        segment_count: segment_count as usize,
        total_size,
        latency,
    })
}

fn bytes_for(avg_bytes_per_sec: u64, duration: Duration) -> u64 {
    (avg_bytes_per_sec as u128 * duration.as_micros() / 1_000_000) as u64
}
