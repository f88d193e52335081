//! Copies between a contiguous segment and the one or two regions a locked
//! hardware range exposes. The second region is non-empty only when the
//! locked range wraps past the end of the ring.

/// Playback: spread `src` across `first` then `second`.
///
/// Returns the number of bytes copied, which is short only when the regions
/// together are smaller than `src`.
pub fn scatter(src: &[u8], first: &mut [u8], second: &mut [u8]) -> usize {
    let head = src.len().min(first.len());
    first[..head].copy_from_slice(&src[..head]);

    let tail = (src.len() - head).min(second.len());
    second[..tail].copy_from_slice(&src[head..head + tail]);

    head + tail
}

/// Capture: collect `first` then `second` into `dst`.
pub fn gather(dst: &mut [u8], first: &[u8], second: &[u8]) -> usize {
    let head = dst.len().min(first.len());
    dst[..head].copy_from_slice(&first[..head]);

    let tail = (dst.len() - head).min(second.len());
    dst[head..head + tail].copy_from_slice(&second[..tail]);

    head + tail
}
