use crate::models::error::HardwareError;
use crate::models::format::{Direction, FormatSpec};

/// Hardware buffer status flags.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BufferStatus {
    /// Contents were discarded by the driver and must be restored.
    pub lost: bool,
    pub playing: bool,
    pub capturing: bool,
}

/// Cursor positions reported by a hardware buffer, in bytes.
///
/// | direction | `device`        | `safe`         |
/// |-----------|-----------------|----------------|
/// | playback  | play cursor     | write cursor   |
/// | capture   | capture cursor  | read cursor    |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorPair {
    pub device: usize,
    pub safe: usize,
}

impl CursorPair {
    /// The cursor that bounds transfers in `direction`.
    pub fn transfer_bound(&self, direction: Direction) -> usize {
        match direction {
            Direction::Playback => self.device,
            Direction::Capture => self.safe,
        }
    }
}

/// Platform audio API entry point.
///
/// Implemented by:
/// - `SimulatedBackend` (all platforms, tests and demos)
/// - `DirectSoundBackend` (Windows)
pub trait AudioBackend: Send + Sync + 'static {
    type Device: AudioDevice;

    /// Open the device `device_id` (None = system default). Playback
    /// devices are opened in the exclusive priority cooperative mode.
    fn open(&self, device_id: Option<&str>, direction: Direction) -> Result<Self::Device, HardwareError>;

    /// Raise the calling thread to the platform's real-time priority.
    fn promote_current_thread(&self) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// An open device. Closed when dropped.
pub trait AudioDevice: Send + 'static {
    type Buffer: HardwareBuffer;

    fn create_buffer(&mut self, format: &FormatSpec, size_bytes: usize) -> Result<Self::Buffer, HardwareError>;
}

/// The device's circular buffer. Released when dropped, which must happen
/// before the device it was created from is dropped.
pub trait HardwareBuffer: Send + 'static {
    fn status(&self) -> Result<BufferStatus, HardwareError>;

    /// Reallocate the memory of a lost buffer.
    fn restore(&mut self) -> Result<(), HardwareError>;

    fn position(&self) -> Result<CursorPair, HardwareError>;

    /// Lock `len` bytes starting at `offset` and hand the one or two
    /// resulting regions to `access`. The second region is empty unless the
    /// range wraps. The buffer is unlocked before this returns.
    fn lock(
        &mut self,
        offset: usize,
        len: usize,
        access: &mut dyn FnMut(&mut [u8], &mut [u8]),
    ) -> Result<(), HardwareError>;

    /// Start looping playback or capture.
    fn start(&mut self) -> Result<(), HardwareError>;

    fn stop(&mut self) -> Result<(), HardwareError>;

    /// Linear volume 0.0–1.0. Capture buffers ignore it.
    fn set_volume(&mut self, _volume: f64) -> Result<(), HardwareError> {
        Ok(())
    }
}

/// Buffer type produced by a backend's devices.
pub type BufferOf<B> = <<B as AudioBackend>::Device as AudioDevice>::Buffer;
