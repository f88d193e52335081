//! Simulated audio hardware for testing without a sound card.

use std::collections::VecDeque;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::models::error::HardwareError;
use crate::models::format::{Direction, FormatSpec};
use crate::traits::backend::{AudioBackend, AudioDevice, BufferStatus, CursorPair, HardwareBuffer};

/// An in-memory backend with a controllable cursor and injectable faults.
///
/// Every device and buffer it creates shares one state, so a clone kept by
/// the test observes and steers what the session does.
///
/// # Example
///
/// ```
/// use audio_ring_core::simulated::SimulatedBackend;
/// use audio_ring_core::{FormatSpec, RingBufferConfiguration, RingBufferSession};
///
/// let backend = SimulatedBackend::new();
/// let session = RingBufferSession::acquire(
///     backend.clone(),
///     RingBufferConfiguration::playback(),
///     FormatSpec::pcm16(2, 48000),
/// )
/// .unwrap();
///
/// assert_eq!(backend.storage().len(), session.layout().total_size);
/// ```
#[derive(Clone, Default)]
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

#[derive(Debug, Default)]
struct SimState {
    storage: Vec<u8>,
    format: Option<FormatSpec>,
    cursor: usize,
    /// Bytes the cursor moves per position query while running.
    cursor_step: usize,
    running: bool,
    lost: bool,
    volume: Option<f64>,

    restore_failures: u32,
    position_errors: VecDeque<HardwareError>,
    stop_error: Option<HardwareError>,
    lock_error: Option<HardwareError>,
    /// Caps the bytes the next lock hands out.
    lock_limit: Option<usize>,
    open_delay: Duration,
    open_error: Option<HardwareError>,
    create_error: Option<HardwareError>,
    promotion_error: Option<HardwareError>,

    opens: u32,
    open_devices: u32,
    buffers_created: u32,
    live_buffers: u32,
    restores: u32,
    starts: u32,
    stops: u32,
    promotions: u32,
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move the device cursor forward, wrapping at the buffer end.
    pub fn advance_cursor(&self, bytes: usize) {
        let mut state = self.state.lock();
        let size = state.storage.len().max(1);
        state.cursor = (state.cursor + bytes) % size;
    }

    pub fn set_cursor(&self, position: usize) {
        let mut state = self.state.lock();
        let size = state.storage.len().max(1);
        state.cursor = position % size;
    }

    /// Advance the cursor by `bytes` on every position query while the
    /// buffer is playing or capturing.
    pub fn set_cursor_step(&self, bytes: usize) {
        self.state.lock().cursor_step = bytes;
    }

    pub fn set_lost(&self, lost: bool) {
        self.state.lock().lost = lost;
    }

    /// The next `count` restores report the buffer still lost.
    pub fn fail_restores(&self, count: u32) {
        self.state.lock().restore_failures = count;
    }

    /// Queue an error for an upcoming position query.
    pub fn inject_position_error(&self, error: HardwareError) {
        self.state.lock().position_errors.push_back(error);
    }

    pub fn fail_next_stop(&self, error: HardwareError) {
        self.state.lock().stop_error = Some(error);
    }

    pub fn fail_next_lock(&self, error: HardwareError) {
        self.state.lock().lock_error = Some(error);
    }

    /// The next lock exposes at most `bytes` across both regions.
    pub fn shorten_next_lock(&self, bytes: usize) {
        self.state.lock().lock_limit = Some(bytes);
    }

    /// Every open takes this long, with the backend unlocked meanwhile.
    pub fn set_open_delay(&self, delay: Duration) {
        self.state.lock().open_delay = delay;
    }

    pub fn fail_open(&self, error: HardwareError) {
        self.state.lock().open_error = Some(error);
    }

    pub fn fail_create(&self, error: HardwareError) {
        self.state.lock().create_error = Some(error);
    }

    pub fn fail_promotion(&self, error: HardwareError) {
        self.state.lock().promotion_error = Some(error);
    }

    /// Write `bytes` into the buffer starting at `offset`, wrapping at the end.
    pub fn fill_storage(&self, offset: usize, bytes: &[u8]) {
        let mut state = self.state.lock();
        let size = state.storage.len();
        if size == 0 {
            return;
        }
        for (i, &byte) in bytes.iter().enumerate() {
            state.storage[(offset + i) % size] = byte;
        }
    }

    pub fn storage(&self) -> Vec<u8> {
        self.state.lock().storage.clone()
    }

    pub fn format(&self) -> Option<FormatSpec> {
        self.state.lock().format
    }

    pub fn cursor(&self) -> usize {
        self.state.lock().cursor
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn volume(&self) -> Option<f64> {
        self.state.lock().volume
    }

    pub fn opens(&self) -> u32 {
        self.state.lock().opens
    }

    pub fn open_devices(&self) -> u32 {
        self.state.lock().open_devices
    }

    pub fn buffers_created(&self) -> u32 {
        self.state.lock().buffers_created
    }

    pub fn live_buffers(&self) -> u32 {
        self.state.lock().live_buffers
    }

    pub fn restores(&self) -> u32 {
        self.state.lock().restores
    }

    pub fn starts(&self) -> u32 {
        self.state.lock().starts
    }

    pub fn stops(&self) -> u32 {
        self.state.lock().stops
    }

    pub fn promotions(&self) -> u32 {
        self.state.lock().promotions
    }
}

impl AudioBackend for SimulatedBackend {
    type Device = SimulatedDevice;

    fn open(&self, _device_id: Option<&str>, direction: Direction) -> Result<SimulatedDevice, HardwareError> {
        let delay = self.state.lock().open_delay;
        if !delay.is_zero() {
            thread::sleep(delay);
        }

        let mut state = self.state.lock();
        state.opens += 1;
        if let Some(error) = state.open_error.take() {
            return Err(error);
        }
        state.open_devices += 1;
        Ok(SimulatedDevice {
            state: Arc::clone(&self.state),
            direction,
        })
    }

    fn promote_current_thread(&self) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        state.promotions += 1;
        match state.promotion_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

pub struct SimulatedDevice {
    state: Arc<Mutex<SimState>>,
    direction: Direction,
}

impl AudioDevice for SimulatedDevice {
    type Buffer = SimulatedBuffer;

    fn create_buffer(&mut self, format: &FormatSpec, size_bytes: usize) -> Result<SimulatedBuffer, HardwareError> {
        let mut state = self.state.lock();
        if let Some(error) = state.create_error.take() {
            return Err(error);
        }
        if size_bytes == 0 {
            return Err(HardwareError::BufferCreationFailed("zero-sized buffer".into()));
        }

        state.storage = vec![0; size_bytes];
        state.format = Some(*format);
        state.cursor = 0;
        state.running = false;
        state.lost = false;
        state.buffers_created += 1;
        state.live_buffers += 1;

        Ok(SimulatedBuffer {
            state: Arc::clone(&self.state),
            direction: self.direction,
        })
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.state.lock().open_devices -= 1;
    }
}

pub struct SimulatedBuffer {
    state: Arc<Mutex<SimState>>,
    direction: Direction,
}

impl HardwareBuffer for SimulatedBuffer {
    fn status(&self) -> Result<BufferStatus, HardwareError> {
        let state = self.state.lock();
        Ok(BufferStatus {
            lost: state.lost,
            playing: state.running && self.direction == Direction::Playback,
            capturing: state.running && self.direction == Direction::Capture,
        })
    }

    fn restore(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        state.restores += 1;
        if state.restore_failures > 0 {
            state.restore_failures -= 1;
            return Err(HardwareError::BufferLost);
        }
        state.lost = false;
        Ok(())
    }

    fn position(&self) -> Result<CursorPair, HardwareError> {
        let mut state = self.state.lock();
        if let Some(error) = state.position_errors.pop_front() {
            return Err(error);
        }
        if state.running && !state.storage.is_empty() {
            state.cursor = (state.cursor + state.cursor_step) % state.storage.len();
        }
        Ok(CursorPair {
            device: state.cursor,
            safe: state.cursor,
        })
    }

    fn lock(
        &mut self,
        offset: usize,
        len: usize,
        access: &mut dyn FnMut(&mut [u8], &mut [u8]),
    ) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        if let Some(error) = state.lock_error.take() {
            return Err(error);
        }

        let size = state.storage.len();
        let exposed = state.lock_limit.take().map_or(len, |limit| limit.min(len));
        if len > size || offset >= size {
            return Err(HardwareError::CallFailed(format!(
                "lock of {} bytes at {} outside {} byte buffer",
                len, offset, size
            )));
        }

        let end = offset + exposed;
        if end <= size {
            access(&mut state.storage[offset..end], &mut []);
        } else {
            let (head, tail) = state.storage.split_at_mut(offset);
            access(tail, &mut head[..end - size]);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        state.starts += 1;
        state.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state.lock();
        state.stops += 1;
        state.running = false;
        match state.stop_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn set_volume(&mut self, volume: f64) -> Result<(), HardwareError> {
        self.state.lock().volume = Some(volume);
        Ok(())
    }
}

impl Drop for SimulatedBuffer {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.live_buffers -= 1;
        state.running = false;
    }
}
