//! DirectSound secondary buffers behind the `HardwareBuffer` trait.

use std::ffi::c_void;

use windows::core::Error;
use windows::Win32::Media::Audio::DirectSound::*;

use audio_ring_core::models::error::HardwareError;
use audio_ring_core::traits::backend::{BufferStatus, CursorPair, HardwareBuffer};

use crate::dsound_backend::{map_error, DSERR_DEVICE_RECONFIGURED};

/// Lowest attenuation DirectSound accepts, in hundredths of a decibel.
const DSBVOLUME_MIN: i32 = -10_000;

/// Convert a linear 0.0–1.0 volume to DirectSound attenuation.
pub fn volume_to_attenuation(volume: f64) -> i32 {
    if volume <= 0.0 {
        return DSBVOLUME_MIN;
    }
    let hundredths = (2000.0 * volume.min(1.0).log10()).round() as i32;
    hundredths.max(DSBVOLUME_MIN)
}

/// Either kind of DirectSound buffer, as created by `DirectSoundDevice`.
pub enum DsBuffer {
    Playback(DirectSoundBuffer),
    Capture(DirectSoundCaptureBuffer),
}

/// Looping secondary playback buffer.
pub struct DirectSoundBuffer {
    buffer: IDirectSoundBuffer8,
    size: usize,
}

/// Looping capture buffer.
pub struct DirectSoundCaptureBuffer {
    buffer: IDirectSoundCaptureBuffer8,
    size: usize,
}

// SAFETY: DirectSound buffers are free-threaded, and the session serializes
// every call on a buffer through its instance lock.
unsafe impl Send for DsBuffer {}

impl DirectSoundBuffer {
    pub(crate) fn new(buffer: IDirectSoundBuffer8, size: usize) -> Self {
        Self { buffer, size }
    }
}

impl DirectSoundCaptureBuffer {
    pub(crate) fn new(buffer: IDirectSoundCaptureBuffer8, size: usize) -> Self {
        Self { buffer, size }
    }
}

impl HardwareBuffer for DsBuffer {
    fn status(&self) -> Result<BufferStatus, HardwareError> {
        unsafe {
            match self {
                Self::Playback(b) => {
                    let status = b.buffer.GetStatus().map_err(|e| map_error("GetStatus", e))?;
                    Ok(BufferStatus {
                        lost: status & DSBSTATUS_BUFFERLOST != 0,
                        playing: status & DSBSTATUS_PLAYING != 0,
                        capturing: false,
                    })
                }
                Self::Capture(b) => {
                    let status = b.buffer.GetStatus().map_err(|e| map_error("GetStatus", e))?;
                    Ok(BufferStatus {
                        lost: false,
                        playing: false,
                        capturing: status & DSCBSTATUS_CAPTURING != 0,
                    })
                }
            }
        }
    }

    fn restore(&mut self) -> Result<(), HardwareError> {
        match self {
            Self::Playback(b) => unsafe {
                b.buffer.Restore().map_err(|e: Error| {
                    if e.code() == DSERR_DEVICE_RECONFIGURED {
                        // DSERR_BUFFERLOST shares the code
                        HardwareError::BufferLost
                    } else {
                        map_error("Restore", e)
                    }
                })
            },
            // capture buffers are never lost
            Self::Capture(_) => Ok(()),
        }
    }

    fn position(&self) -> Result<CursorPair, HardwareError> {
        let mut device = 0u32;
        let mut safe = 0u32;
        let queried = unsafe {
            match self {
                Self::Playback(b) => b.buffer.GetCurrentPosition(Some(&mut device as *mut _), Some(&mut safe as *mut _)),
                Self::Capture(b) => b.buffer.GetCurrentPosition(Some(&mut device as *mut _), Some(&mut safe as *mut _)),
            }
        };
        queried.map_err(|e| map_error("GetCurrentPosition", e))?;
        Ok(CursorPair {
            device: device as usize,
            safe: safe as usize,
        })
    }

    fn lock(
        &mut self,
        offset: usize,
        len: usize,
        access: &mut dyn FnMut(&mut [u8], &mut [u8]),
    ) -> Result<(), HardwareError> {
        let size = match self {
            Self::Playback(b) => b.size,
            Self::Capture(b) => b.size,
        };
        if len > size || offset >= size {
            return Err(HardwareError::CallFailed(format!(
                "lock of {} bytes at {} outside {} byte buffer",
                len, offset, size
            )));
        }

        let mut ptr1: *mut c_void = std::ptr::null_mut();
        let mut len1 = 0u32;
        let mut ptr2: *mut c_void = std::ptr::null_mut();
        let mut len2 = 0u32;

        unsafe {
            let locked = match self {
                Self::Playback(b) => b.buffer.Lock(
                    offset as u32,
                    len as u32,
                    &mut ptr1,
                    &mut len1,
                    Some(&mut ptr2 as *mut *mut c_void),
                    Some(&mut len2 as *mut u32),
                    0,
                ),
                Self::Capture(b) => b.buffer.Lock(
                    offset as u32,
                    len as u32,
                    &mut ptr1,
                    &mut len1,
                    Some(&mut ptr2 as *mut *mut c_void),
                    Some(&mut len2 as *mut u32),
                    0,
                ),
            };
            locked.map_err(|e| map_error("Lock", e))?;

            access(region(ptr1, len1), region(ptr2, len2));

            let second = Some(ptr2 as *const c_void);
            let unlocked = match self {
                Self::Playback(b) => b.buffer.Unlock(ptr1, len1, second, len2),
                Self::Capture(b) => b.buffer.Unlock(ptr1, len1, second, len2),
            };
            unlocked.map_err(|e| map_error("Unlock", e))
        }
    }

    fn start(&mut self) -> Result<(), HardwareError> {
        unsafe {
            match self {
                Self::Playback(b) => b.buffer.Play(0, 0, DSBPLAY_LOOPING).map_err(|e| map_error("Play", e)),
                Self::Capture(b) => b.buffer.Start(DSCBSTART_LOOPING).map_err(|e| map_error("Start", e)),
            }
        }
    }

    fn stop(&mut self) -> Result<(), HardwareError> {
        let stopped = unsafe {
            match self {
                Self::Playback(b) => b.buffer.Stop(),
                Self::Capture(b) => b.buffer.Stop(),
            }
        };
        stopped.map_err(|e| map_error("Stop", e))
    }

    fn set_volume(&mut self, volume: f64) -> Result<(), HardwareError> {
        match self {
            Self::Playback(b) => unsafe {
                b.buffer
                    .SetVolume(volume_to_attenuation(volume))
                    .map_err(|e| map_error("SetVolume", e))
            },
            Self::Capture(_) => Ok(()),
        }
    }
}

/// View a locked region as a byte slice. DirectSound hands back a null
/// pointer for an unused second region.
unsafe fn region<'a>(ptr: *mut c_void, len: u32) -> &'a mut [u8] {
    if ptr.is_null() || len == 0 {
        &mut []
    } else {
        std::slice::from_raw_parts_mut(ptr as *mut u8, len as usize)
    }
}
