//! DirectSound device access.
//!
//! Opens DirectSound 8 playback devices (in the priority cooperative level)
//! and DirectSoundCapture 8 devices, and creates their secondary buffers.

use windows::core::{Error, Interface, GUID, HRESULT};
use windows::Win32::Media::Audio::DirectSound::*;
use windows::Win32::Media::Audio::WAVEFORMATEX;
use windows::Win32::System::Threading::{GetCurrentThread, SetThreadPriority, THREAD_PRIORITY_TIME_CRITICAL};
use windows::Win32::UI::WindowsAndMessaging::GetDesktopWindow;

use audio_ring_core::models::error::HardwareError;
use audio_ring_core::models::format::{Direction, FormatSpec};
use audio_ring_core::traits::backend::{AudioBackend, AudioDevice};

use crate::dsound_buffer::{DirectSoundBuffer, DirectSoundCaptureBuffer, DsBuffer};

/// Returned by buffer calls once the device was removed or reconfigured,
/// and by `Restore` while the buffer memory is still unavailable.
pub(crate) const DSERR_DEVICE_RECONFIGURED: HRESULT = HRESULT(0x8878_0096_u32 as i32);
pub(crate) const DSERR_NO_DRIVER: HRESULT = HRESULT(0x8878_0078_u32 as i32);

const WAVE_FORMAT_PCM: u16 = 1;

/// Map a failed DirectSound call onto the backend error set.
pub(crate) fn map_error(call: &str, err: Error) -> HardwareError {
    let code = err.code();
    if code == DSERR_DEVICE_RECONFIGURED {
        HardwareError::DeviceReconfigured
    } else if code == DSERR_NO_DRIVER {
        HardwareError::NoDriver
    } else {
        HardwareError::CallFailed(format!("{} failed: {}", call, err))
    }
}

/// Parse a DirectSound device GUID, with or without braces.
pub fn parse_device_guid(id: &str) -> Result<GUID, HardwareError> {
    let trimmed = id.trim().trim_start_matches('{').trim_end_matches('}');
    GUID::try_from(trimmed).map_err(|_| HardwareError::DeviceUnavailable(format!("invalid device id: {}", id)))
}

/// DirectSound implementation of `AudioBackend`.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectSoundBackend;

impl DirectSoundBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for DirectSoundBackend {
    type Device = DirectSoundDevice;

    fn open(&self, device_id: Option<&str>, direction: Direction) -> Result<DirectSoundDevice, HardwareError> {
        let guid = device_id.map(parse_device_guid).transpose()?;
        let guid_ptr = guid.as_ref().map(|g| g as *const GUID);

        unsafe {
            match direction {
                Direction::Playback => {
                    let mut ds: Option<IDirectSound8> = None;
                    DirectSoundCreate8(guid_ptr, &mut ds, None)
                        .map_err(|e| HardwareError::DeviceUnavailable(format!("DirectSoundCreate8 failed: {}", e)))?;
                    let ds = ds.ok_or_else(|| HardwareError::DeviceUnavailable("DirectSoundCreate8 returned no device".into()))?;

                    ds.SetCooperativeLevel(GetDesktopWindow(), DSSCL_PRIORITY)
                        .map_err(|e| HardwareError::DeviceUnavailable(format!("SetCooperativeLevel failed: {}", e)))?;

                    log::debug!("Opened DirectSound playback device {}", device_id.unwrap_or("default"));
                    Ok(DirectSoundDevice::Playback(ds))
                }
                Direction::Capture => {
                    let mut dsc: Option<IDirectSoundCapture> = None;
                    DirectSoundCaptureCreate8(guid_ptr, &mut dsc, None).map_err(|e| {
                        HardwareError::DeviceUnavailable(format!("DirectSoundCaptureCreate8 failed: {}", e))
                    })?;
                    let dsc = dsc.ok_or_else(|| {
                        HardwareError::DeviceUnavailable("DirectSoundCaptureCreate8 returned no device".into())
                    })?;

                    log::debug!("Opened DirectSound capture device {}", device_id.unwrap_or("default"));
                    Ok(DirectSoundDevice::Capture(dsc))
                }
            }
        }
    }

    fn promote_current_thread(&self) -> Result<(), HardwareError> {
        unsafe {
            SetThreadPriority(GetCurrentThread(), THREAD_PRIORITY_TIME_CRITICAL)
                .map_err(|e| HardwareError::CallFailed(format!("SetThreadPriority failed: {}", e)))
        }
    }
}

/// An open DirectSound or DirectSoundCapture object.
pub enum DirectSoundDevice {
    Playback(IDirectSound8),
    Capture(IDirectSoundCapture),
}

// SAFETY: DirectSound objects are free-threaded. The session only touches a
// device under its instance lock, so calls are never concurrent.
unsafe impl Send for DirectSoundDevice {}

impl AudioDevice for DirectSoundDevice {
    type Buffer = DsBuffer;

    fn create_buffer(&mut self, format: &FormatSpec, size_bytes: usize) -> Result<DsBuffer, HardwareError> {
        let mut wfx = wave_format(format);
        let bytes = u32::try_from(size_bytes)
            .map_err(|_| HardwareError::BufferCreationFailed(format!("buffer too large: {} bytes", size_bytes)))?;

        unsafe {
            match self {
                Self::Playback(ds) => {
                    let desc = DSBUFFERDESC {
                        dwSize: std::mem::size_of::<DSBUFFERDESC>() as u32,
                        dwFlags: DSBCAPS_GETCURRENTPOSITION2 | DSBCAPS_GLOBALFOCUS | DSBCAPS_CTRLVOLUME,
                        dwBufferBytes: bytes,
                        dwReserved: 0,
                        lpwfxFormat: &mut wfx,
                        guid3DAlgorithm: GUID::zeroed(),
                    };

                    let mut buffer: Option<IDirectSoundBuffer> = None;
                    ds.CreateSoundBuffer(&desc, &mut buffer, None).map_err(|e| {
                        HardwareError::BufferCreationFailed(format!("CreateSoundBuffer failed: {}", e))
                    })?;
                    let buffer8: IDirectSoundBuffer8 = buffer
                        .ok_or_else(|| HardwareError::BufferCreationFailed("CreateSoundBuffer returned no buffer".into()))?
                        .cast()
                        .map_err(|e| HardwareError::BufferCreationFailed(format!("IDirectSoundBuffer8 query failed: {}", e)))?;

                    Ok(DsBuffer::Playback(DirectSoundBuffer::new(buffer8, size_bytes)))
                }
                Self::Capture(dsc) => {
                    let desc = DSCBUFFERDESC {
                        dwSize: std::mem::size_of::<DSCBUFFERDESC>() as u32,
                        dwFlags: 0,
                        dwBufferBytes: bytes,
                        dwReserved: 0,
                        lpwfxFormat: &mut wfx,
                        dwFXCount: 0,
                        lpDSCFXDesc: std::ptr::null_mut(),
                    };

                    let mut buffer: Option<IDirectSoundCaptureBuffer> = None;
                    dsc.CreateCaptureBuffer(&desc, &mut buffer, None).map_err(|e| {
                        HardwareError::BufferCreationFailed(format!("CreateCaptureBuffer failed: {}", e))
                    })?;
                    let buffer8: IDirectSoundCaptureBuffer8 = buffer
                        .ok_or_else(|| HardwareError::BufferCreationFailed("CreateCaptureBuffer returned no buffer".into()))?
                        .cast()
                        .map_err(|e| {
                            HardwareError::BufferCreationFailed(format!("IDirectSoundCaptureBuffer8 query failed: {}", e))
                        })?;

                    Ok(DsBuffer::Capture(DirectSoundCaptureBuffer::new(buffer8, size_bytes)))
                }
            }
        }
    }
}

fn wave_format(format: &FormatSpec) -> WAVEFORMATEX {
    WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM,
        nChannels: format.channels,
        nSamplesPerSec: format.sample_rate,
        nAvgBytesPerSec: format.avg_bytes_per_sec() as u32,
        nBlockAlign: format.bytes_per_sample as u16,
        wBitsPerSample: format.bits_per_sample(),
        cbSize: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_guid_with_and_without_braces() {
        let plain = parse_device_guid("bd6dd71a-3deb-11d1-b171-00c04fc20000").unwrap();
        let braced = parse_device_guid("{BD6DD71A-3DEB-11D1-B171-00C04FC20000}").unwrap();
        assert_eq!(plain, braced);
    }

    #[test]
    fn rejects_malformed_guid() {
        assert!(matches!(
            parse_device_guid("speakers"),
            Err(HardwareError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn maps_device_gone_codes() {
        assert_eq!(
            map_error("Stop", Error::from(DSERR_DEVICE_RECONFIGURED)),
            HardwareError::DeviceReconfigured
        );
        assert_eq!(map_error("Stop", Error::from(DSERR_NO_DRIVER)), HardwareError::NoDriver);
    }

    #[test]
    fn pcm_wave_format() {
        let wfx = wave_format(&FormatSpec::pcm16(2, 44100));
        assert_eq!(wfx.nBlockAlign, 4);
        assert_eq!(wfx.wBitsPerSample, 16);
        assert_eq!(wfx.nAvgBytesPerSec, 176_400);
    }
}
