//! DirectSound device enumeration.
//!
//! Lists playback and capture devices as the DirectSound runtime reports
//! them. The primary device comes back with a null GUID and is surfaced
//! with `id: None`, which is also what `DirectSoundBackend::open` takes to
//! select the default device.

use std::ffi::c_void;

use windows::core::{BOOL, GUID, PCWSTR};
use windows::Win32::Media::Audio::DirectSound::{DirectSoundCaptureEnumerateW, DirectSoundEnumerateW};

use audio_ring_core::models::error::HardwareError;
use audio_ring_core::models::format::Direction;

/// A device as reported by DirectSound enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// GUID string accepted by `DirectSoundBackend::open`, or `None` for
    /// the primary device.
    pub id: Option<String>,
    pub description: String,
    pub module: String,
    pub direction: Direction,
}

impl DeviceInfo {
    pub fn is_default(&self) -> bool {
        self.id.is_none()
    }
}

/// Enumerates DirectSound playback and capture devices.
pub struct DeviceEnumerator;

impl DeviceEnumerator {
    pub fn list_playback_devices() -> Result<Vec<DeviceInfo>, HardwareError> {
        Self::list(Direction::Playback)
    }

    pub fn list_capture_devices() -> Result<Vec<DeviceInfo>, HardwareError> {
        Self::list(Direction::Capture)
    }

    fn list(direction: Direction) -> Result<Vec<DeviceInfo>, HardwareError> {
        let mut found = Collected {
            direction,
            devices: Vec::new(),
        };
        let context = &mut found as *mut Collected as *const c_void;

        let result = unsafe {
            match direction {
                Direction::Playback => DirectSoundEnumerateW(Some(collect_device), Some(context)),
                Direction::Capture => DirectSoundCaptureEnumerateW(Some(collect_device), Some(context)),
            }
        };
        result.map_err(|e| HardwareError::CallFailed(format!("{} enumeration failed: {}", direction.label(), e)))?;

        log::debug!("Enumerated {} {} devices", found.devices.len(), direction.label());
        Ok(found.devices)
    }
}

struct Collected {
    direction: Direction,
    devices: Vec<DeviceInfo>,
}

unsafe extern "system" fn collect_device(
    guid: *mut GUID,
    description: PCWSTR,
    module: PCWSTR,
    context: *mut c_void,
) -> BOOL {
    let found = &mut *(context as *mut Collected);
    let id = if guid.is_null() {
        None
    } else {
        Some(format!("{:?}", *guid))
    };
    found.devices.push(DeviceInfo {
        id,
        description: wide_to_string(description),
        module: wide_to_string(module),
        direction: found.direction,
    });
    true.into()
}

unsafe fn wide_to_string(text: PCWSTR) -> String {
    if text.is_null() {
        String::new()
    } else {
        text.to_string().unwrap_or_default()
    }
}
