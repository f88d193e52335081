//! # audio-ring-windows
//!
//! Windows DirectSound backend for audio-ring.
//!
//! Provides:
//! - `DirectSoundBackend` — opens DirectSound 8 playback and DirectSoundCapture 8 devices
//! - `DsBuffer` — looping secondary buffers with lost-buffer restore and volume control
//! - `DeviceEnumerator` — playback and capture device listing
//!
//! ## Platform Requirements
//! - Windows with the DirectSound runtime (present on every supported release)
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use audio_ring_core::{FormatSpec, RingBufferConfiguration, RingBufferSession};
//! use audio_ring_windows::DirectSoundBackend;
//!
//! let mut session = RingBufferSession::acquire(
//!     DirectSoundBackend::new(),
//!     RingBufferConfiguration::playback(),
//!     FormatSpec::pcm16(2, 48000),
//! )
//! .unwrap();
//! session.start().unwrap();
//! ```

#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod dsound_backend;
#[cfg(target_os = "windows")]
pub mod dsound_buffer;

#[cfg(target_os = "windows")]
pub use device_enumerator::{DeviceEnumerator, DeviceInfo};
#[cfg(target_os = "windows")]
pub use dsound_backend::{DirectSoundBackend, DirectSoundDevice};
#[cfg(target_os = "windows")]
pub use dsound_buffer::DsBuffer;
