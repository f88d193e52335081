use crate::models::config::RingBufferConfiguration;
use crate::models::error::{HardwareError, RingError};
use crate::models::format::FormatSpec;
use crate::processing::buffer_sizing::BufferLayout;
use crate::traits::backend::{AudioBackend, AudioDevice, BufferOf};

/// Open the configured device and create a buffer of `layout.total_size`.
///
/// Open failures surface as `DeviceUnavailable`, buffer failures as
/// `BufferCreationFailed`. A device whose buffer could not be created is
/// closed before returning.
pub(crate) fn acquire_hardware<B: AudioBackend>(
    backend: &B,
    config: &RingBufferConfiguration,
    format: &FormatSpec,
    layout: &BufferLayout,
) -> Result<(B::Device, BufferOf<B>), RingError> {
    let device_label = config.device_id.as_deref().unwrap_or("default");

    let mut device = backend
        .open(config.device_id.as_deref(), config.direction)
        .map_err(|err| match err {
            HardwareError::DeviceUnavailable(reason) => RingError::DeviceUnavailable(reason),
            other => RingError::DeviceUnavailable(format!("{}: {}", device_label, other)),
        })?;

    let buffer = device
        .create_buffer(format, layout.total_size)
        .map_err(|err| match err {
            HardwareError::BufferCreationFailed(reason) => RingError::BufferCreationFailed(reason),
            other => RingError::BufferCreationFailed(other.to_string()),
        })?;

    log::debug!(
        "Acquired {} buffer on {} device: {} x {} bytes",
        config.direction.label(),
        device_label,
        layout.segment_count,
        layout.segment_size
    );

    Ok((device, buffer))
}
