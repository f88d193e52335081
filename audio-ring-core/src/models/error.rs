use std::time::Duration;

use thiserror::Error;

/// Failures reported by a hardware backend.
///
/// Backends map their native status codes onto these variants; the transfer
/// engine only branches on `BufferLost` and `DeviceReconfigured`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HardwareError {
    #[error("buffer lost")]
    BufferLost,

    #[error("device reconfigured")]
    DeviceReconfigured,

    #[error("no driver present")]
    NoDriver,

    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),

    #[error("hardware call failed: {0}")]
    CallFailed(String),
}

impl HardwareError {
    /// The device went away underneath us; a stop that fails this way
    /// has still left the transport stopped.
    pub fn is_device_gone(&self) -> bool {
        matches!(self, Self::DeviceReconfigured | Self::NoDriver)
    }
}

/// Errors surfaced by a ring buffer session.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RingError {
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("buffer creation failed: {0}")]
    BufferCreationFailed(String),

    #[error("invalid format: {0}")]
    InvalidFormat(String),

    #[error("configuration failed: {0}")]
    ConfigurationFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("failed to spawn transfer thread: {0}")]
    ThreadSpawnFailed(String),

    #[error("transfer thread did not exit within {0:?}")]
    StopTimeout(Duration),

    #[error("buffer still lost after {0} restore attempts")]
    RestoreExhausted(u32),

    #[error("position query failed: {0}")]
    PositionQueryFailed(HardwareError),

    #[error("hardware error: {0}")]
    Hardware(HardwareError),
}

impl From<HardwareError> for RingError {
    fn from(err: HardwareError) -> Self {
        match err {
            HardwareError::DeviceUnavailable(reason) => Self::DeviceUnavailable(reason),
            HardwareError::BufferCreationFailed(reason) => Self::BufferCreationFailed(reason),
            other => Self::Hardware(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_gone_codes() {
        assert!(HardwareError::DeviceReconfigured.is_device_gone());
        assert!(HardwareError::NoDriver.is_device_gone());
        assert!(!HardwareError::BufferLost.is_device_gone());
        assert!(!HardwareError::CallFailed("x".into()).is_device_gone());
    }

    #[test]
    fn hardware_errors_convert_to_session_errors() {
        let err: RingError = HardwareError::DeviceUnavailable("no such guid".into()).into();
        assert_eq!(err, RingError::DeviceUnavailable("no such guid".into()));

        let err: RingError = HardwareError::BufferCreationFailed("out of memory".into()).into();
        assert_eq!(err, RingError::BufferCreationFailed("out of memory".into()));

        let err: RingError = HardwareError::NoDriver.into();
        assert_eq!(err, RingError::Hardware(HardwareError::NoDriver));
    }

    #[test]
    fn display_messages() {
        assert_eq!(
            RingError::RestoreExhausted(11).to_string(),
            "buffer still lost after 11 restore attempts"
        );
        assert_eq!(
            RingError::PositionQueryFailed(HardwareError::CallFailed("E_FAIL".into())).to_string(),
            "position query failed: hardware call failed: E_FAIL"
        );
    }
}
