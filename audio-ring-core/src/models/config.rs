use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::RingError;
use super::format::Direction;

/// Configuration for a ring buffer session.
///
/// Durations serialize as integer milliseconds, e.g.
/// `{"direction": "capture", "latency": 20, "buffer_duration": 400}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RingBufferConfiguration {
    /// Specific device ID, or None for the system default.
    pub device_id: Option<String>,

    pub direction: Direction,

    /// Requested segment duration (default: 10ms). Raised to twice
    /// `min_sleep` when smaller.
    #[serde(with = "duration_ms")]
    pub latency: Duration,

    /// Requested total hardware buffer duration (default: 200ms).
    #[serde(with = "duration_ms")]
    pub buffer_duration: Duration,

    /// Sleep granularity of the transfer loop (default: 10ms).
    #[serde(with = "duration_ms")]
    pub min_sleep: Duration,

    /// Extra restore attempts after a lost buffer (default: 10).
    pub max_lost_retries: u32,

    /// Wait before reopening a reconfigured device (default: 2000ms).
    #[serde(with = "duration_ms")]
    pub reconfigure_settle: Duration,

    /// Bound on waiting for the transfer thread in `stop()` (default: 5000ms).
    #[serde(with = "duration_ms")]
    pub stop_timeout: Duration,

    /// Linear playback volume, 0.0–1.0 (default: 1.0).
    pub volume: f64,

    /// Stack size of the transfer thread in bytes (default: 256 KiB).
    pub worker_stack_size: usize,
}

impl RingBufferConfiguration {
    pub fn playback() -> Self {
        Self::default()
    }

    pub fn capture() -> Self {
        Self {
            direction: Direction::Capture,
            ..Self::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self, RingError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| RingError::ConfigurationFailed(format!("failed to parse configuration: {}", e)))?;
        config.validate().map_err(RingError::ConfigurationFailed)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min_sleep.is_zero() {
            return Err("min sleep must be positive".into());
        }
        if self.buffer_duration.is_zero() {
            return Err("buffer duration must be positive".into());
        }
        if self.stop_timeout.is_zero() {
            return Err("stop timeout must be positive".into());
        }
        if !(0.0..=1.0).contains(&self.volume) {
            return Err(format!("volume out of range: {}", self.volume));
        }
        if self.worker_stack_size < 16 * 1024 {
            return Err(format!("worker stack too small: {} bytes", self.worker_stack_size));
        }
        Ok(())
    }
}

impl Default for RingBufferConfiguration {
    fn default() -> Self {
        Self {
            device_id: None,
            direction: Direction::Playback,
            latency: Duration::from_millis(10),
            buffer_duration: Duration::from_millis(200),
            min_sleep: Duration::from_millis(10),
            max_lost_retries: 10,
            reconfigure_settle: Duration::from_millis(2000),
            stop_timeout: Duration::from_millis(5000),
            volume: 1.0,
            worker_stack_size: 256 * 1024,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = RingBufferConfiguration::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.direction, Direction::Playback);
        assert_eq!(config.max_lost_retries, 10);
        assert_eq!(config.stop_timeout, Duration::from_secs(5));
    }

    #[test]
    fn parses_partial_json() {
        let config = RingBufferConfiguration::from_json(
            r#"{"direction": "capture", "latency": 20, "buffer_duration": 400, "device_id": "{abc}"}"#,
        )
        .unwrap();

        assert_eq!(config.direction, Direction::Capture);
        assert_eq!(config.latency, Duration::from_millis(20));
        assert_eq!(config.buffer_duration, Duration::from_millis(400));
        assert_eq!(config.device_id.as_deref(), Some("{abc}"));
        // untouched fields keep their defaults
        assert_eq!(config.min_sleep, Duration::from_millis(10));
    }

    #[test]
    fn json_round_trip_keeps_milliseconds() {
        let config = RingBufferConfiguration {
            reconfigure_settle: Duration::from_millis(1500),
            ..RingBufferConfiguration::capture()
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"reconfigure_settle\":1500"));
        assert_eq!(RingBufferConfiguration::from_json(&json).unwrap(), config);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let config = RingBufferConfiguration {
            volume: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let err = RingBufferConfiguration::from_json(r#"{"min_sleep": 0}"#).unwrap_err();
        assert!(matches!(err, RingError::ConfigurationFailed(_)));
    }
}
