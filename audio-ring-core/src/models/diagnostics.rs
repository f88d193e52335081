use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::RingError;

/// Counters for debugging a ring buffer session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RingDiagnostics {
    pub session_id: String,
    pub direction: String,
    pub started_at: Option<DateTime<Utc>>,
    pub iterations: u64,
    pub bytes_transferred: u64,
    pub segments_completed: u64,
    pub starved_iterations: u64,
    pub restore_attempts: u64,
    pub reacquisitions: u64,
    pub lock_failures: u64,
    pub fatal_errors: u64,
    pub last_error: Option<String>,
    pub last_error_at: Option<DateTime<Utc>>,
}

impl RingDiagnostics {
    pub fn new(direction: &str) -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            direction: direction.to_string(),
            ..Default::default()
        }
    }

    pub(crate) fn record_error(&mut self, error: &RingError) {
        self.fatal_errors += 1;
        self.last_error = Some(error.to_string());
        self.last_error_at = Some(Utc::now());
    }

    pub fn to_json(&self) -> Result<String, RingError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| RingError::ConfigurationFailed(format!("failed to serialize diagnostics: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_get_distinct_ids() {
        let a = RingDiagnostics::new("playback");
        let b = RingDiagnostics::new("playback");
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.direction, "playback");
    }

    #[test]
    fn records_last_error() {
        let mut diag = RingDiagnostics::new("capture");
        diag.record_error(&RingError::RestoreExhausted(11));

        assert_eq!(diag.fatal_errors, 1);
        assert_eq!(diag.last_error.as_deref(), Some("buffer still lost after 11 restore attempts"));
        assert!(diag.last_error_at.is_some());

        let json = diag.to_json().unwrap();
        assert!(json.contains("\"fatal_errors\": 1"));
    }
}
