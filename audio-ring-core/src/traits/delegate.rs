use crate::models::error::RingError;
use crate::models::state::LifecycleState;

/// Event delegate for ring buffer session notifications.
///
/// Called from the transfer thread or the controlling thread, never with
/// the session lock held. Implementations should return quickly.
pub trait RingBufferDelegate: Send + Sync {
    /// Called when the session state changes.
    fn on_state_changed(&self, state: &LifecycleState);

    /// Called once per fatal error on the transfer thread.
    fn on_error(&self, error: &RingError);

    /// Called after the device was reopened following a reconfiguration.
    fn on_device_reacquired(&self) {}
}
