/// Ring buffer lifecycle.
///
/// State transitions:
/// ```text
/// idle → running ⇄ paused
///           ↓        ↓
///          stopped (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Running,
    Paused,
    Stopped,
}

impl LifecycleState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped)
    }

    /// A worker thread exists for this state.
    pub fn has_worker(&self) -> bool {
        matches!(self, Self::Running | Self::Paused)
    }
}
