//! # audio-ring-core
//!
//! Platform-agnostic hardware ring-buffer transfer engine.
//!
//! Moves fixed-size software segments to (playback) or from (capture) a
//! device's circular hardware buffer on a dedicated real-time thread, and
//! recovers from lost buffers and reconfigured devices. Platform backends
//! (Windows DirectSound) implement the `AudioBackend` traits and plug into
//! the generic `RingBufferSession`.
//!
//! ## Architecture
//!
//! ```text
//! audio-ring-core (this crate)
//! ├── traits/       ← AudioBackend, AudioDevice, HardwareBuffer, SegmentQueue, RingBufferDelegate
//! ├── models/       ← RingError, HardwareError, LifecycleState, RingBufferConfiguration, FormatSpec, diagnostics
//! ├── processing/   ← buffer sizing, PositionTracker, region copies, SegmentRing
//! ├── session/      ← RingBufferSession (lifecycle), transfer engine, recovery
//! └── simulated     ← SimulatedBackend for tests and demos
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod simulated;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use models::config::RingBufferConfiguration;
pub use models::diagnostics::RingDiagnostics;
pub use models::error::{HardwareError, RingError};
pub use models::format::{Direction, FormatSpec};
pub use models::state::LifecycleState;
pub use processing::buffer_sizing::{compute_layout, BufferLayout};
pub use processing::position::PositionTracker;
pub use processing::ring_buffer::SegmentRing;
pub use session::ring_session::RingBufferSession;
pub use simulated::SimulatedBackend;
pub use traits::backend::{AudioBackend, AudioDevice, BufferOf, BufferStatus, CursorPair, HardwareBuffer};
pub use traits::delegate::RingBufferDelegate;
pub use traits::segment_queue::{Segment, SegmentQueue};
