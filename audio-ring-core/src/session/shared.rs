use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::models::config::RingBufferConfiguration;
use crate::models::diagnostics::RingDiagnostics;
use crate::models::format::{Direction, FormatSpec};
use crate::models::state::LifecycleState;
use crate::processing::buffer_sizing::BufferLayout;
use crate::processing::position::PositionTracker;
use crate::processing::ring_buffer::SegmentRing;
use crate::traits::backend::{AudioBackend, BufferOf};
use crate::traits::delegate::RingBufferDelegate;

/// Transfer bookkeeping, mutated only under the session lock.
#[derive(Debug)]
pub(crate) struct TransferState {
    pub tracker: PositionTracker,
    pub suspended: bool,
    pub should_run: bool,
    pub flushing: bool,
    pub retry_count: u32,
}

/// Owned hardware handles. Fields drop in declaration order, so the buffer
/// always goes before the device that created it.
pub(crate) struct HardwareSlot<B: AudioBackend> {
    pub buffer: Option<BufferOf<B>>,
    pub device: Option<B::Device>,
}

impl<B: AudioBackend> HardwareSlot<B> {
    pub fn install(&mut self, device: B::Device, buffer: BufferOf<B>) {
        self.release();
        self.device = Some(device);
        self.buffer = Some(buffer);
    }

    pub fn release(&mut self) {
        self.buffer = None;
        self.device = None;
    }
}

/// State guarded by the session lock.
pub(crate) struct Inner<B: AudioBackend> {
    pub transfer: TransferState,
    pub hardware: HardwareSlot<B>,
    pub lifecycle: LifecycleState,
    pub worker_exited: bool,
    pub volume: f64,
}

/// Everything the controlling side and the transfer thread share.
///
/// Lock order: `inner` → `segments` → `diagnostics`. Delegate callbacks are
/// never made while `inner` is held.
pub(crate) struct Shared<B: AudioBackend> {
    pub backend: B,
    pub config: RingBufferConfiguration,
    pub format: FormatSpec,
    pub layout: BufferLayout,
    pub segments: Arc<Mutex<SegmentRing>>,
    pub delegate: Mutex<Option<Arc<dyn RingBufferDelegate>>>,
    pub inner: Mutex<Inner<B>>,
    /// Signalled when a suspended worker should re-check its state.
    pub wake: Condvar,
    /// Signalled by the worker on its way out.
    pub exited: Condvar,
    pub diagnostics: Mutex<RingDiagnostics>,
}

impl<B: AudioBackend> Shared<B> {
    pub fn new(
        backend: B,
        config: RingBufferConfiguration,
        format: FormatSpec,
        layout: BufferLayout,
        device: B::Device,
        buffer: BufferOf<B>,
    ) -> Self {
        let direction = config.direction;
        let volume = config.volume;
        Self {
            backend,
            format,
            layout,
            segments: Arc::new(Mutex::new(SegmentRing::new(direction, &layout))),
            delegate: Mutex::new(None),
            inner: Mutex::new(Inner {
                transfer: TransferState {
                    tracker: PositionTracker::new(&layout),
                    suspended: false,
                    should_run: false,
                    flushing: false,
                    retry_count: 0,
                },
                hardware: HardwareSlot {
                    buffer: Some(buffer),
                    device: Some(device),
                },
                lifecycle: LifecycleState::Idle,
                worker_exited: false,
                volume,
            }),
            wake: Condvar::new(),
            exited: Condvar::new(),
            diagnostics: Mutex::new(RingDiagnostics::new(direction.label())),
            config,
        }
    }

    pub fn direction(&self) -> Direction {
        self.config.direction
    }

    pub fn delegate(&self) -> Option<Arc<dyn RingBufferDelegate>> {
        self.delegate.lock().clone()
    }

    pub fn notify_state(&self, state: LifecycleState) {
        if let Some(delegate) = self.delegate() {
            delegate.on_state_changed(&state);
        }
    }

    pub fn record(&self, update: impl FnOnce(&mut RingDiagnostics)) {
        update(&mut self.diagnostics.lock());
    }
}
