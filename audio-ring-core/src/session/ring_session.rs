use std::sync::Arc;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use parking_lot::Mutex;

use super::acquire::acquire_hardware;
use super::shared::Shared;
use super::transfer::TransferEngine;
use crate::models::config::RingBufferConfiguration;
use crate::models::diagnostics::RingDiagnostics;
use crate::models::error::{HardwareError, RingError};
use crate::models::format::{Direction, FormatSpec};
use crate::models::state::LifecycleState;
use crate::processing::buffer_sizing::{compute_layout, BufferLayout};
use crate::processing::position::PositionTracker;
use crate::processing::ring_buffer::SegmentRing;
use crate::traits::backend::{AudioBackend, HardwareBuffer};
use crate::traits::delegate::RingBufferDelegate;

/// A hardware ring buffer driven by a dedicated transfer thread.
///
/// Data flow:
/// ```text
/// playback: [app] → commit → [SegmentRing] → transfer thread → [hardware buffer] → device
/// capture:  device → [hardware buffer] → transfer thread → [SegmentRing] → take → [app]
/// ```
///
/// Lifecycle:
/// 1. `acquire()` — open the device, size and create the hardware buffer
/// 2. `start()` — spawn the transfer thread
/// 3. `pause()` / `resume()` — park and wake the thread
/// 4. `stop()` — stop the thread, bounded by the configured timeout
/// 5. `release()` or drop — free the hardware
pub struct RingBufferSession<B: AudioBackend> {
    shared: Arc<Shared<B>>,
    worker: Option<JoinHandle<()>>,
    released: bool,
}

impl<B: AudioBackend> RingBufferSession<B> {
    pub fn acquire(backend: B, config: RingBufferConfiguration, format: FormatSpec) -> Result<Self, RingError> {
        config.validate().map_err(RingError::ConfigurationFailed)?;
        format.validate().map_err(RingError::InvalidFormat)?;

        let layout = compute_layout(&format, config.latency, config.buffer_duration, config.min_sleep)?;
        let (device, buffer) = acquire_hardware(&backend, &config, &format, &layout)?;

        log::info!(
            "Acquired {} ring buffer: {} ch, {} Hz, {} segments of {} bytes ({:?})",
            config.direction.label(),
            format.channels,
            format.sample_rate,
            layout.segment_count,
            layout.segment_size,
            layout.latency
        );

        Ok(Self {
            shared: Arc::new(Shared::new(backend, config, format, layout, device, buffer)),
            worker: None,
            released: false,
        })
    }

    pub fn set_delegate(&self, delegate: Arc<dyn RingBufferDelegate>) {
        *self.shared.delegate.lock() = Some(delegate);
    }

    pub fn state(&self) -> LifecycleState {
        self.shared.inner.lock().lifecycle
    }

    pub fn direction(&self) -> Direction {
        self.shared.direction()
    }

    pub fn layout(&self) -> BufferLayout {
        self.shared.layout
    }

    pub fn format(&self) -> FormatSpec {
        self.shared.format
    }

    pub fn config(&self) -> &RingBufferConfiguration {
        &self.shared.config
    }

    /// The software segment queue. Playback producers `commit` into it,
    /// capture consumers `take` from it.
    pub fn segments(&self) -> Arc<Mutex<SegmentRing>> {
        Arc::clone(&self.shared.segments)
    }

    pub fn diagnostics(&self) -> RingDiagnostics {
        self.shared.diagnostics.lock().clone()
    }

    /// Snapshot of the transfer position.
    pub fn position(&self) -> PositionTracker {
        self.shared.inner.lock().transfer.tracker
    }

    pub fn volume(&self) -> f64 {
        self.shared.inner.lock().volume
    }

    /// Spawn the transfer thread. Only valid from `Idle`.
    pub fn start(&mut self) -> Result<(), RingError> {
        let shared = Arc::clone(&self.shared);
        let direction = shared.direction();

        {
            let mut inner = shared.inner.lock();
            if !inner.lifecycle.is_idle() {
                return Err(RingError::InvalidState(format!("cannot start from {:?}", inner.lifecycle)));
            }

            // The worker blocks on the lock we hold until setup below is done.
            let engine = TransferEngine::new(Arc::clone(&shared));
            let handle = thread::Builder::new()
                .name(format!("audio-ring-{}", direction.label()))
                .stack_size(shared.config.worker_stack_size)
                .spawn(move || engine.run())
                .map_err(|e| RingError::ThreadSpawnFailed(e.to_string()))?;
            self.worker = Some(handle);

            inner.transfer.should_run = true;
            inner.transfer.suspended = false;
            inner.worker_exited = false;

            if direction == Direction::Playback {
                let volume = inner.volume;
                if let Some(buffer) = inner.hardware.buffer.as_mut() {
                    if let Err(e) = buffer.set_volume(volume) {
                        log::warn!("Failed to apply initial volume: {}", e);
                    }
                }
            }

            shared.segments.lock().activate();
            inner.lifecycle = LifecycleState::Running;
        }

        shared.record(|d| d.started_at = Some(Utc::now()));
        log::info!("{} ring buffer started", direction.label());
        shared.notify_state(LifecycleState::Running);
        Ok(())
    }

    /// Stop the hardware transport and park the transfer thread.
    /// Pausing a paused session is a no-op.
    pub fn pause(&self) -> Result<(), RingError> {
        let stopped = {
            let mut inner = self.shared.inner.lock();
            match inner.lifecycle {
                LifecycleState::Paused => return Ok(()),
                LifecycleState::Running => {}
                other => return Err(RingError::InvalidState(format!("cannot pause from {:?}", other))),
            }

            inner.transfer.suspended = true;
            inner.lifecycle = LifecycleState::Paused;
            stop_transport(inner.hardware.buffer.as_mut())
        };

        log::info!("{} ring buffer paused", self.shared.direction().label());
        self.shared.notify_state(LifecycleState::Paused);

        stopped.map_err(|e| {
            log::warn!("Failed to stop hardware buffer on pause: {}", e);
            RingError::from(e)
        })
    }

    /// Wake the transfer thread. Resuming a running session is a no-op.
    pub fn resume(&self) -> Result<(), RingError> {
        {
            let mut inner = self.shared.inner.lock();
            match inner.lifecycle {
                LifecycleState::Running => return Ok(()),
                LifecycleState::Paused => {}
                other => return Err(RingError::InvalidState(format!("cannot resume from {:?}", other))),
            }
            if inner.worker_exited {
                return Err(RingError::InvalidState("transfer thread has exited".into()));
            }

            inner.transfer.suspended = false;
            inner.lifecycle = LifecycleState::Running;
            self.shared.wake.notify_all();
        }

        log::info!("{} ring buffer resumed", self.shared.direction().label());
        self.shared.notify_state(LifecycleState::Running);
        Ok(())
    }

    /// Stop the transfer thread and wait for it to exit, up to the
    /// configured stop timeout.
    ///
    /// On timeout the thread handle is kept and the state is unchanged, so
    /// a later `stop()` can try again.
    pub fn stop(&mut self) -> Result<(), RingError> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        let shared = Arc::clone(&self.shared);
        let timeout = shared.config.stop_timeout;

        let stopped = {
            let mut inner = shared.inner.lock();
            inner.transfer.should_run = false;
            inner.transfer.suspended = false;
            let stopped = stop_transport(inner.hardware.buffer.as_mut());
            shared.wake.notify_all();

            shared
                .exited
                .wait_while_for(&mut inner, |inner| !inner.worker_exited, timeout);
            if !inner.worker_exited {
                drop(inner);
                self.worker = Some(handle);
                log::error!("{} transfer thread did not exit within {:?}", shared.direction().label(), timeout);
                return Err(RingError::StopTimeout(timeout));
            }

            inner.lifecycle = LifecycleState::Stopped;
            stopped
        };

        if handle.join().is_err() {
            log::error!("{} transfer thread panicked", shared.direction().label());
        }
        shared.segments.lock().deactivate();

        log::info!("{} ring buffer stopped", shared.direction().label());
        shared.notify_state(LifecycleState::Stopped);

        stopped.map_err(|e| {
            log::warn!("Failed to stop hardware buffer: {}", e);
            RingError::from(e)
        })
    }

    /// Set the linear playback volume (0.0–1.0). Applied now and to every
    /// buffer recreated later.
    pub fn set_volume(&self, volume: f64) -> Result<(), RingError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(RingError::ConfigurationFailed(format!("volume out of range: {}", volume)));
        }

        let mut inner = self.shared.inner.lock();
        inner.volume = volume;
        if self.shared.direction() == Direction::Playback {
            if let Some(buffer) = inner.hardware.buffer.as_mut() {
                buffer.set_volume(volume)?;
            }
        }
        Ok(())
    }

    /// While flushing, the transfer thread skips transfers. Entering a
    /// flush discards queued segments and any partially transferred one.
    pub fn set_flushing(&self, flushing: bool) {
        let mut inner = self.shared.inner.lock();
        if flushing && !inner.transfer.flushing {
            self.shared.segments.lock().clear_all();
            inner.transfer.tracker.reset_segment();
        }
        inner.transfer.flushing = flushing;
    }

    /// Frames sitting in the hardware buffer between the device cursor and
    /// the transfer position. 0 when the cursor can't be read.
    pub fn delay(&self) -> usize {
        let inner = self.shared.inner.lock();
        let Some(buffer) = inner.hardware.buffer.as_ref() else {
            return 0;
        };

        match buffer.position() {
            Ok(cursors) => {
                let queued = inner.transfer.tracker.queued(self.shared.direction(), cursors.device);
                queued / self.shared.format.bytes_per_sample as usize
            }
            Err(e) => {
                log::warn!("Failed to read cursor for delay: {}", e);
                0
            }
        }
    }

    /// Stop, then free the hardware and the segment storage.
    pub fn release(mut self) -> Result<(), RingError> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> Result<(), RingError> {
        if self.released {
            return Ok(());
        }
        let stopped = self.stop();

        self.shared.inner.lock().hardware.release();
        self.shared.segments.lock().release();
        self.released = true;

        log::info!("{} ring buffer released", self.shared.direction().label());
        stopped
    }
}

impl<B: AudioBackend> Drop for RingBufferSession<B> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            log::warn!("Error releasing ring buffer: {}", e);
        }
    }
}

/// Stop the transport. A device that has gone away is already stopped.
fn stop_transport<H: HardwareBuffer>(buffer: Option<&mut H>) -> Result<(), HardwareError> {
    match buffer.map(|b| b.stop()) {
        Some(Err(e)) if !e.is_device_gone() => Err(e),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    use approx::assert_relative_eq;

    use crate::simulated::SimulatedBackend;

    #[derive(Default)]
    struct StateLog {
        states: Mutex<Vec<LifecycleState>>,
        errors: Mutex<Vec<RingError>>,
    }

    impl RingBufferDelegate for StateLog {
        fn on_state_changed(&self, state: &LifecycleState) {
            self.states.lock().push(*state);
        }

        fn on_error(&self, error: &RingError) {
            self.errors.lock().push(error.clone());
        }
    }

    fn fast_config(direction: Direction) -> RingBufferConfiguration {
        RingBufferConfiguration {
            direction,
            latency: Duration::from_millis(20),
            buffer_duration: Duration::from_millis(200),
            min_sleep: Duration::from_millis(1),
            stop_timeout: Duration::from_secs(2),
            ..Default::default()
        }
    }

    fn playback(backend: &SimulatedBackend) -> RingBufferSession<SimulatedBackend> {
        RingBufferSession::acquire(
            backend.clone(),
            fast_config(Direction::Playback),
            FormatSpec::new(2, 44100, 4),
        )
        .unwrap()
    }

    fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if condition() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        false
    }

    #[test]
    fn acquire_sizes_buffer() {
        let backend = SimulatedBackend::new();
        let session = playback(&backend);

        assert_eq!(session.state(), LifecycleState::Idle);
        assert_eq!(session.layout().segment_size, 3528);
        assert_eq!(session.layout().total_size, 35280);
        assert_eq!(backend.storage().len(), 35280);
        assert_eq!(backend.opens(), 1);
    }

    #[test]
    fn acquire_reports_device_and_buffer_failures() {
        let backend = SimulatedBackend::new();
        backend.fail_open(HardwareError::DeviceUnavailable("no such device".into()));
        let err = RingBufferSession::acquire(backend.clone(), fast_config(Direction::Playback), FormatSpec::pcm16(2, 48000))
            .err()
            .unwrap();
        assert_eq!(err, RingError::DeviceUnavailable("no such device".into()));

        backend.fail_create(HardwareError::CallFailed("E_OUTOFMEMORY".into()));
        let err = RingBufferSession::acquire(backend.clone(), fast_config(Direction::Playback), FormatSpec::pcm16(2, 48000))
            .err()
            .unwrap();
        assert_eq!(err, RingError::BufferCreationFailed("hardware call failed: E_OUTOFMEMORY".into()));
        assert_eq!(backend.open_devices(), 0);

        let err = RingBufferSession::acquire(backend.clone(), fast_config(Direction::Capture), FormatSpec::new(2, 48000, 3))
            .err()
            .unwrap();
        assert!(matches!(err, RingError::InvalidFormat(_)));
    }

    #[test]
    fn start_runs_transfers() {
        let backend = SimulatedBackend::new();
        backend.set_cursor_step(3528);
        let mut session = playback(&backend);
        let log = Arc::new(StateLog::default());
        session.set_delegate(log.clone());

        session.start().unwrap();
        assert_eq!(session.state(), LifecycleState::Running);
        assert!(matches!(session.start(), Err(RingError::InvalidState(_))));

        assert!(wait_for(|| session.diagnostics().segments_completed >= 12));
        assert!(session.diagnostics().started_at.is_some());
        assert!(backend.is_running());
        assert!(backend.promotions() >= 1);

        session.stop().unwrap();
        assert_eq!(session.state(), LifecycleState::Stopped);
        assert!(!backend.is_running());
        assert!(!session.segments().lock().is_active());
        assert_eq!(
            *log.states.lock(),
            vec![LifecycleState::Running, LifecycleState::Stopped]
        );
        assert!(log.errors.lock().is_empty());
    }

    #[test]
    fn pause_and_resume_are_idempotent() {
        let backend = SimulatedBackend::new();
        let mut session = playback(&backend);
        let log = Arc::new(StateLog::default());
        session.set_delegate(log.clone());

        assert!(matches!(session.pause(), Err(RingError::InvalidState(_))));
        session.start().unwrap();

        session.pause().unwrap();
        session.pause().unwrap();
        assert_eq!(session.state(), LifecycleState::Paused);

        session.resume().unwrap();
        session.resume().unwrap();
        assert_eq!(session.state(), LifecycleState::Running);

        session.stop().unwrap();
        assert_eq!(
            *log.states.lock(),
            vec![
                LifecycleState::Running,
                LifecycleState::Paused,
                LifecycleState::Running,
                LifecycleState::Stopped
            ]
        );
    }

    #[test]
    fn stop_while_paused_wakes_worker() {
        let backend = SimulatedBackend::new();
        let mut session = playback(&backend);
        session.start().unwrap();
        session.pause().unwrap();

        let started = Instant::now();
        session.stop().unwrap();
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(session.state(), LifecycleState::Stopped);
        assert!(matches!(session.resume(), Err(RingError::InvalidState(_))));
    }

    #[test]
    fn stop_without_worker_is_noop() {
        let backend = SimulatedBackend::new();
        let mut session = playback(&backend);

        session.stop().unwrap();
        assert_eq!(session.state(), LifecycleState::Idle);
        assert_eq!(backend.stops(), 0);
    }

    #[test]
    fn pause_reports_stop_failures() {
        let backend = SimulatedBackend::new();
        let mut session = playback(&backend);
        session.start().unwrap();

        backend.fail_next_stop(HardwareError::NoDriver);
        session.pause().unwrap();
        session.resume().unwrap();

        backend.fail_next_stop(HardwareError::CallFailed("E_FAIL".into()));
        let err = session.pause().unwrap_err();
        assert_eq!(err, RingError::Hardware(HardwareError::CallFailed("E_FAIL".into())));
        assert_eq!(session.state(), LifecycleState::Paused);

        session.stop().unwrap();
    }

    #[test]
    fn stop_times_out_during_reconfigure_settle() {
        let backend = SimulatedBackend::new();
        let config = RingBufferConfiguration {
            reconfigure_settle: Duration::from_millis(500),
            stop_timeout: Duration::from_millis(50),
            ..fast_config(Direction::Playback)
        };
        let mut session = RingBufferSession::acquire(backend.clone(), config, FormatSpec::new(2, 44100, 4)).unwrap();
        backend.inject_position_error(HardwareError::DeviceReconfigured);

        session.start().unwrap();
        thread::sleep(Duration::from_millis(100));
        session.pause().unwrap();

        assert_eq!(session.stop(), Err(RingError::StopTimeout(Duration::from_millis(50))));
        assert_eq!(session.state(), LifecycleState::Paused);

        thread::sleep(Duration::from_millis(600));
        // the worker gave up the recovery and exited
        assert!(matches!(session.resume(), Err(RingError::InvalidState(_))));
        session.stop().unwrap();
        assert_eq!(session.state(), LifecycleState::Stopped);
        assert_eq!(backend.opens(), 1);
    }

    #[test]
    fn delay_counts_queued_frames() {
        let backend = SimulatedBackend::new();
        let mut session = playback(&backend);
        assert_eq!(session.delay(), 0);

        {
            let segments = session.segments();
            let mut ring = segments.lock();
            for _ in 0..10 {
                assert!(ring.commit(&[1u8; 3528]));
            }
        }
        session.start().unwrap();

        // the cursor never moves, so nine segments fit before starving
        assert!(wait_for(|| session.position().circular_offset() == 31752));
        assert!(wait_for(|| backend.is_running()));
        assert_eq!(session.delay(), 31752 / 4);

        session.stop().unwrap();
    }

    #[test]
    fn volume_is_validated_and_applied() {
        let backend = SimulatedBackend::new();
        let session = playback(&backend);

        assert!(matches!(session.set_volume(1.5), Err(RingError::ConfigurationFailed(_))));
        session.set_volume(0.25).unwrap();
        assert_eq!(backend.volume(), Some(0.25));
        assert_relative_eq!(session.volume(), 0.25);
    }

    #[test]
    fn flushing_discards_queued_segments() {
        let backend = SimulatedBackend::new();
        let session = playback(&backend);
        session.segments().lock().commit(&[1u8; 16]);

        session.set_flushing(true);
        assert_eq!(session.segments().lock().queued(), 0);
        session.set_flushing(false);
    }

    #[test]
    fn release_frees_hardware() {
        let backend = SimulatedBackend::new();
        let mut session = playback(&backend);
        session.start().unwrap();
        let segments = session.segments();

        session.release().unwrap();
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.open_devices(), 0);
        assert!(!segments.lock().commit(&[0u8; 4]));
    }

    #[test]
    fn drop_releases_hardware() {
        let backend = SimulatedBackend::new();
        {
            let mut session = playback(&backend);
            session.start().unwrap();
        }
        assert_eq!(backend.live_buffers(), 0);
        assert_eq!(backend.open_devices(), 0);
    }

    #[test]
    fn capture_session_delivers_segments() {
        let backend = SimulatedBackend::new();
        backend.set_cursor_step(320);
        let mut session = RingBufferSession::acquire(
            backend.clone(),
            fast_config(Direction::Capture),
            FormatSpec::pcm16(1, 8000),
        )
        .unwrap();
        session.start().unwrap();

        let segments = session.segments();
        assert!(wait_for(|| segments.lock().take().is_some()));
        session.stop().unwrap();
        assert_eq!(session.diagnostics().direction, "capture");
    }
}
