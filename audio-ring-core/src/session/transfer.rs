use std::sync::Arc;
use std::thread;

use parking_lot::MutexGuard;

use super::shared::{Inner, Shared};
use crate::models::error::{HardwareError, RingError};
use crate::models::format::Direction;
use crate::processing::region_copy::{gather, scatter};
use crate::traits::backend::{AudioBackend, CursorPair, HardwareBuffer};
use crate::traits::segment_queue::SegmentQueue;

/// Outcome of one transfer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    /// Flushing, or no hardware buffer.
    Skipped,
    /// A fatal error was raised (or is still in effect).
    Faulted,
    /// The segment queue had nothing to offer.
    NoSegment,
    /// Not enough room (playback) or data (capture) for the pending chunk.
    Starved { len: usize, available: usize },
    Transferred { len: usize, available: usize },
}

impl Step {
    /// Whether the worker should sleep before the next iteration: always,
    /// unless what is left after a transfer still fits another chunk.
    pub fn wants_sleep(&self) -> bool {
        match *self {
            Step::Transferred { len, available } => len >= available.saturating_sub(len),
            _ => true,
        }
    }
}

/// The per-session transfer loop, run on the dedicated thread.
pub(crate) struct TransferEngine<B: AudioBackend> {
    pub(super) shared: Arc<Shared<B>>,
    /// A fatal error was reported; further ones are suppressed.
    pub(super) error: bool,
    /// Lost-buffer restores gave up; nothing more is attempted until restart.
    pub(super) restores_abandoned: bool,
}

/// Marks the worker as exited however `run` ends.
struct ExitNotice<B: AudioBackend>(Arc<Shared<B>>);

impl<B: AudioBackend> Drop for ExitNotice<B> {
    fn drop(&mut self) {
        let mut inner = self.0.inner.lock();
        inner.worker_exited = true;
        self.0.exited.notify_all();
    }
}

impl<B: AudioBackend> TransferEngine<B> {
    pub fn new(shared: Arc<Shared<B>>) -> Self {
        Self {
            shared,
            error: false,
            restores_abandoned: false,
        }
    }

    pub fn run(mut self) {
        let _exit = ExitNotice(Arc::clone(&self.shared));
        let direction = self.shared.direction();

        if let Err(e) = self.shared.backend.promote_current_thread() {
            log::warn!("Failed to raise {} thread priority: {}", direction.label(), e);
        }
        log::debug!("{} transfer thread running", direction.label());

        let min_sleep = self.shared.config.min_sleep;
        loop {
            if !self.wait_while_suspended() {
                break;
            }

            let step = self.step();
            let (should_run, flushing) = self.complete();
            if !should_run {
                break;
            }
            if flushing || self.error || step.wants_sleep() {
                thread::sleep(min_sleep);
            }
        }

        log::debug!("{} transfer thread exiting", direction.label());
    }

    /// Park while paused. Returns whether the worker should keep running.
    fn wait_while_suspended(&self) -> bool {
        let mut inner = self.shared.inner.lock();
        while inner.transfer.suspended && inner.transfer.should_run {
            self.shared.wake.wait(&mut inner);
        }
        inner.transfer.should_run
    }

    fn complete(&self) -> (bool, bool) {
        let mut inner = self.shared.inner.lock();
        inner.transfer.retry_count = 0;
        (inner.transfer.should_run, inner.transfer.flushing)
    }

    /// Run one iteration: loss check, position query, and at most one chunk
    /// moved between the current segment and the hardware buffer.
    pub fn step(&mut self) -> Step {
        let shared = Arc::clone(&self.shared);
        let mut reacquired = false;

        let outcome = {
            let mut inner = shared.inner.lock();
            self.step_locked(&mut inner, &mut reacquired)
        };

        if reacquired {
            if let Some(delegate) = shared.delegate() {
                delegate.on_device_reacquired();
            }
        }

        let step = match outcome {
            Ok(step) => step,
            Err(err) => {
                self.raise_fatal(err);
                Step::Faulted
            }
        };

        shared.record(|d| {
            d.iterations += 1;
            if matches!(step, Step::Starved { .. }) {
                d.starved_iterations += 1;
            }
        });
        step
    }

    fn step_locked(
        &mut self,
        inner: &mut MutexGuard<'_, Inner<B>>,
        reacquired: &mut bool,
    ) -> Result<Step, RingError> {
        let direction = self.shared.direction();

        loop {
            if inner.transfer.flushing || inner.hardware.buffer.is_none() {
                return Ok(Step::Skipped);
            }
            if self.restores_abandoned {
                return Ok(Step::Faulted);
            }

            let status = self.check_loss(inner)?;

            if direction == Direction::Capture && !status.capturing && !inner.transfer.suspended {
                if let Some(buffer) = inner.hardware.buffer.as_mut() {
                    match buffer.start() {
                        Ok(()) => log::debug!("Started looping capture"),
                        Err(e) => log::warn!("Failed to start capture: {}", e),
                    }
                }
            }

            let position = match inner.hardware.buffer.as_ref() {
                Some(buffer) => buffer.position(),
                None => return Ok(Step::Skipped),
            };

            match position {
                Ok(cursors) => return Ok(self.transfer(inner, cursors)),
                Err(HardwareError::DeviceReconfigured) => {
                    if self.reacquire(inner)? {
                        *reacquired = true;
                        if inner.transfer.should_run && !inner.transfer.suspended {
                            continue;
                        }
                    }
                    return Ok(Step::Skipped);
                }
                Err(err) => return Err(RingError::PositionQueryFailed(err)),
            }
        }
    }

    /// Move one chunk between the current segment and the hardware buffer.
    fn transfer(&mut self, inner: &mut Inner<B>, cursors: CursorPair) -> Step {
        let direction = self.shared.direction();
        let Inner {
            transfer, hardware, ..
        } = inner;
        let Some(buffer) = hardware.buffer.as_mut() else {
            return Step::Skipped;
        };

        let available = transfer
            .tracker
            .available(direction, cursors.transfer_bound(direction));

        let mut segments = self.shared.segments.lock();
        let Some(segment) = segments.prepare_segment() else {
            return Step::NoSegment;
        };
        let index = segment.index;
        let mut len = transfer.tracker.remaining_in(segment.data.len());

        match direction {
            Direction::Playback => {
                if len >= available {
                    if !transfer.suspended {
                        ensure_playing(buffer);
                    }
                    return Step::Starved { len, available };
                }
            }
            Direction::Capture => {
                len = len.min(available);
                if len == 0 {
                    return Step::Starved { len, available };
                }
            }
        }

        let start = transfer.tracker.segment_offset();
        let chunk = &mut segment.data[start..start + len];
        let mut copied = 0;
        let locked = buffer.lock(
            transfer.tracker.circular_offset(),
            len,
            &mut |first: &mut [u8], second: &mut [u8]| {
                copied = match direction {
                    Direction::Playback => scatter(chunk, first, second),
                    Direction::Capture => gather(chunk, first, second),
                };
            },
        );

        match locked {
            Err(e) => {
                log::warn!("Failed to lock {} bytes at {}: {}", len, transfer.tracker.circular_offset(), e);
                self.shared.record(|d| d.lock_failures += 1);
            }
            Ok(()) if copied != len => {
                log::warn!(
                    "Locked region at {} held {} of {} bytes",
                    transfer.tracker.circular_offset(),
                    copied,
                    len
                );
                self.shared.record(|d| d.lock_failures += 1);
            }
            Ok(()) => {}
        }

        let completed = transfer.tracker.advance(len);
        if completed {
            if direction == Direction::Playback {
                segments.clear_segment(index);
            }
            segments.advance(1);
        }

        self.shared.record(|d| {
            d.bytes_transferred += len as u64;
            if completed {
                d.segments_completed += 1;
            }
        });

        Step::Transferred { len, available }
    }
}

fn ensure_playing<H: HardwareBuffer>(buffer: &mut H) {
    let playing = buffer.status().map(|s| s.playing).unwrap_or(false);
    if playing {
        return;
    }
    match buffer.start() {
        Ok(()) => log::debug!("Started looping playback"),
        Err(e) => log::warn!("Failed to start playback: {}", e),
    }
}
