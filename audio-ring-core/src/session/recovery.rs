use std::sync::Arc;
use std::thread;

use parking_lot::MutexGuard;

use super::acquire::acquire_hardware;
use super::shared::Inner;
use super::transfer::TransferEngine;
use crate::models::error::{HardwareError, RingError};
use crate::models::format::Direction;
use crate::traits::backend::{AudioBackend, BufferStatus, HardwareBuffer};

impl<B: AudioBackend> TransferEngine<B> {
    /// Restore a lost buffer, retrying while the restore itself reports the
    /// buffer lost. Fails once `max_lost_retries` extra attempts are used up.
    pub(super) fn check_loss(&mut self, inner: &mut Inner<B>) -> Result<BufferStatus, RingError> {
        let max_retries = self.shared.config.max_lost_retries;

        loop {
            let Some(buffer) = inner.hardware.buffer.as_mut() else {
                return Ok(BufferStatus::default());
            };

            let status = buffer.status().unwrap_or_else(|e| {
                log::debug!("Buffer status query failed: {}", e);
                BufferStatus::default()
            });
            if !status.lost {
                return Ok(status);
            }

            self.shared.record(|d| d.restore_attempts += 1);
            match buffer.restore() {
                Ok(()) => {
                    log::debug!("Restored lost buffer after {} retries", inner.transfer.retry_count);
                    return Ok(BufferStatus { lost: false, ..status });
                }
                Err(HardwareError::BufferLost) if inner.transfer.retry_count < max_retries => {
                    inner.transfer.retry_count += 1;
                    log::debug!("Buffer still lost, retry {}/{}", inner.transfer.retry_count, max_retries);
                }
                Err(HardwareError::BufferLost) => {
                    self.restores_abandoned = true;
                    return Err(RingError::RestoreExhausted(inner.transfer.retry_count + 1));
                }
                Err(e) => {
                    log::warn!("Failed to restore lost buffer: {}", e);
                    return Ok(status);
                }
            }
        }
    }

    /// Reopen the device after it was reconfigured underneath us.
    ///
    /// Returns false when the session was stopped during the settle wait or
    /// while the device was reopening.
    /// The lock is released while waiting and while the device reopens.
    pub(super) fn reacquire(&mut self, inner: &mut MutexGuard<'_, Inner<B>>) -> Result<bool, RingError> {
        let shared = Arc::clone(&self.shared);
        let settle = shared.config.reconfigure_settle;

        log::warn!(
            "{} device reconfigured, reacquiring in {:?}",
            shared.direction().label(),
            settle
        );
        MutexGuard::unlocked(inner, || thread::sleep(settle));

        if !inner.transfer.should_run {
            log::debug!("Stopped while waiting for the device to settle");
            return Ok(false);
        }

        inner.hardware.release();
        let (device, mut buffer) = MutexGuard::unlocked(inner, || {
            acquire_hardware(&shared.backend, &shared.config, &shared.format, &shared.layout)
        })?;

        if !inner.transfer.should_run {
            log::debug!("Stopped while reopening the device, discarding new handles");
            drop(buffer);
            drop(device);
            return Ok(false);
        }

        if shared.direction() == Direction::Playback {
            if let Err(e) = buffer.set_volume(inner.volume) {
                log::warn!("Failed to restore volume on new buffer: {}", e);
            }
        }

        inner.hardware.install(device, buffer);
        inner.transfer.tracker.reset_circular();
        self.error = false;
        shared.record(|d| d.reacquisitions += 1);

        log::info!("{} device reacquired", shared.direction().label());
        Ok(true)
    }

    /// Report a fatal error once; repeats are suppressed until the error
    /// state is cleared by a reacquisition.
    pub(super) fn raise_fatal(&mut self, error: RingError) {
        if self.error {
            log::debug!("Suppressed repeated error: {}", error);
            return;
        }
        self.error = true;

        log::error!("{} transfer failed: {}", self.shared.direction().label(), error);
        self.shared.record(|d| d.record_error(&error));
        if let Some(delegate) = self.shared.delegate() {
            delegate.on_error(&error);
        }
    }
}
