//! Control loop - samples telemetry and publishes gain vectors
//!
//! Runs at a fixed control rate on its own thread. Each tick samples the
//! telemetry source, maps the reading through the drive curves, and
//! publishes the whole gain vector to the bank. A failed or non-finite
//! sample publishes nothing, so the audio path keeps playing the last
//! good vector.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::engine::MixAtomics;
use crate::gain::{map_to_gains, DriveLimits, GainBank};
use crate::telemetry::{TelemetryError, TelemetrySource};

pub struct GainScheduler {
    telemetry: Arc<dyn TelemetrySource>,
    limits: DriveLimits,
    gains: Arc<GainBank>,
    atomics: Arc<MixAtomics>,
}

impl GainScheduler {
    pub fn new(
        telemetry: Arc<dyn TelemetrySource>,
        limits: DriveLimits,
        gains: Arc<GainBank>,
        atomics: Arc<MixAtomics>,
    ) -> Self {
        Self {
            telemetry,
            limits,
            gains,
            atomics,
        }
    }

    /// One scheduler tick: sample, map, publish
    ///
    /// On failure the bank keeps its previous vector. Returns the error
    /// so callers can decide how loudly to complain.
    pub fn tick(&self) -> Result<(), TelemetryError> {
        let sample = self.telemetry.sample()?;
        if !sample.speed.is_finite() || !sample.rpm.is_finite() {
            return Err(TelemetryError::NonFinite);
        }

        self.atomics.set_telemetry(sample.speed, sample.rpm);
        let gains = map_to_gains(&sample, &self.limits);
        self.gains.publish(&gains);
        Ok(())
    }
}

/// Handle to a running control loop thread
///
/// `stop()` (or drop) raises the shutdown flag and joins the thread, so
/// no tick runs after the handle is gone.
pub struct ControlHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

impl ControlHandle {
    pub fn stop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("control loop thread panicked");
            }
        }
    }
}

impl Drop for ControlHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the control loop at `rate_hz` ticks per second
pub fn spawn_control_loop(scheduler: GainScheduler, rate_hz: u32) -> io::Result<ControlHandle> {
    let shutdown = Arc::new(AtomicBool::new(false));
    let thread_shutdown = Arc::clone(&shutdown);
    let period = Duration::from_secs_f64(1.0 / rate_hz.max(1) as f64);

    let join = std::thread::Builder::new()
        .name("stemdrive-control".to_string())
        .spawn(move || {
            log::debug!("control loop running at {rate_hz} Hz");
            let mut failing = false;
            while !thread_shutdown.load(Ordering::Relaxed) {
                match scheduler.tick() {
                    Ok(()) => failing = false,
                    Err(err) if !failing => {
                        // Log the edge, not every tick of an outage
                        log::warn!("telemetry unavailable, holding last gains: {err}");
                        failing = true;
                    }
                    Err(_) => {}
                }
                std::thread::sleep(period);
            }
            log::debug!("control loop exited");
        })?;

    Ok(ControlHandle {
        shutdown,
        join: Some(join),
    })
}
