//! Telemetry sampling - live or simulated vehicle state
//!
//! The mix engine only ever pulls a `(speed, rpm)` pair through
//! [`TelemetrySource`]; whether that comes from an OBD-II adapter or the
//! built-in simulator is invisible to the rest of the system.
//!
//! The simulator has no background thread. Target values are approached
//! asymptotically as a pure function of elapsed time, so reads are cheap
//! and there is no update loop to stop and join at teardown.

use std::sync::Mutex;
use std::time::Instant;

use thiserror::Error;

/// Simulator smoothing: 10% of the remaining distance per 30 ms
const SMOOTHING_TICK_SECONDS: f32 = 0.03;
const SMOOTHING_FACTOR: f32 = 0.1;

/// One telemetry reading
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TelemetrySample {
    /// Road speed in display units (mph in the reference setup)
    pub speed: f32,
    /// Engine speed in revolutions per minute
    pub rpm: f32,
}

/// Errors reported by a telemetry source
///
/// These are transient by contract: the gain scheduler recovers by holding
/// the previous gain vector, so an error here never reaches the audio path.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Sampler transiently unavailable (sensor dropout, bus timeout)
    #[error("telemetry source unavailable: {0}")]
    Unavailable(String),

    /// Source produced a NaN or infinite reading
    #[error("telemetry source returned a non-finite value")]
    NonFinite,
}

/// A source of current vehicle telemetry
///
/// `sample` must be non-blocking and return the most recently known values.
pub trait TelemetrySource: Send + Sync {
    fn sample(&self) -> Result<TelemetrySample, TelemetryError>;
}

/// One smoothed channel: approaches `target` from `anchor` over time
///
/// `value(t) = target + (anchor - target) * retain^(elapsed / tick)`
/// where retain is (1 - smoothing factor). The value is always between
/// anchor and target, so the approach can never overshoot.
#[derive(Debug, Clone, Copy)]
struct SmoothedChannel {
    target: f32,
    anchor: f32,
    anchor_at: Instant,
}

impl SmoothedChannel {
    fn new(now: Instant) -> Self {
        Self {
            target: 0.0,
            anchor: 0.0,
            anchor_at: now,
        }
    }

    fn value_at(&self, now: Instant) -> f32 {
        let elapsed = now.saturating_duration_since(self.anchor_at).as_secs_f32();
        let retain = (1.0 - SMOOTHING_FACTOR).powf(elapsed / SMOOTHING_TICK_SECONDS);
        self.target + (self.anchor - self.target) * retain
    }

    /// Re-anchor at the value current right now, then head for `target`
    fn retarget(&mut self, target: f32, now: Instant) {
        self.anchor = self.value_at(now);
        self.anchor_at = now;
        self.target = target.max(0.0);
    }
}

/// Simulated telemetry with operator-set targets
///
/// The control surface sets target speed/RPM; reads see values gliding
/// toward those targets with the smoothing of the reference simulator.
/// The mutex is only touched from control-rate threads, never from the
/// audio callback.
pub struct SimulatedTelemetry {
    channels: Mutex<SimChannels>,
}

struct SimChannels {
    speed: SmoothedChannel,
    rpm: SmoothedChannel,
}

impl SimulatedTelemetry {
    /// Create a simulator at rest (speed 0, rpm 0)
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            channels: Mutex::new(SimChannels {
                speed: SmoothedChannel::new(now),
                rpm: SmoothedChannel::new(now),
            }),
        }
    }

    /// Set the target road speed; the reading approaches it gradually
    pub fn set_target_speed(&self, speed: f32) {
        let now = Instant::now();
        let mut ch = self.lock_channels();
        ch.speed.retarget(speed, now);
    }

    /// Set the target engine RPM; the reading approaches it gradually
    pub fn set_target_rpm(&self, rpm: f32) {
        let now = Instant::now();
        let mut ch = self.lock_channels();
        ch.rpm.retarget(rpm, now);
    }

    /// The channel state is plain floats and stays valid even if a
    /// panicking thread poisoned the mutex, so setters keep working.
    fn lock_channels(&self) -> std::sync::MutexGuard<'_, SimChannels> {
        match self.channels.lock() {
            Ok(ch) => ch,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for SimulatedTelemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl TelemetrySource for SimulatedTelemetry {
    /// Poisoning surfaces as the recoverable `Unavailable` error, which
    /// the gain scheduler absorbs by holding the last published vector.
    fn sample(&self) -> Result<TelemetrySample, TelemetryError> {
        let now = Instant::now();
        let ch = self
            .channels
            .lock()
            .map_err(|_| TelemetryError::Unavailable("simulator state poisoned".to_string()))?;
        Ok(TelemetrySample {
            speed: ch.speed.value_at(now),
            rpm: ch.rpm.value_at(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn later(base: Instant, ms: u64) -> Instant {
        base + Duration::from_millis(ms)
    }

    #[test]
    fn test_channel_approaches_target() {
        let t0 = Instant::now();
        let mut ch = SmoothedChannel::new(t0);
        ch.retarget(100.0, t0);

        let early = ch.value_at(later(t0, 30));
        let mid = ch.value_at(later(t0, 300));
        let late = ch.value_at(later(t0, 3000));

        // One smoothing tick covers 10% of the distance
        assert!((early - 10.0).abs() < 0.5, "got {early}");
        assert!(early < mid && mid < late);
        assert!(late < 100.0);
        assert!((late - 100.0).abs() < 1.0);
    }

    #[test]
    fn test_channel_never_overshoots() {
        let t0 = Instant::now();
        let mut ch = SmoothedChannel::new(t0);
        ch.retarget(50.0, t0);

        for ms in (0..5000).step_by(100) {
            let v = ch.value_at(later(t0, ms));
            assert!((0.0..=50.0).contains(&v), "overshoot at {ms}ms: {v}");
        }
    }

    #[test]
    fn test_retarget_reanchors_at_current_value() {
        let t0 = Instant::now();
        let mut ch = SmoothedChannel::new(t0);
        ch.retarget(100.0, t0);

        // Partway up, drop the target back to zero
        let t1 = later(t0, 300);
        let before = ch.value_at(t1);
        ch.retarget(0.0, t1);
        assert!((ch.value_at(t1) - before).abs() < 1e-3);

        // Now it descends from that point
        let after = ch.value_at(later(t0, 600));
        assert!(after < before);
        assert!(after >= 0.0);
    }

    #[test]
    fn test_negative_targets_clamp_to_zero() {
        let t0 = Instant::now();
        let mut ch = SmoothedChannel::new(t0);
        ch.retarget(-25.0, t0);
        assert_eq!(ch.target, 0.0);
    }

    #[test]
    fn test_poisoned_state_degrades_to_unavailable() {
        use std::sync::Arc;

        let sim = Arc::new(SimulatedTelemetry::new());

        // Panic while holding the lock so the mutex ends up poisoned
        let poisoner = Arc::clone(&sim);
        let result = std::thread::spawn(move || {
            let _guard = poisoner.channels.lock().unwrap();
            panic!("simulated crash while holding the lock");
        })
        .join();
        assert!(result.is_err());

        // The sampler reports the recoverable error instead of panicking,
        // and the setters keep accepting targets.
        assert!(matches!(
            sim.sample(),
            Err(TelemetryError::Unavailable(_))
        ));
        sim.set_target_speed(30.0);
        sim.set_target_rpm(3000.0);
    }

    #[test]
    fn test_simulated_source_reads_without_blocking() {
        let sim = SimulatedTelemetry::new();
        let s = sim.sample().unwrap();
        assert_eq!(s.speed, 0.0);
        assert_eq!(s.rpm, 0.0);

        sim.set_target_speed(70.0);
        sim.set_target_rpm(7000.0);
        let s = sim.sample().unwrap();
        assert!(s.speed <= 70.0);
        assert!(s.rpm <= 7000.0);
    }
}
