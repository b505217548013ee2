//! Telemetry-to-gain mapping and lock-free gain publication
//!
//! The mapping is the musical heart of the system: bass rides RPM with a
//! non-zero floor so the groove is present even at idle, while drums,
//! other and vocals enter at staggered road-speed thresholds so the
//! arrangement densifies as the car accelerates.
//!
//! Gains travel from the control-rate scheduler to the audio thread
//! through [`GainBank`], a versioned bank of atomics: the audio thread can
//! never observe a vector with some roles from an old tick and some from
//! a new one.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::telemetry::TelemetrySample;
use crate::types::{Sample, NUM_STEMS};

/// Normalized per-stem gains in [0, 1], indexed by `StemRole as usize`
pub type GainVector = [Sample; NUM_STEMS];

/// Reference maximum road speed (mph)
pub const DEFAULT_MAX_SPEED: f32 = 70.0;

/// Reference maximum engine speed (rpm)
pub const DEFAULT_MAX_RPM: f32 = 7000.0;

/// Speed-threshold slope: each speed-driven role spans 1/7 of the range
const SPEED_SLOPE: f32 = 7.0;

/// Bass floor at idle
const BASS_FLOOR: f32 = 0.5;

/// Normalization ceilings for the gain mapping
#[derive(Debug, Clone, Copy)]
pub struct DriveLimits {
    pub max_speed: f32,
    pub max_rpm: f32,
}

impl DriveLimits {
    /// Create limits; both ceilings must be positive
    pub fn new(max_speed: f32, max_rpm: f32) -> Self {
        assert!(max_speed > 0.0, "max_speed must be positive");
        assert!(max_rpm > 0.0, "max_rpm must be positive");
        Self { max_speed, max_rpm }
    }
}

impl Default for DriveLimits {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SPEED, DEFAULT_MAX_RPM)
    }
}

/// Map a telemetry sample to per-stem gains
///
/// Pure and deterministic. Inputs are clamped to non-negative before
/// normalization; telemetry beyond the nominal ceilings saturates each
/// gain at 1 rather than erroring.
///
/// - bass:   rpm-driven, `clamp(rpm/max_rpm + 0.5)` - audible at idle
/// - drums:  enter near 1/7 of max speed
/// - other:  enter near 2.5/7 of max speed
/// - vocals: enter near 4/7 of max speed
pub fn map_to_gains(sample: &TelemetrySample, limits: &DriveLimits) -> GainVector {
    let rpm = sample.rpm.max(0.0);
    let speed = sample.speed.max(0.0);

    let bass = (rpm / limits.max_rpm + BASS_FLOOR).clamp(0.0, 1.0);

    let p = speed / limits.max_speed;
    let drums = (p * SPEED_SLOPE - 1.0).clamp(0.0, 1.0);
    let other = (p * SPEED_SLOPE - 2.5).clamp(0.0, 1.0);
    let vocals = (p * SPEED_SLOPE - 4.0).clamp(0.0, 1.0);

    [bass, drums, other, vocals]
}

/// Tear-free shared gain vector (single writer, any readers)
///
/// Seqlock-style publication: the writer bumps the version to an odd value,
/// stores all four gains, then bumps it even again. A reader that sees the
/// version change mid-read retries. The writer (the gain scheduler) is
/// wait-free; the audio-thread reader only spins while a ~nanoseconds
/// write is in flight, so the real-time path never blocks.
pub struct GainBank {
    version: AtomicU32,
    slots: [AtomicU32; NUM_STEMS],
}

impl GainBank {
    /// Create a bank holding `initial`
    pub fn new(initial: GainVector) -> Self {
        Self {
            version: AtomicU32::new(0),
            slots: std::array::from_fn(|i| AtomicU32::new(initial[i].to_bits())),
        }
    }

    /// Publish a whole gain vector atomically
    ///
    /// Must only be called from one thread at a time (the scheduler).
    pub fn publish(&self, gains: &GainVector) {
        let v = self.version.load(Ordering::Relaxed);
        self.version.store(v.wrapping_add(1), Ordering::Release);
        std::sync::atomic::fence(Ordering::Release);
        for (slot, &gain) in self.slots.iter().zip(gains.iter()) {
            slot.store(gain.to_bits(), Ordering::Relaxed);
        }
        self.version.store(v.wrapping_add(2), Ordering::Release);
    }

    /// Read a consistent gain vector
    ///
    /// Retries while a write is in flight; never returns a mix of old and
    /// new values.
    pub fn read(&self) -> GainVector {
        loop {
            let v1 = self.version.load(Ordering::Acquire);
            if v1 & 1 != 0 {
                std::hint::spin_loop();
                continue;
            }
            let gains: GainVector =
                std::array::from_fn(|i| Sample::from_bits(self.slots[i].load(Ordering::Relaxed)));
            std::sync::atomic::fence(Ordering::Acquire);
            if self.version.load(Ordering::Relaxed) == v1 {
                return gains;
            }
            std::hint::spin_loop();
        }
    }
}

impl Default for GainBank {
    fn default() -> Self {
        Self::new([0.0; NUM_STEMS])
    }
}
