//! Stem track - one decoded stem plus its gain ramp state
//!
//! A track never owns a playback position: the transport hands it the
//! shared cursor so every stem reads the exact same frame range and wraps
//! at the exact same point. The track only remembers the gain it last
//! applied, so each block can ramp linearly from there to the newly
//! scheduled gain - control-rate updates are heard as short fades rather
//! than 33 ms steps.

use crate::types::{Sample, StemRole, StereoBuffer, StereoSample};

pub struct StemTrack {
    role: StemRole,
    buffer: StereoBuffer,
    /// Gain applied at the end of the previous block (ramp start)
    last_gain: Sample,
}

impl StemTrack {
    /// Wrap a decoded stem buffer; playback starts silent and fades in
    /// as the scheduler publishes real gains.
    pub fn new(role: StemRole, buffer: StereoBuffer) -> Self {
        debug_assert!(!buffer.is_empty(), "stem buffers are validated non-empty at load");
        Self {
            role,
            buffer,
            last_gain: 0.0,
        }
    }

    pub fn role(&self) -> StemRole {
        self.role
    }

    /// Stem length in frames
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Gain in effect at the end of the last mixed block
    pub fn current_gain(&self) -> Sample {
        self.last_gain
    }

    /// Mix `out.len()` frames into `out`, starting at the shared `cursor`
    /// and wrapping modulo the stem length
    ///
    /// Gain ramps linearly across the block from the previously applied
    /// value to `target_gain`, landing exactly on the target so the next
    /// block continues without a discontinuity. Real-time safe: no
    /// allocation, no locks.
    pub fn mix_into(&mut self, out: &mut [StereoSample], cursor: usize, target_gain: Sample) {
        let frames = out.len();
        if frames == 0 {
            self.last_gain = target_gain;
            return;
        }

        let samples = self.buffer.as_slice();
        let len = samples.len();
        let start = self.last_gain;
        let step = (target_gain - start) / frames as Sample;

        let mut pos = cursor % len;
        for (i, slot) in out.iter_mut().enumerate() {
            let gain = start + step * (i + 1) as Sample;
            *slot += samples[pos] * gain;
            pos += 1;
            if pos == len {
                pos = 0;
            }
        }

        self.last_gain = target_gain;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn constant_track(value: f32, len: usize) -> StemTrack {
        let buffer = StereoBuffer::from_vec(vec![StereoSample::mono(value); len]);
        StemTrack::new(StemRole::Bass, buffer)
    }

    #[test]
    fn test_block_ramps_to_target_gain() {
        let mut track = constant_track(1.0, 64);
        let mut out = vec![StereoSample::silence(); 4];
        track.mix_into(&mut out, 0, 1.0);

        // Ramp from 0 up to exactly 1.0 across the block
        assert!((out[0].left - 0.25).abs() < 1e-6);
        assert!((out[1].left - 0.5).abs() < 1e-6);
        assert!((out[3].left - 1.0).abs() < 1e-6);
        assert_eq!(track.current_gain(), 1.0);
    }

    #[test]
    fn test_steady_gain_is_flat() {
        let mut track = constant_track(1.0, 64);
        let mut out = vec![StereoSample::silence(); 8];
        track.mix_into(&mut out, 0, 0.5);

        let mut out2 = vec![StereoSample::silence(); 8];
        track.mix_into(&mut out2, 8, 0.5);
        for s in &out2 {
            assert!((s.left - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cursor_wraps_within_block() {
        let buffer = StereoBuffer::from_vec(
            (0..4).map(|i| StereoSample::mono(i as f32)).collect(),
        );
        let mut track = StemTrack::new(StemRole::Drums, buffer);
        // Settle gain at 1.0 first
        let mut warmup = vec![StereoSample::silence(); 4];
        track.mix_into(&mut warmup, 0, 1.0);

        let mut out = vec![StereoSample::silence(); 4];
        track.mix_into(&mut out, 2, 1.0);
        let values: Vec<f32> = out.iter().map(|s| s.left).collect();
        assert_eq!(values, vec![2.0, 3.0, 0.0, 1.0]);
    }

    #[test]
    fn test_mix_accumulates_into_output() {
        let mut a = constant_track(1.0, 16);
        let mut b = constant_track(1.0, 16);
        // Settle both gains
        let mut warmup = vec![StereoSample::silence(); 16];
        a.mix_into(&mut warmup, 0, 0.5);
        warmup.fill(StereoSample::silence());
        b.mix_into(&mut warmup, 0, 0.25);

        let mut out = vec![StereoSample::silence(); 8];
        a.mix_into(&mut out, 0, 0.5);
        b.mix_into(&mut out, 0, 0.25);
        for s in &out {
            assert!((s.left - 0.75).abs() < 1e-6);
        }
    }
}
