//! Mix transport - shared playback clock and stem summing
//!
//! The transport owns the single playback cursor for every stem. Because
//! the stem set is validated to equal lengths at load time, the cursor
//! wraps at the same frame for all four tracks and the loop stays
//! phase-locked indefinitely. The audio thread owns the transport
//! exclusively; other threads see it only through [`MixAtomics`] and the
//! gain bank.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::gain::GainBank;
use crate::stems::StemSet;
use crate::types::{PlayState, StemRole, StereoBuffer, NUM_STEMS};

use super::{StemTrack, TransportCommand};

/// Lock-free playback state for display access
///
/// The audio thread writes position/state, the scheduler writes the
/// telemetry snapshot, and any thread may read. All operations use
/// `Ordering::Relaxed` since we only need visibility, not synchronization
/// with other memory operations.
pub struct MixAtomics {
    /// Current shared cursor position in frames
    pub position: AtomicU64,
    /// Transport state: 0=Idle, 1=Playing, 2=Stopped
    pub state: AtomicU8,
    /// Last sampled road speed (f32 bits), written by the scheduler
    pub speed_bits: AtomicU32,
    /// Last sampled engine RPM (f32 bits), written by the scheduler
    pub rpm_bits: AtomicU32,
    /// Set by the stream error callback when the output device is lost
    pub device_lost: AtomicBool,
}

impl MixAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            state: AtomicU8::new(0),
            speed_bits: AtomicU32::new(0),
            rpm_bits: AtomicU32::new(0),
            device_lost: AtomicBool::new(false),
        }
    }

    /// Current cursor position (lock-free)
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Transport state as enum (lock-free)
    #[inline]
    pub fn play_state(&self) -> PlayState {
        match self.state.load(Ordering::Relaxed) {
            1 => PlayState::Playing,
            2 => PlayState::Stopped,
            _ => PlayState::Idle,
        }
    }

    /// Last sampled road speed
    #[inline]
    pub fn speed(&self) -> f32 {
        f32::from_bits(self.speed_bits.load(Ordering::Relaxed))
    }

    /// Last sampled engine RPM
    #[inline]
    pub fn rpm(&self) -> f32 {
        f32::from_bits(self.rpm_bits.load(Ordering::Relaxed))
    }

    /// Record a telemetry snapshot for display readers
    #[inline]
    pub fn set_telemetry(&self, speed: f32, rpm: f32) {
        self.speed_bits.store(speed.to_bits(), Ordering::Relaxed);
        self.rpm_bits.store(rpm.to_bits(), Ordering::Relaxed);
    }

    /// Whether the output device reported a fatal stream error
    #[inline]
    pub fn is_device_lost(&self) -> bool {
        self.device_lost.load(Ordering::Relaxed)
    }
}

impl Default for MixAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// The mix transport: four stem tracks driven by one cursor
///
/// State machine: `Idle -> Playing -> Stopped` (terminal). Commands are
/// drained at the start of every block, so a stop lands within one
/// block's duration. No `Paused` state exists; silence is a property of
/// the gains, never of the clock.
pub struct MixTransport {
    tracks: [StemTrack; NUM_STEMS],
    /// Shared loop length in frames (equal for every track, enforced at load)
    frames: usize,
    sample_rate: u32,
    /// The one shared cursor; owned and mutated only on the audio thread
    position: usize,
    state: PlayState,
    gains: Arc<GainBank>,
    atomics: Arc<MixAtomics>,
}

impl MixTransport {
    /// Build a transport from a validated stem set
    pub fn new(stems: StemSet, gains: Arc<GainBank>, atomics: Arc<MixAtomics>) -> Self {
        let frames = stems.frames();
        let sample_rate = stems.sample_rate();
        let mut buffers = stems.into_buffers().into_iter();
        let tracks: [StemTrack; NUM_STEMS] = std::array::from_fn(|i| {
            StemTrack::new(
                StemRole::ALL[i],
                buffers.next().expect("stem set carries one buffer per role"),
            )
        });

        Self {
            tracks,
            frames,
            sample_rate,
            position: 0,
            state: PlayState::Idle,
            gains,
            atomics,
        }
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn position(&self) -> usize {
        self.position
    }

    /// Loop length in frames
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn atomics(&self) -> Arc<MixAtomics> {
        Arc::clone(&self.atomics)
    }

    #[inline]
    fn sync_state_atomic(&self) {
        let state_val = match self.state {
            PlayState::Idle => 0,
            PlayState::Playing => 1,
            PlayState::Stopped => 2,
        };
        self.atomics.state.store(state_val, Ordering::Relaxed);
    }

    #[inline]
    fn sync_position_atomic(&self) {
        self.atomics.position.store(self.position as u64, Ordering::Relaxed);
    }

    /// Start the playback clock (`Idle -> Playing`)
    ///
    /// `Stopped` is terminal: a start after stop is ignored.
    pub fn start(&mut self) {
        if self.state == PlayState::Idle {
            self.state = PlayState::Playing;
            self.sync_state_atomic();
            log::info!(
                "transport started: {} frames @ {} Hz loop",
                self.frames,
                self.sample_rate
            );
        }
    }

    /// Stop playback permanently (`-> Stopped`)
    pub fn stop(&mut self) {
        if self.state != PlayState::Stopped {
            self.state = PlayState::Stopped;
            self.sync_state_atomic();
            log::info!("transport stopped at frame {}", self.position);
        }
    }

    /// Drain pending control commands (called at block start)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<TransportCommand>) {
        while let Ok(cmd) = rx.pop() {
            match cmd {
                TransportCommand::Start => self.start(),
                TransportCommand::Stop => self.stop(),
            }
        }
    }

    /// Produce one block of mixed audio
    ///
    /// Reads the gain vector once for the whole block, sums every stem at
    /// the shared cursor, then advances the cursor modulo the loop length.
    /// Real-time safe: no locks, no allocation.
    pub fn process(&mut self, output: &mut StereoBuffer) {
        output.fill_silence();

        if self.state != PlayState::Playing {
            return;
        }

        // One consistent vector per block; the ramp inside each track
        // smooths the step from the previous block's value.
        let gains = self.gains.read();
        let cursor = self.position;
        let out = output.as_mut_slice();

        for track in &mut self.tracks {
            track.mix_into(out, cursor, gains[track.role() as usize]);
        }

        // Advance and wrap the shared cursor; the wrap point is identical
        // for every track because lengths are equal by construction.
        self.position = (self.position + out.len()) % self.frames;
        self.sync_position_atomic();
    }
}

#[cfg(test)]
mod tests {
    use super::super::command_channel;
    use super::*;
    use crate::types::{StereoSample, NUM_STEMS};

    fn test_stems(frames: usize) -> StemSet {
        let buffers = std::array::from_fn(|i| {
            StereoBuffer::from_vec(vec![StereoSample::mono((i + 1) as f32 * 0.1); frames])
        });
        StemSet::from_buffers(buffers, 48000).unwrap()
    }

    fn test_transport(frames: usize) -> (MixTransport, Arc<GainBank>) {
        let gains = Arc::new(GainBank::default());
        let transport = MixTransport::new(
            test_stems(frames),
            Arc::clone(&gains),
            Arc::new(MixAtomics::new()),
        );
        (transport, gains)
    }

    #[test]
    fn test_idle_transport_outputs_silence() {
        let (mut transport, gains) = test_transport(256);
        gains.publish(&[1.0; NUM_STEMS]);

        let mut out = StereoBuffer::silence(64);
        transport.process(&mut out);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(transport.position(), 0);
    }

    #[test]
    fn test_state_machine_stop_is_terminal() {
        let (mut transport, _gains) = test_transport(256);
        assert_eq!(transport.state(), PlayState::Idle);

        transport.start();
        assert_eq!(transport.state(), PlayState::Playing);

        transport.stop();
        assert_eq!(transport.state(), PlayState::Stopped);

        transport.start();
        assert_eq!(transport.state(), PlayState::Stopped);
    }

    #[test]
    fn test_cursor_wraps_exactly_at_loop_length() {
        let (mut transport, _gains) = test_transport(100);
        transport.start();

        let mut out = StereoBuffer::silence(64);
        transport.process(&mut out);
        assert_eq!(transport.position(), 64);
        transport.process(&mut out);
        assert_eq!(transport.position(), 28); // (128 % 100)
    }

    #[test]
    fn test_loop_periodicity_over_full_cycles() {
        // After any whole number of loop lengths, the cursor returns to
        // its starting residue exactly.
        let frames = 96;
        let (mut transport, _gains) = test_transport(frames);
        transport.start();

        let block = 32;
        let blocks_per_cycle = frames / block;
        let mut out = StereoBuffer::silence(block);
        for _ in 0..blocks_per_cycle * 5 {
            transport.process(&mut out);
        }
        assert_eq!(transport.position(), 0);
    }

    #[test]
    fn test_gains_scale_the_mix() {
        let (mut transport, gains) = test_transport(512);
        transport.start();

        // Only bass audible: stems are 0.1/0.2/0.3/0.4, so the mix is 0.1
        gains.publish(&[1.0, 0.0, 0.0, 0.0]);
        let mut out = StereoBuffer::silence(128);
        transport.process(&mut out); // ramp-in block
        transport.process(&mut out); // settled block
        assert!((out[0].left - 0.1).abs() < 1e-5);

        // All stems at full: 0.1+0.2+0.3+0.4 = 1.0
        gains.publish(&[1.0; NUM_STEMS]);
        transport.process(&mut out); // ramp block
        transport.process(&mut out);
        assert!((out[0].left - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_gain_ramp_spans_one_block() {
        let (mut transport, gains) = test_transport(4096);
        transport.start();

        gains.publish(&[1.0, 0.0, 0.0, 0.0]);
        let mut out = StereoBuffer::silence(64);
        transport.process(&mut out);

        // First block climbs from silence toward 0.1, reaching it at the end
        assert!(out[0].left < out[63].left);
        assert!((out[63].left - 0.1).abs() < 1e-5);

        // Second block is already settled
        transport.process(&mut out);
        assert!((out[0].left - 0.1).abs() < 1e-3);
    }

    #[test]
    fn test_stop_command_observed_within_one_block() {
        let (mut transport, gains) = test_transport(1024);
        gains.publish(&[1.0; NUM_STEMS]);
        let (mut tx, mut rx) = command_channel();

        tx.send(TransportCommand::Start).unwrap();
        transport.process_commands(&mut rx);
        let mut out = StereoBuffer::silence(64);
        transport.process(&mut out);
        // settle the ramps, then confirm audio is flowing
        transport.process(&mut out);
        assert!(out.peak() > 0.0);

        tx.send(TransportCommand::Stop).unwrap();
        transport.process_commands(&mut rx);
        transport.process(&mut out);
        assert_eq!(out.peak(), 0.0);
        assert_eq!(transport.state(), PlayState::Stopped);
    }

    #[test]
    fn test_atomics_mirror_position_and_state() {
        let (mut transport, _gains) = test_transport(256);
        let atomics = transport.atomics();

        assert_eq!(atomics.play_state(), PlayState::Idle);
        transport.start();
        assert_eq!(atomics.play_state(), PlayState::Playing);

        let mut out = StereoBuffer::silence(100);
        transport.process(&mut out);
        assert_eq!(atomics.position(), 100);
    }
}
