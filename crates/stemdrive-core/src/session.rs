//! Mix session - ties stems, audio output, and the control loop together
//!
//! A session owns the whole pipeline. Construction is all-or-nothing: if
//! any stage fails, everything already built is dropped in reverse order
//! and the device is released. Shutdown stops the control loop first so
//! no gain publication races the transport's final blocks.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;

use crate::audio::{start_audio_system, AudioHandle, AudioSystem};
use crate::config::SimConfig;
use crate::control::{spawn_control_loop, ControlHandle, GainScheduler};
use crate::engine::{CommandSender, MixAtomics, TransportCommand};
use crate::gain::{GainBank, GainVector};
use crate::stems::StemSet;
use crate::telemetry::TelemetrySource;
use crate::types::PlayState;

/// Point-in-time view of the running mix, for display
#[derive(Debug, Clone, Copy)]
pub struct MixSnapshot {
    pub speed: f32,
    pub rpm: f32,
    pub gains: GainVector,
    /// Shared cursor position in frames
    pub position: u64,
    pub state: PlayState,
}

pub struct MixSession {
    handle: AudioHandle,
    command_sender: CommandSender,
    atomics: Arc<MixAtomics>,
    gains: Arc<GainBank>,
    control: Option<ControlHandle>,
}

impl MixSession {
    /// Load stems, open the output device, and start playing
    ///
    /// Gains start at zero, so audio fades in from silence as soon as the
    /// first telemetry tick lands.
    pub fn start(
        config: &SimConfig,
        stem_dir: &Path,
        telemetry: Arc<dyn TelemetrySource>,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let stems = StemSet::load_dir(stem_dir)
            .with_context(|| format!("loading stems from {}", stem_dir.display()))?;
        log::info!(
            "loaded {} frames @ {} Hz ({:.1}s loop)",
            stems.frames(),
            stems.sample_rate(),
            stems.duration_seconds()
        );

        let AudioSystem {
            handle,
            mut command_sender,
            atomics,
            gains,
        } = start_audio_system(stems, &config.audio).context("starting audio output")?;
        log::info!(
            "output running: {} frames/block, {:.1} ms latency",
            handle.buffer_frames(),
            handle.latency_ms()
        );

        let scheduler = GainScheduler::new(
            telemetry,
            config.limits(),
            Arc::clone(&gains),
            Arc::clone(&atomics),
        );
        let control = spawn_control_loop(scheduler, config.drive.control_rate_hz)
            .context("spawning control loop")?;

        if command_sender.send(TransportCommand::Start).is_err() {
            anyhow::bail!("command queue full before playback started");
        }

        Ok(Self {
            handle,
            command_sender,
            atomics,
            gains,
            control: Some(control),
        })
    }

    /// Lock-free view of the current mix state
    pub fn snapshot(&self) -> MixSnapshot {
        MixSnapshot {
            speed: self.atomics.speed(),
            rpm: self.atomics.rpm(),
            gains: self.gains.read(),
            position: self.atomics.position(),
            state: self.atomics.play_state(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.handle.sample_rate()
    }

    pub fn latency_ms(&self) -> f32 {
        self.handle.latency_ms()
    }

    /// Whether the output device reported a fatal stream error
    pub fn device_lost(&self) -> bool {
        self.atomics.is_device_lost()
    }

    /// Stop playback and release the device
    ///
    /// Order matters: the control loop stops first so no further gains
    /// land, then the transport is told to stop, then dropping the
    /// handle closes the stream.
    pub fn shutdown(mut self) {
        self.stop_internal();
    }

    fn stop_internal(&mut self) {
        if let Some(mut control) = self.control.take() {
            control.stop();
            if self.command_sender.send(TransportCommand::Stop).is_err() {
                log::warn!("command queue full during shutdown, stream closing anyway");
            }
            log::info!("session stopped");
        }
    }
}

impl Drop for MixSession {
    fn drop(&mut self) {
        // Same path as shutdown(), so an early return or panic in the
        // caller still releases the device cleanly.
        self.stop_internal();
    }
}
