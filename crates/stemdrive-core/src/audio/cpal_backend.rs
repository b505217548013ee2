//! cpal output backend
//!
//! Builds a single stereo output stream and hands the mix transport to
//! its data callback by move. The callback owns the transport outright -
//! no lock is ever taken on the audio thread; everything it shares with
//! the rest of the process travels through the gain bank, the command
//! queue, or `MixAtomics`.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};

use crate::engine::{
    command_channel, CommandSender, MixAtomics, MixTransport, TransportCommand,
    DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE,
};
use crate::gain::GainBank;
use crate::stems::StemSet;
use crate::types::StereoBuffer;

use super::device::resolve_output_device;
use super::error::{AudioError, AudioResult};
use super::OutputConfig;

/// Running audio output
///
/// Dropping the handle drops the cpal stream, which releases the device.
/// This is the only way the stream ends, so device release is guaranteed
/// on every exit path that unwinds the owning scope.
pub struct AudioHandle {
    _stream: cpal::Stream,
    sample_rate: u32,
    buffer_frames: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Negotiated block size in frames
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    /// Output latency of one block, in milliseconds
    pub fn latency_ms(&self) -> f32 {
        self.buffer_frames as f32 * 1000.0 / self.sample_rate as f32
    }
}

/// Everything the control side needs to drive a running stream
pub struct AudioSystem {
    pub handle: AudioHandle,
    pub command_sender: CommandSender,
    pub atomics: Arc<MixAtomics>,
    pub gains: Arc<GainBank>,
}

/// State moved into the cpal data callback
///
/// Pre-allocated to `MAX_BUFFER_SIZE` so the callback never allocates.
struct CallbackState {
    transport: MixTransport,
    command_rx: rtrb::Consumer<TransportCommand>,
    scratch: StereoBuffer,
}

impl CallbackState {
    /// Render one hardware buffer
    ///
    /// Oversized buffers are handled in chunks so the scratch buffer
    /// never needs to grow on the audio thread.
    fn render(&mut self, data: &mut [f32], channels: usize) {
        self.transport.process_commands(&mut self.command_rx);

        let total_frames = data.len() / channels;
        let mut offset = 0;
        while offset < total_frames {
            let frames = (total_frames - offset).min(MAX_BUFFER_SIZE);
            self.scratch.set_len_from_capacity(frames);
            self.transport.process(&mut self.scratch);

            let out = &mut data[offset * channels..(offset + frames) * channels];
            if channels == 2 {
                // Fast path: our frames are already interleaved stereo
                out.copy_from_slice(self.scratch.as_interleaved());
            } else {
                for (frame, sample) in out.chunks_exact_mut(channels).zip(self.scratch.as_slice()) {
                    frame[0] = sample.left;
                    frame[1] = sample.right;
                    for extra in &mut frame[2..] {
                        *extra = 0.0;
                    }
                }
            }
            offset += frames;
        }
    }
}

/// Open the output device and start the mix transport on it
///
/// The stream plays immediately but the transport starts in `Idle` and
/// emits silence until a `TransportCommand::Start` arrives.
pub fn start_audio_system(stems: StemSet, config: &OutputConfig) -> AudioResult<AudioSystem> {
    let sample_rate = stems.sample_rate();
    let host = cpal::default_host();
    let device = resolve_output_device(&host, config.device.as_deref())?;
    let device_name = device.name()?;

    let channels = find_output_channels(&device, sample_rate)?;
    let buffer_frames = config.buffer_frames.unwrap_or(DEFAULT_BUFFER_SIZE);
    let stream_config = StreamConfig {
        channels,
        sample_rate: SampleRate(sample_rate),
        buffer_size: BufferSize::Fixed(buffer_frames),
    };

    log::info!(
        "opening output: {} ({} ch, {} Hz, {} frame buffer)",
        device_name,
        channels,
        sample_rate,
        buffer_frames
    );

    let gains = Arc::new(GainBank::default());
    let atomics = Arc::new(MixAtomics::new());
    let (command_sender, command_rx) = command_channel();

    let transport = MixTransport::new(stems, Arc::clone(&gains), Arc::clone(&atomics));
    let mut state = CallbackState {
        transport,
        command_rx,
        scratch: StereoBuffer::silence(MAX_BUFFER_SIZE),
    };

    let err_atomics = Arc::clone(&atomics);
    let channel_count = channels as usize;
    let stream = device.build_output_stream(
        &stream_config,
        move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
            state.render(data, channel_count);
        },
        move |err| {
            log::error!("output stream error: {err}");
            err_atomics
                .device_lost
                .store(true, std::sync::atomic::Ordering::Relaxed);
        },
        None,
    )?;
    stream.play()?;

    Ok(AudioSystem {
        handle: AudioHandle {
            _stream: stream,
            sample_rate,
            buffer_frames,
        },
        command_sender,
        atomics,
        gains,
    })
}

/// Pick a channel count for an f32 output at the stems' native rate
fn find_output_channels(device: &cpal::Device, rate: u32) -> AudioResult<u16> {
    let wanted = SampleRate(rate);
    let mut channels = None;
    for config in device.supported_output_configs()? {
        if config.sample_format() == SampleFormat::F32
            && config.channels() >= 2
            && config.min_sample_rate() <= wanted
            && wanted <= config.max_sample_rate()
        {
            // Prefer plain stereo when offered
            let c = config.channels();
            if c == 2 {
                return Ok(2);
            }
            channels.get_or_insert(c);
        }
    }
    channels.ok_or(AudioError::UnsupportedSampleRate { rate })
}
