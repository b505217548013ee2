//! Real-time mix engine - stem tracks, transport, and command plumbing

mod command;
mod track;
mod transport;

pub use command::{command_channel, CommandSender, TransportCommand};
pub use track::StemTrack;
pub use transport::{MixAtomics, MixTransport};

/// Maximum buffer size to pre-allocate for real-time safety
/// Covers all common device configurations (64..4096 frames).
/// Pre-allocating to this size eliminates allocations in the audio callback.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Default requested buffer size in frames (safe on most systems)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;
