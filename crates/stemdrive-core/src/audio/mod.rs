//! Audio output - device discovery and the cpal stream backend

mod cpal_backend;
mod device;
mod error;

pub use cpal_backend::{start_audio_system, AudioHandle, AudioSystem};
pub use device::{list_output_devices, resolve_output_device};
pub use error::{AudioError, AudioResult};

use serde::{Deserialize, Serialize};

/// Output stream configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output device name; `None` selects the host default
    pub device: Option<String>,
    /// Requested buffer size in frames; `None` uses the built-in default
    pub buffer_frames: Option<u32>,
}
