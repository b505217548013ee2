//! Audio error types

use thiserror::Error;

/// Errors from the audio output backend
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("No default output device available")]
    NoDefaultDevice,

    #[error("Output device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to enumerate output devices: {0}")]
    DeviceEnumeration(#[from] cpal::DevicesError),

    #[error("Failed to query device name: {0}")]
    DeviceName(#[from] cpal::DeviceNameError),

    #[error("Failed to query device configs: {0}")]
    SupportedConfigs(#[from] cpal::SupportedStreamConfigsError),

    #[error("Device does not support {rate} Hz stereo output")]
    UnsupportedSampleRate { rate: u32 },

    #[error("Failed to build output stream: {0}")]
    StreamBuild(#[from] cpal::BuildStreamError),

    #[error("Failed to start output stream: {0}")]
    StreamPlay(#[from] cpal::PlayStreamError),
}

pub type AudioResult<T> = Result<T, AudioError>;
