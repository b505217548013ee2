//! Output device discovery

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use super::error::{AudioError, AudioResult};

/// List the names of all available output devices
pub fn list_output_devices(host: &Host) -> AudioResult<Vec<String>> {
    let mut names = Vec::new();
    for device in host.output_devices()? {
        names.push(device.name()?);
    }
    Ok(names)
}

/// Resolve an output device by name, or fall back to the host default
///
/// Device names can drift between sessions (USB interfaces especially),
/// so a missing named device is an error rather than a silent fallback.
pub fn resolve_output_device(host: &Host, name: Option<&str>) -> AudioResult<Device> {
    match name {
        Some(wanted) => {
            for device in host.output_devices()? {
                if device.name()? == wanted {
                    return Ok(device);
                }
            }
            if let Ok(names) = list_output_devices(host) {
                log::warn!("available output devices: {}", names.join(", "));
            }
            Err(AudioError::DeviceNotFound(wanted.to_string()))
        }
        None => host.default_output_device().ok_or(AudioError::NoDefaultDevice),
    }
}
