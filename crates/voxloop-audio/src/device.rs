//! Device enumeration and selection.
//!
//! Devices are addressed by their index in the enumerated list; the choice
//! itself is made outside the audio core (CLI flag, config, or prompt).

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host};

use voxloop_foundation::AudioError;

#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub channels: u16,
    pub is_default: bool,
}

pub struct DeviceCatalog {
    host: Host,
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceCatalog {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    pub fn host_id(&self) -> cpal::HostId {
        self.host.id()
    }

    pub fn input_devices(&self) -> Result<Vec<DeviceInfo>, AudioError> {
        let default_name = self
            .host
            .default_input_device()
            .and_then(|d| d.name().ok());

        let mut devices = Vec::new();
        for (index, device) in self.host.input_devices()?.enumerate() {
            let Ok(name) = device.name() else { continue };
            let channels = device
                .default_input_config()
                .map(|c| c.channels())
                .unwrap_or(0);
            devices.push(DeviceInfo {
                index,
                is_default: Some(&name) == default_name.as_ref(),
                name,
                channels,
            });
        }
        Ok(devices)
    }

    pub fn output_devices(&self) -> Result<Vec<DeviceInfo>, AudioError> {
        let default_name = self
            .host
            .default_output_device()
            .and_then(|d| d.name().ok());

        let mut devices = Vec::new();
        for (index, device) in self.host.output_devices()?.enumerate() {
            let Ok(name) = device.name() else { continue };
            let channels = device
                .default_output_config()
                .map(|c| c.channels())
                .unwrap_or(0);
            devices.push(DeviceInfo {
                index,
                is_default: Some(&name) == default_name.as_ref(),
                name,
                channels,
            });
        }
        Ok(devices)
    }

    /// Open an input device by enumeration index, or the host default.
    pub fn open_input(&self, index: Option<usize>) -> Result<Device, AudioError> {
        match index {
            Some(i) => self
                .host
                .input_devices()?
                .nth(i)
                .ok_or(AudioError::DeviceNotFound { index: Some(i) }),
            None => self
                .host
                .default_input_device()
                .ok_or(AudioError::DeviceNotFound { index: None }),
        }
    }

    /// Open an output device by enumeration index, or the host default.
    pub fn open_output(&self, index: Option<usize>) -> Result<Device, AudioError> {
        match index {
            Some(i) => self
                .host
                .output_devices()?
                .nth(i)
                .ok_or(AudioError::DeviceNotFound { index: Some(i) }),
            None => self
                .host
                .default_output_device()
                .ok_or(AudioError::DeviceNotFound { index: None }),
        }
    }
}
