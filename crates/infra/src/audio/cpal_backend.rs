//! CPAL-based audio device enumeration
//!
//! Provides a cross-platform view of the available capture and playback
//! devices for the CLI and for stream setup.

use cpal::traits::{DeviceTrait, HostTrait};
use quinteq_core::domain::audio::{
    AudioEnumerator, AudioError, DeviceId, DeviceInfo, DeviceType, Result, SampleRate,
};
use tracing::{debug, info, warn};

/// CPAL-based audio enumerator
pub struct CpalEnumerator {
    host: cpal::Host,
}

impl Default for CpalEnumerator {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalEnumerator {
    pub fn new() -> Self {
        let host = cpal::default_host();
        debug!("Using audio host: {:?}", host.id());
        Self { host }
    }

    fn describe(device: &cpal::Device, device_type: DeviceType) -> Result<DeviceInfo> {
        #[allow(deprecated)]
        let name = device
            .name()
            .unwrap_or_else(|_| "Unknown Device".to_string());

        let default_config = match device_type {
            DeviceType::Input => device.default_input_config(),
            DeviceType::Output => device.default_output_config(),
        };
        let default_config =
            default_config.map_err(|e| AudioError::InvalidConfiguration(e.to_string()))?;

        Ok(DeviceInfo {
            id: DeviceId::new(name.clone()),
            name,
            device_type,
            default_sample_rate: Some(SampleRate::from_hz(default_config.sample_rate())),
            max_channels: default_config.channels(),
        })
    }

    fn collect(
        &self,
        devices: impl Iterator<Item = cpal::Device>,
        device_type: DeviceType,
    ) -> Vec<DeviceInfo> {
        let mut infos = Vec::new();
        for device in devices {
            match Self::describe(&device, device_type) {
                Ok(info) => {
                    debug!("Found device: {}", info.name);
                    infos.push(info);
                }
                Err(e) => warn!("Skipping device due to error: {}", e),
            }
        }
        infos
    }

    /// Find a CPAL capture device by name, or the default when `None`.
    #[allow(deprecated)]
    pub fn find_input_device(&self, name: Option<&str>) -> Result<cpal::Device> {
        match name {
            Some(name) => self
                .host
                .input_devices()
                .map_err(|e| AudioError::OsError(e.to_string()))?
                .find(|d| d.name().ok().as_deref() == Some(name))
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
            None => self
                .host
                .default_input_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default input".to_string())),
        }
    }

    /// Find a CPAL playback device by name, or the default when `None`.
    #[allow(deprecated)]
    pub fn find_output_device(&self, name: Option<&str>) -> Result<cpal::Device> {
        match name {
            Some(name) => self
                .host
                .output_devices()
                .map_err(|e| AudioError::OsError(e.to_string()))?
                .find(|d| d.name().ok().as_deref() == Some(name))
                .ok_or_else(|| AudioError::DeviceNotFound(name.to_string())),
            None => self
                .host
                .default_output_device()
                .ok_or_else(|| AudioError::DeviceNotFound("default output".to_string())),
        }
    }
}

impl AudioEnumerator for CpalEnumerator {
    fn input_devices(&self) -> Result<Vec<DeviceInfo>> {
        info!("Enumerating capture devices");
        let devices = self
            .host
            .input_devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?;
        Ok(self.collect(devices, DeviceType::Input))
    }

    fn output_devices(&self) -> Result<Vec<DeviceInfo>> {
        info!("Enumerating playback devices");
        let devices = self
            .host
            .output_devices()
            .map_err(|e| AudioError::OsError(e.to_string()))?;
        Ok(self.collect(devices, DeviceType::Output))
    }

    fn default_input_device(&self) -> Result<DeviceInfo> {
        let device = self.find_input_device(None)?;
        Self::describe(&device, DeviceType::Input)
    }

    fn default_output_device(&self) -> Result<DeviceInfo> {
        let device = self.find_output_device(None)?;
        Self::describe(&device, DeviceType::Output)
    }
}
