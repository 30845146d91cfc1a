//! Audio device lookup and cpal error mapping

use cpal::traits::HostTrait;

use crate::error::AudioError;

/// Get the default input device
pub fn default_input_device() -> Result<cpal::Device, AudioError> {
    cpal::default_host()
        .default_input_device()
        .ok_or_else(|| AudioError::DeviceNotFound("No default input device".to_string()))
}

/// Get the default output device
pub fn default_output_device() -> Result<cpal::Device, AudioError> {
    cpal::default_host()
        .default_output_device()
        .ok_or_else(|| AudioError::DeviceNotFound("No default output device".to_string()))
}

/// Map a stream build failure onto the session error taxonomy.
///
/// A device that exists but cannot be opened (typically because the OS
/// denied access to the microphone) surfaces as `AccessDenied` so the
/// session can show the permission message instead of a generic fault.
pub fn map_build_error(err: cpal::BuildStreamError) -> AudioError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => AudioError::AccessDenied(err.to_string()),
        cpal::BuildStreamError::StreamConfigNotSupported => {
            AudioError::UnsupportedFormat(err.to_string())
        }
        other => AudioError::StreamError(other.to_string()),
    }
}
