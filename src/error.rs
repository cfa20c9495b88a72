//! Custom error types for the application

use thiserror::Error;

/// Application-specific error type
#[derive(Error, Debug)]
pub enum AppError {
    /// No spectral bin fell inside the requested band
    #[error("No spectral bins between {low_hz} Hz and {high_hz} Hz")]
    EmptyBand { low_hz: f64, high_hz: f64 },

    /// A required mixer channel is missing
    #[error("Mixer channel not found: {which}")]
    SinkNotFound { which: &'static str },

    /// Transport failure while talking to the mixer
    #[error("Mixer I/O error: {0}")]
    MixerIo(String),

    /// Ratio string was not of the form `<float>/<float>`
    #[error("Window ratio should be in the format float/float, got {0:?}")]
    InvalidRatioFormat(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Audio device related errors
    #[error("Audio device error: {0}")]
    AudioDevice(String),

    /// Audio stream related errors
    #[error("Audio stream error: {0}")]
    AudioStream(String),

    /// General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<cpal::DevicesError> for AppError {
    fn from(err: cpal::DevicesError) -> Self {
        AppError::AudioDevice(format!("Failed to enumerate devices: {}", err))
    }
}

impl From<cpal::DeviceNameError> for AppError {
    fn from(err: cpal::DeviceNameError) -> Self {
        AppError::AudioDevice(format!("Failed to get device name: {}", err))
    }
}

impl From<cpal::DefaultStreamConfigError> for AppError {
    fn from(err: cpal::DefaultStreamConfigError) -> Self {
        AppError::AudioDevice(format!("Failed to get default stream config: {}", err))
    }
}

impl From<cpal::BuildStreamError> for AppError {
    fn from(err: cpal::BuildStreamError) -> Self {
        AppError::AudioStream(format!("Failed to build audio stream: {}", err))
    }
}

impl From<cpal::PlayStreamError> for AppError {
    fn from(err: cpal::PlayStreamError) -> Self {
        AppError::AudioStream(format!("Failed to play audio stream: {}", err))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::MixerIo(format!("Unreadable mixer response: {}", err))
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
