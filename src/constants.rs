//! Application constants and configuration values

/// Band-energy signal constants
pub mod band {
    /// Lower edge of the marker-tone band (inclusive), in Hz
    pub const LOW_HZ: f64 = 18_750.0;
    /// Upper edge of the marker-tone band (exclusive), in Hz
    pub const HIGH_HZ: f64 = 19_250.0;
}

/// Classification thresholds.
///
/// Chosen empirically against real captures, not derived from any physical
/// model. Exposed as command line tunables.
pub mod thresholds {
    /// Averages above this select standard playback
    pub const HIGH: f64 = 17_500.0;
    /// Averages below this select standard playback
    pub const LOW: f64 = 1_000.0;
}

/// Control loop timing
pub mod control {
    /// Target ticks per second
    pub const TICKS_PER_SECOND: u32 = 60;
    /// Length of the smoothing window in seconds
    pub const WINDOW_SECONDS: u32 = 6;
    /// Upper bound on samples held by the smoothing window
    pub const MAX_WINDOW_SAMPLES: u64 = 1_000_000;
    /// Ticks to ignore before classifying; 0 classifies from the first tick
    pub const WARMUP_TICKS: u64 = 0;
    /// Fraction of the remaining interval slept when idle
    pub const IDLE_SLEEP_FACTOR: f64 = 0.99;
}

/// Mixer channel selection
pub mod mixer {
    /// Substring identifying the digital pass-through stream
    pub const DIGITAL_MARKER: &str = "SPDIF";
    /// Substring identifying the standard playback stream
    pub const STANDARD_MARKER: &str = "Playback";
    /// PulseAudio's nominal full volume
    pub const PA_VOLUME_NORM: f64 = 65_536.0;
}

/// Audio capture and analysis constants
pub mod audio {
    /// Length of the FFT window in milliseconds
    pub const FFT_WINDOW_MS: u32 = 256;
    /// Temporal smoothing applied to spectra, in milliseconds
    pub const SMOOTHING_MS: u32 = 50;
    /// Number of grouped frequency bins reported alongside the raw spectrum
    pub const FREQUENCY_BINS: usize = 400;
    /// Preferred capture rate; must be high enough to see the marker band
    pub const PREFERRED_SAMPLE_RATE: u32 = 48_000;
    /// Scale applied to f32 samples so magnitudes match 16-bit capture
    pub const SAMPLE_SCALE: f32 = 32_768.0;
    /// FFT windows to wait for samples before the capture counts as stalled
    pub const STALL_WINDOWS: u32 = 4;
    /// Buffer size for audio streams
    pub const BUFFER_SIZE: cpal::BufferSize = cpal::BufferSize::Default;
}

/// Display-only defaults
pub mod display {
    /// Visualizer height in pixels
    pub const HEIGHT: u32 = 450;
    /// Visualizer aspect ratio
    pub const WINDOW_RATIO: &str = "24/9";
}

/// UI display constants
pub mod ui {
    /// Bar width calculation accounts for borders
    pub const BAR_BORDER_WIDTH: usize = 2;
    /// Gauge full scale as a multiple of the high threshold
    pub const GAUGE_HEADROOM: f64 = 1.25;
}
