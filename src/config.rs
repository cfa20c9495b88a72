//! Configuration parsing and validation

use crate::audio::AnalyzerConfig;
use crate::constants;
use crate::error::{AppError, AppResult};
use crate::scheduler::IdleStrategy;
use crate::spectrum::Band;
use crate::state::{RoutingState, Thresholds};
use clap::{Parser, Subcommand};
use std::cmp::Ordering;

/// Command line arguments for the toneswitch application
#[derive(Parser)]
#[command(name = "toneswitch")]
#[command(about = "Route audio between two playback streams based on an ultrasonic marker tone")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Listen for the marker tone and switch playback streams
    Run(RunArgs),
    /// List available audio input devices
    List(ListArgs),
    /// List mixer playback streams and their volumes
    Sinks(SinksArgs),
}

#[derive(Parser)]
pub struct RunArgs {
    /// Audio input device index (optional, uses default if not specified)
    #[arg(long)]
    pub device: Option<usize>,

    /// Height, in pixels, of the visualizer window
    #[arg(long, default_value_t = constants::display::HEIGHT)]
    pub height: u32,

    /// Number of grouped frequency bins reported by the analyzer
    #[arg(long, alias = "n_frequency_bins", default_value_t = constants::audio::FREQUENCY_BINS)]
    pub n_frequency_bins: usize,

    /// Log running statistics (average, analyzer frame rate)
    #[arg(long)]
    pub verbose: bool,

    /// Aspect ratio of the visualizer window, e.g. 24/9
    #[arg(long, alias = "window_ratio", default_value = constants::display::WINDOW_RATIO)]
    pub window_ratio: String,

    /// Sleep between frames to reduce CPU usage instead of spinning
    #[arg(long, alias = "sleep_between_frames")]
    pub sleep_between_frames: bool,

    /// Lower edge of the marker band in Hz (inclusive)
    #[arg(long, default_value_t = constants::band::LOW_HZ)]
    pub low_hz: f64,

    /// Upper edge of the marker band in Hz (exclusive)
    #[arg(long, default_value_t = constants::band::HIGH_HZ)]
    pub high_hz: f64,

    /// Averages below this select standard playback (empirical)
    #[arg(long, default_value_t = constants::thresholds::LOW)]
    pub low_threshold: f64,

    /// Averages above this select standard playback (empirical)
    #[arg(long, default_value_t = constants::thresholds::HIGH)]
    pub high_threshold: f64,

    /// Control loop ticks per second
    #[arg(long, default_value_t = constants::control::TICKS_PER_SECOND)]
    pub fps: u32,

    /// Length of the running average in seconds
    #[arg(long, default_value_t = constants::control::WINDOW_SECONDS)]
    pub window_seconds: u32,

    /// Samples to collect before classifying (0 classifies from the first tick)
    #[arg(long, default_value_t = constants::control::WARMUP_TICKS)]
    pub warmup_ticks: u64,

    /// Substring identifying the digital pass-through stream
    #[arg(long, default_value = constants::mixer::DIGITAL_MARKER)]
    pub digital_marker: String,

    /// Substring identifying the standard playback stream
    #[arg(long, default_value = constants::mixer::STANDARD_MARKER)]
    pub standard_marker: String,

    /// Routing applied at startup
    #[arg(long, value_enum, default_value = "digital")]
    pub initial_state: RoutingState,

    /// FFT window length in milliseconds
    #[arg(long, default_value_t = constants::audio::FFT_WINDOW_MS)]
    pub fft_window_ms: u32,

    /// Temporal smoothing of spectra in milliseconds
    #[arg(long, default_value_t = constants::audio::SMOOTHING_MS)]
    pub smoothing_ms: u32,

    /// Show a live status screen instead of log output
    #[arg(long)]
    pub monitor: bool,
}

#[derive(Parser)]
pub struct ListArgs {}

#[derive(Parser)]
pub struct SinksArgs {}

/// Display settings; accepted for compatibility, not used by the control loop
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayConfig {
    pub height: u32,
    pub window_ratio: f64,
}

/// Application configuration derived from command line arguments
#[derive(Debug, Clone)]
pub struct Config {
    pub analyzer: AnalyzerConfig,
    pub band: Band,
    pub thresholds: Thresholds,
    pub ticks_per_second: u32,
    pub window_seconds: u32,
    pub warmup_ticks: u64,
    pub initial_state: RoutingState,
    pub digital_marker: String,
    pub standard_marker: String,
    pub idle: IdleStrategy,
    pub verbose: bool,
    pub monitor: bool,
    pub display: DisplayConfig,
}

impl Config {
    /// Create configuration from run arguments
    pub fn from_run_args(args: RunArgs) -> AppResult<Self> {
        let window_ratio = parse_window_ratio(&args.window_ratio)?;

        if args.low_hz.partial_cmp(&args.high_hz) != Some(Ordering::Less) {
            return Err(AppError::Config(format!(
                "Band low edge must be below high edge, got {} Hz .. {} Hz",
                args.low_hz, args.high_hz
            )));
        }

        if args.low_threshold.partial_cmp(&args.high_threshold).is_none_or(Ordering::is_gt) {
            return Err(AppError::Config(format!(
                "Low threshold must not exceed high threshold, got {} and {}",
                args.low_threshold, args.high_threshold
            )));
        }

        if args.fps == 0 {
            return Err(AppError::Config("Ticks per second must be positive".to_string()));
        }

        if args.window_seconds == 0 {
            return Err(AppError::Config("Window length must be positive".to_string()));
        }

        let window_samples = args.fps as u64 * args.window_seconds as u64;
        if window_samples > constants::control::MAX_WINDOW_SAMPLES {
            return Err(AppError::Config(format!(
                "Smoothing window of {} samples exceeds the limit of {}",
                window_samples,
                constants::control::MAX_WINDOW_SAMPLES
            )));
        }

        if args.n_frequency_bins == 0 {
            return Err(AppError::Config("Frequency bin count must be positive".to_string()));
        }

        if args.fft_window_ms == 0 {
            return Err(AppError::Config("FFT window must be positive".to_string()));
        }

        if args.digital_marker.is_empty() || args.standard_marker.is_empty() {
            return Err(AppError::Config("Stream markers must not be empty".to_string()));
        }

        Ok(Config {
            analyzer: AnalyzerConfig {
                device: args.device,
                fft_window_ms: args.fft_window_ms,
                smoothing_ms: args.smoothing_ms,
                frequency_bins: args.n_frequency_bins,
                ticks_per_second: args.fps,
            },
            band: Band::new(args.low_hz, args.high_hz),
            thresholds: Thresholds {
                low: args.low_threshold,
                high: args.high_threshold,
            },
            ticks_per_second: args.fps,
            window_seconds: args.window_seconds,
            warmup_ticks: args.warmup_ticks,
            initial_state: args.initial_state,
            digital_marker: args.digital_marker,
            standard_marker: args.standard_marker,
            idle: IdleStrategy::from_flag(args.sleep_between_frames),
            verbose: args.verbose,
            monitor: args.monitor,
            display: DisplayConfig {
                height: args.height,
                window_ratio,
            },
        })
    }
}

/// Parse a ratio of the form `<float>/<float>`
pub fn parse_window_ratio(ratio: &str) -> AppResult<f64> {
    let invalid = || AppError::InvalidRatioFormat(ratio.to_string());

    let (dividend, divisor) = ratio.split_once('/').ok_or_else(invalid)?;
    let dividend: f64 = dividend.trim().parse().map_err(|_| invalid())?;
    let divisor: f64 = divisor.trim().parse().map_err(|_| invalid())?;

    let value = dividend / divisor;
    if !value.is_finite() {
        return Err(invalid());
    }
    Ok(value)
}
