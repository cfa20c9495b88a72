//! Audio device handling and spectrum capture

use crate::error::{AppError, AppResult};
use crate::spectrum::{SpectralFrame, SpectralSource, group_bins};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::collections::VecDeque;
use std::f32::consts::PI;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Analyzer settings
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Input device index; `None` uses the system default
    pub device: Option<usize>,
    pub fft_window_ms: u32,
    pub smoothing_ms: u32,
    pub frequency_bins: usize,
    /// Rate at which frames will be requested
    pub ticks_per_second: u32,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            device: None,
            fft_window_ms: crate::constants::audio::FFT_WINDOW_MS,
            smoothing_ms: crate::constants::audio::SMOOTHING_MS,
            frequency_bins: crate::constants::audio::FREQUENCY_BINS,
            ticks_per_second: crate::constants::control::TICKS_PER_SECOND,
        }
    }
}

/// Names of all input devices, in index order
pub fn input_device_names() -> AppResult<Vec<String>> {
    let host = cpal::default_host();
    Ok(host
        .input_devices()?
        .map(|d| d.name().unwrap_or_else(|_| "unknown".to_string()))
        .collect())
}

/// Find an input device and pick a capture configuration for it
pub fn setup_audio_device(
    device_index: Option<usize>,
) -> AppResult<(cpal::Device, cpal::SupportedStreamConfig)> {
    let host = cpal::default_host();

    let device = if let Some(index) = device_index {
        host.input_devices()?
            .nth(index)
            .ok_or_else(|| AppError::AudioDevice(format!("No input device with index {}", index)))?
    } else {
        host.default_input_device()
            .ok_or_else(|| AppError::AudioDevice("No default input device available".to_string()))?
    };

    let config = choose_input_config(&device)?;
    Ok((device, config))
}

/// Prefer a configuration that runs at the preferred rate in f32.
///
/// The marker band sits close to 19 kHz, so a range that cannot reach the
/// preferred rate is run at its maximum instead of its minimum.
fn choose_input_config(device: &cpal::Device) -> AppResult<cpal::SupportedStreamConfig> {
    let target = crate::constants::audio::PREFERRED_SAMPLE_RATE;
    let mut best: Option<(i32, cpal::SupportedStreamConfig)> = None;

    let ranges = device
        .supported_input_configs()
        .map_err(|e| AppError::AudioDevice(format!("Failed to get supported stream configs: {}", e)))?;

    for range in ranges {
        let min = range.min_sample_rate().0;
        let max = range.max_sample_rate().0;
        let rate = if (min..=max).contains(&target) { target } else { max };
        let config = range.with_sample_rate(cpal::SampleRate(rate));

        let mut score = 0;
        if rate == target {
            score += 2;
        }
        if config.sample_format() == cpal::SampleFormat::F32 {
            score += 1;
        }
        if best.as_ref().is_none_or(|(s, _)| score > *s) {
            best = Some((score, config));
        }
    }

    match best {
        Some((_, config)) => Ok(config),
        None => Ok(device.default_input_config()?),
    }
}

/// Build an input stream that feeds the first channel into `samples`
fn build_capture_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Arc<Mutex<VecDeque<f32>>>,
    capacity: usize,
) -> AppResult<cpal::Stream>
where
    T: Sample + SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let scale = crate::constants::audio::SAMPLE_SCALE;

    let stream = device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let Ok(mut buffer) = samples.lock() else {
                return;
            };
            for frame in data.chunks(channels) {
                buffer.push_back(frame[0].to_sample::<f32>() * scale);
            }
            let excess = buffer.len().saturating_sub(capacity);
            buffer.drain(..excess);
        },
        |err| error!("Audio stream error: {}", err),
        None,
    )?;

    Ok(stream)
}

/// Turns windows of samples into smoothed magnitude spectra
pub struct SpectrumProcessor {
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    buffer: Vec<Complex<f32>>,
    frequencies: Vec<f64>,
    history: VecDeque<Vec<f64>>,
    history_len: usize,
    frequency_bins: usize,
}

impl SpectrumProcessor {
    pub fn new(sample_rate: u32, config: &AnalyzerConfig) -> Self {
        let fft_size = fft_size(sample_rate, config.fft_window_ms);
        let fft = FftPlanner::<f32>::new().plan_fft_forward(fft_size);

        let frequencies = (0..fft_size / 2)
            .map(|i| i as f64 * sample_rate as f64 / fft_size as f64)
            .collect();

        let frame_ms = 1000.0 / config.ticks_per_second.max(1) as f64;
        let history_len = ((config.smoothing_ms as f64 / frame_ms).round() as usize).max(1);

        Self {
            fft,
            window: hamming_window(fft_size),
            buffer: vec![Complex::new(0.0, 0.0); fft_size],
            frequencies,
            history: VecDeque::with_capacity(history_len + 1),
            history_len,
            frequency_bins: config.frequency_bins,
        }
    }

    /// Number of samples consumed per frame
    pub fn fft_size(&self) -> usize {
        self.buffer.len()
    }

    /// Spectrum of `samples`, averaged with the previous few spectra.
    ///
    /// `samples` shorter than the FFT size are zero-padded.
    pub fn process(&mut self, samples: &[f32]) -> SpectralFrame {
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let s = samples.get(i).copied().unwrap_or(0.0);
            *slot = Complex::new(s * self.window[i], 0.0);
        }
        self.fft.process(&mut self.buffer);

        let magnitudes: Vec<f64> = self.buffer[..self.frequencies.len()]
            .iter()
            .map(|c| c.norm() as f64)
            .collect();

        self.history.push_back(magnitudes);
        while self.history.len() > self.history_len {
            self.history.pop_front();
        }

        let mut averaged = vec![0.0f64; self.frequencies.len()];
        for spectrum in &self.history {
            for (acc, m) in averaged.iter_mut().zip(spectrum) {
                *acc += m;
            }
        }
        let count = self.history.len() as f64;
        averaged.iter_mut().for_each(|m| *m /= count);

        let binned = group_bins(&averaged, self.frequency_bins);
        SpectralFrame {
            frequencies: self.frequencies.clone(),
            magnitudes: averaged,
            binned,
        }
    }
}

/// Even number of samples covering `window_ms` at `sample_rate`
fn fft_size(sample_rate: u32, window_ms: u32) -> usize {
    let samples = (sample_rate as u64 * window_ms as u64).div_ceil(1000) as usize;
    (samples + samples % 2).max(2)
}

fn hamming_window(len: usize) -> Vec<f32> {
    if len < 2 {
        return vec![1.0; len];
    }
    (0..len)
        .map(|i| 0.54 - 0.46 * (2.0 * PI * i as f32 / (len - 1) as f32).cos())
        .collect()
}

/// Frame rate bookkeeping for verbose output
struct FrameStats {
    window_start: Instant,
    frames: u32,
}

impl FrameStats {
    fn record(&mut self, frame: &SpectralFrame) {
        self.frames += 1;
        let elapsed = self.window_start.elapsed();
        if elapsed >= Duration::from_secs(1) {
            let loudest_bin = frame
                .binned
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.total_cmp(b.1))
                .map(|(i, _)| i);
            debug!(
                fps = self.frames as f64 / elapsed.as_secs_f64(),
                ?loudest_bin,
                bins = frame.binned.len(),
                "analyzer throughput"
            );
            self.frames = 0;
            self.window_start = Instant::now();
        }
    }
}

/// Live spectrum of a cpal input device
pub struct CpalAnalyzer {
    device_name: String,
    _stream: cpal::Stream,
    samples: Arc<Mutex<VecDeque<f32>>>,
    scratch: Vec<f32>,
    processor: SpectrumProcessor,
    stats: FrameStats,
    stall_timeout: Duration,
}

impl CpalAnalyzer {
    /// Open the configured device and start capturing
    pub fn start(config: &AnalyzerConfig) -> AppResult<Self> {
        let (device, supported) = setup_audio_device(config.device)?;
        let device_name = device.name()?;
        let sample_rate = supported.sample_rate().0;

        let processor = SpectrumProcessor::new(sample_rate, config);
        let capacity = processor.fft_size();
        let samples = Arc::new(Mutex::new(VecDeque::with_capacity(capacity)));

        let mut stream_config: cpal::StreamConfig = supported.config();
        stream_config.buffer_size = crate::constants::audio::BUFFER_SIZE;

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => build_capture_stream::<f32>,
            cpal::SampleFormat::I16 => build_capture_stream::<i16>,
            cpal::SampleFormat::U16 => build_capture_stream::<u16>,
            other => {
                return Err(AppError::AudioStream(format!(
                    "Unsupported sample format {:?}",
                    other
                )));
            }
        }(&device, &stream_config, samples.clone(), capacity)?;
        stream.play()?;

        info!(
            device = %device_name,
            sample_rate,
            fft_size = capacity,
            "Capturing audio"
        );
        if (sample_rate as f64) / 2.0 < crate::constants::band::HIGH_HZ {
            warn!(
                sample_rate,
                "Sample rate too low to observe the marker band"
            );
        }

        Ok(Self {
            device_name,
            _stream: stream,
            samples,
            scratch: Vec::with_capacity(capacity),
            processor,
            stats: FrameStats {
                window_start: Instant::now(),
                frames: 0,
            },
            stall_timeout: Duration::from_millis(
                config.fft_window_ms.max(1) as u64
                    * crate::constants::audio::STALL_WINDOWS as u64,
            ),
        })
    }
}

/// Copy the newest `needed` samples into `out` once the capture buffer holds
/// them. Fails if the buffer does not fill within `timeout`.
fn wait_for_window(
    samples: &Mutex<VecDeque<f32>>,
    needed: usize,
    timeout: Duration,
    out: &mut Vec<f32>,
) -> AppResult<()> {
    let started = Instant::now();
    loop {
        {
            let buffer = samples
                .lock()
                .map_err(|_| AppError::AudioStream("Capture buffer poisoned".to_string()))?;
            if buffer.len() >= needed {
                out.clear();
                out.extend(buffer.iter().skip(buffer.len() - needed));
                return Ok(());
            }
            if started.elapsed() >= timeout {
                return Err(AppError::AudioStream(format!(
                    "Capture stalled: {} of {} samples after {:?}",
                    buffer.len(),
                    needed,
                    timeout
                )));
            }
        }
        std::thread::sleep(Duration::from_millis(1));
    }
}

impl SpectralSource for CpalAnalyzer {
    /// Blocks until a full window has been captured, or the capture stalls
    fn frame(&mut self) -> AppResult<SpectralFrame> {
        wait_for_window(
            &self.samples,
            self.processor.fft_size(),
            self.stall_timeout,
            &mut self.scratch,
        )?;

        let frame = self.processor.process(&self.scratch);
        self.stats.record(&frame);
        Ok(frame)
    }

    fn name(&self) -> &str {
        &self.device_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AnalyzerConfig {
        AnalyzerConfig {
            smoothing_ms: 0,
            frequency_bins: 8,
            ..AnalyzerConfig::default()
        }
    }

    #[test]
    fn test_wait_for_window_takes_newest_samples() {
        let samples = Mutex::new((0..6).map(|i| i as f32).collect::<VecDeque<_>>());
        let mut out = Vec::new();
        wait_for_window(&samples, 4, Duration::from_millis(50), &mut out).unwrap();
        assert_eq!(out, vec![2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_wait_for_window_times_out_on_stalled_capture() {
        let samples = Mutex::new(VecDeque::from(vec![0.0f32; 3]));
        let mut out = Vec::new();
        let started = Instant::now();

        let err = wait_for_window(&samples, 4, Duration::from_millis(20), &mut out).unwrap_err();
        assert!(matches!(err, AppError::AudioStream(_)));
        assert!(err.to_string().contains("stalled"));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(out.is_empty());
    }

    #[test]
    fn test_fft_size_is_even() {
        assert_eq!(fft_size(48_000, 256), 12_288);
        assert_eq!(fft_size(44_100, 256), 11_290);
        assert_eq!(fft_size(1, 1), 2);
    }

    #[test]
    fn test_frequency_axis() {
        let processor = SpectrumProcessor::new(48_000, &config());
        let frame_len = processor.frequencies.len();
        assert_eq!(frame_len, processor.fft_size() / 2);
        assert_eq!(processor.frequencies[1], 48_000.0 / 12_288.0);
    }

    #[test]
    fn test_tone_lands_in_marker_band() {
        let mut processor = SpectrumProcessor::new(48_000, &config());
        let n = processor.fft_size();
        let tone = 19_000.0f64;
        let samples: Vec<f32> = (0..n)
            .map(|i| {
                let t = i as f64 / 48_000.0;
                (10_000.0 * (2.0 * std::f64::consts::PI * tone * t).sin()) as f32
            })
            .collect();

        let frame = processor.process(&samples);
        let peak = frame
            .magnitudes
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| frame.frequencies[i])
            .unwrap();
        assert!((peak - 19_000.0).abs() < 10.0);

        let in_band = crate::spectrum::mean_energy_in_band(
            &frame.frequencies,
            &frame.magnitudes,
            18_750.0,
            19_250.0,
        )
        .unwrap();
        let below = crate::spectrum::mean_energy_in_band(
            &frame.frequencies,
            &frame.magnitudes,
            1_000.0,
            2_000.0,
        )
        .unwrap();
        assert!(in_band > below * 100.0);
        assert_eq!(frame.binned.len(), 8);
    }

    #[test]
    fn test_history_smooths_frames() {
        let cfg = AnalyzerConfig {
            smoothing_ms: 50,
            ticks_per_second: 60,
            ..config()
        };
        let mut processor = SpectrumProcessor::new(8_000, &cfg);
        assert_eq!(processor.history_len, 3);

        let n = processor.fft_size();
        let loud: Vec<f32> = (0..n).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let first = processor.process(&loud);
        let second = processor.process(&vec![0.0; n]);
        let peak = first.magnitudes.len() - 1;
        assert!((second.magnitudes[peak] - first.magnitudes[peak] / 2.0).abs() < 1e-3);
    }
}
