//! Spectral frames and band-energy extraction

use crate::error::{AppError, AppResult};

/// One spectrum snapshot as produced by an analyzer.
///
/// `frequencies` is in Hz and non-decreasing; `magnitudes` has the same length.
#[derive(Debug, Clone, Default)]
pub struct SpectralFrame {
    pub frequencies: Vec<f64>,
    pub magnitudes: Vec<f64>,
    /// Magnitudes grouped into a fixed number of coarser bins
    pub binned: Vec<f64>,
}

impl SpectralFrame {
    pub fn new(frequencies: Vec<f64>, magnitudes: Vec<f64>) -> Self {
        Self {
            frequencies,
            magnitudes,
            binned: Vec::new(),
        }
    }
}

/// Anything that can hand out the latest spectrum on demand.
///
/// Calls may block until a frame is available.
pub trait SpectralSource {
    fn frame(&mut self) -> AppResult<SpectralFrame>;

    /// Human readable name of the capture device
    fn name(&self) -> &str {
        "spectral source"
    }
}

/// Frequency range whose energy drives classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub low_hz: f64,
    pub high_hz: f64,
}

impl Band {
    pub fn new(low_hz: f64, high_hz: f64) -> Self {
        Self { low_hz, high_hz }
    }

    /// Mean magnitude of `frame` inside this band
    pub fn energy(&self, frame: &SpectralFrame) -> AppResult<f64> {
        mean_energy_in_band(
            &frame.frequencies,
            &frame.magnitudes,
            self.low_hz,
            self.high_hz,
        )
    }
}

/// Mean magnitude over the run of bins with `low_hz <= f < high_hz`.
///
/// The mean covers every index from the first matching bin through the last
/// matching bin, inclusive, whether or not the bins in between match.
pub fn mean_energy_in_band(
    frequencies: &[f64],
    magnitudes: &[f64],
    low_hz: f64,
    high_hz: f64,
) -> AppResult<f64> {
    let len = frequencies.len().min(magnitudes.len());
    let frequencies = &frequencies[..len];

    let in_band = |f: &f64| low_hz <= *f && *f < high_hz;
    let first = frequencies.iter().position(in_band);
    let last = frequencies.iter().rposition(in_band);

    match (first, last) {
        (Some(first), Some(last)) => {
            let span = &magnitudes[first..=last];
            Ok(span.iter().sum::<f64>() / span.len() as f64)
        }
        _ => Err(AppError::EmptyBand { low_hz, high_hz }),
    }
}

/// Group `magnitudes` into `bins` contiguous buckets and average each.
pub fn group_bins(magnitudes: &[f64], bins: usize) -> Vec<f64> {
    if bins == 0 || magnitudes.is_empty() {
        return Vec::new();
    }
    if bins >= magnitudes.len() {
        return magnitudes.to_vec();
    }

    (0..bins)
        .map(|b| {
            let start = b * magnitudes.len() / bins;
            let end = (b + 1) * magnitudes.len() / bins;
            let group = &magnitudes[start..end];
            group.iter().sum::<f64>() / group.len() as f64
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis() -> Vec<f64> {
        vec![0.0, 100.0, 200.0, 300.0, 400.0]
    }

    #[test]
    fn test_mean_over_matching_bins() {
        let mags = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let mean = mean_energy_in_band(&axis(), &mags, 100.0, 300.0).unwrap();
        assert_eq!(mean, 2.5);

        let mean = mean_energy_in_band(&axis(), &mags, 0.0, 1000.0).unwrap();
        assert_eq!(mean, 3.0);
    }

    #[test]
    fn test_low_edge_inclusive_high_edge_exclusive() {
        let mags = vec![10.0, 20.0, 30.0, 40.0, 50.0];
        // 200 Hz is included, 300 Hz is not
        let mean = mean_energy_in_band(&axis(), &mags, 200.0, 300.0).unwrap();
        assert_eq!(mean, 30.0);
    }

    #[test]
    fn test_band_between_bins_is_empty() {
        let mags = vec![1.0; 5];
        let err = mean_energy_in_band(&axis(), &mags, 150.0, 190.0).unwrap_err();
        assert!(matches!(err, AppError::EmptyBand { .. }));
    }

    #[test]
    fn test_band_outside_spectrum_is_empty() {
        let mags = vec![1.0; 5];
        assert!(mean_energy_in_band(&axis(), &mags, 18_750.0, 19_250.0).is_err());
        assert!(mean_energy_in_band(&[], &[], 0.0, 1.0).is_err());
    }

    #[test]
    fn test_span_includes_interior_bins() {
        // The middle bin is outside the band but sits inside the matching run
        let freqs = vec![100.0, 500.0, 200.0, 900.0];
        let mags = vec![3.0, 6.0, 9.0, 100.0];
        let mean = mean_energy_in_band(&freqs, &mags, 100.0, 300.0).unwrap();
        assert_eq!(mean, 6.0);
    }

    #[test]
    fn test_band_energy_on_frame() {
        let freqs: Vec<f64> = (0..200).map(|i| i as f64 * 125.0).collect();
        let mags: Vec<f64> = freqs
            .iter()
            .map(|f| if (18_750.0..19_250.0).contains(f) { 20_000.0 } else { 5.0 })
            .collect();
        let frame = SpectralFrame::new(freqs, mags);
        let band = Band::new(18_750.0, 19_250.0);
        assert_eq!(band.energy(&frame).unwrap(), 20_000.0);
    }

    #[test]
    fn test_group_bins() {
        let mags = vec![1.0, 3.0, 5.0, 7.0];
        assert_eq!(group_bins(&mags, 2), vec![2.0, 6.0]);
        assert_eq!(group_bins(&mags, 8), mags);
        assert!(group_bins(&mags, 0).is_empty());
    }
}
