//! Running average over recent band-energy samples

/// Fixed-capacity circular history of per-tick samples.
///
/// Unwritten slots hold `0.0`, so the mean is biased toward zero until the
/// window has been filled once.
#[derive(Debug, Clone)]
pub struct RunningAverage {
    slots: Vec<f64>,
    pushed: u64,
}

impl RunningAverage {
    /// Create a zero-filled window with `capacity` slots (at least one)
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![0.0; capacity.max(1)],
            pushed: 0,
        }
    }

    /// Window sized for `ticks_per_second * window_seconds` samples
    pub fn for_duration(ticks_per_second: u32, window_seconds: u32) -> Self {
        Self::new(ticks_per_second as usize * window_seconds as usize)
    }

    /// Overwrite the oldest slot with `sample`
    pub fn push(&mut self, sample: f64) {
        let slot = (self.pushed % self.slots.len() as u64) as usize;
        self.slots[slot] = sample;
        self.pushed += 1;
    }

    /// Mean of every slot, recomputed on each call
    pub fn mean(&self) -> f64 {
        self.slots.iter().sum::<f64>() / self.slots.len() as f64
    }

    /// True once more than `capacity` samples have been pushed
    pub fn is_primed(&self) -> bool {
        self.pushed > self.slots.len() as u64
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Total samples pushed so far
    pub fn pushed(&self) -> u64 {
        self.pushed
    }
}
