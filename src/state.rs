//! Routing state and threshold classification

use std::fmt;

/// Which of the two outputs is audible
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum RoutingState {
    /// Marker tone present: the pass-through stream plays
    #[value(name = "digital")]
    DigitalPassthrough,
    /// Marker tone absent or swamped: the regular stream plays
    #[value(name = "standard")]
    StandardPlayback,
}

impl fmt::Display for RoutingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoutingState::DigitalPassthrough => write!(f, "digital pass-through"),
            RoutingState::StandardPlayback => write!(f, "standard playback"),
        }
    }
}

/// Classification thresholds on the smoothed band energy
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub low: f64,
    pub high: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            low: crate::constants::thresholds::LOW,
            high: crate::constants::thresholds::HIGH,
        }
    }
}

/// Maps a smoothed average to a routing state
#[derive(Debug, Clone, Copy, Default)]
pub struct StateClassifier {
    thresholds: Thresholds,
}

impl StateClassifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self { thresholds }
    }

    /// Averages strictly outside `[low, high]` select standard playback
    pub fn classify(&self, average: f64) -> RoutingState {
        if average > self.thresholds.high || average < self.thresholds.low {
            RoutingState::StandardPlayback
        } else {
            RoutingState::DigitalPassthrough
        }
    }
}
