//! Mixer channel selection and volume routing

use crate::error::{AppError, AppResult};
use crate::state::RoutingState;
use tracing::{debug, info};

/// Linear volume of the audible channel
pub const FULL_VOLUME: f64 = 1.0;
/// Linear volume of the silenced channel
pub const MUTED_VOLUME: f64 = 0.0;

/// A mixer channel as last reported by the mixer
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelHandle {
    pub name: String,
    pub index: u32,
    /// Linear volume in `[0.0, 1.0]`
    pub volume: f64,
}

/// Control-plane access to a system mixer
pub trait Mixer {
    /// Enumerate the channels currently known to the mixer
    fn list_channels(&mut self) -> AppResult<Vec<ChannelHandle>>;

    /// Set the linear volume of the channel with `index`
    fn set_volume(&mut self, index: u32, value: f64) -> AppResult<()>;
}

/// Decides which mixer channel plays which role
pub trait SinkMatcher {
    fn is_digital(&self, name: &str) -> bool;
    fn is_standard(&self, name: &str) -> bool;
}

/// Matches channels by a substring of their name
#[derive(Debug, Clone)]
pub struct SubstringMatcher {
    pub digital: String,
    pub standard: String,
}

impl SubstringMatcher {
    pub fn new(digital: impl Into<String>, standard: impl Into<String>) -> Self {
        Self {
            digital: digital.into(),
            standard: standard.into(),
        }
    }
}

impl Default for SubstringMatcher {
    fn default() -> Self {
        Self::new(
            crate::constants::mixer::DIGITAL_MARKER,
            crate::constants::mixer::STANDARD_MARKER,
        )
    }
}

impl SinkMatcher for SubstringMatcher {
    fn is_digital(&self, name: &str) -> bool {
        name.contains(&self.digital)
    }

    fn is_standard(&self, name: &str) -> bool {
        name.contains(&self.standard)
    }
}

/// The two channels being switched between
#[derive(Debug, Clone, PartialEq)]
pub struct SinkPair {
    pub digital: ChannelHandle,
    pub standard: ChannelHandle,
}

impl SinkPair {
    /// `(audible, silenced)` channels for `state`
    pub fn split(&self, state: RoutingState) -> (&ChannelHandle, &ChannelHandle) {
        match state {
            RoutingState::DigitalPassthrough => (&self.digital, &self.standard),
            RoutingState::StandardPlayback => (&self.standard, &self.digital),
        }
    }
}

/// Keeps exactly one of the two channels audible
pub struct SinkVolumeController<M: Mixer> {
    mixer: M,
    matcher: Box<dyn SinkMatcher>,
}

impl<M: Mixer> SinkVolumeController<M> {
    pub fn new(mixer: M, matcher: Box<dyn SinkMatcher>) -> Self {
        Self { mixer, matcher }
    }

    /// Look up both channels from the mixer's current channel list.
    ///
    /// A channel matching the digital marker is never considered for the
    /// standard role.
    pub fn resolve_sinks(&mut self) -> AppResult<SinkPair> {
        let mut digital = None;
        let mut standard = None;

        for channel in self.mixer.list_channels()? {
            if self.matcher.is_digital(&channel.name) {
                digital.get_or_insert(channel);
            } else if self.matcher.is_standard(&channel.name) {
                standard.get_or_insert(channel);
            }
        }

        Ok(SinkPair {
            digital: digital.ok_or(AppError::SinkNotFound { which: "digital" })?,
            standard: standard.ok_or(AppError::SinkNotFound { which: "standard" })?,
        })
    }

    /// Bring the mixer in line with `state`, touching only channels that
    /// are not already at their target volume.
    ///
    /// Returns a freshly resolved pair when anything changed. A failed
    /// volume call is returned as is; channels already switched stay switched.
    pub fn apply(&mut self, state: RoutingState, sinks: SinkPair) -> AppResult<SinkPair> {
        let (audible, silenced) = sinks.split(state);
        let mut changed = false;

        if audible.volume != FULL_VOLUME {
            debug!(channel = %audible.name, index = audible.index, "unmuting");
            self.mixer.set_volume(audible.index, FULL_VOLUME)?;
            changed = true;
        }
        if silenced.volume != MUTED_VOLUME {
            debug!(channel = %silenced.name, index = silenced.index, "muting");
            self.mixer.set_volume(silenced.index, MUTED_VOLUME)?;
            changed = true;
        }

        if changed {
            info!("Routed audio to {}", state);
            self.resolve_sinks()
        } else {
            Ok(sinks)
        }
    }

    /// Resolve the channels fresh and apply `state` to them
    pub fn route(&mut self, state: RoutingState) -> AppResult<SinkPair> {
        let sinks = self.resolve_sinks()?;
        self.apply(state, sinks)
    }

    #[cfg(test)]
    pub fn mixer(&self) -> &M {
        &self.mixer
    }

    #[cfg(test)]
    pub fn mixer_mut(&mut self) -> &mut M {
        &mut self.mixer
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;

    /// In-memory mixer that records every volume change
    #[derive(Debug, Default)]
    pub struct FakeMixer {
        pub channels: Vec<ChannelHandle>,
        pub set_calls: Vec<(u32, f64)>,
        pub fail_on: Option<u32>,
        pub list_calls: usize,
    }

    impl FakeMixer {
        pub fn with_channels(channels: &[(&str, u32, f64)]) -> Self {
            Self {
                channels: channels
                    .iter()
                    .map(|(name, index, volume)| ChannelHandle {
                        name: name.to_string(),
                        index: *index,
                        volume: *volume,
                    })
                    .collect(),
                ..Default::default()
            }
        }

        pub fn volume_of(&self, index: u32) -> f64 {
            self.channels
                .iter()
                .find(|c| c.index == index)
                .map(|c| c.volume)
                .unwrap_or(f64::NAN)
        }
    }

    impl Mixer for FakeMixer {
        fn list_channels(&mut self) -> AppResult<Vec<ChannelHandle>> {
            self.list_calls += 1;
            Ok(self.channels.clone())
        }

        fn set_volume(&mut self, index: u32, value: f64) -> AppResult<()> {
            if self.fail_on == Some(index) {
                return Err(AppError::MixerIo(format!("channel {} unreachable", index)));
            }
            self.set_calls.push((index, value));
            if let Some(channel) = self.channels.iter_mut().find(|c| c.index == index) {
                channel.volume = value;
            }
            Ok(())
        }
    }
}
