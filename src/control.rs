//! Per-tick control logic: spectrum in, routing decision out

use crate::error::AppResult;
use crate::mixer::{Mixer, SinkPair, SinkVolumeController};
use crate::smoothing::RunningAverage;
use crate::spectrum::{Band, SpectralSource};
use crate::state::{RoutingState, StateClassifier};
use tracing::info;

/// Mutable loop state, owned by whoever drives the ticks
#[derive(Debug, Clone)]
pub struct ControlContext {
    /// Routing state last applied successfully
    pub state: RoutingState,
    pub window: RunningAverage,
    /// Ticks attempted, including ones that failed
    pub ticks: u64,
    /// Target of the last switch that failed; not attempted again until the
    /// classification moves away from it
    pub failed_target: Option<RoutingState>,
}

impl ControlContext {
    pub fn new(state: RoutingState, window: RunningAverage) -> Self {
        Self {
            state,
            window,
            ticks: 0,
            failed_target: None,
        }
    }
}

/// What a single tick observed and did
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub band_energy: f64,
    pub average: f64,
    pub primed: bool,
    /// `None` while still inside the warm-up period
    pub classified: Option<RoutingState>,
    /// Set when this tick switched the routing
    pub transition: Option<RoutingState>,
}

/// Static parts of the control loop: where frames come from, how they are
/// judged, and where the decision goes.
pub struct ControlLoop<S: SpectralSource, M: Mixer> {
    source: S,
    band: Band,
    classifier: StateClassifier,
    controller: SinkVolumeController<M>,
    warmup_ticks: u64,
}

impl<S: SpectralSource, M: Mixer> ControlLoop<S, M> {
    pub fn new(
        source: S,
        band: Band,
        classifier: StateClassifier,
        controller: SinkVolumeController<M>,
        warmup_ticks: u64,
    ) -> Self {
        Self {
            source,
            band,
            classifier,
            controller,
            warmup_ticks,
        }
    }

    /// Run one tick against `ctx`.
    ///
    /// Errors leave `ctx.state` untouched. A failed switch is abandoned until
    /// the classification changes, then attempted again on the next change.
    pub fn tick(&mut self, ctx: &mut ControlContext) -> AppResult<TickReport> {
        ctx.ticks += 1;

        let frame = self.source.frame()?;
        let band_energy = self.band.energy(&frame)?;
        ctx.window.push(band_energy);

        // The mean is used before the window is primed; zero-filled slots
        // pull it down during the first window.
        let average = ctx.window.mean();
        let mut report = TickReport {
            band_energy,
            average,
            primed: ctx.window.is_primed(),
            classified: None,
            transition: None,
        };

        if ctx.window.pushed() <= self.warmup_ticks {
            return Ok(report);
        }

        let target = self.classifier.classify(average);
        report.classified = Some(target);

        if target == ctx.state {
            ctx.failed_target = None;
        } else if ctx.failed_target != Some(target) {
            if let Err(e) = self.controller.route(target) {
                ctx.failed_target = Some(target);
                return Err(e);
            }
            info!(from = %ctx.state, to = %target, average, "Routing state changed");
            ctx.state = target;
            report.transition = Some(target);
        }

        Ok(report)
    }

    /// Apply `state` to the mixer regardless of what the context holds
    pub fn enforce(&mut self, state: RoutingState) -> AppResult<SinkPair> {
        self.controller.route(state)
    }

    #[cfg(test)]
    pub fn controller(&self) -> &SinkVolumeController<M> {
        &self.controller
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::mixer::SubstringMatcher;
    use crate::mixer::fake::FakeMixer;
    use crate::spectrum::SpectralFrame;
    use crate::state::Thresholds;
    use std::collections::VecDeque;

    /// Plays back a fixed list of band energies, one per frame
    struct ScriptedSource {
        energies: VecDeque<f64>,
        frequencies: Vec<f64>,
    }

    impl ScriptedSource {
        fn new(energies: impl IntoIterator<Item = f64>) -> Self {
            Self {
                energies: energies.into_iter().collect(),
                frequencies: (0..200).map(|i| i as f64 * 125.0).collect(),
            }
        }

        fn below_band(energies: impl IntoIterator<Item = f64>) -> Self {
            Self {
                frequencies: (0..100).map(|i| i as f64 * 100.0).collect(),
                ..Self::new(energies)
            }
        }
    }

    impl SpectralSource for ScriptedSource {
        fn frame(&mut self) -> AppResult<SpectralFrame> {
            let energy = self
                .energies
                .pop_front()
                .ok_or_else(|| AppError::AudioStream("script exhausted".to_string()))?;
            let magnitudes = vec![energy; self.frequencies.len()];
            Ok(SpectralFrame::new(self.frequencies.clone(), magnitudes))
        }
    }

    fn standard_active_mixer() -> FakeMixer {
        FakeMixer::with_channels(&[("Playback", 1, 1.0), ("SPDIF", 2, 0.0)])
    }

    fn control_loop(
        source: ScriptedSource,
        mixer: FakeMixer,
        warmup_ticks: u64,
    ) -> ControlLoop<ScriptedSource, FakeMixer> {
        ControlLoop::new(
            source,
            Band::new(18_750.0, 19_250.0),
            StateClassifier::new(Thresholds::default()),
            SinkVolumeController::new(mixer, Box::new(SubstringMatcher::default())),
            warmup_ticks,
        )
    }

    #[test]
    fn test_tone_onset_switches_once() {
        let energies = std::iter::repeat_n(0.0, 360).chain(std::iter::repeat_n(20_000.0, 40));
        let mut cl = control_loop(ScriptedSource::new(energies), standard_active_mixer(), 0);
        let mut ctx = ControlContext::new(
            RoutingState::StandardPlayback,
            RunningAverage::for_duration(60, 6),
        );

        let mut transitions = Vec::new();
        for tick in 1..=400u64 {
            let report = cl.tick(&mut ctx).unwrap();
            if let Some(state) = report.transition {
                transitions.push((tick, state, report.average));
            }
        }

        // 18 loud samples bring the mean to exactly 1000
        assert_eq!(
            transitions,
            vec![(378, RoutingState::DigitalPassthrough, 1000.0)]
        );
        assert_eq!(ctx.state, RoutingState::DigitalPassthrough);
        assert_eq!(cl.controller().mixer().set_calls, vec![(2, 1.0), (1, 0.0)]);
    }

    #[test]
    fn test_unprimed_window_classifies_immediately() {
        let mut cl = control_loop(ScriptedSource::new([0.0]), standard_active_mixer(), 0);
        let mut ctx = ControlContext::new(
            RoutingState::DigitalPassthrough,
            RunningAverage::new(360),
        );

        let report = cl.tick(&mut ctx).unwrap();
        assert!(!report.primed);
        assert_eq!(report.transition, Some(RoutingState::StandardPlayback));
        assert_eq!(ctx.state, RoutingState::StandardPlayback);
    }

    #[test]
    fn test_warmup_suppresses_early_transitions() {
        let energies = std::iter::repeat_n(0.0, 5);
        let mut cl = control_loop(ScriptedSource::new(energies), standard_active_mixer(), 4);
        let mut ctx = ControlContext::new(
            RoutingState::DigitalPassthrough,
            RunningAverage::new(360),
        );

        for _ in 0..4 {
            let report = cl.tick(&mut ctx).unwrap();
            assert_eq!(report.classified, None);
            assert_eq!(ctx.state, RoutingState::DigitalPassthrough);
        }
        let report = cl.tick(&mut ctx).unwrap();
        assert_eq!(report.transition, Some(RoutingState::StandardPlayback));
    }

    #[test]
    fn test_empty_band_keeps_state_and_window() {
        let mut cl = control_loop(
            ScriptedSource::below_band([20_000.0]),
            standard_active_mixer(),
            0,
        );
        let mut ctx = ControlContext::new(
            RoutingState::DigitalPassthrough,
            RunningAverage::new(10),
        );

        let err = cl.tick(&mut ctx).unwrap_err();
        assert!(matches!(err, AppError::EmptyBand { .. }));
        assert_eq!(ctx.state, RoutingState::DigitalPassthrough);
        assert_eq!(ctx.window.pushed(), 0);
        assert_eq!(ctx.ticks, 1);
        assert!(cl.controller().mixer().set_calls.is_empty());
    }

    #[test]
    fn test_missing_sink_freezes_routing_until_next_change() {
        let energies = [5_000.0, 5_000.0, 0.0, 5_000.0];
        let mixer = FakeMixer::with_channels(&[("Playback", 1, 1.0)]);
        let mut cl = control_loop(ScriptedSource::new(energies), mixer, 0);
        let mut ctx = ControlContext::new(
            RoutingState::StandardPlayback,
            RunningAverage::new(1),
        );

        let err = cl.tick(&mut ctx).unwrap_err();
        assert!(matches!(err, AppError::SinkNotFound { which: "digital" }));
        assert_eq!(ctx.state, RoutingState::StandardPlayback);
        assert_eq!(ctx.failed_target, Some(RoutingState::DigitalPassthrough));

        cl.controller.mixer_mut().channels.push(crate::mixer::ChannelHandle {
            name: "SPDIF".to_string(),
            index: 2,
            volume: 0.0,
        });

        // Same classification: the abandoned switch is not attempted
        let report = cl.tick(&mut ctx).unwrap();
        assert_eq!(report.transition, None);
        assert_eq!(cl.controller().mixer().list_calls, 1);

        // Classification falls back to the current state, clearing the failure
        let report = cl.tick(&mut ctx).unwrap();
        assert_eq!(report.transition, None);
        assert_eq!(ctx.failed_target, None);

        let report = cl.tick(&mut ctx).unwrap();
        assert_eq!(report.transition, Some(RoutingState::DigitalPassthrough));
        assert_eq!(cl.controller().mixer().volume_of(2), 1.0);
        assert_eq!(cl.controller().mixer().volume_of(1), 0.0);
    }

    #[test]
    fn test_missing_sinks_are_not_polled_every_tick() {
        let energies = std::iter::repeat_n(0.0, 60);
        let mut cl = control_loop(ScriptedSource::new(energies), FakeMixer::default(), 0);
        let mut ctx = ControlContext::new(
            RoutingState::DigitalPassthrough,
            RunningAverage::new(360),
        );

        let mut failures = 0;
        for _ in 0..60 {
            if cl.tick(&mut ctx).is_err() {
                failures += 1;
            }
        }

        assert_eq!(failures, 1);
        assert_eq!(cl.controller().mixer().list_calls, 1);
        assert_eq!(ctx.state, RoutingState::DigitalPassthrough);
        assert_eq!(ctx.ticks, 60);
    }

    #[test]
    fn test_enforce_applies_initial_state() {
        let mut cl = control_loop(ScriptedSource::new(Vec::new()), standard_active_mixer(), 0);
        let sinks = cl.enforce(RoutingState::DigitalPassthrough).unwrap();
        assert_eq!(sinks.digital.volume, 1.0);
        assert_eq!(sinks.standard.volume, 0.0);

        cl.enforce(RoutingState::DigitalPassthrough).unwrap();
        assert_eq!(cl.controller().mixer().set_calls.len(), 2);
    }
}
