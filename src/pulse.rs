//! PulseAudio / PipeWire sink inputs driven through `pactl`

use crate::constants::mixer::PA_VOLUME_NORM;
use crate::error::{AppError, AppResult};
use crate::mixer::{ChannelHandle, Mixer};
use serde::Deserialize;
use std::collections::HashMap;
use std::process::Command;
use tracing::trace;

#[derive(Debug, Deserialize)]
struct SinkInputEntry {
    index: u32,
    #[serde(default)]
    volume: HashMap<String, ChannelVolume>,
    #[serde(default)]
    properties: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChannelVolume {
    value: u64,
}

impl SinkInputEntry {
    fn name(&self) -> String {
        ["media.name", "application.name"]
            .iter()
            .find_map(|key| self.properties.get(*key).and_then(|v| v.as_str()))
            .map(str::to_string)
            .unwrap_or_else(|| format!("sink-input #{}", self.index))
    }

    /// Mean of the per-channel volumes, normalised so 1.0 is nominal full volume
    fn flat_volume(&self) -> f64 {
        if self.volume.is_empty() {
            return 0.0;
        }
        let total: u64 = self.volume.values().map(|v| v.value).sum();
        total as f64 / self.volume.len() as f64 / PA_VOLUME_NORM
    }
}

/// Parse the output of `pactl --format=json list sink-inputs`
pub fn parse_sink_inputs(json: &str) -> AppResult<Vec<ChannelHandle>> {
    let entries: Vec<SinkInputEntry> = serde_json::from_str(json)?;
    Ok(entries
        .iter()
        .map(|entry| ChannelHandle {
            name: entry.name(),
            index: entry.index,
            volume: entry.flat_volume(),
        })
        .collect())
}

/// Mixer backed by the `pactl` command line client
pub struct PactlMixer {
    program: String,
}

impl PactlMixer {
    pub fn new() -> Self {
        Self::with_program("pactl")
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> AppResult<String> {
        trace!(program = %self.program, ?args, "running mixer command");
        let output = Command::new(&self.program)
            .args(args)
            .output()
            .map_err(|e| AppError::MixerIo(format!("Failed to run {}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(AppError::MixerIo(format!(
                "{} {} failed: {}",
                self.program,
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Default for PactlMixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer for PactlMixer {
    fn list_channels(&mut self) -> AppResult<Vec<ChannelHandle>> {
        let json = self.run(&["--format=json", "list", "sink-inputs"])?;
        parse_sink_inputs(&json)
    }

    fn set_volume(&mut self, index: u32, value: f64) -> AppResult<()> {
        let percent = format!("{:.0}%", value.clamp(0.0, 1.0) * 100.0);
        self.run(&["set-sink-input-volume", &index.to_string(), &percent])?;
        Ok(())
    }
}
