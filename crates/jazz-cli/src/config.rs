//! TOML presets for the effect commands

use std::path::Path;

use anyhow::Context;
use jazz_services::{ChorusParams, ReverbParams, SampleSet, WahParams, WavSynthParams};
use serde::{Deserialize, Serialize};

/// Every table is optional; missing keys keep their defaults
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Presets {
    pub sample_set: SampleSet,
    pub reverb: ReverbParams,
    pub chorus: ChorusParams,
    pub wah: WahParams,
    pub synth: WavSynthParams,
}

impl Presets {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading preset file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("parsing preset file {}", path.display()))
    }

    pub fn parse(text: &str) -> anyhow::Result<Self> {
        let presets: Self = toml::from_str(text)?;
        presets.validate()?;
        Ok(presets)
    }

    /// Values the effects cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        self.sample_set.validate()?;
        anyhow::ensure!(
            self.reverb.reverb_time > 0.0,
            "reverb_time must be positive, got {}",
            self.reverb.reverb_time
        );
        Ok(())
    }
}
