//! Controller configuration
//!
//! Loaded from a JSON file; every field has a default so a partial file (or
//! no file at all) is valid.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::dsp::{EchoParams, ReverbPreset, DEFAULT_WINDOW_SIZE};
use crate::error::{PitchPerfectError, Result};

/// Default render budget: ten minutes of 48 kHz audio
pub const DEFAULT_MAX_RENDER_FRAMES: usize = 48_000 * 60 * 10;

/// Fixed presets the chain builder gives each stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    pub echo: EchoParams,
    pub reverb: ReverbPreset,
    /// Analysis window of the rate/pitch stage, in frames
    pub time_pitch_window: usize,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            echo: EchoParams::multi_echo(),
            reverb: ReverbPreset::Cathedral,
            time_pitch_window: DEFAULT_WINDOW_SIZE,
        }
    }
}

/// Configuration for an [`EffectGraphController`](crate::EffectGraphController)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Largest rendered session, in frames, the graph may allocate
    pub max_render_frames: usize,
    pub stages: StageConfig,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_render_frames: DEFAULT_MAX_RENDER_FRAMES,
            stages: StageConfig::default(),
        }
    }
}

impl ControllerConfig {
    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ControllerConfig = serde_json::from_str(&text)?;
        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_render_frames == 0 {
            return Err(PitchPerfectError::InvalidConfig {
                reason: "max_render_frames must be positive".to_string(),
            });
        }
        if !(64..=65536).contains(&self.stages.time_pitch_window) {
            return Err(PitchPerfectError::InvalidConfig {
                reason: format!(
                    "time_pitch_window = {} is outside 64 to 65536",
                    self.stages.time_pitch_window
                ),
            });
        }
        self.stages.echo.validate()?;
        self.stages.reverb.params().validate()
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
