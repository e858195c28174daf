use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{PlaybackState, PlayerError, Result};

/// Top-level configuration structure for the player.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub visualizer: VisualizerConfig,
}

impl AppConfig {
    /// Parses a configuration document. Missing fields take their defaults.
    pub fn from_json_str(input: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(input)?;
        config.visualizer.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Configuration of the playback control.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Restart from the beginning when the source runs out.
    pub looping: bool,
    pub labels: Labels,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            looping: true,
            labels: Labels::default(),
        }
    }
}

/// Text shown on the control for each playback phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Labels {
    pub loading: String,
    pub playing: String,
    pub paused: String,
}

impl Default for Labels {
    fn default() -> Self {
        Self {
            loading: "Loading…".to_string(),
            playing: "Pause".to_string(),
            paused: "Play".to_string(),
        }
    }
}

impl Labels {
    pub fn label_for(&self, state: PlaybackState) -> &str {
        match state {
            PlaybackState::Loading => &self.loading,
            PlaybackState::Playing => &self.playing,
            PlaybackState::Idle | PlaybackState::Errored => &self.paused,
        }
    }

    /// Width in characters of the widest label, so the control keeps a
    /// stable size while its label changes.
    pub fn min_width(&self) -> usize {
        [&self.loading, &self.playing, &self.paused]
            .iter()
            .map(|label| label.chars().count())
            .max()
            .unwrap_or(0)
    }
}

/// Configuration of the spectrum bars and the analyser feeding them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualizerConfig {
    /// Fraction of the canvas width shared by all bars.
    pub thickness_scalar: f32,
    /// Horizontal gap between bars in canvas units.
    pub bar_spacing: f32,
    pub fft_size: usize,
    /// Theme variable holding the bar colour.
    pub color_variable: String,
    pub fallback_color: String,
    pub smoothing: f32,
    pub min_decibels: f32,
    pub max_decibels: f32,
}

impl Default for VisualizerConfig {
    fn default() -> Self {
        Self {
            thickness_scalar: 0.15,
            bar_spacing: 30.0,
            fft_size: 256,
            color_variable: "--color-secondary".to_string(),
            fallback_color: "rgb(0, 0, 0)".to_string(),
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl VisualizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.thickness_scalar > 0.0 && self.thickness_scalar <= 1.0) {
            return Err(PlayerError::InvalidInput(
                "thickness_scalar must be within (0, 1]",
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing) {
            return Err(PlayerError::InvalidInput("smoothing must be within [0, 1]"));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(PlayerError::InvalidInput(
                "min_decibels must be below max_decibels",
            ));
        }
        crate::analysis::validate_fft_size(self.fft_size)
    }
}
