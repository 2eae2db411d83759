use crate::error::{AnalysisError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Offset multipliers tried by the peak search, in scan order.
pub const DEFAULT_OFFSET_MULTIPLIERS: [f64; 26] = [
    0.0, 0.05, 0.1, 0.15, 0.2, 0.25, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0, 1.1, 1.2, 1.3, 1.4,
    1.5, 1.75, 2.0, 2.5, 2.75, 3.0, 3.5, 4.0,
];

/// Tunable parameters for the strip analysis pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Running-mean window used as the detection baseline (seconds).
    pub window_size_s: f64,
    /// Candidate baseline offset multipliers.
    pub offset_multipliers: Vec<f64>,
    /// Shortest plausible beat-to-beat interval / refractory period (seconds).
    pub min_beat_interval_s: f64,
    /// Longest plausible beat-to-beat interval (seconds).
    pub max_beat_interval_s: f64,
    /// Absolute voltage above which a one-time range warning is logged (mV).
    pub voltage_warning_mv: f64,
    /// Running-mean window over peak voltages when re-filtering fast signals (peaks).
    pub refilter_window: f64,
    /// Initial fraction of the peak running mean subtracted per re-filter round.
    pub refilter_start_factor: f64,
    /// Amount the re-filter fraction shrinks each round.
    pub refilter_step: f64,
    /// Rounds after which re-filtering gives up and rejects the signal.
    pub max_refilter_rounds: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_size_s: 0.75,
            offset_multipliers: DEFAULT_OFFSET_MULTIPLIERS.to_vec(),
            min_beat_interval_s: 0.24,
            max_beat_interval_s: 1.6,
            voltage_warning_mv: 300.0,
            refilter_window: 4.0,
            refilter_start_factor: 0.3,
            refilter_step: 0.04,
            max_refilter_rounds: 500,
        }
    }
}

impl AnalysisConfig {
    /// Parse a TOML document; missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self =
            toml::from_str(text).map_err(|e| AnalysisError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            AnalysisError::InvalidConfig(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.window_size_s.is_finite() && self.window_size_s > 0.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "window_size_s must be positive, got {}",
                self.window_size_s
            )));
        }
        if self.offset_multipliers.is_empty() {
            return Err(AnalysisError::InvalidConfig(
                "offset_multipliers must not be empty".into(),
            ));
        }
        if self.offset_multipliers.iter().any(|m| !m.is_finite()) {
            return Err(AnalysisError::InvalidConfig(
                "offset_multipliers must be finite".into(),
            ));
        }
        if !(self.min_beat_interval_s > 0.0 && self.min_beat_interval_s < self.max_beat_interval_s)
        {
            return Err(AnalysisError::InvalidConfig(format!(
                "beat interval bounds must satisfy 0 < min < max, got [{}, {}]",
                self.min_beat_interval_s, self.max_beat_interval_s
            )));
        }
        if !(self.refilter_window >= 1.0) {
            return Err(AnalysisError::InvalidConfig(format!(
                "refilter_window must be at least 1, got {}",
                self.refilter_window
            )));
        }
        Ok(())
    }
}
