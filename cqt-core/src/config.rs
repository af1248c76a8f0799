//! # Analysis Configuration
//!
//! User-facing settings for the live analyzer, persisted as JSON. The defaults analyze
//! two octaves of semitones centred on A4, which is what a chromatic tuner needs out of
//! the box.

use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

use crate::{error::ConfigError, window::WindowKind};

/// Capture rate that virtually every input device supports.
pub const FALLBACK_SAMPLE_RATE: u32 = 44_100;

/// Concert pitch, A4.
pub const DEFAULT_TUNING_FREQUENCY: f64 = 440.0;

/// Reference power for the decibel scale.
///
/// Input sensitivity is commonly calibrated so that a 90 dB SPL tone yields an RMS of
/// 2500 on 16-bit samples. Treating that as a pressure level gives
/// `P0 = 2500 / 10^(90 / 20)`.
pub const DEFAULT_REFERENCE_POWER: f64 = 0.079_056_941_504_209_48;

/// Settings used to build a [`ConstantQTransform`](crate::transform::ConstantQTransform)
/// and drive the analysis worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Preferred capture rate in Hz. The device may grant a different one.
    pub sample_rate: u32,
    /// Pitch the default bin range is centred on.
    pub tuning_frequency: f64,
    /// Geometric ratio between neighbouring bins.
    pub ratio: f64,
    pub num_bins: usize,
    /// Lowest bin; derived from `tuning_frequency` when unset.
    pub min_frequency: Option<f64>,
    pub window: WindowKind,
    pub reference_power: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rate: FALLBACK_SAMPLE_RATE,
            tuning_frequency: DEFAULT_TUNING_FREQUENCY,
            ratio: 2f64.powf(1.0 / 12.0),
            num_bins: 2 * 12 + 1,
            min_frequency: None,
            window: WindowKind::default(),
            reference_power: DEFAULT_REFERENCE_POWER,
        }
    }
}

impl AnalysisConfig {
    /// Lowest analyzed frequency.
    ///
    /// An explicit positive `min_frequency` wins. Otherwise the range is placed so that
    /// the tuning frequency falls on bin `num_bins / 2`.
    pub fn min_frequency(&self) -> f64 {
        match self.min_frequency {
            Some(f) if f > 0.0 => f,
            _ => self.tuning_frequency / self.ratio.powi((self.num_bins / 2) as i32),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Loads a configuration file. Missing fields take their default values.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
