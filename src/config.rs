//! Tolerance, velocity and matching configuration

use serde::{Deserialize, Serialize};

use crate::error::EvalError;

/// How pitch distance between two notes is measured.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PitchMode {
    /// Absolute semitone difference.
    #[default]
    Exact,
    /// Octave-invariant distance, `min(d mod 12, 12 - d mod 12)`.
    Chroma,
}

/// Gating tolerances for note correspondence.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ToleranceConfig {
    /// Maximum onset distance in seconds (default: 0.05)
    pub onset_tolerance: f64,

    /// Maximum pitch distance in semitones (default: 0, exact)
    pub pitch_tolerance: f64,

    /// Offset tolerance as a fraction of the reference duration (default: 0.2)
    pub offset_ratio_tolerance: f64,

    /// Lower bound of the offset tolerance in seconds (default: 0.05)
    pub offset_min_tolerance: f64,

    /// Whether offsets take part in admissibility (default: true)
    pub check_offsets: bool,

    pub pitch_mode: PitchMode,

    /// Use `<` instead of `<=` for every tolerance comparison
    pub strict: bool,
}

impl Default for ToleranceConfig {
    fn default() -> Self {
        Self {
            onset_tolerance: 0.05,
            pitch_tolerance: 0.0,
            offset_ratio_tolerance: 0.2,
            offset_min_tolerance: 0.05,
            check_offsets: true,
            pitch_mode: PitchMode::Exact,
            strict: false,
        }
    }
}

/// Scale of incoming velocity values.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VelocityUnit {
    /// Already in [0, 1]
    #[default]
    Normalized,
    /// MIDI velocity 0-127
    Midi,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum VelocityMode {
    /// Correct when the scaled error is within tolerance
    #[default]
    Threshold,
    /// Correct when `max(0, 1 - error / tolerance) >= 0.5`
    Weighted,
}

/// What velocity gating does with a pair where either velocity is missing.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MissingVelocityPolicy {
    #[default]
    Ignore,
    Reject,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct VelocityConfig {
    /// Velocity tolerance, expressed in `unit` (default: 0.1)
    pub tolerance: f64,
    pub unit: VelocityUnit,
    pub mode: VelocityMode,
    /// Gate edges on raw velocity difference during matching (default: false)
    pub include_in_matching: bool,
    pub missing_velocity_policy: MissingVelocityPolicy,
}

impl Default for VelocityConfig {
    fn default() -> Self {
        Self {
            tolerance: 0.1,
            unit: VelocityUnit::Normalized,
            mode: VelocityMode::Threshold,
            include_in_matching: false,
            missing_velocity_policy: MissingVelocityPolicy::Ignore,
        }
    }
}

impl VelocityConfig {
    /// Convert a velocity in the configured unit to [0, 1].
    pub fn normalize(&self, velocity: f64) -> f64 {
        let v = match self.unit {
            VelocityUnit::Normalized => velocity,
            VelocityUnit::Midi => velocity / 127.0,
        };
        let clamped = v.clamp(0.0, 1.0);
        if clamped != v {
            log::warn!(
                "velocity {} ({:?} unit) is outside [0, 1] after conversion, clamped to {}",
                velocity,
                self.unit,
                clamped
            );
        }
        clamped
    }

    /// Tolerance in normalized velocity space.
    pub fn normalized_tolerance(&self) -> f64 {
        match self.unit {
            VelocityUnit::Normalized => self.tolerance,
            VelocityUnit::Midi => self.tolerance / 127.0,
        }
    }
}

/// Assignment strategy used once the admissible edges are known.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MatchStrategy {
    /// Maximum-cardinality 1:1 matching (Hopcroft-Karp).
    #[default]
    Maximum,
    /// Greedy 1:1 assignment by descending edge quality.
    Weighted,
    /// Greedy 1:N assignment with per-side caps.
    Bounded {
        max_matches_per_ref: usize,
        max_matches_per_est: usize,
    },
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct EvaluationConfig {
    pub tolerance: ToleranceConfig,
    pub velocity: VelocityConfig,
    pub strategy: MatchStrategy,
    /// Rescale the estimated time axis by the ratio of the two tempos
    pub tempo_normalize: bool,
    /// Walk notes in (onset, pitch) order while building and augmenting
    pub sort_by_time_pitch: bool,
    /// F-measure weighting (default: 1.0)
    pub beta: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            tolerance: ToleranceConfig::default(),
            velocity: VelocityConfig::default(),
            strategy: MatchStrategy::Maximum,
            tempo_normalize: false,
            sort_by_time_pitch: false,
            beta: 1.0,
        }
    }
}

fn check_non_negative(name: &str, value: f64) -> Result<(), EvalError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EvalError::InvalidConfig(format!(
            "{} must be a finite, non-negative number (got {})",
            name, value
        )));
    }
    Ok(())
}

impl EvaluationConfig {
    pub fn validate(&self) -> Result<(), EvalError> {
        let t = &self.tolerance;
        check_non_negative("onset_tolerance", t.onset_tolerance)?;
        check_non_negative("pitch_tolerance", t.pitch_tolerance)?;
        check_non_negative("offset_ratio_tolerance", t.offset_ratio_tolerance)?;
        check_non_negative("offset_min_tolerance", t.offset_min_tolerance)?;
        check_non_negative("velocity tolerance", self.velocity.tolerance)?;

        if !self.beta.is_finite() || self.beta <= 0.0 {
            return Err(EvalError::InvalidConfig(format!(
                "beta must be positive (got {})",
                self.beta
            )));
        }

        if let MatchStrategy::Bounded {
            max_matches_per_ref,
            max_matches_per_est,
        } = self.strategy
        {
            if max_matches_per_ref == 0 || max_matches_per_est == 0 {
                return Err(EvalError::InvalidConfig(
                    "bounded matching caps must be at least 1".to_string(),
                ));
            }
        }
        Ok(())
    }
}
