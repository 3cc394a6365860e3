//! Error types for note evaluation

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which of the two note sets a value came from.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Reference,
    Estimated,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Reference => write!(f, "reference"),
            Side::Estimated => write!(f, "estimated"),
        }
    }
}

/// Errors raised while validating evaluation inputs.
///
/// Validation happens before any matching work starts; once inputs pass,
/// evaluation itself cannot fail.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("{side} intervals and pitches differ in length ({intervals} vs {pitches})")]
    LengthMismatch {
        side: Side,
        intervals: usize,
        pitches: usize,
    },

    #[error("{side} note {index} ends before it starts (onset {onset}, offset {offset})")]
    InvertedInterval {
        side: Side,
        index: usize,
        onset: f64,
        offset: f64,
    },

    #[error("{side} note {index} has a non-finite or negative {field}")]
    NonFiniteValue {
        side: Side,
        index: usize,
        field: &'static str,
    },

    #[error("{side} note {index} has pitch {pitch} outside the MIDI range 0-127")]
    PitchOutOfRange { side: Side, index: usize, pitch: i32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
