use crate::config::VelocityConfig;
use crate::error::{EvalError, Side};
use crate::scoring::types::{Interval, Note, TempoEvent};

/// Durations below this are treated as this, so overlap math never divides by zero.
pub const MIN_DURATION: f64 = 1e-6;

pub const DEFAULT_BPM: f64 = 120.0;
pub const MIN_BPM: f64 = 20.0;
pub const MAX_BPM: f64 = 300.0;

/// Index-aligned note arrays in the caller's original note order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteArrays {
    pub intervals: Vec<Interval>,
    pub pitches: Vec<f64>,
    /// Normalized to [0, 1]
    pub velocities: Vec<Option<f64>>,
}

impl NoteArrays {
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    pub fn has_velocities(&self) -> bool {
        self.velocities.iter().any(Option::is_some)
    }

    /// Validate a note collection and split it into arrays.
    pub fn from_notes(
        notes: &[Note],
        side: Side,
        velocity: &VelocityConfig,
    ) -> Result<Self, EvalError> {
        let mut arrays = NoteArrays {
            intervals: Vec::with_capacity(notes.len()),
            pitches: Vec::with_capacity(notes.len()),
            velocities: Vec::with_capacity(notes.len()),
        };

        for (index, note) in notes.iter().enumerate() {
            if !note.onset.is_finite() || note.onset < 0.0 {
                return Err(EvalError::NonFiniteValue {
                    side,
                    index,
                    field: "onset",
                });
            }
            if !note.duration.is_finite() {
                return Err(EvalError::NonFiniteValue {
                    side,
                    index,
                    field: "duration",
                });
            }
            if note.duration < 0.0 {
                return Err(EvalError::InvertedInterval {
                    side,
                    index,
                    onset: note.onset,
                    offset: note.onset + note.duration,
                });
            }
            if !(0..=127).contains(&note.pitch) {
                return Err(EvalError::PitchOutOfRange {
                    side,
                    index,
                    pitch: note.pitch,
                });
            }
            let vel = match note.velocity {
                Some(v) if !v.is_finite() => {
                    return Err(EvalError::NonFiniteValue {
                        side,
                        index,
                        field: "velocity",
                    })
                }
                Some(v) => Some(velocity.normalize(v)),
                None => None,
            };

            let duration = note.duration.max(MIN_DURATION);
            arrays
                .intervals
                .push(Interval::new(note.onset, note.onset + duration));
            arrays.pitches.push(note.pitch as f64);
            arrays.velocities.push(vel);
        }

        Ok(arrays)
    }

    /// Validate explicit interval/pitch arrays (the array-style calling convention).
    pub fn from_parts(
        intervals: &[[f64; 2]],
        pitches: &[f64],
        side: Side,
    ) -> Result<Self, EvalError> {
        if intervals.len() != pitches.len() {
            return Err(EvalError::LengthMismatch {
                side,
                intervals: intervals.len(),
                pitches: pitches.len(),
            });
        }

        let mut out = Vec::with_capacity(intervals.len());
        for (index, &[onset, offset]) in intervals.iter().enumerate() {
            if !onset.is_finite() || !offset.is_finite() {
                return Err(EvalError::NonFiniteValue {
                    side,
                    index,
                    field: "interval",
                });
            }
            if offset < onset {
                return Err(EvalError::InvertedInterval {
                    side,
                    index,
                    onset,
                    offset,
                });
            }
            out.push(Interval::new(onset, offset.max(onset + MIN_DURATION)));
        }

        for (index, &pitch) in pitches.iter().enumerate() {
            if !pitch.is_finite() || pitch < 0.0 {
                return Err(EvalError::NonFiniteValue {
                    side,
                    index,
                    field: "pitch",
                });
            }
        }

        Ok(NoteArrays {
            intervals: out,
            pitches: pitches.to_vec(),
            velocities: vec![None; pitches.len()],
        })
    }

    /// Copy with every interval endpoint multiplied by `factor`.
    pub fn rescaled(&self, factor: f64) -> Self {
        NoteArrays {
            intervals: self.intervals.iter().map(|i| i.scaled(factor)).collect(),
            pitches: self.pitches.clone(),
            velocities: self.velocities.clone(),
        }
    }

    /// Indices ordered by onset, ties broken by ascending pitch. Stable.
    pub fn time_pitch_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        order.sort_by(|&a, &b| {
            self.intervals[a]
                .onset
                .total_cmp(&self.intervals[b].onset)
                .then_with(|| self.pitches[a].total_cmp(&self.pitches[b]))
        });
        order
    }
}

/// Pick the tempo in effect at the start of a track.
///
/// Uses the event at time 0, or the one closest to 0 (earliest listed on ties),
/// clamped to [MIN_BPM, MAX_BPM]. Falls back to DEFAULT_BPM.
pub fn extract_tempo(events: &[TempoEvent]) -> f64 {
    let mut best: Option<&TempoEvent> = None;
    for event in events {
        if !event.time.is_finite() || !event.bpm.is_finite() || event.bpm <= 0.0 {
            continue;
        }
        match best {
            Some(b) if b.time.abs() <= event.time.abs() => {}
            _ => best = Some(event),
        }
    }

    match best {
        Some(event) => event.bpm.clamp(MIN_BPM, MAX_BPM),
        None => DEFAULT_BPM,
    }
}

/// Factor applied to the estimated side's times for tempo-normalized comparison.
pub fn tempo_scale_factor(reference_bpm: f64, estimated_bpm: f64) -> f64 {
    reference_bpm / estimated_bpm
}
