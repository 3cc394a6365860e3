use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Note {
    pub pitch: i32,
    pub onset: f64,
    pub duration: f64,
    #[serde(default)]
    pub velocity: Option<f64>,
}

impl Note {
    pub fn new(pitch: i32, onset: f64, duration: f64) -> Self {
        Note {
            pitch,
            onset,
            duration,
            velocity: None,
        }
    }

    pub fn with_velocity(mut self, velocity: f64) -> Self {
        self.velocity = Some(velocity);
        self
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TempoEvent {
    pub time: f64,
    pub bpm: f64,
}

/// A note collection together with the tempo map it was decoded with.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct NoteTrack {
    pub notes: Vec<Note>,
    #[serde(default)]
    pub tempo_events: Vec<TempoEvent>,
}

impl From<Vec<Note>> for NoteTrack {
    fn from(notes: Vec<Note>) -> Self {
        NoteTrack {
            notes,
            tempo_events: Vec::new(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Interval {
    pub onset: f64,
    pub offset: f64,
}

impl Interval {
    pub fn new(onset: f64, offset: f64) -> Self {
        Interval { onset, offset }
    }

    pub fn duration(&self) -> f64 {
        self.offset - self.onset
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Interval {
            onset: self.onset * factor,
            offset: self.offset * factor,
        }
    }

    /// Shared time window of two intervals, `None` if they do not overlap.
    pub fn intersection(&self, other: &Interval) -> Option<Interval> {
        let start = self.onset.max(other.onset);
        let end = self.offset.min(other.offset);
        if end > start {
            Some(Interval::new(start, end))
        } else {
            None
        }
    }

    /// Intersection over union, in [0, 1].
    pub fn overlap_ratio(&self, other: &Interval) -> f64 {
        let intersection = (self.offset.min(other.offset) - self.onset.max(other.onset)).max(0.0);
        let union = self.offset.max(other.offset) - self.onset.min(other.onset);
        if union <= 0.0 {
            return 0.0;
        }
        (intersection / union).clamp(0.0, 1.0)
    }
}

/// A value belonging to one estimated note, or to several under 1:N matching.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OneOrMany<T> {
    Single(T),
    Multiple(Vec<T>),
}

impl<T> OneOrMany<T> {
    pub fn from_vec(mut values: Vec<T>) -> Option<Self> {
        match values.len() {
            0 => None,
            1 => values.pop().map(OneOrMany::Single),
            _ => Some(OneOrMany::Multiple(values)),
        }
    }

    /// The best (first selected) value.
    pub fn primary(&self) -> Option<&T> {
        match self {
            OneOrMany::Single(v) => Some(v),
            OneOrMany::Multiple(values) => values.first(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            OneOrMany::Single(_) => 1,
            OneOrMany::Multiple(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        match self {
            OneOrMany::Single(v) => std::slice::from_ref(v).iter(),
            OneOrMany::Multiple(values) => values.iter(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Match {
    pub ref_index: usize,
    pub est_index: OneOrMany<usize>,
    /// Unscaled onsets, for display
    pub ref_onset: f64,
    pub est_onset: f64,
    pub onset_diff: f64,
    pub offset_diff: f64,
    pub pitch_diff: f64,
    pub overlap_ratio: f64,
    pub intersection: Option<Interval>,
    pub ref_velocity: Option<f64>,
    pub est_velocity: Option<OneOrMany<f64>>,
    pub scaled_est_velocity: Option<f64>,
    pub confidence: Option<f64>,
}

impl Match {
    pub fn primary_est(&self) -> usize {
        self.est_index.primary().copied().unwrap_or(usize::MAX)
    }
}

/// Linear map from estimated velocity to the reference's velocity scale.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct VelocityScaling {
    pub slope: f64,
    pub intercept: f64,
}

impl VelocityScaling {
    pub fn apply(&self, velocity: f64) -> f64 {
        (self.slope * velocity + self.intercept).clamp(0.0, 1.0)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct MatchResult {
    pub matches: Vec<Match>,
    pub false_negatives: Vec<usize>,
    pub false_positives: Vec<usize>,
    pub velocity_scaling: Option<VelocityScaling>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorPercentiles {
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
    pub p95: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct VelocityMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
    pub correct: usize,
    pub mean_abs_error: f64,
    pub rms_error: f64,
    pub correlation: Option<f64>,
    pub percentiles: Option<ErrorPercentiles>,
}

/// 1:N diagnostics, only filled for bounded matching.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct MultiplicityStats {
    pub avg_matches_per_ref: f64,
    pub max_matches_per_ref: usize,
    pub refs_with_multiple: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Metrics {
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
    pub avg_overlap_ratio: f64,
    pub total_reference: usize,
    pub total_estimated: usize,
    pub matched_reference: usize,
    pub matched_estimated: usize,
    pub velocity: Option<VelocityMetrics>,
    pub multiplicity: Option<MultiplicityStats>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct EvaluationReport {
    pub result: MatchResult,
    pub metrics: Metrics,
}
