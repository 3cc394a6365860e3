use std::ops::Range;

use crate::config::{EvaluationConfig, MissingVelocityPolicy, PitchMode};
use crate::scoring::intervals::NoteArrays;

/// Time distances are rounded to this many decimals before comparison
/// so a distance of exactly the tolerance is not lost to float error.
const DISTANCE_DECIMALS: i32 = 4;

const ONSET_WEIGHT: f64 = 0.3;
const PITCH_WEIGHT: f64 = 0.3;
const OFFSET_WEIGHT: f64 = 0.2;
const OVERLAP_WEIGHT: f64 = 0.1;
const VELOCITY_WEIGHT: f64 = 0.1;

/// Admissibility predicate for a (reference, estimated) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct MatchCriteria {
    pub onset_tolerance: f64,
    pub check_onsets: bool,
    /// Semitones
    pub pitch_tolerance: f64,
    pub pitch_mode: PitchMode,
    pub check_pitch: bool,
    pub offset_ratio: f64,
    pub offset_min_tolerance: f64,
    pub check_offsets: bool,
    /// Normalized velocity units
    pub velocity_tolerance: f64,
    /// `Some` when velocity gates edges
    pub velocity_gate: Option<MissingVelocityPolicy>,
    pub strict: bool,
}

impl Default for MatchCriteria {
    fn default() -> Self {
        MatchCriteria::from_config(&EvaluationConfig::default())
    }
}

impl MatchCriteria {
    pub fn from_config(config: &EvaluationConfig) -> Self {
        let t = &config.tolerance;
        let v = &config.velocity;
        MatchCriteria {
            onset_tolerance: t.onset_tolerance,
            check_onsets: true,
            pitch_tolerance: t.pitch_tolerance,
            pitch_mode: t.pitch_mode,
            check_pitch: true,
            offset_ratio: t.offset_ratio_tolerance,
            offset_min_tolerance: t.offset_min_tolerance,
            check_offsets: t.check_offsets,
            velocity_tolerance: v.normalized_tolerance(),
            velocity_gate: if v.include_in_matching {
                Some(v.missing_velocity_policy)
            } else {
                None
            },
            strict: t.strict,
        }
    }

    fn within(&self, distance: f64, tolerance: f64) -> bool {
        if self.strict {
            distance < tolerance
        } else {
            distance <= tolerance
        }
    }

    /// Offset tolerance for a reference note of the given duration.
    pub fn offset_tolerance(&self, ref_duration: f64) -> f64 {
        (self.offset_ratio * ref_duration).max(self.offset_min_tolerance)
    }
}

pub fn pitch_distance(ref_pitch: f64, est_pitch: f64, mode: PitchMode) -> f64 {
    let d = (est_pitch - ref_pitch).abs();
    match mode {
        PitchMode::Exact => d,
        PitchMode::Chroma => {
            let m = d.rem_euclid(12.0);
            m.min(12.0 - m)
        }
    }
}

fn round_distance(distance: f64) -> f64 {
    let scale = 10f64.powi(DISTANCE_DECIMALS);
    (distance * scale).round_ties_even() / scale
}

/// `1 - diff / tolerance`, clamped at 0. A zero tolerance only rewards a zero diff.
fn closeness(diff: f64, tolerance: f64) -> f64 {
    if tolerance > 0.0 {
        (1.0 - diff / tolerance).max(0.0)
    } else if diff <= 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Raw distances between one reference and one estimated note.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PairMeasure {
    pub onset_diff: f64,
    pub offset_diff: f64,
    pub pitch_diff: f64,
    pub overlap_ratio: f64,
}

pub fn measure_pair(
    reference: &NoteArrays,
    estimated: &NoteArrays,
    ref_index: usize,
    est_index: usize,
    mode: PitchMode,
) -> PairMeasure {
    let r = &reference.intervals[ref_index];
    let e = &estimated.intervals[est_index];
    PairMeasure {
        onset_diff: (e.onset - r.onset).abs(),
        offset_diff: (e.offset - r.offset).abs(),
        pitch_diff: pitch_distance(reference.pitches[ref_index], estimated.pitches[est_index], mode),
        overlap_ratio: r.overlap_ratio(e),
    }
}

/// Admissible edges in compressed row form: the estimated neighbours of
/// reference `i` are `targets[offsets[i]..offsets[i + 1]]`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Adjacency {
    offsets: Vec<usize>,
    targets: Vec<usize>,
    weights: Vec<f64>,
    n_est: usize,
}

impl Adjacency {
    pub fn n_ref(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    pub fn n_est(&self) -> usize {
        self.n_est
    }

    pub fn edge_count(&self) -> usize {
        self.targets.len()
    }

    /// Edge ids belonging to reference `ref_index`.
    pub fn edge_range(&self, ref_index: usize) -> Range<usize> {
        self.offsets[ref_index]..self.offsets[ref_index + 1]
    }

    pub fn neighbors(&self, ref_index: usize) -> &[usize] {
        &self.targets[self.edge_range(ref_index)]
    }

    pub fn target(&self, edge: usize) -> usize {
        self.targets[edge]
    }

    pub fn weight(&self, edge: usize) -> f64 {
        self.weights[edge]
    }

    pub fn contains(&self, ref_index: usize, est_index: usize) -> bool {
        self.neighbors(ref_index).contains(&est_index)
    }

    /// Weight of the edge between the two notes, if it is admissible.
    pub fn edge_weight(&self, ref_index: usize, est_index: usize) -> Option<f64> {
        self.edge_range(ref_index)
            .find(|&e| self.targets[e] == est_index)
            .map(|e| self.weights[e])
    }
}

/// Composite edge quality in [0, 1].
fn edge_quality(
    criteria: &MatchCriteria,
    measure: &PairMeasure,
    offset_tolerance: f64,
    velocity_diff: Option<f64>,
) -> f64 {
    let onset_score = closeness(measure.onset_diff, criteria.onset_tolerance);
    let pitch_score = closeness(measure.pitch_diff, criteria.pitch_tolerance);
    let offset_score = closeness(measure.offset_diff, offset_tolerance);
    let velocity_score = velocity_diff
        .map(|d| closeness(d, criteria.velocity_tolerance))
        .unwrap_or(0.0);

    ONSET_WEIGHT * onset_score
        + PITCH_WEIGHT * pitch_score
        + OFFSET_WEIGHT * offset_score
        + OVERLAP_WEIGHT * measure.overlap_ratio
        + VELOCITY_WEIGHT * velocity_score
}

/// Build the admissible edge set.
///
/// Estimated neighbours of each reference note are listed in `est_order`
/// when given, otherwise in ascending index order.
pub fn build_adjacency(
    reference: &NoteArrays,
    estimated: &NoteArrays,
    criteria: &MatchCriteria,
    est_order: Option<&[usize]>,
) -> Adjacency {
    let natural: Vec<usize>;
    let order: &[usize] = match est_order {
        Some(order) => order,
        None => {
            natural = (0..estimated.len()).collect();
            natural.as_slice()
        }
    };

    let mut offsets = Vec::with_capacity(reference.len() + 1);
    let mut targets = Vec::new();
    let mut weights = Vec::new();
    offsets.push(0);

    for i in 0..reference.len() {
        let offset_tolerance = criteria.offset_tolerance(reference.intervals[i].duration());

        for &j in order {
            let measure = measure_pair(reference, estimated, i, j, criteria.pitch_mode);

            if criteria.check_onsets
                && !criteria.within(round_distance(measure.onset_diff), criteria.onset_tolerance)
            {
                continue;
            }
            if criteria.check_pitch && !criteria.within(measure.pitch_diff, criteria.pitch_tolerance)
            {
                continue;
            }
            if criteria.check_offsets
                && !criteria.within(round_distance(measure.offset_diff), offset_tolerance)
            {
                continue;
            }

            let velocity_diff = match (reference.velocities[i], estimated.velocities[j]) {
                (Some(rv), Some(ev)) => Some((ev - rv).abs()),
                _ => None,
            };
            if let Some(policy) = criteria.velocity_gate {
                let keep = match velocity_diff {
                    Some(d) => criteria.within(d, criteria.velocity_tolerance),
                    None => policy == MissingVelocityPolicy::Ignore,
                };
                if !keep {
                    continue;
                }
            }

            targets.push(j);
            weights.push(edge_quality(criteria, &measure, offset_tolerance, velocity_diff));
        }
        offsets.push(targets.len());
    }

    log::debug!(
        "adjacency: {} reference x {} estimated notes, {} admissible edges",
        reference.len(),
        estimated.len(),
        targets.len()
    );

    Adjacency {
        offsets,
        targets,
        weights,
        n_est: estimated.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VelocityConfig;
    use crate::error::Side;
    use crate::scoring::types::Note;

    fn arrays(notes: Vec<(i32, f64, f64)>) -> NoteArrays {
        let notes: Vec<Note> = notes
            .into_iter()
            .map(|(p, on, dur)| Note::new(p, on, dur))
            .collect();
        NoteArrays::from_notes(&notes, Side::Reference, &VelocityConfig::default()).unwrap()
    }

    fn with_velocities(mut a: NoteArrays, v: Vec<Option<f64>>) -> NoteArrays {
        a.velocities = v;
        a
    }

    #[test]
    fn test_onset_tolerance_boundary() {
        let reference = arrays(vec![(60, 0.0, 1.0)]);
        let estimated = arrays(vec![(60, 0.049, 1.0)]);
        let mut criteria = MatchCriteria::default();
        assert_eq!(build_adjacency(&reference, &estimated, &criteria, None).edge_count(), 1);

        criteria.onset_tolerance = 0.04;
        assert_eq!(build_adjacency(&reference, &estimated, &criteria, None).edge_count(), 0);
    }

    #[test]
    fn test_exact_tolerance_survives_float_error() {
        // 1.05 - 1.0 is slightly above 0.05 in binary floating point
        let reference = arrays(vec![(60, 1.0, 1.0)]);
        let estimated = arrays(vec![(60, 1.05, 1.0)]);
        let criteria = MatchCriteria::default();
        assert_eq!(build_adjacency(&reference, &estimated, &criteria, None).edge_count(), 1);

        let strict = MatchCriteria {
            strict: true,
            ..MatchCriteria::default()
        };
        assert_eq!(build_adjacency(&reference, &estimated, &strict, None).edge_count(), 0);
    }

    #[test]
    fn test_chroma_mode() {
        assert_eq!(pitch_distance(60.0, 72.0, PitchMode::Exact), 12.0);
        assert_eq!(pitch_distance(60.0, 72.0, PitchMode::Chroma), 0.0);
        assert_eq!(pitch_distance(60.0, 71.0, PitchMode::Chroma), 1.0);
        assert_eq!(pitch_distance(72.0, 53.0, PitchMode::Chroma), 5.0);

        let reference = arrays(vec![(60, 0.0, 1.0)]);
        let estimated = arrays(vec![(72, 0.0, 1.0)]);
        let mut criteria = MatchCriteria::default();
        assert_eq!(build_adjacency(&reference, &estimated, &criteria, None).edge_count(), 0);
        criteria.pitch_mode = PitchMode::Chroma;
        assert_eq!(build_adjacency(&reference, &estimated, &criteria, None).edge_count(), 1);
    }

    #[test]
    fn test_offset_gate() {
        // Reference duration 1.0 -> offset tolerance max(0.05, 0.2) = 0.2
        let reference = arrays(vec![(60, 0.0, 1.0)]);
        let near = arrays(vec![(60, 0.0, 1.15)]);
        let far = arrays(vec![(60, 0.0, 1.5)]);
        let mut criteria = MatchCriteria::default();
        assert_eq!(build_adjacency(&reference, &near, &criteria, None).edge_count(), 1);
        assert_eq!(build_adjacency(&reference, &far, &criteria, None).edge_count(), 0);

        criteria.check_offsets = false;
        assert_eq!(build_adjacency(&reference, &far, &criteria, None).edge_count(), 1);

        // Short notes fall back to the minimum offset tolerance
        assert!((criteria.offset_tolerance(0.1) - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_velocity_gate_and_missing_policy() {
        let reference = with_velocities(arrays(vec![(60, 0.0, 1.0), (62, 1.0, 1.0)]), vec![Some(0.8), None]);
        let estimated = with_velocities(arrays(vec![(60, 0.0, 1.0), (62, 1.0, 1.0)]), vec![Some(0.5), Some(0.5)]);

        let mut criteria = MatchCriteria::default();
        assert_eq!(build_adjacency(&reference, &estimated, &criteria, None).edge_count(), 2);

        criteria.velocity_gate = Some(MissingVelocityPolicy::Ignore);
        let adj = build_adjacency(&reference, &estimated, &criteria, None);
        assert!(!adj.contains(0, 0));
        assert!(adj.contains(1, 1));

        criteria.velocity_gate = Some(MissingVelocityPolicy::Reject);
        assert_eq!(build_adjacency(&reference, &estimated, &criteria, None).edge_count(), 0);
    }

    #[test]
    fn test_edge_weights() {
        let reference = arrays(vec![(60, 0.0, 1.0)]);
        let estimated = arrays(vec![(60, 0.0, 1.0), (60, 0.025, 1.0)]);
        let criteria = MatchCriteria::default();
        let adj = build_adjacency(&reference, &estimated, &criteria, None);
        // Perfect pair without velocities: everything but the velocity term
        let perfect = adj.edge_weight(0, 0).unwrap();
        assert!((perfect - 0.9).abs() < 1e-9, "got {}", perfect);
        let shifted = adj.edge_weight(0, 1).unwrap();
        assert!(shifted < perfect);
        assert!((0.0..=1.0).contains(&shifted));
    }

    #[test]
    fn test_est_order_controls_neighbor_order() {
        let reference = arrays(vec![(60, 0.0, 1.0)]);
        let estimated = arrays(vec![(60, 0.01, 1.0), (60, 0.0, 1.0)]);
        let criteria = MatchCriteria::default();
        let adj = build_adjacency(&reference, &estimated, &criteria, Some(&[1usize, 0][..]));
        assert_eq!(adj.neighbors(0), &[1, 0]);
        assert_eq!(adj.n_ref(), 1);
        assert_eq!(adj.n_est(), 2);
    }
}
