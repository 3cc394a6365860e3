//! Array-style entry points.
//!
//! These mirror the `match_notes` / `precision_recall_f1_overlap` calling
//! convention of common transcription evaluation toolkits: parallel
//! `[onset, offset]` interval and pitch arrays, pitch tolerance in cents.
//! Pitches are MIDI note numbers and may be fractional.

use serde::{Deserialize, Serialize};

use crate::config::PitchMode;
use crate::error::{EvalError, Side};
use crate::scoring::adjacency::{build_adjacency, MatchCriteria};
use crate::scoring::intervals::NoteArrays;
use crate::scoring::matcher::maximum_matching;
use crate::scoring::metrics::{f_measure, mean};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ArrayMatchParams {
    pub onset_tolerance: f64,
    pub pitch_tolerance_cents: f64,
    /// `None` ignores offsets
    pub offset_ratio: Option<f64>,
    pub offset_min_tolerance: f64,
    pub strict: bool,
}

impl Default for ArrayMatchParams {
    fn default() -> Self {
        Self {
            onset_tolerance: 0.05,
            pitch_tolerance_cents: 50.0,
            offset_ratio: Some(0.2),
            offset_min_tolerance: 0.05,
            strict: false,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PrfOverlap {
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
    pub avg_overlap_ratio: f64,
}

fn array_criteria(
    onset_tolerance: Option<f64>,
    pitch_tolerance: Option<f64>,
    offset_ratio: Option<f64>,
    offset_min_tolerance: f64,
    strict: bool,
) -> MatchCriteria {
    MatchCriteria {
        onset_tolerance: onset_tolerance.unwrap_or(0.0),
        check_onsets: onset_tolerance.is_some(),
        pitch_tolerance: pitch_tolerance.unwrap_or(0.0),
        pitch_mode: PitchMode::Exact,
        check_pitch: pitch_tolerance.is_some(),
        offset_ratio: offset_ratio.unwrap_or(0.0),
        offset_min_tolerance,
        check_offsets: offset_ratio.is_some(),
        velocity_tolerance: 0.0,
        velocity_gate: None,
        strict,
    }
}

fn check_tolerance(name: &str, value: f64) -> Result<(), EvalError> {
    if !value.is_finite() || value < 0.0 {
        return Err(EvalError::InvalidConfig(format!(
            "{} must be a finite, non-negative number (got {})",
            name, value
        )));
    }
    Ok(())
}

/// Validate both sides and convert them to note arrays.
pub fn validate(
    ref_intervals: &[[f64; 2]],
    ref_pitches: &[f64],
    est_intervals: &[[f64; 2]],
    est_pitches: &[f64],
) -> Result<(NoteArrays, NoteArrays), EvalError> {
    let reference = NoteArrays::from_parts(ref_intervals, ref_pitches, Side::Reference)?;
    let estimated = NoteArrays::from_parts(est_intervals, est_pitches, Side::Estimated)?;
    Ok((reference, estimated))
}

fn intervals_only(intervals: &[[f64; 2]], side: Side) -> Result<NoteArrays, EvalError> {
    NoteArrays::from_parts(intervals, &vec![0.0; intervals.len()], side)
}

/// Maximum onset/pitch(/offset) matching. Pairs are `(reference, estimated)`
/// sorted by reference index.
pub fn match_notes(
    ref_intervals: &[[f64; 2]],
    ref_pitches: &[f64],
    est_intervals: &[[f64; 2]],
    est_pitches: &[f64],
    params: &ArrayMatchParams,
) -> Result<Vec<(usize, usize)>, EvalError> {
    let (reference, estimated) = validate(ref_intervals, ref_pitches, est_intervals, est_pitches)?;
    check_tolerance("onset_tolerance", params.onset_tolerance)?;
    check_tolerance("pitch_tolerance_cents", params.pitch_tolerance_cents)?;
    check_tolerance("offset_min_tolerance", params.offset_min_tolerance)?;
    if let Some(ratio) = params.offset_ratio {
        check_tolerance("offset_ratio", ratio)?;
    }

    let criteria = array_criteria(
        Some(params.onset_tolerance),
        Some(params.pitch_tolerance_cents / 100.0),
        params.offset_ratio,
        params.offset_min_tolerance,
        params.strict,
    );
    let adjacency = build_adjacency(&reference, &estimated, &criteria, None);
    Ok(maximum_matching(&adjacency, None))
}

/// Maximum matching on onsets alone.
pub fn match_note_onsets(
    ref_intervals: &[[f64; 2]],
    est_intervals: &[[f64; 2]],
    onset_tolerance: f64,
    strict: bool,
) -> Result<Vec<(usize, usize)>, EvalError> {
    let reference = intervals_only(ref_intervals, Side::Reference)?;
    let estimated = intervals_only(est_intervals, Side::Estimated)?;
    check_tolerance("onset_tolerance", onset_tolerance)?;
    let criteria = array_criteria(Some(onset_tolerance), None, None, 0.0, strict);
    let adjacency = build_adjacency(&reference, &estimated, &criteria, None);
    Ok(maximum_matching(&adjacency, None))
}

/// Maximum matching on offsets alone.
pub fn match_note_offsets(
    ref_intervals: &[[f64; 2]],
    est_intervals: &[[f64; 2]],
    offset_ratio: f64,
    offset_min_tolerance: f64,
    strict: bool,
) -> Result<Vec<(usize, usize)>, EvalError> {
    let reference = intervals_only(ref_intervals, Side::Reference)?;
    let estimated = intervals_only(est_intervals, Side::Estimated)?;
    check_tolerance("offset_ratio", offset_ratio)?;
    check_tolerance("offset_min_tolerance", offset_min_tolerance)?;
    let criteria = array_criteria(None, None, Some(offset_ratio), offset_min_tolerance, strict);
    let adjacency = build_adjacency(&reference, &estimated, &criteria, None);
    Ok(maximum_matching(&adjacency, None))
}

/// Mean intersection-over-union of the matched pairs, 0 without matches.
pub fn average_overlap_ratio(
    ref_intervals: &[[f64; 2]],
    est_intervals: &[[f64; 2]],
    matching: &[(usize, usize)],
) -> f64 {
    let ratios: Vec<f64> = matching
        .iter()
        .filter_map(|&(r, e)| {
            let [r_on, r_off] = *ref_intervals.get(r)?;
            let [e_on, e_off] = *est_intervals.get(e)?;
            let intersection = (r_off.min(e_off) - r_on.max(e_on)).max(0.0);
            let union = r_off.max(e_off) - r_on.min(e_on);
            Some(if union > 0.0 { intersection / union } else { 0.0 })
        })
        .collect();
    mean(&ratios)
}

fn prf(matched: usize, n_ref: usize, n_est: usize, beta: f64) -> (f64, f64, f64) {
    if n_ref == 0 || n_est == 0 {
        return (0.0, 0.0, 0.0);
    }
    let precision = matched as f64 / n_est as f64;
    let recall = matched as f64 / n_ref as f64;
    (precision, recall, f_measure(precision, recall, beta))
}

pub fn precision_recall_f1_overlap(
    ref_intervals: &[[f64; 2]],
    ref_pitches: &[f64],
    est_intervals: &[[f64; 2]],
    est_pitches: &[f64],
    params: &ArrayMatchParams,
    beta: f64,
) -> Result<PrfOverlap, EvalError> {
    let matching = match_notes(ref_intervals, ref_pitches, est_intervals, est_pitches, params)?;
    let (precision, recall, f) = prf(matching.len(), ref_intervals.len(), est_intervals.len(), beta);
    Ok(PrfOverlap {
        precision,
        recall,
        f_measure: f,
        avg_overlap_ratio: average_overlap_ratio(ref_intervals, est_intervals, &matching),
    })
}

pub fn onset_precision_recall_f1(
    ref_intervals: &[[f64; 2]],
    est_intervals: &[[f64; 2]],
    onset_tolerance: f64,
    strict: bool,
    beta: f64,
) -> Result<(f64, f64, f64), EvalError> {
    let matching = match_note_onsets(ref_intervals, est_intervals, onset_tolerance, strict)?;
    Ok(prf(matching.len(), ref_intervals.len(), est_intervals.len(), beta))
}

pub fn offset_precision_recall_f1(
    ref_intervals: &[[f64; 2]],
    est_intervals: &[[f64; 2]],
    offset_ratio: f64,
    offset_min_tolerance: f64,
    strict: bool,
    beta: f64,
) -> Result<(f64, f64, f64), EvalError> {
    let matching = match_note_offsets(
        ref_intervals,
        est_intervals,
        offset_ratio,
        offset_min_tolerance,
        strict,
    )?;
    Ok(prf(matching.len(), ref_intervals.len(), est_intervals.len(), beta))
}
