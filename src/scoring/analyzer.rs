use crate::config::EvaluationConfig;
use crate::error::{EvalError, Side};
use crate::scoring::adjacency::{build_adjacency, measure_pair, MatchCriteria};
use crate::scoring::intervals::{extract_tempo, tempo_scale_factor, NoteArrays};
use crate::scoring::matcher::{assign, Assignment};
use crate::scoring::metrics::compute_metrics;
use crate::scoring::types::*;
use crate::scoring::velocity::fit_velocity_scaling;

/// Evaluate an estimated note list against a reference note list.
pub fn evaluate(
    reference: &[Note],
    estimated: &[Note],
    config: &EvaluationConfig,
) -> Result<EvaluationReport, EvalError> {
    evaluate_notes(reference, &[], estimated, &[], config)
}

/// Like [`evaluate`], with tempo maps available for tempo-normalized comparison.
pub fn evaluate_tracks(
    reference: &NoteTrack,
    estimated: &NoteTrack,
    config: &EvaluationConfig,
) -> Result<EvaluationReport, EvalError> {
    evaluate_notes(
        &reference.notes,
        &reference.tempo_events,
        &estimated.notes,
        &estimated.tempo_events,
        config,
    )
}

fn evaluate_notes(
    reference: &[Note],
    reference_tempo: &[TempoEvent],
    estimated: &[Note],
    estimated_tempo: &[TempoEvent],
    config: &EvaluationConfig,
) -> Result<EvaluationReport, EvalError> {
    config.validate()?;
    let ref_arrays = NoteArrays::from_notes(reference, Side::Reference, &config.velocity)?;
    let est_arrays = NoteArrays::from_notes(estimated, Side::Estimated, &config.velocity)?;

    if ref_arrays.is_empty() || est_arrays.is_empty() {
        log::warn!(
            "nothing to match: {} reference and {} estimated notes",
            ref_arrays.len(),
            est_arrays.len()
        );
        let result = assemble_result(&[], &ref_arrays, &est_arrays, &est_arrays, config);
        let metrics = compute_metrics(&result, ref_arrays.len(), est_arrays.len(), config);
        return Ok(EvaluationReport { result, metrics });
    }

    // Tolerances are checked on rescaled estimated times; display keeps the originals.
    let rescaled;
    let est_compare = if config.tempo_normalize {
        let ref_bpm = extract_tempo(reference_tempo);
        let est_bpm = extract_tempo(estimated_tempo);
        log::debug!("tempo normalization: reference {} bpm, estimated {} bpm", ref_bpm, est_bpm);
        rescaled = est_arrays.rescaled(tempo_scale_factor(ref_bpm, est_bpm));
        &rescaled
    } else {
        &est_arrays
    };

    let (ref_order, est_order) = if config.sort_by_time_pitch {
        (
            Some(ref_arrays.time_pitch_order()),
            Some(est_compare.time_pitch_order()),
        )
    } else {
        (None, None)
    };

    let criteria = MatchCriteria::from_config(config);
    let adjacency = build_adjacency(&ref_arrays, est_compare, &criteria, est_order.as_deref());
    let assignments = assign(&adjacency, &config.strategy, ref_order.as_deref());

    let result = assemble_result(&assignments, &ref_arrays, est_compare, &est_arrays, config);
    let metrics = compute_metrics(&result, ref_arrays.len(), est_arrays.len(), config);
    log::debug!(
        "evaluation: {} matches, {} false negatives, {} false positives, F {:.4}",
        result.matches.len(),
        result.false_negatives.len(),
        result.false_positives.len(),
        metrics.f_measure
    );

    Ok(EvaluationReport { result, metrics })
}

/// Turn assignments into matches plus the unmatched index lists.
///
/// `est_compare` holds the times tolerances were checked against and
/// `est_display` the caller's original times.
pub fn assemble_result(
    assignments: &[Assignment],
    reference: &NoteArrays,
    est_compare: &NoteArrays,
    est_display: &NoteArrays,
    config: &EvaluationConfig,
) -> MatchResult {
    let mut ref_used = vec![false; reference.len()];
    let mut est_used = vec![false; est_compare.len()];
    let mut matches = Vec::with_capacity(assignments.len());

    for assignment in assignments {
        let r = assignment.ref_index;
        let Some(&e) = assignment.est_indices.first() else {
            continue;
        };
        ref_used[r] = true;
        for &j in &assignment.est_indices {
            est_used[j] = true;
        }

        let measure = measure_pair(reference, est_compare, r, e, config.tolerance.pitch_mode);
        let est_velocity = assignment
            .est_indices
            .iter()
            .map(|&j| est_compare.velocities[j])
            .collect::<Option<Vec<f64>>>()
            .and_then(OneOrMany::from_vec);

        matches.push(Match {
            ref_index: r,
            est_index: OneOrMany::from_vec(assignment.est_indices.clone())
                .unwrap_or(OneOrMany::Single(e)),
            ref_onset: reference.intervals[r].onset,
            est_onset: est_display.intervals[e].onset,
            onset_diff: measure.onset_diff,
            offset_diff: measure.offset_diff,
            pitch_diff: measure.pitch_diff,
            overlap_ratio: measure.overlap_ratio,
            intersection: reference.intervals[r].intersection(&est_compare.intervals[e]),
            ref_velocity: reference.velocities[r],
            est_velocity,
            scaled_est_velocity: None,
            confidence: assignment.weights.first().copied(),
        });
    }

    let velocity_scaling = if reference.has_velocities() && est_compare.has_velocities() {
        let pairs: Vec<(f64, f64)> = matches
            .iter()
            .filter_map(|m| Some((m.ref_velocity?, est_compare.velocities[m.primary_est()]?)))
            .collect();
        fit_velocity_scaling(&pairs)
    } else {
        None
    };

    if let Some(scaling) = velocity_scaling {
        for m in &mut matches {
            m.scaled_est_velocity = est_compare.velocities[m.primary_est()].map(|v| scaling.apply(v));
        }
    }

    let false_negatives = (0..reference.len()).filter(|&i| !ref_used[i]).collect();
    let false_positives = (0..est_compare.len()).filter(|&j| !est_used[j]).collect();

    MatchResult {
        matches,
        false_negatives,
        false_positives,
        velocity_scaling,
    }
}
