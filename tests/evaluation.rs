//! End-to-end checks of the public evaluation API

use notematch_rs::config::{PitchMode, VelocityMode};
use notematch_rs::scoring::arrays::{match_notes, ArrayMatchParams};
use notematch_rs::{evaluate, EvaluationConfig, EvaluationReport, MatchStrategy, Note};

fn note(pitch: i32, onset: f64, duration: f64) -> Note {
    Note::new(pitch, onset, duration)
}

/// A small polyphonic passage with a dense cluster so several estimated
/// notes compete for the same reference notes.
fn passage() -> (Vec<Note>, Vec<Note>) {
    let reference = vec![
        note(60, 0.0, 0.5).with_velocity(0.6),
        note(64, 0.0, 0.5).with_velocity(0.5),
        note(67, 0.5, 0.5).with_velocity(0.7),
        note(72, 1.0, 1.0).with_velocity(0.9),
        note(60, 1.0, 0.25).with_velocity(0.4),
        note(62, 1.25, 0.25).with_velocity(0.45),
    ];
    let estimated = vec![
        note(60, 0.01, 0.48).with_velocity(0.55),
        note(64, 0.02, 0.5).with_velocity(0.5),
        note(67, 0.53, 0.45).with_velocity(0.66),
        note(71, 1.0, 1.0).with_velocity(0.8),
        note(60, 1.03, 0.22).with_velocity(0.35),
        note(60, 1.04, 0.2).with_velocity(0.3),
        note(62, 1.27, 0.25).with_velocity(0.5),
    ];
    (reference, estimated)
}

fn check_invariants(report: &EvaluationReport, n_ref: usize, n_est: usize) {
    let result = &report.result;

    let mut refs: Vec<usize> = result.matches.iter().map(|m| m.ref_index).collect();
    let mut ests: Vec<usize> = result.matches.iter().map(|m| m.primary_est()).collect();
    refs.sort();
    ests.sort();
    let (n_refs, n_ests) = (refs.len(), ests.len());
    refs.dedup();
    ests.dedup();
    assert_eq!(refs.len(), n_refs, "reference index used twice");
    assert_eq!(ests.len(), n_ests, "estimated index used twice");

    let mut all_refs = refs.clone();
    all_refs.extend(&result.false_negatives);
    all_refs.sort();
    assert_eq!(all_refs, (0..n_ref).collect::<Vec<_>>());

    let mut all_ests = ests.clone();
    all_ests.extend(&result.false_positives);
    all_ests.sort();
    assert_eq!(all_ests, (0..n_est).collect::<Vec<_>>());

    assert!(result.false_negatives.windows(2).all(|w| w[0] < w[1]));
    assert!(result.false_positives.windows(2).all(|w| w[0] < w[1]));

    let m = &report.metrics;
    assert!((0.0..=1.0).contains(&m.precision));
    assert!((0.0..=1.0).contains(&m.recall));
    assert!((0.0..=1.0).contains(&m.avg_overlap_ratio));
    assert_eq!(m.f_measure == 0.0, m.precision + m.recall == 0.0);
    for mm in &result.matches {
        assert!((0.0..=1.0).contains(&mm.overlap_ratio));
    }
}

#[test]
fn test_single_note_scenario() {
    let reference = vec![note(60, 0.0, 1.0).with_velocity(0.8)];
    let estimated = vec![note(60, 0.02, 1.0).with_velocity(0.8)];
    let report = evaluate(&reference, &estimated, &EvaluationConfig::default()).unwrap();

    assert_eq!(report.result.matches.len(), 1);
    assert!(report.result.false_negatives.is_empty());
    assert!(report.result.false_positives.is_empty());
    assert_eq!(report.metrics.precision, 1.0);
    assert_eq!(report.metrics.recall, 1.0);
    assert_eq!(report.metrics.f_measure, 1.0);
    assert!(report.metrics.avg_overlap_ratio > 0.95);

    let velocity = report.metrics.velocity.unwrap();
    assert_eq!(velocity.correct, 1);
    assert!(velocity.mean_abs_error < 1e-9);
}

#[test]
fn test_onset_tolerance_boundary() {
    let reference = vec![note(60, 0.0, 1.0)];
    let estimated = vec![note(60, 0.049, 1.0)];

    let report = evaluate(&reference, &estimated, &EvaluationConfig::default()).unwrap();
    assert_eq!(report.result.matches.len(), 1);
    assert!((report.result.matches[0].onset_diff - 0.049).abs() < 1e-12);

    let mut config = EvaluationConfig::default();
    config.tolerance.onset_tolerance = 0.04;
    let report = evaluate(&reference, &estimated, &config).unwrap();
    assert!(report.result.matches.is_empty());
    assert_eq!(report.result.false_negatives, vec![0]);
    assert_eq!(report.result.false_positives, vec![0]);
}

#[test]
fn test_octave_error_only_matches_in_chroma_mode() {
    let reference = vec![note(60, 0.0, 1.0)];
    let estimated = vec![note(72, 0.0, 1.0)];

    let report = evaluate(&reference, &estimated, &EvaluationConfig::default()).unwrap();
    assert!(report.result.matches.is_empty());

    let mut config = EvaluationConfig::default();
    config.tolerance.pitch_mode = PitchMode::Chroma;
    let report = evaluate(&reference, &estimated, &config).unwrap();
    assert_eq!(report.result.matches.len(), 1);
}

#[test]
fn test_velocity_scaling_identity() {
    let reference: Vec<Note> = [0.2, 0.5, 0.65, 0.9]
        .iter()
        .enumerate()
        .map(|(i, &v)| note(60 + i as i32, i as f64 * 0.5, 0.4).with_velocity(v))
        .collect();
    let report = evaluate(&reference, &reference, &EvaluationConfig::default()).unwrap();
    let scaling = report.result.velocity_scaling.unwrap();
    assert!((scaling.slope - 1.0).abs() < 1e-9);
    assert!(scaling.intercept.abs() < 1e-9);
}

#[test]
fn test_invariants_across_strategies() {
    let (reference, estimated) = passage();
    for strategy in [MatchStrategy::Maximum, MatchStrategy::Weighted] {
        let config = EvaluationConfig {
            strategy,
            ..EvaluationConfig::default()
        };
        let report = evaluate(&reference, &estimated, &config).unwrap();
        check_invariants(&report, reference.len(), estimated.len());
    }
}

#[test]
fn test_passage_metrics() {
    let (reference, estimated) = passage();
    let report = evaluate(&reference, &estimated, &EvaluationConfig::default()).unwrap();

    // 72 vs 71 is a wrong pitch; one of the two 60s at 1.03/1.04 is extra
    assert_eq!(report.result.false_negatives, vec![3]);
    assert_eq!(report.result.false_positives.len(), 2);
    assert!(report.result.false_positives.contains(&3));
    assert_eq!(report.metrics.matched_reference, 5);
    assert!((report.metrics.recall - 5.0 / 6.0).abs() < 1e-12);
    assert!((report.metrics.precision - 5.0 / 7.0).abs() < 1e-12);

    let velocity = report.metrics.velocity.as_ref().unwrap();
    assert!(velocity.correct <= 5);
    assert!(velocity.rms_error >= velocity.mean_abs_error);
    let p = velocity.percentiles.as_ref().unwrap();
    assert!(p.p25 <= p.p50 && p.p50 <= p.p75 && p.p75 <= p.p90 && p.p90 <= p.p95);
}

#[test]
fn test_deterministic_output() {
    let (reference, estimated) = passage();
    let config = EvaluationConfig::default();
    let first = evaluate(&reference, &estimated, &config).unwrap();
    let second = evaluate(&reference, &estimated, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_weighted_velocity_mode() {
    let (reference, estimated) = passage();
    let mut config = EvaluationConfig::default();
    config.velocity.mode = VelocityMode::Weighted;
    let weighted = evaluate(&reference, &estimated, &config).unwrap();
    let threshold = evaluate(&reference, &estimated, &EvaluationConfig::default()).unwrap();
    // Weighted mode only accepts errors up to half the tolerance
    assert!(
        weighted.metrics.velocity.unwrap().correct <= threshold.metrics.velocity.unwrap().correct
    );
}

#[test]
fn test_velocity_gating_restricts_edges() {
    let reference = vec![note(60, 0.0, 1.0).with_velocity(0.9)];
    let estimated = vec![note(60, 0.0, 1.0).with_velocity(0.2)];
    let mut config = EvaluationConfig::default();
    assert_eq!(evaluate(&reference, &estimated, &config).unwrap().result.matches.len(), 1);
    config.velocity.include_in_matching = true;
    assert!(evaluate(&reference, &estimated, &config).unwrap().result.matches.is_empty());
}

#[test]
fn test_array_api_agrees_with_note_api() {
    let (reference, estimated) = passage();
    let to_arrays = |notes: &[Note]| -> (Vec<[f64; 2]>, Vec<f64>) {
        (
            notes.iter().map(|n| [n.onset, n.onset + n.duration]).collect(),
            notes.iter().map(|n| n.pitch as f64).collect(),
        )
    };
    let (ri, rp) = to_arrays(&reference);
    let (ei, ep) = to_arrays(&estimated);
    // 0 cents equals the note API's exact pitch default
    let params = ArrayMatchParams {
        pitch_tolerance_cents: 0.0,
        ..ArrayMatchParams::default()
    };
    let pairs = match_notes(&ri, &rp, &ei, &ep, &params).unwrap();

    let report = evaluate(&reference, &estimated, &EvaluationConfig::default()).unwrap();
    let from_report: Vec<(usize, usize)> = report
        .result
        .matches
        .iter()
        .map(|m| (m.ref_index, m.primary_est()))
        .collect();
    assert_eq!(pairs, from_report);
}

#[test]
fn test_report_serializes() {
    let (reference, estimated) = passage();
    let report = evaluate(&reference, &estimated, &EvaluationConfig::default()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["result"]["matches"].is_array());
    assert_eq!(json["result"]["matches"][0]["est_index"]["kind"], "single");
    assert!(json["metrics"]["f_measure"].is_number());
}
