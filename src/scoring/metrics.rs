use crate::config::{EvaluationConfig, MatchStrategy, VelocityConfig, VelocityMode};
use crate::scoring::types::{
    ErrorPercentiles, Match, MatchResult, Metrics, MultiplicityStats, VelocityMetrics,
};

/// Weighted harmonic mean of precision and recall; 0 when both are 0.
pub fn f_measure(precision: f64, recall: f64, beta: f64) -> f64 {
    if precision == 0.0 && recall == 0.0 {
        return 0.0;
    }
    let b2 = beta * beta;
    (1.0 + b2) * precision * recall / (b2 * precision + recall)
}

fn ratio(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Linear interpolation between the two sorted samples bracketing rank
/// `p / 100 * (n - 1)`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

pub fn error_percentiles(errors: &[f64]) -> Option<ErrorPercentiles> {
    if errors.is_empty() {
        return None;
    }
    let mut sorted = errors.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    Some(ErrorPercentiles {
        p25: percentile(&sorted, 25.0),
        p50: percentile(&sorted, 50.0),
        p75: percentile(&sorted, 75.0),
        p90: percentile(&sorted, 90.0),
        p95: percentile(&sorted, 95.0),
    })
}

/// Pearson correlation; `None` with fewer than two samples or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let mx = mean(xs);
    let my = mean(ys);
    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mx;
        let dy = y - my;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let denom = (sxx * syy).sqrt();
    if denom <= f64::EPSILON {
        return None;
    }
    Some((sxy / denom).clamp(-1.0, 1.0))
}

fn velocity_is_correct(error: f64, config: &VelocityConfig, strict: bool) -> bool {
    let tolerance = config.normalized_tolerance();
    match config.mode {
        VelocityMode::Threshold => {
            if strict {
                error < tolerance
            } else {
                error <= tolerance
            }
        }
        VelocityMode::Weighted => {
            let score = if tolerance > 0.0 {
                (1.0 - error / tolerance).max(0.0)
            } else if error <= 0.0 {
                1.0
            } else {
                0.0
            };
            score >= 0.5
        }
    }
}

/// Velocity accuracy over the matches that carry both velocities.
///
/// Errors compare the reference velocity with the scaled estimated one.
/// Returns `None` when no match has both.
pub fn velocity_metrics(
    matches: &[Match],
    total_reference: usize,
    config: &VelocityConfig,
    strict: bool,
    beta: f64,
) -> Option<VelocityMetrics> {
    let mut refs = Vec::new();
    let mut scaled = Vec::new();
    let mut errors = Vec::new();
    let mut correct = 0usize;

    for m in matches {
        if let (Some(r), Some(s)) = (m.ref_velocity, m.scaled_est_velocity) {
            let error = (s - r).abs();
            if velocity_is_correct(error, config, strict) {
                correct += 1;
            }
            refs.push(r);
            scaled.push(s);
            errors.push(error);
        }
    }

    if errors.is_empty() {
        return None;
    }

    let precision = ratio(correct, matches.len());
    let recall = ratio(correct, total_reference);
    let rms_error = (errors.iter().map(|e| e * e).sum::<f64>() / errors.len() as f64).sqrt();

    Some(VelocityMetrics {
        precision,
        recall,
        f_measure: f_measure(precision, recall, beta),
        correct,
        mean_abs_error: mean(&errors),
        rms_error,
        correlation: pearson(&refs, &scaled),
        percentiles: error_percentiles(&errors),
    })
}

pub fn multiplicity_stats(matches: &[Match]) -> MultiplicityStats {
    let counts: Vec<usize> = matches.iter().map(|m| m.est_index.len()).collect();
    MultiplicityStats {
        avg_matches_per_ref: if counts.is_empty() {
            0.0
        } else {
            counts.iter().sum::<usize>() as f64 / counts.len() as f64
        },
        max_matches_per_ref: counts.iter().copied().max().unwrap_or(0),
        refs_with_multiple: counts.iter().filter(|&&c| c > 1).count(),
    }
}

/// Full metrics report for an assembled match result.
pub fn compute_metrics(
    result: &MatchResult,
    total_reference: usize,
    total_estimated: usize,
    config: &EvaluationConfig,
) -> Metrics {
    let matches = &result.matches;
    let matched_reference = matches.len();
    let matched_estimated = total_estimated - result.false_positives.len();

    let precision = ratio(matched_estimated, total_estimated);
    let recall = ratio(matched_reference, total_reference);
    let overlaps: Vec<f64> = matches.iter().map(|m| m.overlap_ratio).collect();

    let velocity = if result.velocity_scaling.is_some() {
        velocity_metrics(
            matches,
            total_reference,
            &config.velocity,
            config.tolerance.strict,
            config.beta,
        )
    } else {
        None
    };

    let multiplicity = match config.strategy {
        MatchStrategy::Bounded { .. } => Some(multiplicity_stats(matches)),
        _ => None,
    };

    Metrics {
        precision,
        recall,
        f_measure: f_measure(precision, recall, config.beta),
        avg_overlap_ratio: mean(&overlaps),
        total_reference,
        total_estimated,
        matched_reference,
        matched_estimated,
        velocity,
        multiplicity,
    }
}
