use crate::scoring::types::VelocityScaling;

/// One MIDI velocity step in normalized units; the smallest reference
/// range the fit will divide by.
pub const VELOCITY_RANGE_FLOOR: f64 = 1.0 / 127.0;

const SINGULAR_EPSILON: f64 = 1e-12;

/// Least-squares map from estimated velocity onto the reference's scale.
///
/// `pairs` holds `(reference, estimated)` velocities of matched notes, both
/// normalized to [0, 1]. Reference velocities are min-max normalized over the
/// matched subset before the fit, and the fitted line is expressed back on the
/// reference scale, so identical inputs give slope 1 and intercept 0.
/// With no spread in the estimated velocities the map is a pure shift by the
/// difference of the means. Returns `None` for an empty slice.
pub fn fit_velocity_scaling(pairs: &[(f64, f64)]) -> Option<VelocityScaling> {
    if pairs.is_empty() {
        return None;
    }
    let n = pairs.len() as f64;

    let (ref_min, ref_max) = pairs
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(r, _)| {
            (lo.min(r), hi.max(r))
        });
    let range = (ref_max - ref_min).max(VELOCITY_RANGE_FLOOR);

    let mean_est = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_norm = pairs.iter().map(|p| (p.0 - ref_min) / range).sum::<f64>() / n;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for &(r, e) in pairs {
        let dx = e - mean_est;
        sxx += dx * dx;
        sxy += dx * ((r - ref_min) / range - mean_norm);
    }

    if sxx <= SINGULAR_EPSILON {
        let mean_ref = pairs.iter().map(|p| p.0).sum::<f64>() / n;
        log::warn!(
            "velocity fit is singular over {} pairs, falling back to a mean shift",
            pairs.len()
        );
        return Some(VelocityScaling {
            slope: 1.0,
            intercept: mean_ref - mean_est,
        });
    }

    let slope = sxy / sxx;
    let intercept = mean_norm - slope * mean_est;
    let scaling = VelocityScaling {
        slope: slope * range,
        intercept: intercept * range + ref_min,
    };
    log::debug!(
        "velocity scaling over {} pairs: slope {:.4}, intercept {:.4}",
        pairs.len(),
        scaling.slope,
        scaling.intercept
    );
    Some(scaling)
}
