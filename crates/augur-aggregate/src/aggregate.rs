//! Median aggregation with two-tier epsilon tolerance.
//!
//! The center of a round is the median of the submitted values:
//!
//! ```text
//! odd n:  center = v[n / 2]
//! even n: center = floor((v[n/2 - 1] + v[n/2]) / 2)
//! ```
//!
//! rounded to the nearest multiple of `aggregation_result` (ties round up).
//! Each submission is then classified by its distance `d` from the center:
//!
//! ```text
//! d <= epsilon1            → Tight
//! epsilon1 < d <= epsilon2 → Loose
//! d > epsilon2             → Outlier
//! ```
//!
//! All arithmetic is done in `i128`, so no input can overflow.

use augur_types::params::TaskParams;
use augur_types::task::{AggregateResult, Deviation, DeviationTier, Submission};

/// Submissions needed for a result that is not flagged low-confidence.
pub const MIN_CONFIDENT_SUBMISSIONS: usize = 2;

/// Aggregate a window of submissions.
///
/// Never fails: an empty window produces `value: None`, and fewer than
/// [`MIN_CONFIDENT_SUBMISSIONS`] submissions set `low_confidence`.
///
/// # Examples
///
/// ```
/// use augur_aggregate::aggregate;
/// use augur_types::params::TaskParams;
/// use augur_types::task::{DeviationTier, Submission};
/// use augur_types::ValidatorId;
///
/// let params = TaskParams { epsilon1: 1, epsilon2: 100, ..TaskParams::default() };
/// let subs: Vec<Submission> = [100, 101, 250]
///     .iter()
///     .enumerate()
///     .map(|(i, &value)| Submission { validator: ValidatorId([i as u8; 32]), value, height: 1 })
///     .collect();
/// let result = aggregate(&subs, &params);
/// assert_eq!(result.value, Some(101));
/// assert_eq!(result.deviations[2].tier, DeviationTier::Outlier);
/// ```
pub fn aggregate(submissions: &[Submission], params: &TaskParams) -> AggregateResult {
    let values: Vec<i64> = submissions.iter().map(|s| s.value).collect();
    let center = median(&values).map(|m| quantize(m, params.aggregation_result));

    let deviations = match center {
        Some(center) => submissions
            .iter()
            .map(|s| {
                let distance = distance(s.value, center);
                Deviation {
                    validator: s.validator,
                    distance,
                    tier: classify(distance, params),
                }
            })
            .collect(),
        None => Vec::new(),
    };

    let low_confidence = submissions.len() < MIN_CONFIDENT_SUBMISSIONS;
    tracing::trace!(
        count = submissions.len(),
        ?center,
        low_confidence,
        "aggregated submission window"
    );

    AggregateResult {
        value: center,
        low_confidence,
        submission_count: submissions.len(),
        deviations,
    }
}

/// Median of `values`, flooring the midpoint of the two middle values when
/// the count is even. `None` for an empty slice.
pub fn median(values: &[i64]) -> Option<i64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 1 {
        return Some(sorted[mid]);
    }
    let sum = i128::from(sorted[mid - 1]) + i128::from(sorted[mid]);
    // The floored mean of two i64 values always fits in i64.
    Some(clamp_i64(sum.div_euclid(2)))
}

/// Round `value` to the nearest multiple of `quantum`; ties round up.
/// A quantum of one or less leaves the value unchanged.
pub fn quantize(value: i64, quantum: i64) -> i64 {
    if quantum <= 1 {
        return value;
    }
    let v = i128::from(value);
    let q = i128::from(quantum);
    let floor = v.div_euclid(q) * q;
    let rounded = if (v - floor) * 2 >= q { floor + q } else { floor };
    clamp_i64(rounded)
}

/// Tier for a deviation of `distance` under the given tolerances.
pub fn classify(distance: u64, params: &TaskParams) -> DeviationTier {
    let epsilon1 = u64::try_from(params.epsilon1).unwrap_or(0);
    let epsilon2 = u64::try_from(params.epsilon2).unwrap_or(0);
    if distance <= epsilon1 {
        DeviationTier::Tight
    } else if distance <= epsilon2 {
        DeviationTier::Loose
    } else {
        DeviationTier::Outlier
    }
}

fn distance(value: i64, center: i64) -> u64 {
    let d = (i128::from(value) - i128::from(center)).unsigned_abs();
    u64::try_from(d).unwrap_or(u64::MAX)
}

fn clamp_i64(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v.is_negative() { i64::MIN } else { i64::MAX })
}
