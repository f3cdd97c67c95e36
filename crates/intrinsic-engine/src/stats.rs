//! Small numeric helpers shared by the table and valuation code.

use crate::diagnostics::{Diagnostic, Diagnostics};

/// Period-over-period changes at or beyond this magnitude (percent) are suppressed.
pub(crate) const MAX_CHANGE_PCT: f64 = 1000.0;

/// Arithmetic mean of the defined values.
pub(crate) fn mean(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .flatten()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// Median of the defined values.
pub(crate) fn median(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let mut v: Vec<f64> = values.into_iter().flatten().filter(|v| v.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_by(f64::total_cmp);
    let mid = v.len() / 2;
    if v.len() % 2 == 0 {
        Some((v[mid - 1] + v[mid]) / 2.0)
    } else {
        Some(v[mid])
    }
}

/// Compound growth in percent per period over `periods` steps.
///
/// Zero unless both endpoints are strictly positive and there is at least one step.
pub(crate) fn cagr_pct(oldest: Option<f64>, newest: Option<f64>, periods: usize) -> f64 {
    match (oldest, newest) {
        (Some(first), Some(last)) if first > 0.0 && last > 0.0 && periods > 0 => {
            ((last / first).powf(1.0 / periods as f64) - 1.0) * 100.0
        }
        _ => 0.0,
    }
}

/// Percent change from `base` to `value`.
///
/// Undefined when either side is missing or `base` is not strictly positive.
/// A change at or beyond [`MAX_CHANGE_PCT`] is suppressed to 0 and flagged.
pub(crate) fn bounded_change_pct(
    metric: &str,
    base: Option<f64>,
    value: Option<f64>,
    diagnostics: &mut Diagnostics,
) -> Option<f64> {
    let base = base.filter(|b| *b > 0.0)?;
    let value = value.filter(|v| v.is_finite())?;
    let change = (value - base) / base * 100.0;
    if change.abs() >= MAX_CHANGE_PCT {
        diagnostics.flag(Diagnostic::AnomalousGrowth {
            metric: metric.to_string(),
            change_pct: change,
        });
        Some(0.0)
    } else {
        Some(change)
    }
}

/// Ratio gated on a strictly positive denominator.
pub(crate) fn positive_ratio(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let d = denominator.filter(|d| *d > 0.0)?;
    numerator.map(|n| n / d).filter(|r| r.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_median_skip_undefined() {
        assert_eq!(mean([Some(1.0), None, Some(3.0)]), Some(2.0));
        assert_eq!(mean([None, None]), None);
        assert_eq!(median([Some(5.0), Some(1.0), None, Some(3.0)]), Some(3.0));
        assert_eq!(median([Some(4.0), Some(1.0), Some(3.0), Some(2.0)]), Some(2.5));
    }

    #[test]
    fn test_cagr() {
        assert_relative_eq!(cagr_pct(Some(100.0), Some(121.0), 2), 10.0, epsilon = 1e-9);
        assert_eq!(cagr_pct(Some(-1.0), Some(121.0), 2), 0.0);
        assert_eq!(cagr_pct(Some(100.0), Some(0.0), 2), 0.0);
        assert_eq!(cagr_pct(Some(100.0), Some(121.0), 0), 0.0);
    }

    #[test]
    fn test_bounded_change() {
        let mut diags = Diagnostics::new();
        assert_eq!(bounded_change_pct("x", Some(100.0), Some(150.0), &mut diags), Some(50.0));
        assert_eq!(bounded_change_pct("x", Some(0.0), Some(150.0), &mut diags), None);
        assert!(diags.is_empty());
        assert_eq!(bounded_change_pct("x", Some(1.0), Some(20.0), &mut diags), Some(0.0));
        assert!(diags.any(|d| matches!(d, Diagnostic::AnomalousGrowth { .. })));
    }

    #[test]
    fn test_positive_ratio() {
        assert_eq!(positive_ratio(Some(10.0), Some(2.0)), Some(5.0));
        assert_eq!(positive_ratio(Some(10.0), Some(0.0)), None);
        assert_eq!(positive_ratio(Some(10.0), Some(-2.0)), None);
        assert_eq!(positive_ratio(None, Some(2.0)), None);
    }
}
