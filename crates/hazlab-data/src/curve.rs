//! Hazard curves and the probability-of-exceedance helpers built on them.

use crate::{HazardError, Result};
use serde::{Deserialize, Serialize};

/// A hazard curve: shaking levels and their annual probability of exceedance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveValue {
    /// Shaking levels, ascending.
    pub levels: Vec<f64>,
    /// Annual probability of exceedance at each level.
    pub values: Vec<f64>,
}

impl CurveValue {
    /// Create a curve, checking that levels and values line up.
    pub fn new(levels: Vec<f64>, values: Vec<f64>) -> Result<Self> {
        if levels.len() != values.len() {
            return Err(HazardError::CurveLength {
                levels: levels.len(),
                values: values.len(),
            });
        }
        Ok(Self { levels, values })
    }

    /// Number of points on the curve.
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Returns true if the curve has no points.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Iterate over `(level, value)` points.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.levels.iter().copied().zip(self.values.iter().copied())
    }

    /// Shaking level with the given probability of exceedance over
    /// `investigation_time` years.
    ///
    /// Interpolates in log-log space between curve points. Targets beyond
    /// the curve clamp to its first or last level. Points with a
    /// non-positive level or value are skipped. Returns `None` when no usable
    /// point remains or the inputs are out of range.
    pub fn hazard_at_poe(&self, poe: f64, investigation_time: f64) -> Option<f64> {
        let rp = return_period(poe, investigation_time)?;
        let target = (1.0 / rp).ln();

        // Exceedance falls as level rises, so walk the log-values ascending.
        let mut pts: Vec<(f64, f64)> = self
            .points()
            .filter(|(l, v)| *l > 0.0 && *v > 0.0)
            .map(|(l, v)| (v.ln(), l.ln()))
            .collect();
        if pts.is_empty() {
            return None;
        }
        pts.reverse();

        Some(interp(target, &pts).exp())
    }
}

/// Return period in years for a probability of exceedance over an
/// investigation time: `-t / ln(1 - poe)`.
///
/// `None` unless `0 < poe < 1` and `t > 0`.
pub fn return_period(poe: f64, investigation_time: f64) -> Option<f64> {
    if !(poe > 0.0 && poe < 1.0) || investigation_time <= 0.0 {
        return None;
    }
    Some(-investigation_time / (1.0 - poe).ln())
}

/// Piecewise-linear interpolation over `(x, y)` points sorted by `x`,
/// clamping outside the range.
fn interp(x: f64, pts: &[(f64, f64)]) -> f64 {
    let (first, last) = (pts[0], pts[pts.len() - 1]);
    if x <= first.0 {
        return first.1;
    }
    if x >= last.0 {
        return last.1;
    }
    for w in pts.windows(2) {
        let ((x0, y0), (x1, y1)) = (w[0], w[1]);
        if x >= x0 && x <= x1 {
            if x1 == x0 {
                return y0;
            }
            return y0 + (x - x0) * (y1 - y0) / (x1 - x0);
        }
    }
    last.1
}

/// Indices of the `n` realizations whose shaking level at `poe` is closest to
/// `target_level`, nearest first.
///
/// Realizations whose level cannot be computed are skipped.
pub fn nearest_realizations(
    curves: &[(u32, &CurveValue)],
    poe: f64,
    investigation_time: f64,
    target_level: f64,
    n: usize,
) -> Vec<u32> {
    let mut dists: Vec<(f64, u32)> = curves
        .iter()
        .filter_map(|(idx, curve)| {
            curve
                .hazard_at_poe(poe, investigation_time)
                .map(|level| ((level - target_level).abs(), *idx))
        })
        .collect();
    dists.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
    dists.into_iter().take(n).map(|(_, idx)| idx).collect()
}

/// Indices of the `n` largest weights, heaviest first.
pub fn heaviest_realizations(weights: &[f64], n: usize) -> Vec<u32> {
    let mut order: Vec<u32> = (0..weights.len() as u32).collect();
    order.sort_by(|&a, &b| weights[b as usize].total_cmp(&weights[a as usize]).then(a.cmp(&b)));
    order.truncate(n);
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn loglinear_curve() -> CurveValue {
        // value = 1e-2 * level^-2, straight line in log-log space
        let levels = vec![0.01, 0.1, 1.0, 10.0];
        let values = levels.iter().map(|l: &f64| 1e-2 * l.powi(-2)).collect();
        CurveValue::new(levels, values).unwrap()
    }

    #[test]
    fn test_new_rejects_mismatched_lengths() {
        assert!(matches!(
            CurveValue::new(vec![0.1, 0.2], vec![0.01]),
            Err(HazardError::CurveLength { levels: 2, values: 1 })
        ));
    }

    #[test]
    fn test_return_period() {
        // 10% in 50 years is the classic 475 year event
        assert_relative_eq!(return_period(0.1, 50.0).unwrap(), 474.56, epsilon = 0.01);
        assert!(return_period(0.0, 50.0).is_none());
        assert!(return_period(1.0, 50.0).is_none());
        assert!(return_period(0.1, 0.0).is_none());
    }

    #[test]
    fn test_hazard_at_poe_on_loglinear_curve() {
        let curve = loglinear_curve();
        let apoe = 1.0 / return_period(0.1, 50.0).unwrap();
        let expected = (1e-2 / apoe).sqrt();
        assert_relative_eq!(
            curve.hazard_at_poe(0.1, 50.0).unwrap(),
            expected,
            max_relative = 1e-9
        );
    }

    #[test]
    fn test_hazard_at_poe_clamps() {
        let curve = loglinear_curve();
        // Tiny PoE: rarer than the curve reaches, clamps to the top level.
        assert_relative_eq!(curve.hazard_at_poe(1e-9, 1.0).unwrap(), 10.0, epsilon = 1e-9);
        // Large PoE: clamps to the lowest level.
        assert_relative_eq!(curve.hazard_at_poe(0.999999, 0.01).unwrap(), 0.01, epsilon = 1e-12);
    }

    #[test]
    fn test_hazard_at_poe_skips_zero_values() {
        let curve = CurveValue::new(vec![0.0, 0.1, 1.0], vec![0.5, 1e-2, 0.0]).unwrap();
        assert_relative_eq!(curve.hazard_at_poe(0.5, 1.0).unwrap(), 0.1, epsilon = 1e-12);

        let empty = CurveValue::new(vec![0.0], vec![0.0]).unwrap();
        assert!(empty.hazard_at_poe(0.1, 50.0).is_none());
    }

    #[test]
    fn test_nearest_realizations() {
        let low = CurveValue::new(vec![0.1, 1.0], vec![1e-2, 1e-4]).unwrap();
        let mid = CurveValue::new(vec![0.1, 1.0], vec![1e-1, 1e-3]).unwrap();
        let high = CurveValue::new(vec![0.1, 1.0], vec![1.0, 1e-2]).unwrap();
        let curves = [(0, &low), (1, &mid), (2, &high)];

        let level_mid = mid.hazard_at_poe(0.1, 50.0).unwrap();
        let picked = nearest_realizations(&curves, 0.1, 50.0, level_mid, 2);
        assert_eq!(picked[0], 1);
        assert_eq!(picked.len(), 2);
    }

    #[test]
    fn test_heaviest_realizations() {
        let weights = [0.1, 0.4, 0.2, 0.3];
        assert_eq!(heaviest_realizations(&weights, 2), vec![1, 3]);
        assert_eq!(heaviest_realizations(&weights, 10).len(), 4);
    }
}
