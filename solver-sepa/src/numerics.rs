//! Tolerance-aware floating point comparisons.

use crate::settings::Tolerances;

/// Relative difference `(a - b) / max(|a|, |b|, 1)`.
///
/// An infinite difference is returned as is; equal infinities compare as 0.
pub fn rel_diff(a: f64, b: f64) -> f64 {
    let diff = a - b;
    if diff.is_infinite() {
        return diff;
    }
    if diff.is_nan() {
        return 0.0;
    }
    let scale = a.abs().max(b.abs()).max(1.0);
    diff / scale
}

impl Tolerances {
    /// `|x| >= infinity`.
    pub fn is_infinity(&self, x: f64) -> bool {
        x >= self.infinity
    }

    /// `|x| <= epsilon`.
    pub fn is_zero(&self, x: f64) -> bool {
        x.abs() <= self.epsilon
    }

    /// `|x| <= sum_epsilon`.
    pub fn is_sum_zero(&self, x: f64) -> bool {
        x.abs() <= self.sum_epsilon
    }

    /// `a == b` up to epsilon (relative).
    pub fn is_eq(&self, a: f64, b: f64) -> bool {
        if a.is_infinite() || b.is_infinite() {
            return a == b;
        }
        rel_diff(a, b).abs() <= self.epsilon
    }

    /// `a < b` beyond epsilon (relative).
    pub fn is_lt(&self, a: f64, b: f64) -> bool {
        rel_diff(a, b) < -self.epsilon
    }

    /// `a > b` beyond epsilon (relative).
    pub fn is_gt(&self, a: f64, b: f64) -> bool {
        rel_diff(a, b) > self.epsilon
    }

    /// `a < b` beyond the feasibility tolerance (relative).
    pub fn feas_lt(&self, a: f64, b: f64) -> bool {
        rel_diff(a, b) < -self.feastol
    }

    /// `a > b` beyond the feasibility tolerance (relative).
    pub fn feas_gt(&self, a: f64, b: f64) -> bool {
        rel_diff(a, b) > self.feastol
    }

    /// `a <= b` within the feasibility tolerance (relative).
    pub fn feas_le(&self, a: f64, b: f64) -> bool {
        !self.feas_gt(a, b)
    }

    /// `a >= b` within the feasibility tolerance (relative).
    pub fn feas_ge(&self, a: f64, b: f64) -> bool {
        !self.feas_lt(a, b)
    }

    /// Clamp `x` to +-inf if it is beyond the infinity threshold.
    pub fn normalize_infinity(&self, x: f64) -> f64 {
        if x >= self.infinity {
            f64::INFINITY
        } else if x <= -self.infinity {
            f64::NEG_INFINITY
        } else {
            x
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_comparisons() {
        let tol = Tolerances::default();

        assert!(tol.is_zero(1e-10));
        assert!(!tol.is_zero(1e-8));

        // Relative difference on large values.
        assert!(tol.is_eq(1e8, 1e8 + 1e-3));
        assert!(!tol.is_eq(1.0, 1.0 + 1e-6));

        assert!(tol.feas_lt(1.0, 1.1));
        assert!(!tol.feas_lt(1.0, 1.0 + 1e-7));
        assert!(tol.feas_gt(2.0, 1.0));
        assert!(tol.feas_le(1.0 + 1e-7, 1.0));
    }

    #[test]
    fn test_infinity() {
        let tol = Tolerances::default();
        assert!(tol.is_infinity(1e20));
        assert!(tol.is_infinity(f64::INFINITY));
        assert!(!tol.is_infinity(1e19));
        assert_eq!(tol.normalize_infinity(-1e21), f64::NEG_INFINITY);
        assert_eq!(tol.normalize_infinity(5.0), 5.0);
        assert!(tol.is_eq(f64::INFINITY, f64::INFINITY));
        assert!(!tol.is_eq(f64::INFINITY, f64::NEG_INFINITY));

        assert!(tol.feas_gt(f64::INFINITY, 3.0));
        assert!(tol.feas_lt(f64::NEG_INFINITY, 3.0));
        assert!(!tol.feas_lt(f64::INFINITY, f64::INFINITY));
        assert_eq!(rel_diff(f64::INFINITY, f64::INFINITY), 0.0);
    }
}
