//! Norms, feasibility, efficacy and violation of cut rows.
//!
//! All functions evaluate a row against a dense point `x` (either the
//! relaxation optimum or an explicit solution snapshot). Feasibility is
//! negative when the row is violated, so efficacy and violation are
//! "larger is better".

use super::row::Row;
use crate::settings::{EfficacyNorm, SepaSettings, Tolerances};

/// Norm of a dense vector.
pub fn vector_norm(values: &[f64], mode: EfficacyNorm, tol: &Tolerances) -> f64 {
    match mode {
        EfficacyNorm::Euclidean => values.iter().map(|v| v * v).sum::<f64>().sqrt(),
        EfficacyNorm::Maximum => values.iter().map(|v| v.abs()).fold(0.0_f64, f64::max),
        EfficacyNorm::Sum => values.iter().map(|v| v.abs()).sum(),
        EfficacyNorm::Discrete => {
            if values.iter().any(|&v| !tol.is_zero(v)) {
                1.0
            } else {
                0.0
            }
        }
    }
}

/// Norm of a row's coefficients, using the norms cached on the row.
pub fn row_norm(row: &Row, mode: EfficacyNorm, tol: &Tolerances) -> f64 {
    match mode {
        EfficacyNorm::Euclidean => row.norm(),
        EfficacyNorm::Maximum => row.max_norm(),
        EfficacyNorm::Sum => row.sum_norm(),
        EfficacyNorm::Discrete => vector_norm(row.vals(), mode, tol),
    }
}

/// Slack of the tighter side: `min(rhs - act, act - lhs)`.
///
/// Infinite sides do not constrain the row.
pub fn feasibility(row: &Row, x: &[f64], tol: &Tolerances) -> f64 {
    let act = row.activity(x);
    let mut feas = f64::INFINITY;
    if !tol.is_infinity(row.rhs()) {
        feas = feas.min(row.rhs() - act);
    }
    if !tol.is_infinity(-row.lhs()) {
        feas = feas.min(act - row.lhs());
    }
    feas
}

/// Efficacy `-feasibility / norm`.
pub fn efficacy(row: &Row, x: &[f64], settings: &SepaSettings) -> f64 {
    let tol = &settings.tolerances;
    let norm = row_norm(row, settings.efficacy_norm, tol).max(tol.epsilon);
    -feasibility(row, x, tol) / norm
}

/// Whether an efficacy value passes the minimal efficacy threshold.
pub fn is_efficacious(efficacy: f64, is_root: bool, settings: &SepaSettings) -> bool {
    let min = if is_root {
        settings.min_efficacy_root
    } else {
        settings.min_efficacy
    };
    settings.tolerances.feas_gt(efficacy, min)
}

/// Whether a row's efficacy at `x` passes the threshold.
pub fn is_cut_efficacious(row: &Row, x: &[f64], is_root: bool, settings: &SepaSettings) -> bool {
    is_efficacious(efficacy(row, x, settings), is_root, settings)
}

/// Raw violation `-feasibility`.
pub fn violation(row: &Row, x: &[f64], tol: &Tolerances) -> f64 {
    -feasibility(row, x, tol)
}

/// Violation scaled by `min(|lhs|, |rhs|)`.
///
/// Falls back to the unscaled violation when the scale is not above epsilon.
pub fn relative_violation(row: &Row, x: &[f64], tol: &Tolerances) -> f64 {
    let scale = row.lhs().abs().min(row.rhs().abs());
    let viol = violation(row, x, tol);
    if tol.epsilon < scale {
        viol / scale
    } else {
        viol
    }
}

/// Minimal activity of a row under column bounds `[lb, ub]`.
pub fn min_activity(row: &Row, lb: &[f64], ub: &[f64], tol: &Tolerances) -> f64 {
    let mut act = 0.0;
    for (j, &a) in row.coefs().iter() {
        let bound = if a > 0.0 { lb[j] } else { ub[j] };
        if tol.is_infinity(bound.abs()) {
            return f64::NEG_INFINITY;
        }
        act += a * bound;
    }
    act
}

/// Maximal activity of a row under column bounds `[lb, ub]`.
pub fn max_activity(row: &Row, lb: &[f64], ub: &[f64], tol: &Tolerances) -> f64 {
    let mut act = 0.0;
    for (j, &a) in row.coefs().iter() {
        let bound = if a > 0.0 { ub[j] } else { lb[j] };
        if tol.is_infinity(bound.abs()) {
            return f64::INFINITY;
        }
        act += a * bound;
    }
    act
}
