//! Conflict analysis triggered by cuts that are infeasible for local bounds.
//!
//! The analysis itself is an external collaborator ([`ConflictAnalyzer`]);
//! this module only builds the initial bound set from the infeasible row.

use crate::cuts::efficacy::{max_activity, min_activity};
use crate::cuts::Row;
use crate::error::SepaResult;
use crate::relax::Relaxation;
use crate::settings::Tolerances;

/// What kind of reasoning produced the conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    /// Infeasibility found by propagating a single row.
    Propagation,

    /// Infeasible LP relaxation.
    InfeasibleLp,
}

/// Which bound of a column takes part in the conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BoundSide {
    /// Current local lower bound.
    Lower,

    /// Current local upper bound.
    Upper,
}

/// Conflict analysis engine.
pub trait ConflictAnalyzer {
    /// Whether conflict analysis is currently enabled.
    fn is_applicable(&self) -> bool;

    /// Start a new analysis session.
    fn init(&mut self, kind: ConflictKind) -> SepaResult<()>;

    /// Add the current local bound of `col` to the conflict.
    fn add_bound(&mut self, col: usize, side: BoundSide) -> SepaResult<()>;

    /// Analyze the collected bounds at the given depth.
    ///
    /// Returns whether a deduction was learned.
    fn analyze(&mut self, depth: usize) -> SepaResult<bool>;
}

/// Analyzer that is never applicable.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoConflictAnalysis;

impl ConflictAnalyzer for NoConflictAnalysis {
    fn is_applicable(&self) -> bool {
        false
    }

    fn init(&mut self, _kind: ConflictKind) -> SepaResult<()> {
        Ok(())
    }

    fn add_bound(&mut self, _col: usize, _side: BoundSide) -> SepaResult<()> {
        Ok(())
    }

    fn analyze(&mut self, _depth: usize) -> SepaResult<bool> {
        Ok(false)
    }
}

/// A finished conflict session.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictSet {
    /// Conflict kind.
    pub kind: ConflictKind,

    /// Bounds taking part in the conflict.
    pub bounds: Vec<(usize, BoundSide)>,

    /// Depth at which the conflict was analyzed.
    pub depth: usize,
}

/// Analyzer that records every bound set it is given.
///
/// Each analyzed, nonempty set is kept as a learned conflict for the caller
/// to turn into constraints or bound changes.
#[derive(Debug, Clone)]
pub struct ConflictRecorder {
    enabled: bool,
    current: Option<ConflictSet>,
    learned: Vec<ConflictSet>,
}

impl Default for ConflictRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConflictRecorder {
    /// New enabled recorder.
    pub fn new() -> Self {
        Self {
            enabled: true,
            current: None,
            learned: Vec::new(),
        }
    }

    /// Enable or disable analysis.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Conflicts learned so far.
    pub fn learned(&self) -> &[ConflictSet] {
        &self.learned
    }

    /// Take the learned conflicts.
    pub fn drain(&mut self) -> Vec<ConflictSet> {
        std::mem::take(&mut self.learned)
    }
}

impl ConflictAnalyzer for ConflictRecorder {
    fn is_applicable(&self) -> bool {
        self.enabled
    }

    fn init(&mut self, kind: ConflictKind) -> SepaResult<()> {
        self.current = Some(ConflictSet {
            kind,
            bounds: Vec::new(),
            depth: 0,
        });
        Ok(())
    }

    fn add_bound(&mut self, col: usize, side: BoundSide) -> SepaResult<()> {
        if let Some(set) = self.current.as_mut() {
            if !set.bounds.contains(&(col, side)) {
                set.bounds.push((col, side));
            }
        }
        Ok(())
    }

    fn analyze(&mut self, depth: usize) -> SepaResult<bool> {
        match self.current.take() {
            Some(mut set) if !set.bounds.is_empty() => {
                set.depth = depth;
                self.learned.push(set);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Run conflict analysis on a row that is infeasible for the local bounds.
///
/// Skipped (returns `Ok(false)`) if some columns are missing from the LP or
/// the analyzer is disabled.
pub fn analyze_infeasible_row<R: Relaxation>(
    row: &Row,
    relax: &R,
    conflict: &mut dyn ConflictAnalyzer,
    depth: usize,
    tol: &Tolerances,
) -> SepaResult<bool> {
    if !relax.all_cols_in_lp() || !conflict.is_applicable() {
        return Ok(false);
    }

    conflict.init(ConflictKind::Propagation)?;

    let (lb, ub) = (relax.col_lb(), relax.col_ub());
    if !tol.is_infinity(-row.lhs()) {
        // Even the largest activity stays below lhs: the bounds that
        // maximize the activity form the conflict.
        let act = max_activity(row, lb, ub, tol);
        if tol.is_lt(act, row.lhs()) {
            for (j, &val) in row.coefs().iter() {
                if tol.is_zero(val) {
                    continue;
                }
                let side = if val > 0.0 {
                    BoundSide::Upper
                } else {
                    BoundSide::Lower
                };
                conflict.add_bound(j, side)?;
            }
        }
    } else if !tol.is_infinity(row.rhs()) {
        let act = min_activity(row, lb, ub, tol);
        if tol.is_gt(act, row.rhs()) {
            for (j, &val) in row.coefs().iter() {
                if tol.is_zero(val) {
                    continue;
                }
                let side = if val > 0.0 {
                    BoundSide::Lower
                } else {
                    BoundSide::Upper
                };
                conflict.add_bound(j, side)?;
            }
        }
    }

    let learned = conflict.analyze(depth)?;
    log::debug!(
        "conflict analysis on infeasible row {} at depth {}: learned={}",
        row.id(),
        depth,
        learned
    );
    Ok(learned)
}
