//! Solution snapshots used as reference points for cut evaluation.

use crate::relax::Relaxation;

/// Read-only primal solution: one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    values: Vec<f64>,
    obj_val: f64,
}

impl Solution {
    /// Create a snapshot.
    pub fn new(values: Vec<f64>, obj_val: f64) -> Self {
        Self { values, obj_val }
    }

    /// Snapshot of the relaxation's current optimum.
    pub fn from_relaxation<R: Relaxation>(relax: &R) -> Self {
        Self::new(relax.primal_values().to_vec(), relax.objective_value())
    }

    /// Value of a column.
    pub fn value(&self, col: usize) -> f64 {
        self.values[col]
    }

    /// All values.
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Objective value.
    pub fn obj_val(&self) -> f64 {
        self.obj_val
    }
}

/// Point against which a cut is evaluated.
#[derive(Debug, Clone, Copy)]
pub enum Reference<'a> {
    /// The optimum of the current relaxation.
    Relaxation,

    /// An explicit solution.
    Solution(&'a Solution),
}

impl<'a> Reference<'a> {
    /// Reference for an optional solution (None = relaxation optimum).
    pub fn from_option(sol: Option<&'a Solution>) -> Self {
        match sol {
            Some(sol) => Reference::Solution(sol),
            None => Reference::Relaxation,
        }
    }

    /// Dense values of the reference point.
    pub fn values<'r, R: Relaxation>(&self, relax: &'r R) -> &'r [f64]
    where
        'a: 'r,
    {
        match *self {
            Reference::Relaxation => relax.primal_values(),
            Reference::Solution(sol) => sol.values(),
        }
    }

    /// Whether this is the relaxation optimum.
    pub fn is_relaxation(&self) -> bool {
        matches!(self, Reference::Relaxation)
    }
}

/// Best known primal solution, updated by the caller.
#[derive(Debug, Clone, Default)]
pub struct IncumbentTracker {
    /// Best solution found so far.
    pub solution: Option<Solution>,

    /// Number of improvements.
    pub update_count: u64,
}

impl IncumbentTracker {
    /// Empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the incumbent if `candidate` has a lower objective.
    ///
    /// Returns whether it was improved.
    pub fn update(&mut self, candidate: Solution) -> bool {
        let improves = self
            .solution
            .as_ref()
            .map_or(true, |best| candidate.obj_val < best.obj_val);
        if improves {
            self.solution = Some(candidate);
            self.update_count += 1;
        }
        improves
    }

    /// The incumbent, if any.
    pub fn best(&self) -> Option<&Solution> {
        self.solution.as_ref()
    }
}
