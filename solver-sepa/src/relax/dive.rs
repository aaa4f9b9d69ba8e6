//! Scoped dive on the relaxation with guaranteed rollback.

use super::{LpStatus, Relaxation};
use crate::cuts::SharedRow;
use crate::error::SepaResult;

/// Guard holding the relaxation in dive mode.
///
/// Entering captures a restore token; dropping the guard hands it back to
/// [`Relaxation::end_dive`], whatever path the caller leaves by.
pub struct DiveGuard<'r, R: Relaxation> {
    relax: &'r mut R,
    state: Option<R::DiveState>,
}

impl<'r, R: Relaxation> DiveGuard<'r, R> {
    /// Start a dive. Fails if the relaxation is already diving.
    pub fn enter(relax: &'r mut R) -> SepaResult<Self> {
        let state = relax.start_dive()?;
        Ok(Self {
            relax,
            state: Some(state),
        })
    }

    /// Add a trial row to the dived LP.
    pub fn add_row(&mut self, row: SharedRow) -> SepaResult<()> {
        self.relax.add_row(row)
    }

    /// Solve the dived LP.
    pub fn solve(&mut self) -> SepaResult<LpStatus> {
        self.relax.solve()
    }

    /// Objective value of the last dive solve.
    pub fn objective_value(&self) -> f64 {
        self.relax.objective_value()
    }

    /// Status of the last dive solve.
    pub fn status(&self) -> LpStatus {
        self.relax.status()
    }

    /// Read access to the dived relaxation.
    pub fn relaxation(&self) -> &R {
        self.relax
    }
}

impl<R: Relaxation> Drop for DiveGuard<'_, R> {
    fn drop(&mut self) {
        if let Some(state) = self.state.take() {
            self.relax.end_dive(state);
        }
    }
}
