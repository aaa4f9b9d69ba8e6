//! Cut selection and application.
//!
//! Staged cuts are ranked by score; forced cuts always go first and are
//! never filtered. Remaining cuts are taken greedily in descending score
//! while they are not too parallel to a cut already taken.

use super::pool::CutPool;
use super::row::SharedRow;
use super::score::{ScorePolicy, Scorer};
use super::store::{is_cut_applicable, SepaStore};
use crate::error::{SepaError, SepaResult};
use crate::relax::Relaxation;
use crate::settings::SepaSettings;
use crate::solution::Solution;

/// A staged cut with its score.
#[derive(Debug, Clone)]
pub struct ScoredCut {
    /// The cut.
    pub row: SharedRow,

    /// Score under the selection policy.
    pub score: f64,

    /// Whether the cut was staged as forced.
    pub forced: bool,
}

/// Rank the staged cuts and pick at most `settings.max_cuts_per_round`.
///
/// Forced cuts are selected unconditionally and count towards the limit.
pub fn select_cuts<R: Relaxation>(
    store: &SepaStore,
    scorer: &mut Scorer,
    policy: ScorePolicy,
    relax: &mut R,
    incumbent: Option<&Solution>,
    settings: &SepaSettings,
) -> SepaResult<Vec<ScoredCut>> {
    let mut forced = Vec::with_capacity(store.n_forced());
    let mut candidates = Vec::with_capacity(store.len() - store.n_forced());
    for (pos, row) in store.cuts().iter().enumerate() {
        let score = scorer.score(policy, row, relax, incumbent, settings)?;
        let scored = ScoredCut {
            row: row.clone(),
            score,
            forced: store.is_forced(pos),
        };
        if scored.forced {
            forced.push(scored);
        } else {
            candidates.push(scored);
        }
    }

    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut selected = forced;
    for cand in candidates {
        if selected.len() >= settings.max_cuts_per_round {
            break;
        }
        let parallel = selected
            .iter()
            .any(|s| s.row.parallelism(&cand.row) > settings.max_parallelism);
        if parallel {
            log::trace!("skipping row {}: too parallel", cand.row.id());
            continue;
        }
        selected.push(cand);
    }

    log::debug!(
        "selected {} of {} staged cuts ({} forced)",
        selected.len(),
        store.len(),
        store.n_forced()
    );
    Ok(selected)
}

/// Add the selected cuts to the relaxation and clear the store.
///
/// Non-applicable bound changes and cuts already in the relaxation are
/// skipped. Global non-modifiable cuts also go to `global_pool` when
/// `settings.pool_global_cuts` is set. Returns the number of rows added.
///
/// If the relaxation rejects a row, the store and the pool are left
/// untouched; rows added before the failure stay in the relaxation and are
/// skipped when the call is repeated.
pub fn apply_cuts<R: Relaxation>(
    store: &mut SepaStore,
    selected: &[ScoredCut],
    relax: &mut R,
    global_pool: &mut CutPool,
    settings: &SepaSettings,
) -> SepaResult<usize> {
    if let Some(c) = selected.iter().find(|c| c.row.dim() > relax.num_cols()) {
        return Err(SepaError::InvalidRow(format!(
            "cut {} over {} columns, relaxation has {}",
            c.row.id(),
            c.row.dim(),
            relax.num_cols()
        )));
    }

    let tol = &settings.tolerances;
    let mut added = Vec::with_capacity(selected.len());
    for cut in selected {
        let row = &cut.row;
        if relax.has_row(row.id()) || !is_cut_applicable(row, &*relax, tol) {
            continue;
        }
        relax.add_row(row.clone())?;
        added.push(row);
    }

    if settings.pool_global_cuts {
        for row in added.iter().filter(|r| !r.is_local() && !r.is_modifiable()) {
            global_pool.add_row((*row).clone());
        }
    }
    store.clear();

    log::debug!("applied {} cuts, LP has {} rows", added.len(), relax.num_rows());
    Ok(added.len())
}
