//! Separation storage: candidate cuts staged for one relaxation round.
//!
//! Forced cuts are kept in front of the others. A structurally identical
//! cut is never staged twice. The store is cleared explicitly once the
//! round's candidates have been evaluated.

use super::efficacy::{is_cut_efficacious, max_activity, min_activity};
use super::row::{Row, SharedRow};
use crate::conflict::{analyze_infeasible_row, ConflictAnalyzer};
use crate::error::{SepaError, SepaResult};
use crate::node::NodeInfo;
use crate::relax::Relaxation;
use crate::settings::{SepaSettings, Tolerances};

/// Statistics for a separation store.
#[derive(Debug, Default, Clone)]
pub struct StoreStats {
    /// Cuts offered to the store.
    pub offered: usize,

    /// Cuts actually staged.
    pub stored: usize,

    /// Forced cuts staged.
    pub forced: usize,

    /// Cuts rejected as duplicates.
    pub duplicates: usize,

    /// Cuts rejected as redundant for the local bounds.
    pub redundant: usize,

    /// Cuts infeasible for the local bounds.
    pub infeasible: usize,

    /// Cuts dropped by `remove_inefficacious`.
    pub inefficacious: usize,
}

/// How a row relates to the local bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundCheck {
    Infeasible,
    Redundant,
    Useful,
}

/// Store state recorded by [`SepaStore::checkpoint`].
#[derive(Debug, Clone)]
pub struct StoreCheckpoint {
    len: usize,
    n_forced: usize,
    stats: StoreStats,
}

/// Transient storage for the cuts of one separation round.
#[derive(Debug, Default)]
pub struct SepaStore {
    /// Staged cuts; the first `n_forced` are forced.
    cuts: Vec<SharedRow>,

    /// Number of forced cuts.
    n_forced: usize,

    /// Statistics.
    stats: StoreStats,
}

impl SepaStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage a cut.
    ///
    /// Returns whether the cut is infeasible for the current local bounds.
    /// Infeasible cuts are staged anyway and, if possible, trigger conflict
    /// analysis. Redundant non-forced cuts and duplicates are dropped.
    pub fn add_cut<R: Relaxation>(
        &mut self,
        cut: SharedRow,
        forced: bool,
        node: &NodeInfo,
        relax: &R,
        conflict: &mut dyn ConflictAnalyzer,
        settings: &SepaSettings,
    ) -> SepaResult<bool> {
        let tol = &settings.tolerances;
        if cut.dim() > relax.num_cols() {
            return Err(SepaError::InvalidRow(format!(
                "cut over {} columns, relaxation has {}",
                cut.dim(),
                relax.num_cols()
            )));
        }

        self.stats.offered += 1;

        if self.contains(&cut, tol) {
            self.stats.duplicates += 1;
            log::trace!("cut {} already staged", cut.id());
            return Ok(false);
        }

        let check = check_bounds(&cut, relax.col_lb(), relax.col_ub(), tol);
        let infeasible = check == BoundCheck::Infeasible;

        if infeasible {
            self.stats.infeasible += 1;
            log::debug!(
                "cut {:?} infeasible for local bounds at depth {}",
                cut.name(),
                node.depth
            );
            analyze_infeasible_row(&cut, relax, conflict, node.depth, tol)?;
        } else if check == BoundCheck::Redundant && !forced {
            self.stats.redundant += 1;
            return Ok(false);
        }

        if forced {
            self.cuts.insert(self.n_forced, cut);
            self.n_forced += 1;
            self.stats.forced += 1;
        } else {
            self.cuts.push(cut);
        }
        self.stats.stored += 1;

        Ok(infeasible)
    }

    /// Record the current contents for a later [`rollback`](Self::rollback).
    pub fn checkpoint(&self) -> StoreCheckpoint {
        StoreCheckpoint {
            len: self.cuts.len(),
            n_forced: self.n_forced,
            stats: self.stats.clone(),
        }
    }

    /// Drop every cut staged since `cp` and restore the statistics.
    ///
    /// Only cuts added since the checkpoint are removed; the store must not
    /// have been cleared or filtered in between.
    pub fn rollback(&mut self, cp: &StoreCheckpoint) {
        debug_assert!(self.n_forced >= cp.n_forced && self.cuts.len() >= cp.len);
        let new_forced = self.n_forced - cp.n_forced;
        let new_other = self.cuts.len() - cp.len - new_forced;
        self.cuts.truncate(self.cuts.len() - new_other);
        self.cuts.drain(cp.n_forced..self.n_forced);
        self.n_forced = cp.n_forced;
        self.stats = cp.stats.clone();
    }

    /// Whether a structurally identical cut is already staged.
    pub fn contains(&self, cut: &Row, tol: &Tolerances) -> bool {
        let sig = cut.signature();
        self.cuts
            .iter()
            .any(|c| c.signature() == sig && c.same_structure(cut, tol))
    }

    /// Drop non-forced cuts that are not efficacious for the relaxation
    /// optimum. The relaxation itself is not touched.
    ///
    /// Returns the number of removed cuts.
    pub fn remove_inefficacious<R: Relaxation>(
        &mut self,
        is_root: bool,
        relax: &R,
        settings: &SepaSettings,
    ) -> usize {
        let x = relax.primal_values();
        let before = self.cuts.len();
        let n_forced = self.n_forced;
        let mut idx = 0;
        self.cuts.retain(|cut| {
            let keep = idx < n_forced || is_cut_efficacious(cut, x, is_root, settings);
            idx += 1;
            keep
        });
        let removed = before - self.cuts.len();
        self.stats.inefficacious += removed;
        if removed > 0 {
            log::debug!("removed {} inefficacious cuts from store", removed);
        }
        removed
    }

    /// Staged cuts, forced ones first.
    pub fn cuts(&self) -> &[SharedRow] {
        &self.cuts
    }

    /// Whether the cut at `pos` is forced.
    pub fn is_forced(&self, pos: usize) -> bool {
        pos < self.n_forced
    }

    /// Number of staged cuts.
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Number of forced cuts.
    pub fn n_forced(&self) -> usize {
        self.n_forced
    }

    /// Remove all cuts, releasing the store's share of each row.
    pub fn clear(&mut self) {
        self.cuts.clear();
        self.n_forced = 0;
    }

    /// Store statistics.
    pub fn stats(&self) -> &StoreStats {
        &self.stats
    }
}

/// Whether applying the cut changes the LP.
///
/// Non-modifiable cuts and rows with more than one nonzero always apply. A
/// modifiable single-nonzero row acts as a bound change and only applies
/// when it tightens a bound of its column beyond epsilon.
pub fn is_cut_applicable<R: Relaxation>(cut: &Row, relax: &R, tol: &Tolerances) -> bool {
    if !cut.is_modifiable() || cut.nnz() != 1 {
        return true;
    }

    let col = cut.cols()[0];
    let val = cut.vals()[0];
    let (lhs, rhs) = (cut.lhs() / val, cut.rhs() / val);
    let (new_lb, new_ub) = if val > 0.0 { (lhs, rhs) } else { (rhs, lhs) };

    let lb = relax.col_lb()[col];
    let ub = relax.col_ub()[col];
    let tightens_lb = !tol.is_infinity(new_lb.abs()) && tol.is_gt(new_lb, lb);
    let tightens_ub = !tol.is_infinity(new_ub.abs()) && tol.is_lt(new_ub, ub);
    tightens_lb || tightens_ub
}

fn check_bounds(cut: &Row, lb: &[f64], ub: &[f64], tol: &Tolerances) -> BoundCheck {
    let min_act = min_activity(cut, lb, ub, tol);
    let max_act = max_activity(cut, lb, ub, tol);
    let has_lhs = !tol.is_infinity(-cut.lhs());
    let has_rhs = !tol.is_infinity(cut.rhs());

    if (has_lhs && tol.feas_lt(max_act, cut.lhs())) || (has_rhs && tol.feas_gt(min_act, cut.rhs()))
    {
        return BoundCheck::Infeasible;
    }
    let lhs_implied = !has_lhs || tol.feas_ge(min_act, cut.lhs());
    let rhs_implied = !has_rhs || tol.feas_le(max_act, cut.rhs());
    if lhs_implied && rhs_implied {
        BoundCheck::Redundant
    } else {
        BoundCheck::Useful
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conflict::{ConflictRecorder, NoConflictAnalysis};
    use crate::relax::{Column, MemoryRelaxation};

    fn relax() -> MemoryRelaxation {
        let mut lp = MemoryRelaxation::new(vec![
            Column::binary(1.0),
            Column::binary(1.0),
            Column::continuous(1.0, 0.0, 10.0),
        ]);
        lp.set_solution(vec![0.5, 0.5, 2.0], 3.0).unwrap();
        lp
    }

    fn le(entries: &[(usize, f64)], rhs: f64) -> SharedRow {
        Row::builder(3)
            .coefs(entries.iter().copied())
            .rhs(rhs)
            .build_shared()
            .unwrap()
    }

    #[test]
    fn test_add_and_clear() {
        let lp = relax();
        let settings = SepaSettings::default();
        let node = NodeInfo::root();
        let mut store = SepaStore::new();

        let infeasible = store
            .add_cut(le(&[(0, 1.0), (1, 1.0)], 0.5), false, &node, &lp, &mut NoConflictAnalysis, &settings)
            .unwrap();
        assert!(!infeasible);
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.n_forced(), 0);
    }

    #[test]
    fn test_duplicates_ignored() {
        let lp = relax();
        let settings = SepaSettings::default();
        let node = NodeInfo::root();
        let mut store = SepaStore::new();
        let mut none = NoConflictAnalysis;

        let a = le(&[(0, 1.0), (1, 1.0)], 1.5);
        let b = le(&[(0, 2.0), (1, 2.0)], 3.0);
        store.add_cut(a.clone(), false, &node, &lp, &mut none, &settings).unwrap();
        store.add_cut(a, false, &node, &lp, &mut none, &settings).unwrap();
        store.add_cut(b, false, &node, &lp, &mut none, &settings).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.stats().duplicates, 2);
    }

    #[test]
    fn test_forced_cuts_first() {
        let lp = relax();
        let settings = SepaSettings::default();
        let node = NodeInfo::root();
        let mut store = SepaStore::new();
        let mut none = NoConflictAnalysis;

        let a = le(&[(0, 1.0), (1, 1.0)], 1.5);
        let b = le(&[(0, 1.0), (2, 1.0)], 2.0);
        store.add_cut(a.clone(), false, &node, &lp, &mut none, &settings).unwrap();
        store.add_cut(b.clone(), true, &node, &lp, &mut none, &settings).unwrap();

        assert_eq!(store.cuts()[0].id(), b.id());
        assert_eq!(store.cuts()[1].id(), a.id());
        assert!(store.is_forced(0));
        assert!(!store.is_forced(1));
    }

    #[test]
    fn test_redundant_cut_dropped_unless_forced() {
        let lp = relax();
        let settings = SepaSettings::default();
        let node = NodeInfo::root();
        let mut store = SepaStore::new();
        let mut none = NoConflictAnalysis;

        // x0 + x1 <= 2 holds for any binaries
        let r = le(&[(0, 1.0), (1, 1.0)], 2.0);
        store.add_cut(r.clone(), false, &node, &lp, &mut none, &settings).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.stats().redundant, 1);

        store.add_cut(r, true, &node, &lp, &mut none, &settings).unwrap();
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_infeasible_cut_triggers_conflict() {
        let lp = relax();
        let settings = SepaSettings::default();
        let node = NodeInfo::at_depth(4, 2);
        let mut store = SepaStore::new();
        let mut rec = ConflictRecorder::new();

        // x0 + x1 <= -1 is impossible for binaries
        let r = le(&[(0, 1.0), (1, 1.0)], -1.0);
        let infeasible = store.add_cut(r, false, &node, &lp, &mut rec, &settings).unwrap();

        assert!(infeasible);
        assert_eq!(store.len(), 1);
        assert_eq!(rec.learned().len(), 1);
        assert_eq!(rec.learned()[0].depth, 2);
    }

    #[test]
    fn test_infeasible_cut_without_all_columns_skips_conflict() {
        let mut lp = relax();
        lp.set_unpriced_cols(true);
        let settings = SepaSettings::default();
        let node = NodeInfo::root();
        let mut store = SepaStore::new();
        let mut rec = ConflictRecorder::new();

        let r = le(&[(0, 1.0), (1, 1.0)], -1.0);
        assert!(store.add_cut(r, false, &node, &lp, &mut rec, &settings).unwrap());
        assert!(rec.learned().is_empty());
    }

    #[test]
    fn test_cut_too_wide_rejected() {
        let lp = relax();
        let settings = SepaSettings::default();
        let mut store = SepaStore::new();
        let r = Row::builder(5).coef(4, 1.0).rhs(1.0).build_shared().unwrap();
        let res = store.add_cut(r, false, &NodeInfo::root(), &lp, &mut NoConflictAnalysis, &settings);
        assert!(matches!(res, Err(SepaError::InvalidRow(_))));
        assert_eq!(store.stats().offered, 0);
    }

    #[test]
    fn test_remove_inefficacious_keeps_forced() {
        let lp = relax();
        let settings = SepaSettings::default();
        let node = NodeInfo::root();
        let mut store = SepaStore::new();
        let mut none = NoConflictAnalysis;

        // violated by (0.5, 0.5, 2.0)
        let violated = le(&[(0, 1.0), (1, 1.0)], 0.5);
        // satisfied
        let slack = le(&[(0, 1.0), (2, 1.0)], 5.0);
        let forced_slack = le(&[(1, 1.0), (2, 1.0)], 5.0);

        store.add_cut(violated.clone(), false, &node, &lp, &mut none, &settings).unwrap();
        store.add_cut(slack, false, &node, &lp, &mut none, &settings).unwrap();
        store.add_cut(forced_slack.clone(), true, &node, &lp, &mut none, &settings).unwrap();
        assert_eq!(store.len(), 3);

        let removed = store.remove_inefficacious(true, &lp, &settings);
        assert_eq!(removed, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.cuts()[0].id(), forced_slack.id());
        assert_eq!(store.cuts()[1].id(), violated.id());
        assert_eq!(lp.num_rows(), 0);
    }

    #[test]
    fn test_rollback_restores_store() {
        let lp = relax();
        let settings = SepaSettings::default();
        let node = NodeInfo::root();
        let mut store = SepaStore::new();
        let mut none = NoConflictAnalysis;

        let a = le(&[(0, 1.0), (1, 1.0)], 1.5);
        let f = le(&[(1, 1.0), (2, 1.0)], 2.0);
        store.add_cut(a.clone(), false, &node, &lp, &mut none, &settings).unwrap();
        store.add_cut(f.clone(), true, &node, &lp, &mut none, &settings).unwrap();
        let cp = store.checkpoint();

        store.add_cut(le(&[(0, 1.0), (2, 1.0)], 2.0), false, &node, &lp, &mut none, &settings).unwrap();
        store.add_cut(le(&[(0, 1.0), (2, 2.0)], 2.0), true, &node, &lp, &mut none, &settings).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.n_forced(), 2);

        store.rollback(&cp);
        assert_eq!(store.len(), 2);
        assert_eq!(store.n_forced(), 1);
        assert_eq!(store.cuts()[0].id(), f.id());
        assert_eq!(store.cuts()[1].id(), a.id());
        assert_eq!(store.stats().stored, 2);
    }

    #[test]
    fn test_cut_applicability() {
        let lp = relax();
        let tol = Tolerances::default();
        let bound = |col: usize, val: f64, rhs: f64| {
            Row::builder(3).coef(col, val).rhs(rhs).modifiable(true).build().unwrap()
        };

        // Multi-nonzero rows always apply
        let m = Row::builder(3)
            .coefs([(0, 1.0), (1, 1.0)])
            .rhs(5.0)
            .modifiable(true)
            .build()
            .unwrap();
        assert!(is_cut_applicable(&m, &lp, &tol));

        // Non-modifiable rows apply even when they tighten nothing
        assert!(is_cut_applicable(&le(&[(2, 1.0)], 10.0), &lp, &tol));
        assert!(is_cut_applicable(&le(&[(2, 1.0)], 4.0), &lp, &tol));

        // Modifiable bound changes: x2 <= 4 tightens ub 10, x2 <= 10 does not
        assert!(is_cut_applicable(&bound(2, 1.0, 4.0), &lp, &tol));
        assert!(!is_cut_applicable(&bound(2, 1.0, 10.0), &lp, &tol));

        // -x2 <= -1 (x2 >= 1) tightens lb 0; -x2 <= 0 does not
        assert!(is_cut_applicable(&bound(2, -1.0, -1.0), &lp, &tol));
        assert!(!is_cut_applicable(&bound(2, -1.0, 0.0), &lp, &tol));
    }
}
