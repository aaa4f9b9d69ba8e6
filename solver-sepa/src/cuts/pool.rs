//! Cut pool management.
//!
//! A pool keeps rows that were useful once so they can be separated again at
//! other nodes without regenerating them:
//! - Deduplicated storage (structural identity, lookup by sparsity pattern)
//! - Age tracking per entry
//! - Eviction of entries older than the age limit

use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::efficacy::{efficacy, is_efficacious};
use super::row::{Row, RowId, SharedRow};
use super::store::SepaStore;
use crate::conflict::ConflictAnalyzer;
use crate::error::{SepaError, SepaResult};
use crate::node::NodeInfo;
use crate::relax::Relaxation;
use crate::settings::{SepaSettings, Tolerances};
use crate::solution::Reference;

/// Outcome of a pool separation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolSeparation {
    /// The pool was empty; nothing to separate.
    DidNotRun,

    /// No pooled cut was efficacious.
    DidNotFind,

    /// At least one efficacious cut was staged.
    Separated,

    /// A staged cut is infeasible for the local bounds.
    Cutoff,
}

impl PoolSeparation {
    /// Whether cuts were staged.
    pub fn found_cuts(self) -> bool {
        matches!(self, PoolSeparation::Separated | PoolSeparation::Cutoff)
    }
}

/// A row with pool metadata.
#[derive(Debug, Clone)]
pub struct PooledCut {
    /// The pooled row.
    pub row: SharedRow,

    /// Consecutive passes in which the row was not efficacious.
    pub age: u32,

    /// Number of passes in which the row was staged.
    pub times_separated: usize,

    /// Pass number when the row was added.
    pub added_pass: usize,
}

/// Statistics for the cut pool.
#[derive(Debug, Default, Clone)]
pub struct CutPoolStats {
    /// Separation passes.
    pub calls: usize,

    /// Cuts staged by separation passes.
    pub cuts_found: usize,

    /// Total rows added.
    pub total_added: usize,

    /// Rows removed explicitly.
    pub total_removed: usize,

    /// Rows evicted by age.
    pub evicted: usize,

    /// Peak pool size.
    pub peak_size: usize,

    /// Time spent separating.
    pub time: Duration,
}

/// Pool of reusable cuts.
#[derive(Debug)]
pub struct CutPool {
    /// All cuts in the pool.
    cuts: Vec<PooledCut>,

    /// Positions in `cuts` per sparsity-pattern signature.
    signatures: HashMap<u64, Vec<usize>>,

    /// Entries with `age > age_limit` are evicted; negative disables eviction.
    age_limit: i32,

    /// Rows in this pool count as globally pooled.
    global: bool,

    /// Settings-independent tolerances used for dedup.
    tol: Tolerances,

    /// Separation passes so far.
    pass: usize,

    /// Statistics.
    stats: CutPoolStats,
}

impl CutPool {
    /// Create a new cut pool.
    pub fn new(age_limit: i32, global: bool, tol: Tolerances) -> Self {
        Self {
            cuts: Vec::new(),
            signatures: HashMap::new(),
            age_limit,
            global,
            tol,
            pass: 0,
            stats: CutPoolStats::default(),
        }
    }

    /// Whether no structurally identical row is in the pool.
    pub fn is_new(&self, row: &Row) -> bool {
        self.signatures.get(&row.signature()).map_or(true, |bucket| {
            !bucket
                .iter()
                .any(|&pos| self.cuts[pos].row.same_structure(row, &self.tol))
        })
    }

    /// Add a row unless an identical one is already pooled.
    ///
    /// Returns whether the row was added.
    pub fn add_row(&mut self, row: SharedRow) -> bool {
        if !self.is_new(&row) {
            log::trace!("row {} already pooled", row.id());
            return false;
        }
        self.add_new_row(row);
        true
    }

    /// Add a row without checking for duplicates.
    pub fn add_new_row(&mut self, row: SharedRow) {
        self.signatures
            .entry(row.signature())
            .or_default()
            .push(self.cuts.len());
        if self.global {
            row.mark_global_pool();
        }
        self.cuts.push(PooledCut {
            row,
            age: 0,
            times_separated: 0,
            added_pass: self.pass,
        });
        self.stats.total_added += 1;
        self.stats.peak_size = self.stats.peak_size.max(self.cuts.len());
    }

    /// Remove a row, releasing the pool's share of it.
    pub fn del_row(&mut self, row: &Row) -> SepaResult<()> {
        let pos = self
            .cuts
            .iter()
            .position(|c| c.row.id() == row.id())
            .ok_or(SepaError::RowNotInPool(row.id()))?;
        let sig = self.cuts[pos].row.signature();
        self.unindex(sig, pos);
        let last = self.cuts.len() - 1;
        let pooled = self.cuts.swap_remove(pos);
        if pos != last {
            // The former last entry moved into `pos`.
            let sig = self.cuts[pos].row.signature();
            if let Some(slot) = self
                .signatures
                .get_mut(&sig)
                .and_then(|bucket| bucket.iter_mut().find(|p| **p == last))
            {
                *slot = pos;
            }
        }
        self.unmark(&pooled.row);
        self.stats.total_removed += 1;
        Ok(())
    }

    /// Remove all rows.
    pub fn clear(&mut self) {
        for pooled in std::mem::take(&mut self.cuts) {
            if self.global {
                pooled.row.unmark_global_pool();
            }
        }
        self.signatures.clear();
    }

    /// Separate the pooled rows against a reference point.
    ///
    /// Efficacious rows that are not already in the LP are staged into
    /// `store` and their age is reset; the others age by one. Afterwards
    /// every entry older than the age limit is evicted.
    pub fn separate<R: Relaxation>(
        &mut self,
        relax: &R,
        reference: Reference<'_>,
        node: &NodeInfo,
        store: &mut SepaStore,
        conflict: &mut dyn ConflictAnalyzer,
        settings: &SepaSettings,
    ) -> SepaResult<PoolSeparation> {
        if !node.lp_processed {
            return Err(SepaError::InvalidCall(
                "cannot separate cut pool, node LP is not processed".to_string(),
            ));
        }
        if self.cuts.is_empty() {
            return Ok(PoolSeparation::DidNotRun);
        }

        let start = Instant::now();
        let x = reference.values(relax);
        let is_root = node.is_root();

        if let Some(c) = self.cuts.iter().find(|c| c.row.dim() > x.len()) {
            return Err(SepaError::InvalidCall(format!(
                "reference point has {} values, pooled row {} spans {} columns",
                x.len(),
                c.row.id(),
                c.row.dim()
            )));
        }
        if let Some(c) = self.cuts.iter().find(|c| c.row.dim() > relax.num_cols()) {
            return Err(SepaError::InvalidRow(format!(
                "pooled row {} spans {} columns, relaxation has {}",
                c.row.id(),
                c.row.dim(),
                relax.num_cols()
            )));
        }

        // Decide first, mutate after: a failing store leaves the pool as is.
        let efficacious: Vec<Option<bool>> = self
            .cuts
            .iter()
            .map(|c| {
                if relax.has_row(c.row.id()) {
                    None
                } else {
                    Some(is_efficacious(efficacy(&c.row, x, settings), is_root, settings))
                }
            })
            .collect();

        let checkpoint = store.checkpoint();
        let mut found = 0;
        let mut cutoff = false;
        for (pooled, eff) in self.cuts.iter().zip(&efficacious) {
            if *eff != Some(true) {
                continue;
            }
            match store.add_cut(pooled.row.clone(), false, node, relax, conflict, settings) {
                Ok(infeasible) => cutoff |= infeasible,
                Err(e) => {
                    store.rollback(&checkpoint);
                    return Err(e);
                }
            }
            found += 1;
        }

        for (pooled, eff) in self.cuts.iter_mut().zip(efficacious) {
            match eff {
                Some(true) => {
                    pooled.age = 0;
                    pooled.times_separated += 1;
                }
                Some(false) => pooled.age += 1,
                // Rows in the LP are in use.
                None => pooled.age = 0,
            }
        }

        let evicted = self.evict_aged();

        self.pass += 1;
        self.stats.calls += 1;
        self.stats.cuts_found += found;
        self.stats.time += start.elapsed();

        log::debug!(
            "cut pool pass {}: {} cuts found, {} evicted, {} remaining",
            self.pass,
            found,
            evicted,
            self.cuts.len()
        );

        Ok(if cutoff {
            PoolSeparation::Cutoff
        } else if found > 0 {
            PoolSeparation::Separated
        } else {
            PoolSeparation::DidNotFind
        })
    }

    fn is_aged(&self, age: u32) -> bool {
        self.age_limit >= 0 && age > self.age_limit as u32
    }

    fn evict_aged(&mut self) -> usize {
        let (keep, aged): (Vec<_>, Vec<_>) = std::mem::take(&mut self.cuts)
            .into_iter()
            .partition(|c| !self.is_aged(c.age));
        self.cuts = keep;
        if !aged.is_empty() {
            self.reindex();
        }
        for pooled in &aged {
            self.unmark(&pooled.row);
        }
        self.stats.evicted += aged.len();
        aged.len()
    }

    fn unindex(&mut self, sig: u64, pos: usize) {
        if let Some(bucket) = self.signatures.get_mut(&sig) {
            bucket.retain(|&p| p != pos);
            if bucket.is_empty() {
                self.signatures.remove(&sig);
            }
        }
    }

    fn reindex(&mut self) {
        self.signatures.clear();
        for (pos, pooled) in self.cuts.iter().enumerate() {
            self.signatures
                .entry(pooled.row.signature())
                .or_default()
                .push(pos);
        }
    }

    fn unmark(&self, row: &Row) {
        if self.global {
            row.unmark_global_pool();
        }
    }

    /// Pooled cuts.
    pub fn cuts(&self) -> &[PooledCut] {
        &self.cuts
    }

    /// Get a pooled cut by row id.
    pub fn get(&self, id: RowId) -> Option<&PooledCut> {
        self.cuts.iter().find(|c| c.row.id() == id)
    }

    /// Number of cuts in pool.
    pub fn len(&self) -> usize {
        self.cuts.len()
    }

    /// Check if pool is empty.
    pub fn is_empty(&self) -> bool {
        self.cuts.is_empty()
    }

    /// Age limit.
    pub fn age_limit(&self) -> i32 {
        self.age_limit
    }

    /// Whether this is a global pool.
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Get pool statistics.
    pub fn stats(&self) -> &CutPoolStats {
        &self.stats
    }
}

impl Drop for CutPool {
    fn drop(&mut self) {
        self.clear();
    }
}
