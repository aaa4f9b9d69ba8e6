//! Cut rows: immutable sparse coefficients plus mutable bookkeeping.

use std::cell::Cell;
use std::collections::hash_map::DefaultHasher;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use sprs::CsVec;

use crate::error::{SepaError, SepaResult};
use crate::settings::Tolerances;

/// Process-unique identifier of a row.
pub type RowId = u64;

/// A row shared between the separation store, cut pools and the relaxation.
pub type SharedRow = Rc<Row>;

static NEXT_ROW_ID: AtomicU64 = AtomicU64::new(0);

/// Producer of a row (for tracking and debugging).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CutSource {
    /// Generated by a separator.
    Separator {
        /// Index of the separator.
        index: usize,
    },

    /// Generated by a constraint handler.
    ConstraintHandler {
        /// Index of the constraint handler.
        index: usize,
    },

    /// User-provided row.
    #[default]
    User,
}

/// A linear row `lhs <= a^T x <= rhs`.
///
/// Coefficients are fixed once the row is built; only the pool membership
/// counter changes afterwards. Infinite sides are stored as `+-f64::INFINITY`.
pub struct Row {
    id: RowId,
    coefs: CsVec<f64>,
    lhs: f64,
    rhs: f64,
    local: bool,
    modifiable: bool,
    name: Option<String>,
    source: CutSource,

    // Norms cached at build time.
    sqr_norm: f64,
    sum_norm: f64,
    max_norm: f64,

    /// Number of global cut pools holding this row.
    n_global_pools: Cell<u32>,
}

impl Row {
    /// Start building a row over `dim` columns.
    pub fn builder(dim: usize) -> RowBuilder {
        RowBuilder::new(dim)
    }

    /// Unique id of this row.
    pub fn id(&self) -> RowId {
        self.id
    }

    /// Sparse coefficient vector.
    pub fn coefs(&self) -> &CsVec<f64> {
        &self.coefs
    }

    /// Column indices of the nonzeros (sorted).
    pub fn cols(&self) -> &[usize] {
        self.coefs.indices()
    }

    /// Coefficient values, parallel to [`Row::cols`].
    pub fn vals(&self) -> &[f64] {
        self.coefs.data()
    }

    /// Number of stored nonzeros.
    pub fn nnz(&self) -> usize {
        self.coefs.nnz()
    }

    /// Number of columns the row is defined over.
    pub fn dim(&self) -> usize {
        self.coefs.dim()
    }

    /// Left-hand side (may be `-inf`).
    pub fn lhs(&self) -> f64 {
        self.lhs
    }

    /// Right-hand side (may be `+inf`).
    pub fn rhs(&self) -> f64 {
        self.rhs
    }

    /// Row is only valid in the current subtree.
    pub fn is_local(&self) -> bool {
        self.local
    }

    /// Row may gain coefficients when columns are added later.
    pub fn is_modifiable(&self) -> bool {
        self.modifiable
    }

    /// Optional name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Producer of this row.
    pub fn source(&self) -> CutSource {
        self.source
    }

    /// Squared Euclidean norm of the coefficients.
    pub fn sqr_norm(&self) -> f64 {
        self.sqr_norm
    }

    /// Euclidean norm of the coefficients.
    pub fn norm(&self) -> f64 {
        self.sqr_norm.sqrt()
    }

    /// Sum of absolute coefficients.
    pub fn sum_norm(&self) -> f64 {
        self.sum_norm
    }

    /// Largest absolute coefficient.
    pub fn max_norm(&self) -> f64 {
        self.max_norm
    }

    /// Row is stored in at least one global cut pool.
    pub fn in_global_pool(&self) -> bool {
        self.n_global_pools.get() > 0
    }

    pub(crate) fn mark_global_pool(&self) {
        self.n_global_pools.set(self.n_global_pools.get() + 1);
    }

    pub(crate) fn unmark_global_pool(&self) {
        let n = self.n_global_pools.get();
        debug_assert!(n > 0, "row {} was not in a global pool", self.id);
        self.n_global_pools.set(n.saturating_sub(1));
    }

    /// Activity `a^T x` for a dense point `x`.
    pub fn activity(&self, x: &[f64]) -> f64 {
        self.coefs.iter().map(|(j, &a)| a * x[j]).sum()
    }

    /// Dot product with another row's coefficients.
    pub fn dot(&self, other: &Row) -> f64 {
        let (ai, av) = (self.cols(), self.vals());
        let (bi, bv) = (other.cols(), other.vals());
        let (mut p, mut q) = (0, 0);
        let mut sum = 0.0;
        while p < ai.len() && q < bi.len() {
            match ai[p].cmp(&bi[q]) {
                std::cmp::Ordering::Less => p += 1,
                std::cmp::Ordering::Greater => q += 1,
                std::cmp::Ordering::Equal => {
                    sum += av[p] * bv[q];
                    p += 1;
                    q += 1;
                }
            }
        }
        sum
    }

    /// Cosine of the angle between the coefficient vectors (absolute value).
    pub fn parallelism(&self, other: &Row) -> f64 {
        let prod = self.sqr_norm * other.sqr_norm;
        if prod <= 0.0 {
            return 0.0;
        }
        (self.dot(other) / prod.sqrt()).abs().min(1.0)
    }

    /// Hash of the sparsity pattern, used as dedup lookup key.
    pub fn signature(&self) -> u64 {
        let mut h = DefaultHasher::new();
        self.nnz().hash(&mut h);
        self.cols().hash(&mut h);
        h.finish()
    }

    /// Structural identity: same pattern, same coefficients and sides after
    /// scaling both rows by their largest absolute coefficient.
    pub fn same_structure(&self, other: &Row, tol: &Tolerances) -> bool {
        if self.id == other.id {
            return true;
        }
        if self.cols() != other.cols() {
            return false;
        }
        let (sa, sb) = (self.max_norm, other.max_norm);
        if sa <= 0.0 || sb <= 0.0 {
            return sa <= 0.0 && sb <= 0.0;
        }
        let coefs_equal = self
            .vals()
            .iter()
            .zip(other.vals())
            .all(|(a, b)| tol.is_eq(a / sa, b / sb));
        coefs_equal
            && tol.is_eq(self.lhs / sa, other.lhs / sb)
            && tol.is_eq(self.rhs / sa, other.rhs / sb)
    }

    /// Validity check on a point: both sides hold within `feastol`.
    pub fn is_satisfied(&self, x: &[f64], tol: &Tolerances) -> bool {
        let act = self.activity(x);
        tol.feas_ge(act, self.lhs) && tol.feas_le(act, self.rhs)
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("lhs", &self.lhs)
            .field("rhs", &self.rhs)
            .field("cols", &self.cols())
            .field("vals", &self.vals())
            .field("local", &self.local)
            .finish()
    }
}

/// Builder collecting coefficients before a row is finalized.
#[derive(Debug, Clone)]
pub struct RowBuilder {
    dim: usize,
    entries: BTreeMap<usize, f64>,
    lhs: f64,
    rhs: f64,
    local: bool,
    modifiable: bool,
    name: Option<String>,
    source: CutSource,
}

impl RowBuilder {
    /// New builder for a free row over `dim` columns.
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            entries: BTreeMap::new(),
            lhs: f64::NEG_INFINITY,
            rhs: f64::INFINITY,
            local: false,
            modifiable: false,
            name: None,
            source: CutSource::default(),
        }
    }

    /// Add `val` to the coefficient of column `col`.
    pub fn coef(mut self, col: usize, val: f64) -> Self {
        *self.entries.entry(col).or_insert(0.0) += val;
        self
    }

    /// Add several coefficients.
    pub fn coefs(mut self, entries: impl IntoIterator<Item = (usize, f64)>) -> Self {
        for (col, val) in entries {
            *self.entries.entry(col).or_insert(0.0) += val;
        }
        self
    }

    /// Set the left-hand side.
    pub fn lhs(mut self, lhs: f64) -> Self {
        self.lhs = lhs;
        self
    }

    /// Set the right-hand side.
    pub fn rhs(mut self, rhs: f64) -> Self {
        self.rhs = rhs;
        self
    }

    /// Mark the row as valid only in the current subtree.
    pub fn local(mut self, local: bool) -> Self {
        self.local = local;
        self
    }

    /// Mark the row as modifiable.
    pub fn modifiable(mut self, modifiable: bool) -> Self {
        self.modifiable = modifiable;
        self
    }

    /// Set a debug name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the producer.
    pub fn source(mut self, source: CutSource) -> Self {
        self.source = source;
        self
    }

    /// Finalize the row.
    pub fn build(self) -> SepaResult<Row> {
        if self.lhs.is_nan() || self.rhs.is_nan() {
            return Err(SepaError::InvalidRow("NaN side".to_string()));
        }
        if !self.lhs.is_finite() && !self.rhs.is_finite() {
            return Err(SepaError::InvalidRow(
                "at least one side must be finite".to_string(),
            ));
        }
        if self.lhs == f64::INFINITY || self.rhs == f64::NEG_INFINITY || self.lhs > self.rhs {
            return Err(SepaError::InvalidRow(format!(
                "inconsistent sides [{}, {}]",
                self.lhs, self.rhs
            )));
        }

        let mut indices = Vec::with_capacity(self.entries.len());
        let mut data = Vec::with_capacity(self.entries.len());
        for (col, val) in self.entries {
            if col >= self.dim {
                return Err(SepaError::InvalidRow(format!(
                    "column {} out of range (dim {})",
                    col, self.dim
                )));
            }
            if !val.is_finite() {
                return Err(SepaError::InvalidRow(format!(
                    "non-finite coefficient for column {}",
                    col
                )));
            }
            if val != 0.0 {
                indices.push(col);
                data.push(val);
            }
        }
        if data.is_empty() {
            return Err(SepaError::InvalidRow("row has no nonzeros".to_string()));
        }

        let sqr_norm = data.iter().map(|v| v * v).sum();
        let sum_norm = data.iter().map(|v| v.abs()).sum();
        let max_norm = data.iter().map(|v| v.abs()).fold(0.0_f64, f64::max);

        Ok(Row {
            id: NEXT_ROW_ID.fetch_add(1, Ordering::Relaxed),
            coefs: CsVec::new(self.dim, indices, data),
            lhs: self.lhs,
            rhs: self.rhs,
            local: self.local,
            modifiable: self.modifiable,
            name: self.name,
            source: self.source,
            sqr_norm,
            sum_norm,
            max_norm,
            n_global_pools: Cell::new(0),
        })
    }

    /// Finalize the row into a shared handle.
    pub fn build_shared(self) -> SepaResult<SharedRow> {
        self.build().map(Rc::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(entries: &[(usize, f64)], lhs: f64, rhs: f64) -> Row {
        Row::builder(4)
            .coefs(entries.iter().copied())
            .lhs(lhs)
            .rhs(rhs)
            .build()
            .unwrap()
    }

    #[test]
    fn test_build_sorts_and_merges() {
        let r = Row::builder(5)
            .coef(3, 1.0)
            .coef(0, 2.0)
            .coef(3, 1.5)
            .coef(4, 0.0)
            .rhs(1.0)
            .build()
            .unwrap();
        assert_eq!(r.cols(), &[0, 3]);
        assert_eq!(r.vals(), &[2.0, 2.5]);
        assert_eq!(r.nnz(), 2);
        assert!((r.sqr_norm() - 10.25).abs() < 1e-12);
        assert!((r.sum_norm() - 4.5).abs() < 1e-12);
        assert!((r.max_norm() - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_build_rejects_invalid() {
        assert!(Row::builder(2).coef(0, 1.0).build().is_err()); // free row
        assert!(Row::builder(2).rhs(1.0).build().is_err()); // empty
        assert!(Row::builder(2).coef(0, 1.0).coef(0, -1.0).rhs(1.0).build().is_err());
        assert!(Row::builder(2).coef(2, 1.0).rhs(1.0).build().is_err());
        assert!(Row::builder(2).coef(0, f64::NAN).rhs(1.0).build().is_err());
        assert!(Row::builder(2).coef(0, 1.0).lhs(2.0).rhs(1.0).build().is_err());
    }

    #[test]
    fn test_ids_unique() {
        let a = row(&[(0, 1.0)], 0.0, 1.0);
        let b = row(&[(0, 1.0)], 0.0, 1.0);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_activity_and_dot() {
        let a = row(&[(0, 1.0), (2, 2.0)], f64::NEG_INFINITY, 3.0);
        let b = row(&[(1, 5.0), (2, 1.0)], f64::NEG_INFINITY, 3.0);
        assert_eq!(a.activity(&[1.0, 9.0, 0.5, 0.0]), 2.0);
        assert_eq!(a.dot(&b), 2.0);
        assert!((a.parallelism(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_same_structure_up_to_scaling() {
        let tol = Tolerances::default();
        let a = row(&[(0, 1.0), (1, 2.0)], f64::NEG_INFINITY, 3.0);
        let b = row(&[(0, 2.0), (1, 4.0)], f64::NEG_INFINITY, 6.0);
        let c = row(&[(0, 1.0), (1, 2.0)], f64::NEG_INFINITY, 4.0);
        let d = row(&[(0, 1.0), (2, 2.0)], f64::NEG_INFINITY, 3.0);

        assert!(a.same_structure(&b, &tol));
        assert!(!a.same_structure(&c, &tol));
        assert!(!a.same_structure(&d, &tol));
        assert_eq!(a.signature(), b.signature());
        assert_ne!(a.signature(), d.signature());
    }

    #[test]
    fn test_global_pool_counter() {
        let r = row(&[(0, 1.0)], 0.0, 1.0);
        assert!(!r.in_global_pool());
        r.mark_global_pool();
        r.mark_global_pool();
        r.unmark_global_pool();
        assert!(r.in_global_pool());
        r.unmark_global_pool();
        assert!(!r.in_global_pool());
    }
}
