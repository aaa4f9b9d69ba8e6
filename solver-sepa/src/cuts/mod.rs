//! Cuts and their management.
//!
//! This module provides everything between a separator proposing a row and
//! the row entering the relaxation:
//! - Row representation with cached norms
//! - Efficacy and violation measures
//! - Per-round separation storage
//! - Persistent, age-limited cut pools
//! - Scoring and selection

pub mod efficacy;
pub mod pool;
pub mod row;
pub mod score;
pub mod select;
pub mod store;

pub use efficacy::{efficacy, is_efficacious, relative_violation, violation};
pub use pool::{CutPool, CutPoolStats, PoolSeparation, PooledCut};
pub use row::{CutSource, Row, RowBuilder, RowId, SharedRow};
pub use score::{ScorePolicy, ScoreStats, Scorer};
pub use select::{apply_cuts, select_cuts, ScoredCut};
pub use store::{is_cut_applicable, SepaStore, StoreCheckpoint, StoreStats};
