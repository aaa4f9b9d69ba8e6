//! Cut selection and cut pool management for branch-and-cut.
//!
//! This crate sits between the separators of a mixed-integer solver and its
//! LP relaxation. Candidate cuts are staged in a [`SepaStore`], scored,
//! filtered and added to the relaxation. Globally useful cuts are kept in
//! age-limited [`CutPool`]s and separated again at later nodes. Cuts that
//! prove local infeasibility can trigger conflict analysis.
//!
//! The LP solver, the search tree and the separators themselves are
//! external; they are reached through the [`Relaxation`],
//! [`ConflictAnalyzer`] and [`Separator`] traits.
//!
//! # Example
//!
//! ```
//! use solver_sepa::{Column, MemoryRelaxation, NodeContext, NodeInfo, Row, Separation, SepaSettings};
//!
//! let mut lp = MemoryRelaxation::new(vec![Column::binary(-1.0), Column::binary(-1.0)]);
//! lp.set_solution(vec![0.5, 0.5], -1.0).unwrap();
//!
//! let mut sepa = Separation::new(SepaSettings::default()).unwrap();
//! let mut ctx = NodeContext::new(&mut lp, NodeInfo::root().with_lp_processed());
//!
//! let cut = Row::builder(2).coef(0, 1.0).coef(1, 1.0).rhs(0.5).build_shared().unwrap();
//! sepa.add_row(&mut ctx, cut, false).unwrap();
//! assert_eq!(sepa.n_cuts(), 1);
//! ```

#![warn(missing_docs)]

pub mod conflict;
pub mod cuts;
pub mod error;
pub mod node;
pub mod numerics;
pub mod relax;
pub mod sepa;
pub mod settings;
pub mod solution;

pub use conflict::{BoundSide, ConflictAnalyzer, ConflictKind, ConflictRecorder, NoConflictAnalysis};
pub use cuts::{
    CutPool, CutSource, PoolSeparation, PooledCut, Row, RowBuilder, RowId, ScorePolicy, Scorer,
    SepaStore, SharedRow,
};
pub use error::{SepaError, SepaResult};
pub use node::NodeInfo;
pub use relax::{Column, DiveGuard, LpStatus, MemoryRelaxation, Relaxation};
pub use sepa::{NodeContext, RoundOutcome, SepaRound, Separation, Separator, SeparatorResult};
pub use settings::{EfficacyNorm, ScoreWeights, SepaSettings, Tolerances};
pub use solution::{IncumbentTracker, Reference, Solution};
