//! Cut scoring.
//!
//! Every score is "higher is better". The weighted scores combine integer
//! support, objective parallelism, efficacy and the directed cutoff distance
//! towards the incumbent; the lookahead scores re-solve the relaxation inside a
//! dive.

use std::time::{Duration, Instant};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::efficacy::{efficacy, relative_violation, violation};
use super::row::{Row, SharedRow};
use crate::error::SepaResult;
use crate::relax::{DiveGuard, LpStatus, Relaxation};
use crate::settings::{ScoreWeights, SepaSettings};
use crate::solution::Solution;

/// Score function used to rank cuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScorePolicy {
    /// Fixed-weight hybrid score with directed cutoff distance.
    #[default]
    Default,

    /// Fixed-weight hybrid score, cutoff weight folded into efficacy.
    DefaultWithoutDirectedCutoff,

    /// Hybrid score with weights from the settings.
    ScipStyle,

    /// Efficacy at the relaxation optimum.
    Efficacy,

    /// Raw violation at the relaxation optimum.
    Violation,

    /// Violation relative to the row sides.
    RelativeViolation,

    /// Objective parallelism.
    ObjParallelism,

    /// Fraction of integer columns in the support.
    IntSupport,

    /// Sparsity of the row.
    Support,

    /// Squared objective norm times parallelism times efficacy.
    ExpectedImprovement,

    /// Directed cutoff distance towards the incumbent.
    DirectedCutoffDistance,

    /// Objective change of a trial solve with the cut added.
    Lookahead,
}

impl ScorePolicy {
    /// Whether the policy solves the relaxation.
    pub fn needs_dive(self) -> bool {
        matches!(self, ScorePolicy::Lookahead)
    }
}

/// `|a . c| / (||a|| ||c||)`, zero for a zero objective.
pub fn obj_parallelism<R: Relaxation>(cut: &Row, relax: &R) -> f64 {
    let obj = relax.objective_coefs();
    let prod = cut.sqr_norm() * relax.objective_sqr_norm();
    if prod <= 0.0 {
        return 0.0;
    }
    let dot: f64 = cut.coefs().iter().map(|(j, &a)| a * obj[j]).sum();
    dot.abs() / prod.sqrt()
}

/// Fraction of the row's nonzeros on integer columns.
pub fn int_support<R: Relaxation>(cut: &Row, relax: &R) -> f64 {
    assert!(cut.nnz() > 0, "row {} has no nonzeros", cut.id());
    let n_int = cut.cols().iter().filter(|&&j| relax.is_integral(j)).count();
    n_int as f64 / cut.nnz() as f64
}

/// `1 - nnz / num_cols`; dense rows score low.
pub fn support_score<R: Relaxation>(cut: &Row, relax: &R) -> f64 {
    assert!(cut.nnz() > 0, "row {} has no nonzeros", cut.id());
    assert!(relax.num_cols() > 0, "relaxation has no columns");
    1.0 - cut.nnz() as f64 / relax.num_cols() as f64
}

/// Distance from the relaxation optimum to the cut hyperplane along the
/// direction towards `sol`; `-1` without a solution.
///
/// Falls back to efficacy when the direction is (nearly) parallel to the
/// hyperplane, and when `sol` does not cover every column of the relaxation.
pub fn directed_cutoff_distance<R: Relaxation>(
    cut: &Row,
    relax: &R,
    sol: Option<&Solution>,
    settings: &SepaSettings,
) -> f64 {
    let Some(sol) = sol else {
        return -1.0;
    };
    let tol = &settings.tolerances;
    let x = relax.primal_values();

    let eff = efficacy(cut, x, settings);
    if sol.values().len() != x.len() {
        log::warn!(
            "solution has {} values for {} columns, no cutoff direction",
            sol.values().len(),
            x.len()
        );
        return eff;
    }
    let dir_norm = x
        .iter()
        .zip(sol.values())
        .map(|(lp, s)| (s - lp) * (s - lp))
        .sum::<f64>()
        .sqrt();
    if tol.is_zero(dir_norm) {
        return eff;
    }

    let dir_prod = cut
        .coefs()
        .iter()
        .map(|(j, &a)| a * (sol.value(j) - x[j]))
        .sum::<f64>()
        .abs()
        / dir_norm;
    if tol.is_sum_zero(dir_prod) {
        eff
    } else {
        violation(cut, x, tol) / dir_prod
    }
}

/// Directed cutoff distance adjusted for locality.
///
/// Without a solution and for local cuts this is the efficacy; for global
/// cuts the larger of raw distance and efficacy.
pub fn adjusted_directed_cutoff_distance<R: Relaxation>(
    cut: &Row,
    relax: &R,
    sol: Option<&Solution>,
    settings: &SepaSettings,
) -> f64 {
    let eff = efficacy(cut, relax.primal_values(), settings);
    match sol {
        Some(_) if !cut.is_local() => directed_cutoff_distance(cut, relax, sol, settings).max(eff),
        _ => eff,
    }
}

/// `||c||^2 * obj_parallelism * efficacy`.
pub fn expected_improvement<R: Relaxation>(cut: &Row, relax: &R, settings: &SepaSettings) -> f64 {
    relax.objective_sqr_norm()
        * obj_parallelism(cut, relax)
        * efficacy(cut, relax.primal_values(), settings)
}

/// Statistics for a scorer.
#[derive(Debug, Default, Clone)]
pub struct ScoreStats {
    /// Scores computed.
    pub scored: usize,

    /// Trial solves done for lookahead.
    pub lookahead_calls: usize,

    /// Time spent in trial solves.
    pub lookahead_time: Duration,
}

/// Scoring state: the jitter RNG and statistics.
#[derive(Debug, Clone)]
pub struct Scorer {
    rng: Option<ChaCha8Rng>,
    stats: ScoreStats,
}

impl Scorer {
    /// Create a scorer; jitter is only added with a seed.
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seed.map(ChaCha8Rng::seed_from_u64),
            stats: ScoreStats::default(),
        }
    }

    /// Scorer seeded from `settings.random_seed`.
    pub fn from_settings(settings: &SepaSettings) -> Self {
        Self::new(settings.random_seed)
    }

    /// Whether jitter is added to the hybrid scores.
    pub fn has_rng(&self) -> bool {
        self.rng.is_some()
    }

    /// Scoring statistics.
    pub fn stats(&self) -> &ScoreStats {
        &self.stats
    }

    /// Hybrid score with the fixed default weights.
    pub fn default_score<R: Relaxation>(
        &mut self,
        cut: &Row,
        relax: &R,
        incumbent: Option<&Solution>,
        settings: &SepaSettings,
    ) -> f64 {
        self.hybrid(cut, relax, incumbent, settings, &ScoreWeights::FIXED, true)
    }

    /// Hybrid score with the fixed default weights and no cutoff term.
    pub fn default_score_without_directed_cutoff<R: Relaxation>(
        &mut self,
        cut: &Row,
        relax: &R,
        settings: &SepaSettings,
    ) -> f64 {
        let fixed = ScoreWeights::FIXED;
        let weights = ScoreWeights {
            efficacy: fixed.efficacy + fixed.dir_cutoff_dist,
            dir_cutoff_dist: 0.0,
            ..fixed
        };
        self.hybrid(cut, relax, None, settings, &weights, false)
    }

    /// Hybrid score with `settings.score_weights`.
    pub fn scip_style_score<R: Relaxation>(
        &mut self,
        cut: &Row,
        relax: &R,
        incumbent: Option<&Solution>,
        settings: &SepaSettings,
    ) -> f64 {
        self.hybrid(cut, relax, incumbent, settings, &settings.score_weights, true)
    }

    fn hybrid<R: Relaxation>(
        &mut self,
        cut: &Row,
        relax: &R,
        incumbent: Option<&Solution>,
        settings: &SepaSettings,
        w: &ScoreWeights,
        with_cutoff: bool,
    ) -> f64 {
        let mut score = w.int_support * int_support(cut, relax)
            + w.obj_parallelism * obj_parallelism(cut, relax)
            + w.efficacy * efficacy(cut, relax.primal_values(), settings);
        if with_cutoff {
            score += w.dir_cutoff_dist
                * adjusted_directed_cutoff_distance(cut, relax, incumbent, settings);
        }
        if cut.in_global_pool() {
            score += settings.pool_bonus;
        }
        if let Some(rng) = self.rng.as_mut() {
            score += rng.gen::<f64>() * settings.jitter;
        }
        self.stats.scored += 1;
        score
    }

    /// Objective value after adding `cut` and re-solving inside a dive.
    ///
    /// `+inf` if the trial solve fails or is not optimal. The relaxation is
    /// restored in every case; only entering the dive and adding the row
    /// can fail.
    pub fn lookahead_objective<R: Relaxation>(
        &mut self,
        cut: &SharedRow,
        relax: &mut R,
    ) -> SepaResult<f64> {
        let start = Instant::now();
        let mut dive = DiveGuard::enter(relax)?;
        dive.add_row(cut.clone())?;
        let obj = match dive.solve() {
            Ok(LpStatus::Optimal) => dive.objective_value(),
            Ok(status) => {
                log::trace!("lookahead for row {} ended {:?}", cut.id(), status);
                f64::INFINITY
            }
            Err(e) => {
                log::debug!("lookahead solve for row {} failed: {}", cut.id(), e);
                f64::INFINITY
            }
        };
        drop(dive);

        self.stats.lookahead_calls += 1;
        self.stats.lookahead_time += start.elapsed();
        Ok(obj)
    }

    /// Objective change caused by `cut`; `-1` if the trial solve gives no
    /// finite objective.
    pub fn lookahead_score<R: Relaxation>(
        &mut self,
        cut: &SharedRow,
        relax: &mut R,
        settings: &SepaSettings,
    ) -> SepaResult<f64> {
        let tol = &settings.tolerances;
        let old = relax.objective_value();
        let new = self.lookahead_objective(cut, relax)?;
        if tol.is_infinity(new.abs()) {
            return Ok(-1.0);
        }
        let delta = (new - old).abs();
        if tol.is_zero(old) {
            Ok(delta)
        } else {
            Ok(delta.min(delta / old.abs()))
        }
    }

    /// Score `cut` with `policy`.
    pub fn score<R: Relaxation>(
        &mut self,
        policy: ScorePolicy,
        cut: &SharedRow,
        relax: &mut R,
        incumbent: Option<&Solution>,
        settings: &SepaSettings,
    ) -> SepaResult<f64> {
        let tol = &settings.tolerances;
        let lp: &R = relax;
        let score = match policy {
            ScorePolicy::Default => self.default_score(cut, lp, incumbent, settings),
            ScorePolicy::DefaultWithoutDirectedCutoff => {
                self.default_score_without_directed_cutoff(cut, lp, settings)
            }
            ScorePolicy::ScipStyle => self.scip_style_score(cut, lp, incumbent, settings),
            ScorePolicy::Efficacy => efficacy(cut, lp.primal_values(), settings),
            ScorePolicy::Violation => violation(cut, lp.primal_values(), tol),
            ScorePolicy::RelativeViolation => relative_violation(cut, lp.primal_values(), tol),
            ScorePolicy::ObjParallelism => obj_parallelism(cut, lp),
            ScorePolicy::IntSupport => int_support(cut, lp),
            ScorePolicy::Support => support_score(cut, lp),
            ScorePolicy::ExpectedImprovement => expected_improvement(cut, lp, settings),
            ScorePolicy::DirectedCutoffDistance => {
                directed_cutoff_distance(cut, lp, incumbent, settings)
            }
            ScorePolicy::Lookahead => return self.lookahead_score(cut, relax, settings),
        };
        Ok(score)
    }
}

impl Default for Scorer {
    fn default() -> Self {
        Self::new(None)
    }
}
