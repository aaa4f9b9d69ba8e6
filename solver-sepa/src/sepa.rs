//! Separation controller.
//!
//! [`Separation`] owns everything that lives across nodes: the three
//! separation stores, the three cut pools, the scorer and the settings.
//! Everything that belongs to the node being processed (the relaxation, the
//! incumbent, the conflict analyzer) is borrowed per call through a
//! [`NodeContext`].

use crate::conflict::{ConflictAnalyzer, NoConflictAnalysis};
use crate::cuts::{
    apply_cuts, efficacy, relative_violation, score, select_cuts, CutPool, CutSource,
    PoolSeparation, PooledCut, Row, ScorePolicy, Scorer, SepaStore, SharedRow,
};
use crate::error::{SepaError, SepaResult};
use crate::node::NodeInfo;
use crate::relax::{LpStatus, Relaxation};
use crate::settings::SepaSettings;
use crate::solution::{Reference, Solution};

/// Collaborators of the node being processed.
pub struct NodeContext<'a, R: Relaxation> {
    /// Relaxation of the node.
    pub relax: &'a mut R,

    /// The node.
    pub node: NodeInfo,

    /// Best known solution, if any.
    pub incumbent: Option<&'a Solution>,

    conflict: Option<&'a mut dyn ConflictAnalyzer>,
    no_conflict: NoConflictAnalysis,
}

impl<'a, R: Relaxation> NodeContext<'a, R> {
    /// Context without incumbent and without conflict analysis.
    pub fn new(relax: &'a mut R, node: NodeInfo) -> Self {
        Self {
            relax,
            node,
            incumbent: None,
            conflict: None,
            no_conflict: NoConflictAnalysis,
        }
    }

    /// Set the incumbent.
    pub fn with_incumbent(mut self, incumbent: Option<&'a Solution>) -> Self {
        self.incumbent = incumbent;
        self
    }

    /// Set the conflict analyzer.
    pub fn with_conflict(mut self, conflict: &'a mut dyn ConflictAnalyzer) -> Self {
        self.conflict = Some(conflict);
        self
    }

    fn parts(&mut self) -> (&mut R, &mut dyn ConflictAnalyzer) {
        let conflict: &mut dyn ConflictAnalyzer = match &mut self.conflict {
            Some(c) => &mut **c,
            None => &mut self.no_conflict,
        };
        (&mut *self.relax, conflict)
    }
}

/// Result of a single separator call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeparatorResult {
    /// Cuts were staged.
    Separated,

    /// Nothing violated was found.
    DidNotFind,

    /// The separator decided not to run.
    DidNotRun,

    /// The separator wants to be called again in a delayed round.
    Delayed,

    /// The node was proven infeasible.
    Cutoff,
}

/// A routine proposing cuts for the current relaxation.
pub trait Separator<R: Relaxation> {
    /// Name for logging.
    fn name(&self) -> &str;

    /// Separators run in decreasing priority.
    fn priority(&self) -> i32 {
        0
    }

    /// Only called in delayed rounds.
    fn is_delayed(&self) -> bool {
        false
    }

    /// Produces only local cuts; skipped when local cuts are not allowed.
    fn is_local_only(&self) -> bool {
        false
    }

    /// Propose cuts through `round`.
    fn separate(&mut self, round: &mut SepaRound<'_, R>) -> SepaResult<SeparatorResult>;
}

/// Handle passed to a separator during a separation round.
pub struct SepaRound<'a, R: Relaxation> {
    relax: &'a R,
    node: NodeInfo,
    incumbent: Option<&'a Solution>,
    store: &'a mut SepaStore,
    pool: &'a CutPool,
    conflict: &'a mut dyn ConflictAnalyzer,
    settings: &'a SepaSettings,
    is_root: bool,
    allow_local: bool,
    source: CutSource,
    n_added: usize,
    cutoff: bool,
}

impl<'a, R: Relaxation> SepaRound<'a, R> {
    /// The relaxation being separated.
    pub fn relaxation(&self) -> &R {
        self.relax
    }

    /// Relaxation optimum.
    pub fn primal_values(&self) -> &[f64] {
        self.relax.primal_values()
    }

    /// The node being processed.
    pub fn node(&self) -> &NodeInfo {
        &self.node
    }

    /// Best known solution, if any.
    pub fn incumbent(&self) -> Option<&Solution> {
        self.incumbent
    }

    /// Whether root thresholds apply.
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    /// Whether local cuts are accepted.
    pub fn allow_local(&self) -> bool {
        self.allow_local
    }

    /// Source tag for rows built by the current separator.
    pub fn source(&self) -> CutSource {
        self.source
    }

    /// Settings in effect.
    pub fn settings(&self) -> &SepaSettings {
        self.settings
    }

    /// Whether `row` is efficacious at the relaxation optimum.
    pub fn is_efficacious(&self, row: &Row) -> bool {
        crate::cuts::efficacy::is_cut_efficacious(
            row,
            self.relax.primal_values(),
            self.is_root,
            self.settings,
        )
    }

    /// Whether `row` is neither staged nor in the global pool.
    pub fn is_cut_new(&self, row: &Row) -> bool {
        !self.store.contains(row, &self.settings.tolerances) && self.pool.is_new(row)
    }

    /// Stage a cut; returns whether it is infeasible for the local bounds.
    pub fn add_cut(&mut self, row: SharedRow, forced: bool) -> SepaResult<bool> {
        if row.is_local() && !self.allow_local {
            return Err(SepaError::InvalidCall(
                "local cuts are not allowed in this round".to_string(),
            ));
        }
        let before = self.store.len();
        let infeasible =
            self.store
                .add_cut(row, forced, &self.node, self.relax, &mut *self.conflict, self.settings)?;
        self.n_added += self.store.len() - before;
        self.cutoff |= infeasible;
        Ok(infeasible)
    }

    /// Cuts staged by the current separator.
    pub fn n_added(&self) -> usize {
        self.n_added
    }
}

/// Outcome of a separation round.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RoundOutcome {
    /// A delayed separator was skipped.
    pub delayed: bool,

    /// The node was proven infeasible.
    pub cutoff: bool,

    /// Cuts staged in the round.
    pub n_cuts: usize,
}

/// Statistics of the separation controller.
#[derive(Debug, Default, Clone)]
pub struct SepaStats {
    /// Separation rounds run.
    pub rounds: usize,

    /// Separator calls.
    pub separator_calls: usize,

    /// Rounds that ended in a cutoff.
    pub cutoffs: usize,

    /// Pool separation passes.
    pub pool_passes: usize,

    /// Cuts added to the relaxation.
    pub cuts_applied: usize,
}

/// Cut storage, pools and scoring for one solve.
#[derive(Debug)]
pub struct Separation {
    settings: SepaSettings,
    store: SepaStore,
    opt_store: SepaStore,
    delayed_store: SepaStore,
    pool: CutPool,
    delayed_pool: CutPool,
    opt_pool: CutPool,
    scorer: Scorer,
    stats: SepaStats,
}

impl Separation {
    /// Create the controller; settings are validated once here.
    pub fn new(settings: SepaSettings) -> SepaResult<Self> {
        settings.validate()?;
        let tol = settings.tolerances;
        Ok(Self {
            store: SepaStore::new(),
            opt_store: SepaStore::new(),
            delayed_store: SepaStore::new(),
            pool: CutPool::new(settings.pool_age_limit, true, tol),
            delayed_pool: CutPool::new(settings.delayed_pool_age_limit, false, tol),
            opt_pool: CutPool::new(settings.opt_pool_age_limit, false, tol),
            scorer: Scorer::from_settings(&settings),
            stats: SepaStats::default(),
            settings,
        })
    }

    /// Settings in effect.
    pub fn settings(&self) -> &SepaSettings {
        &self.settings
    }

    /// Controller statistics.
    pub fn stats(&self) -> &SepaStats {
        &self.stats
    }

    /// The scorer.
    pub fn scorer(&self) -> &Scorer {
        &self.scorer
    }

    // === Stores ===

    /// Stage a cut in the main store; returns whether it is infeasible.
    pub fn add_row<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
        row: SharedRow,
        forced: bool,
    ) -> SepaResult<bool> {
        let node = ctx.node;
        let (relax, conflict) = ctx.parts();
        self.store.add_cut(row, forced, &node, &*relax, conflict, &self.settings)
    }

    /// Stage a cut in the opt store.
    pub fn add_opt_row<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
        row: SharedRow,
        forced: bool,
    ) -> SepaResult<bool> {
        let node = ctx.node;
        let (relax, conflict) = ctx.parts();
        self.opt_store.add_cut(row, forced, &node, &*relax, conflict, &self.settings)
    }

    /// Stage a cut in the delayed store.
    pub fn add_delayed_row<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
        row: SharedRow,
        forced: bool,
    ) -> SepaResult<bool> {
        let node = ctx.node;
        let (relax, conflict) = ctx.parts();
        self.delayed_store.add_cut(row, forced, &node, &*relax, conflict, &self.settings)
    }

    /// Cuts staged in the main store, forced first.
    pub fn cuts(&self) -> &[SharedRow] {
        self.store.cuts()
    }

    /// Number of cuts in the main store.
    pub fn n_cuts(&self) -> usize {
        self.store.len()
    }

    /// Cuts staged in the opt store.
    pub fn opt_cuts(&self) -> &[SharedRow] {
        self.opt_store.cuts()
    }

    /// Number of cuts in the opt store.
    pub fn n_opt_cuts(&self) -> usize {
        self.opt_store.len()
    }

    /// Cuts staged in the delayed store.
    pub fn delayed_cuts(&self) -> &[SharedRow] {
        self.delayed_store.cuts()
    }

    /// Number of cuts in the delayed store.
    pub fn n_delayed_cuts(&self) -> usize {
        self.delayed_store.len()
    }

    /// Empty the main store.
    pub fn clear_cuts(&mut self) {
        self.store.clear();
    }

    /// Empty the opt store.
    pub fn clear_opt_cuts(&mut self) {
        self.opt_store.clear();
    }

    /// Empty the delayed store.
    pub fn clear_delayed_cuts(&mut self) {
        self.delayed_store.clear();
    }

    /// Drop inefficacious non-forced cuts from the main store.
    pub fn remove_inefficacious_cuts<R: Relaxation>(
        &mut self,
        ctx: &NodeContext<'_, R>,
    ) -> SepaResult<usize> {
        check_lp_solved(ctx)?;
        Ok(self
            .store
            .remove_inefficacious(ctx.node.is_root(), &*ctx.relax, &self.settings))
    }

    /// Drop inefficacious non-forced cuts from the opt store.
    pub fn remove_inefficacious_opt_cuts<R: Relaxation>(
        &mut self,
        ctx: &NodeContext<'_, R>,
    ) -> SepaResult<usize> {
        check_lp_solved(ctx)?;
        Ok(self
            .opt_store
            .remove_inefficacious(ctx.node.is_root(), &*ctx.relax, &self.settings))
    }

    // === Pools ===

    /// Whether no identical row is in the global pool.
    pub fn is_cut_new(&self, row: &Row) -> bool {
        self.pool.is_new(row)
    }

    /// Whether no identical row is in the opt pool.
    pub fn is_opt_cut_new(&self, row: &Row) -> bool {
        self.opt_pool.is_new(row)
    }

    /// Add a globally valid row to the global pool.
    pub fn add_pool_cut(&mut self, row: SharedRow) -> SepaResult<bool> {
        if row.is_local() {
            return Err(SepaError::InvalidRow(format!(
                "cannot add local row {} to the global cut pool",
                row.id()
            )));
        }
        Ok(self.pool.add_row(row))
    }

    /// Remove a row from the global pool.
    pub fn del_pool_cut(&mut self, row: &Row) -> SepaResult<()> {
        self.pool.del_row(row)
    }

    /// Add a row to the delayed pool.
    pub fn add_delayed_pool_cut(&mut self, row: SharedRow) -> bool {
        self.delayed_pool.add_row(row)
    }

    /// Remove a row from the delayed pool.
    pub fn del_delayed_pool_cut(&mut self, row: &Row) -> SepaResult<()> {
        self.delayed_pool.del_row(row)
    }

    /// Add a row to the opt pool.
    pub fn add_opt_pool_cut(&mut self, row: SharedRow) -> bool {
        self.opt_pool.add_row(row)
    }

    /// Remove a row from the opt pool.
    pub fn del_opt_pool_cut(&mut self, row: &Row) -> SepaResult<()> {
        self.opt_pool.del_row(row)
    }

    /// Entries of the global pool.
    pub fn pool_cuts(&self) -> &[PooledCut] {
        self.pool.cuts()
    }

    /// Size of the global pool.
    pub fn n_pool_cuts(&self) -> usize {
        self.pool.len()
    }

    /// Entries of the delayed pool.
    pub fn delayed_pool_cuts(&self) -> &[PooledCut] {
        self.delayed_pool.cuts()
    }

    /// Size of the delayed pool.
    pub fn n_delayed_pool_cuts(&self) -> usize {
        self.delayed_pool.len()
    }

    /// Entries of the opt pool.
    pub fn opt_pool_cuts(&self) -> &[PooledCut] {
        self.opt_pool.cuts()
    }

    /// Size of the opt pool.
    pub fn n_opt_pool_cuts(&self) -> usize {
        self.opt_pool.len()
    }

    /// Empty the opt pool.
    pub fn clear_opt_pool(&mut self) {
        self.opt_pool.clear();
    }

    /// The global pool.
    pub fn global_pool(&self) -> &CutPool {
        &self.pool
    }

    /// Separate the global pool against the relaxation optimum.
    pub fn separate_pool<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
    ) -> SepaResult<PoolSeparation> {
        let node = ctx.node;
        let (relax, conflict) = ctx.parts();
        let res = self.pool.separate(
            &*relax,
            Reference::Relaxation,
            &node,
            &mut self.store,
            conflict,
            &self.settings,
        )?;
        self.stats.pool_passes += 1;
        Ok(res)
    }

    /// Separate the global pool against an explicit solution.
    pub fn separate_sol_pool<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
        sol: &Solution,
    ) -> SepaResult<PoolSeparation> {
        let node = ctx.node;
        let (relax, conflict) = ctx.parts();
        let res = self.pool.separate(
            &*relax,
            Reference::Solution(sol),
            &node,
            &mut self.store,
            conflict,
            &self.settings,
        )?;
        self.stats.pool_passes += 1;
        Ok(res)
    }

    /// Separate the delayed pool into the main store.
    pub fn separate_delayed_pool<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
    ) -> SepaResult<PoolSeparation> {
        let node = ctx.node;
        let (relax, conflict) = ctx.parts();
        let res = self.delayed_pool.separate(
            &*relax,
            Reference::Relaxation,
            &node,
            &mut self.store,
            conflict,
            &self.settings,
        )?;
        self.stats.pool_passes += 1;
        Ok(res)
    }

    /// Separate the opt pool into the opt store.
    pub fn separate_opt_pool<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
    ) -> SepaResult<PoolSeparation> {
        let node = ctx.node;
        let (relax, conflict) = ctx.parts();
        let res = self.opt_pool.separate(
            &*relax,
            Reference::Relaxation,
            &node,
            &mut self.opt_store,
            conflict,
            &self.settings,
        )?;
        self.stats.pool_passes += 1;
        Ok(res)
    }

    // === Scores ===

    /// Score a row with `policy`.
    pub fn score<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
        policy: ScorePolicy,
        row: &SharedRow,
    ) -> SepaResult<f64> {
        self.scorer
            .score(policy, row, &mut *ctx.relax, ctx.incumbent, &self.settings)
    }

    /// Efficacy at the relaxation optimum.
    pub fn efficacy<R: Relaxation>(&self, ctx: &NodeContext<'_, R>, row: &Row) -> f64 {
        efficacy(row, ctx.relax.primal_values(), &self.settings)
    }

    /// Relative violation at the relaxation optimum.
    pub fn relative_violation<R: Relaxation>(&self, ctx: &NodeContext<'_, R>, row: &Row) -> f64 {
        relative_violation(row, ctx.relax.primal_values(), &self.settings.tolerances)
    }

    /// Objective parallelism.
    pub fn obj_parallelism<R: Relaxation>(&self, ctx: &NodeContext<'_, R>, row: &Row) -> f64 {
        score::obj_parallelism(row, &*ctx.relax)
    }

    /// Fraction of integer columns in the support.
    pub fn int_support<R: Relaxation>(&self, ctx: &NodeContext<'_, R>, row: &Row) -> f64 {
        score::int_support(row, &*ctx.relax)
    }

    /// Sparsity score.
    pub fn support_score<R: Relaxation>(&self, ctx: &NodeContext<'_, R>, row: &Row) -> f64 {
        score::support_score(row, &*ctx.relax)
    }

    /// Directed cutoff distance towards `sol`.
    pub fn directed_cutoff_distance<R: Relaxation>(
        &self,
        ctx: &NodeContext<'_, R>,
        row: &Row,
        sol: Option<&Solution>,
    ) -> f64 {
        score::directed_cutoff_distance(row, &*ctx.relax, sol, &self.settings)
    }

    /// Directed cutoff distance adjusted for locality.
    pub fn adjusted_directed_cutoff_distance<R: Relaxation>(
        &self,
        ctx: &NodeContext<'_, R>,
        row: &Row,
        sol: Option<&Solution>,
    ) -> f64 {
        score::adjusted_directed_cutoff_distance(row, &*ctx.relax, sol, &self.settings)
    }

    /// Expected objective improvement.
    pub fn expected_improvement<R: Relaxation>(&self, ctx: &NodeContext<'_, R>, row: &Row) -> f64 {
        score::expected_improvement(row, &*ctx.relax, &self.settings)
    }

    /// Default hybrid score against the context's incumbent.
    pub fn default_score<R: Relaxation>(&mut self, ctx: &NodeContext<'_, R>, row: &Row) -> f64 {
        self.scorer
            .default_score(row, &*ctx.relax, ctx.incumbent, &self.settings)
    }

    /// Default hybrid score without the cutoff term.
    pub fn default_score_without_directed_cutoff<R: Relaxation>(
        &mut self,
        ctx: &NodeContext<'_, R>,
        row: &Row,
    ) -> f64 {
        self.scorer
            .default_score_without_directed_cutoff(row, &*ctx.relax, &self.settings)
    }

    /// Hybrid score with the configured weights.
    pub fn scip_style_score<R: Relaxation>(&mut self, ctx: &NodeContext<'_, R>, row: &Row) -> f64 {
        self.scorer
            .scip_style_score(row, &*ctx.relax, ctx.incumbent, &self.settings)
    }

    /// Objective after a trial solve with `row` added.
    pub fn lookahead_objective<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
        row: &SharedRow,
    ) -> SepaResult<f64> {
        self.scorer.lookahead_objective(row, &mut *ctx.relax)
    }

    /// Objective change caused by `row`.
    pub fn lookahead_score<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
        row: &SharedRow,
    ) -> SepaResult<f64> {
        self.scorer
            .lookahead_score(row, &mut *ctx.relax, &self.settings)
    }

    // === Rounds ===

    /// Select cuts from the main store, add them to the relaxation and
    /// clear the store. Returns the number of rows added.
    pub fn apply_selected_cuts<R: Relaxation>(
        &mut self,
        ctx: &mut NodeContext<'_, R>,
        policy: ScorePolicy,
    ) -> SepaResult<usize> {
        let selected = select_cuts(
            &self.store,
            &mut self.scorer,
            policy,
            &mut *ctx.relax,
            ctx.incumbent,
            &self.settings,
        )?;
        let applied = apply_cuts(
            &mut self.store,
            &selected,
            &mut *ctx.relax,
            &mut self.pool,
            &self.settings,
        )?;
        self.stats.cuts_applied += applied;
        Ok(applied)
    }

    /// Call the separators on the current relaxation optimum.
    ///
    /// Separators run in decreasing priority. Delayed separators only run
    /// when `only_delayed` is set, and then nothing else runs. Local-only
    /// separators are skipped unless `allow_local`. The round stops at the
    /// first cutoff.
    pub fn separation_round<R: Relaxation>(
        &mut self,
        separators: &mut [Box<dyn Separator<R>>],
        ctx: &mut NodeContext<'_, R>,
        pretend_root: bool,
        allow_local: bool,
        only_delayed: bool,
    ) -> SepaResult<RoundOutcome> {
        if !ctx.node.lp_processed {
            return Err(SepaError::InvalidCall(
                "cannot separate, node LP is not processed".to_string(),
            ));
        }

        let mut order: Vec<usize> = (0..separators.len()).collect();
        order.sort_by_key(|&i| std::cmp::Reverse(separators[i].priority()));

        let node = ctx.node;
        let incumbent = ctx.incumbent;
        let is_root = pretend_root || node.is_root();
        let (relax, conflict) = ctx.parts();
        let relax: &R = relax;

        let mut outcome = RoundOutcome::default();
        for i in order {
            let sep = &mut separators[i];
            if sep.is_delayed() != only_delayed {
                outcome.delayed |= sep.is_delayed();
                continue;
            }
            if sep.is_local_only() && !allow_local {
                continue;
            }

            let mut round = SepaRound {
                relax,
                node,
                incumbent,
                store: &mut self.store,
                pool: &self.pool,
                conflict: &mut *conflict,
                settings: &self.settings,
                is_root,
                allow_local,
                source: CutSource::Separator { index: i },
                n_added: 0,
                cutoff: false,
            };
            let result = sep.separate(&mut round)?;
            let (n_added, cutoff) = (round.n_added, round.cutoff);
            self.stats.separator_calls += 1;

            log::debug!(
                "separator {} returned {:?} with {} cuts",
                sep.name(),
                result,
                n_added
            );

            outcome.n_cuts += n_added;
            if result == SeparatorResult::Delayed {
                outcome.delayed = true;
            }
            if cutoff || result == SeparatorResult::Cutoff {
                outcome.cutoff = true;
                break;
            }
        }

        self.stats.rounds += 1;
        if outcome.cutoff {
            self.stats.cutoffs += 1;
        }
        Ok(outcome)
    }
}

fn check_lp_solved<R: Relaxation>(ctx: &NodeContext<'_, R>) -> SepaResult<()> {
    if ctx.relax.status() != LpStatus::Optimal {
        return Err(SepaError::InvalidCall(format!(
            "relaxation is not solved to optimality ({:?})",
            ctx.relax.status()
        )));
    }
    Ok(())
}
