//! Integration tests for separation rounds, cut application and scoring.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use solver_sepa::relax::{LpOutcome, LpView};
use solver_sepa::{
    BoundSide, Column, ConflictKind, ConflictRecorder, LpStatus, MemoryRelaxation, NodeContext,
    NodeInfo, PoolSeparation, Relaxation, Row, ScorePolicy, SepaError, SepaResult, SepaRound,
    SepaSettings, Separation, Separator, SeparatorResult, SharedRow, Solution,
};

/// Greedy solver for
///
/// max  x0 + x1 + x2
/// s.t. 2 x0 + 2 x1 + 2 x2 <= 3
///      0 <= x <= 1
///
/// plus any added rows with unit coefficients. Columns are filled in
/// index order, each as far as capacity and the rows allow.
fn knapsack_oracle(lp: &LpView<'_>) -> SepaResult<LpOutcome> {
    let n = lp.obj.len();
    let mut x = vec![0.0; n];
    let mut cap = 3.0;
    for j in 0..n {
        let mut val = lp.ub[j].min(cap / 2.0);
        for row in lp.rows {
            if row.cols().contains(&j) {
                val = val.min(row.rhs() - row.activity(&x));
            }
        }
        let val = val.max(lp.lb[j]);
        x[j] = val;
        cap -= 2.0 * val;
    }
    let obj = lp.obj.iter().zip(&x).map(|(c, v)| c * v).sum();
    Ok(LpOutcome::optimal(x, obj))
}

fn knapsack_lp() -> MemoryRelaxation {
    MemoryRelaxation::new(vec![Column::binary(-1.0); 3]).with_oracle(knapsack_oracle)
}

/// Separates violated pair covers x_i + x_j <= 1.
struct CoverSeparator;

impl Separator<MemoryRelaxation> for CoverSeparator {
    fn name(&self) -> &str {
        "cover"
    }

    fn separate(
        &mut self,
        round: &mut SepaRound<'_, MemoryRelaxation>,
    ) -> SepaResult<SeparatorResult> {
        let x = round.primal_values().to_vec();
        let mut found = false;
        for i in 0..x.len() {
            for j in i + 1..x.len() {
                if x[i] + x[j] <= 1.0 + 1e-9 {
                    continue;
                }
                let cut = Row::builder(x.len())
                    .coef(i, 1.0)
                    .coef(j, 1.0)
                    .rhs(1.0)
                    .source(round.source())
                    .name(format!("cover_{}_{}", i, j))
                    .build_shared()?;
                if round.is_cut_new(&cut) {
                    round.add_cut(cut, false)?;
                    found = true;
                }
            }
        }
        Ok(if found {
            SeparatorResult::Separated
        } else {
            SeparatorResult::DidNotFind
        })
    }
}

#[test]
fn test_cutting_plane_loop() {
    let mut lp = knapsack_lp();
    assert_eq!(lp.solve().unwrap(), LpStatus::Optimal);
    assert!((lp.objective_value() + 1.5).abs() < 1e-9);

    let mut sepa = Separation::new(SepaSettings::default()).unwrap();
    let mut seps: Vec<Box<dyn Separator<MemoryRelaxation>>> = vec![Box::new(CoverSeparator)];
    let mut ctx = NodeContext::new(&mut lp, NodeInfo::root().with_lp_processed());

    let mut rounds = 0;
    loop {
        let outcome = sepa
            .separation_round(&mut seps, &mut ctx, false, false, false)
            .unwrap();
        assert!(!outcome.cutoff);
        if outcome.n_cuts == 0 {
            break;
        }
        let applied = sepa
            .apply_selected_cuts(&mut ctx, ScorePolicy::Default)
            .unwrap();
        assert_eq!(applied, outcome.n_cuts);
        ctx.relax.solve().unwrap();
        rounds += 1;
        assert!(rounds < 10, "cutting plane loop did not terminate");
    }

    // Both covers with x0 were needed; the LP bound is now integral.
    assert_eq!(rounds, 2);
    assert!((ctx.relax.objective_value() + 1.0).abs() < 1e-9);
    assert_eq!(ctx.relax.num_rows(), 2);
    assert_eq!(sepa.n_pool_cuts(), 2);
    assert_eq!(sepa.stats().cuts_applied, 2);
    assert!(sepa.cuts().is_empty());
}

#[test]
fn test_pool_cuts_reused_at_child() {
    let mut root_lp = knapsack_lp();
    root_lp.solve().unwrap();
    let mut sepa = Separation::new(SepaSettings::default()).unwrap();
    let mut seps: Vec<Box<dyn Separator<MemoryRelaxation>>> = vec![Box::new(CoverSeparator)];

    {
        let mut ctx = NodeContext::new(&mut root_lp, NodeInfo::root().with_lp_processed());
        for _ in 0..2 {
            sepa.separation_round(&mut seps, &mut ctx, false, false, false)
                .unwrap();
            sepa.apply_selected_cuts(&mut ctx, ScorePolicy::Efficacy)
                .unwrap();
            ctx.relax.solve().unwrap();
        }
    }
    assert_eq!(sepa.n_pool_cuts(), 2);

    // A fresh child LP without rows: x = (1, 0.5, 0)
    let mut child_lp = knapsack_lp();
    child_lp.solve().unwrap();
    let mut ctx = NodeContext::new(&mut child_lp, NodeInfo::at_depth(1, 1).with_lp_processed());

    let res = sepa.separate_pool(&mut ctx).unwrap();
    assert_eq!(res, PoolSeparation::Separated);
    assert_eq!(sepa.n_cuts(), 1);
    assert_eq!(sepa.cuts()[0].cols(), &[0, 1]);

    let ages: Vec<u32> = sepa.pool_cuts().iter().map(|c| c.age).collect();
    assert!(ages.contains(&0) && ages.contains(&1));
}

#[test]
fn test_infeasible_cut_learns_conflict() {
    let mut lp = MemoryRelaxation::new(vec![Column::binary(1.0), Column::continuous(1.0, 0.0, 5.0)]);
    lp.set_solution(vec![1.0, 2.0], 3.0).unwrap();
    // Branching fixed x0 to 1 in this subtree.
    lp.set_bounds(0, 1.0, 1.0).unwrap();

    let mut rec = ConflictRecorder::new();
    let mut sepa = Separation::new(SepaSettings::default()).unwrap();
    {
        let mut ctx = NodeContext::new(&mut lp, NodeInfo::at_depth(9, 3).with_lp_processed())
            .with_conflict(&mut rec);
        // x0 - x1 <= -6 needs x1 >= 7 > 5
        let cut = Row::builder(2)
            .coef(0, 1.0)
            .coef(1, -1.0)
            .rhs(-6.0)
            .build_shared()
            .unwrap();
        assert!(sepa.add_row(&mut ctx, cut, false).unwrap());
    }

    assert_eq!(sepa.n_cuts(), 1);
    let learned = rec.drain();
    assert_eq!(learned.len(), 1);
    assert_eq!(learned[0].kind, ConflictKind::Propagation);
    assert_eq!(learned[0].depth, 3);
    assert_eq!(learned[0].bounds, vec![(0, BoundSide::Lower), (1, BoundSide::Upper)]);
}

#[test]
fn test_directed_cutoff_through_context() {
    let mut lp = MemoryRelaxation::new(vec![
        Column::integer(1.0, 0.0, 5.0),
        Column::continuous(0.0, 0.0, 5.0),
        Column::continuous(0.0, 0.0, 5.0),
        Column::continuous(0.0, 0.0, 5.0),
    ]);
    lp.set_solution(vec![1.0, 0.0, 0.0, 0.0], 1.0).unwrap();
    let incumbent = Solution::new(vec![0.2, 1.2, 0.4, 0.1], 0.2);
    let sepa = Separation::new(SepaSettings::default()).unwrap();
    let ctx = NodeContext::new(&mut lp, NodeInfo::root().with_lp_processed())
        .with_incumbent(Some(&incumbent));

    let global = Row::builder(4).coef(0, 1.0).rhs(0.2).build().unwrap();
    let local = Row::builder(4).coef(0, 1.0).rhs(0.2).local(true).build().unwrap();

    let adj_global = sepa.adjusted_directed_cutoff_distance(&ctx, &global, ctx.incumbent);
    let adj_local = sepa.adjusted_directed_cutoff_distance(&ctx, &local, ctx.incumbent);
    assert!((adj_global - 1.5).abs() < 1e-9);
    assert!((adj_local - 0.8).abs() < 1e-9);
    assert_eq!(adj_local, sepa.efficacy(&ctx, &local));
}

#[test]
fn test_lookahead_restores_relaxation() {
    let mut oracle_rng = ChaCha8Rng::seed_from_u64(11);
    let mut lp = MemoryRelaxation::new(vec![Column::continuous(1.0, 0.0, 10.0); 3]).with_oracle(
        move |view: &LpView<'_>| -> SepaResult<LpOutcome> {
            match oracle_rng.gen_range(0..3) {
                0 => Err(SepaError::Relaxation("iteration limit".to_string())),
                1 => Ok(LpOutcome::failed(LpStatus::Infeasible)),
                _ => {
                    let x = vec![1.0; view.obj.len()];
                    Ok(LpOutcome::optimal(x, 3.0 + view.rows.len() as f64))
                }
            }
        },
    );
    lp.set_solution(vec![0.5, 0.5, 0.5], 1.5).unwrap();

    let mut sepa = Separation::new(SepaSettings::default()).unwrap();
    let mut ctx = NodeContext::new(&mut lp, NodeInfo::root().with_lp_processed());
    let mut rng = ChaCha8Rng::seed_from_u64(5);

    for _ in 0..50 {
        let row: SharedRow = Row::builder(3)
            .coef(rng.gen_range(0..3), rng.gen_range(0.5..2.0))
            .lhs(rng.gen_range(0.0..3.0))
            .build_shared()
            .unwrap();
        let score = sepa.lookahead_score(&mut ctx, &row).unwrap();
        assert!(score == -1.0 || score >= 0.0);

        assert_eq!(ctx.relax.num_rows(), 0);
        assert_eq!(ctx.relax.objective_value(), 1.5);
        assert_eq!(ctx.relax.primal_values(), &[0.5, 0.5, 0.5]);
        assert!(!ctx.relax.in_dive());
    }
    assert_eq!(sepa.scorer().stats().lookahead_calls, 50);
}

#[test]
fn test_score_policies_rank_consistently() {
    let mut lp = knapsack_lp();
    lp.solve().unwrap();
    let mut sepa = Separation::new(SepaSettings::default().with_random_seed(1)).unwrap();
    let mut ctx = NodeContext::new(&mut lp, NodeInfo::root().with_lp_processed());

    // x = (1, 0.5, 0): the first cover is violated, the second is tight.
    let violated = Row::builder(3).coef(0, 1.0).coef(1, 1.0).rhs(1.0).build_shared().unwrap();
    let tight = Row::builder(3).coef(0, 1.0).coef(2, 1.0).rhs(1.0).build_shared().unwrap();

    for policy in [
        ScorePolicy::Default,
        ScorePolicy::DefaultWithoutDirectedCutoff,
        ScorePolicy::ScipStyle,
        ScorePolicy::Efficacy,
        ScorePolicy::Violation,
        ScorePolicy::RelativeViolation,
    ] {
        let a = sepa.score(&mut ctx, policy, &violated).unwrap();
        let b = sepa.score(&mut ctx, policy, &tight).unwrap();
        assert!(a > b, "{:?}: {} <= {}", policy, a, b);
    }
}
