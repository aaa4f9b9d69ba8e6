//! Cut pool benchmark: random rows, repeated pool separation.
//!
//! Run with: cargo run --release -p solver-sepa --example pool_bench

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use solver_sepa::{
    Column, MemoryRelaxation, NodeContext, NodeInfo, Row, ScorePolicy, Separation, SepaSettings,
};
use std::time::Instant;

const NUM_COLS: usize = 200;
const NUM_CUTS: usize = 5_000;
const NUM_NODES: u64 = 100;

fn main() {
    println!("=== Cut Pool Benchmark ===\n");

    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let settings = SepaSettings::default()
        .with_pool_age_limit(10)
        .with_random_seed(7);
    let mut sepa = match Separation::new(settings) {
        Ok(sepa) => sepa,
        Err(e) => {
            eprintln!("invalid settings: {}", e);
            return;
        }
    };

    let start = Instant::now();
    for _ in 0..NUM_CUTS {
        let mut builder = Row::builder(NUM_COLS);
        for _ in 0..rng.gen_range(2..12) {
            builder = builder.coef(rng.gen_range(0..NUM_COLS), rng.gen_range(-5.0..5.0));
        }
        if let Ok(row) = builder.rhs(rng.gen_range(1.0..10.0)).build_shared() {
            let _ = sepa.add_pool_cut(row);
        }
    }
    println!(
        "Pooled {} cuts in {:.2}ms",
        sepa.n_pool_cuts(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    let start = Instant::now();
    let mut staged = 0;
    let mut applied = 0;
    for node in 0..NUM_NODES {
        let x: Vec<f64> = (0..NUM_COLS).map(|_| rng.gen_range(0.0..1.0)).collect();
        let obj: Vec<f64> = (0..NUM_COLS).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let obj_val = obj.iter().zip(&x).map(|(c, v)| c * v).sum();
        let mut lp = MemoryRelaxation::new(
            obj.iter()
                .map(|&c| Column::continuous(c, 0.0, 1.0))
                .collect(),
        );
        if lp.set_solution(x, obj_val).is_err() {
            continue;
        }

        let depth = if node == 0 { 0 } else { 1 + node as usize % 8 };
        let mut ctx = NodeContext::new(&mut lp, NodeInfo::at_depth(node, depth).with_lp_processed());
        if sepa.separate_pool(&mut ctx).is_err() {
            continue;
        }
        staged += sepa.n_cuts();
        match sepa.apply_selected_cuts(&mut ctx, ScorePolicy::Default) {
            Ok(n) => applied += n,
            Err(e) => eprintln!("node {}: {}", node, e),
        }
    }
    let elapsed = start.elapsed();

    let stats = sepa.global_pool().stats();
    println!("\n--- Results ---");
    println!("Nodes:          {}", NUM_NODES);
    println!("Cuts staged:    {}", staged);
    println!("Cuts applied:   {}", applied);
    println!("Cuts evicted:   {}", stats.evicted);
    println!("Pool size:      {} (peak {})", sepa.n_pool_cuts(), stats.peak_size);
    println!("Scores:         {}", sepa.scorer().stats().scored);
    println!(
        "Time:           {:.2}ms ({:.3}ms/node, {:.2}ms in pool)",
        elapsed.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64() * 1000.0 / NUM_NODES as f64,
        stats.time.as_secs_f64() * 1000.0
    );
}
