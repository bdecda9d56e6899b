// Simulated training loop driving the criterion accumulator.
//
// Usage: epoch-criteria [criteria.json]
// Set RUST_LOG=debug (or trace) for per-minibatch output.

use epoch_criteria::{
    CriteriaConfig, CriterionAccumulator, EpochCriterion, EpochSummary, MinibatchLayout,
    ScalarNode,
};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::sync::Arc;

#[cfg(feature = "jemalloc")]
#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

/// Shape of the simulated run
#[derive(Debug, Clone)]
struct TrainingConfig {
    num_epochs: usize,
    minibatches_per_epoch: usize,
    parallel_sequences: usize,
    max_sequence_length: usize,
    print_every: usize,
    seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            num_epochs: 5,
            minibatches_per_epoch: 200,
            parallel_sequences: 8,
            max_sequence_length: 32,
            print_every: 50,
            seed: 42,
        }
    }
}

/// Random variable-length minibatch; unused cells are padding.
fn random_layout(rng: &mut StdRng, config: &TrainingConfig) -> Result<MinibatchLayout, String> {
    let mut layout = MinibatchLayout::new(config.parallel_sequences, config.max_sequence_length);
    for slot in 0..config.parallel_sequences {
        let len = rng.random_range(1..=config.max_sequence_length);
        layout.add_sequence(slot, slot, 0, len as isize)?;
    }
    Ok(layout)
}

fn run(criteria: &CriteriaConfig, config: &TrainingConfig) -> Result<(), String> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let noise = Normal::new(0.0f32, 0.05).map_err(|e| format!("Invalid noise: {}", e))?;

    // One criterion value per tracked criterion, reused every minibatch
    let mut nodes = criteria
        .criterion_names
        .iter()
        .map(|_| ScalarNode::new(0.0f32, criteria.device))
        .collect::<Result<Vec<_>, String>>()?;

    let mut best = EpochCriterion::infinity();
    let mut best_epoch = None;
    let mut run_total = vec![EpochCriterion::default(); criteria.num_criteria()];

    for epoch in 1..=config.num_epochs {
        let mut accumulator: CriterionAccumulator = criteria.build_accumulator()?;
        let mut last_snapshot = EpochCriterion::default();

        for mb in 0..config.minibatches_per_epoch {
            let layout = Arc::new(random_layout(&mut rng, config)?);
            let num_samples = layout.actual_num_samples();

            for (i, node) in nodes.iter_mut().enumerate() {
                // Criteria decay with the epoch and differ in scale per index
                let per_sample = (2.0 / (epoch as f32 + i as f32)) + noise.sample(&mut rng);
                node.set_value(per_sample.max(0.0) * num_samples as f32)?;
                node.set_layout(Some(layout.clone()));
            }
            for i in 0..nodes.len() {
                accumulator.add(&nodes, i, num_samples)?;
            }

            if (mb + 1) % config.print_every == 0 {
                let snapshot = accumulator.get_criterion(0)?;
                let delta = snapshot - last_snapshot;
                debug!(
                    "Epoch[{}] minibatches {}-{}: {} = {}",
                    epoch,
                    mb + 2 - config.print_every,
                    mb + 1,
                    criteria.criterion_names[0],
                    delta
                );
                last_snapshot = snapshot;
            }
        }

        let summary = EpochSummary::from_accumulator(epoch, &criteria.criterion_names, &accumulator)?;
        info!("{}", summary);

        if summary.any_nan() {
            warn!("Training diverged in epoch {}, stopping", epoch);
            break;
        }

        for (total, named) in run_total.iter_mut().zip(&summary.criteria) {
            *total += named.criterion;
        }

        let objective = summary.criteria[0].criterion;
        if objective.average() < best.average() {
            best = objective;
            best_epoch = Some(epoch);
        }
    }

    match best_epoch {
        Some(epoch) => info!(
            "Best epoch {}: {} = {}",
            epoch, criteria.criterion_names[0], best
        ),
        None => warn!("No epoch produced a usable {}", criteria.criterion_names[0]),
    }
    for (name, total) in criteria.criterion_names.iter().zip(&run_total) {
        info!("Run total: {} = {}", name, total);
    }
    Ok(())
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let criteria = match std::env::args().nth(1) {
        Some(path) => CriteriaConfig::from_file(path)?,
        None => CriteriaConfig::training(),
    };
    info!(
        "Tracking {} criteria on {}: {}",
        criteria.num_criteria(),
        criteria.device,
        criteria.criterion_names.join(", ")
    );

    run(&criteria, &TrainingConfig::default())
}
