//! Evolution of a XOR function approximator. XOR is not linearly
//! separable, so a solving network must grow at least one hidden
//! node — the classic smoke test for topology evolution.

use evoneat::activations::ActivationKind;
use evoneat::config::{Context, NeatOptions};
use evoneat::genomics::{ConnectionGene, Genome, NodeGene, NodeKind, Trait};
use evoneat::populations::{epoch_executor_for, Generation, GenerationEvaluator, Population};

use std::error::Error;

/// Input triples (two signals plus the constant bias) and the
/// expected XOR output.
const XOR_CASES: [([f64; 3], f64); 4] = [
    ([0.0, 0.0, 1.0], 0.0),
    ([0.0, 1.0, 1.0], 1.0),
    ([1.0, 0.0, 1.0], 1.0),
    ([1.0, 1.0, 1.0], 0.0),
];

struct XorEvaluator;

impl GenerationEvaluator for XorEvaluator {
    fn evaluate_generation(
        &self,
        _ctx: &Context,
        population: &mut Population,
        generation: &mut Generation,
    ) -> Result<(), Box<dyn Error + Send + Sync>> {
        for organism in population.organisms_mut() {
            let depth = organism.network().max_activation_depth().max(1);
            let mut error_sum = 0.0;
            let mut correct = true;
            for (inputs, expected) in XOR_CASES {
                let net = organism.network_mut();
                net.flush();
                net.load_sensors(&inputs)?;
                // A mutant can lose its path to the output; it simply
                // scores as if it answered zero.
                let output = match net.forward_steps(depth) {
                    Ok(()) => net.read_outputs()[0],
                    Err(_) => 0.0,
                };
                let deviation = (output - expected).abs();
                error_sum += deviation;
                if deviation >= 0.5 {
                    correct = false;
                }
            }
            organism.set_error(error_sum);
            let fitness = (4.0 - error_sum).powi(2);
            organism.set_fitness(fitness);
            organism.set_original_fitness(fitness);
            organism.set_winner(correct);
        }
        generation.fill_from(population);
        Ok(())
    }
}

/// Two sensors and a bias, fully connected to a single sigmoid
/// output.
fn xor_seed_genome() -> Genome {
    let traits = vec![Trait::new(1, [0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0])];
    let nodes = vec![
        NodeGene::new(1, NodeKind::Sensor, ActivationKind::Null),
        NodeGene::new(2, NodeKind::Sensor, ActivationKind::Null),
        NodeGene::new(3, NodeKind::Bias, ActivationKind::Null),
        NodeGene::new(4, NodeKind::Output, ActivationKind::SigmoidSteepened),
    ];
    let genes = vec![
        ConnectionGene::with_trait(1, 1, 4, 1.0, false, Some(1), 0.0, true),
        ConnectionGene::with_trait(2, 2, 4, 1.0, false, Some(1), 0.0, true),
        ConnectionGene::with_trait(3, 3, 4, 1.0, false, Some(1), 0.0, true),
    ];
    Genome::new(1, traits, nodes, genes)
}

fn main() {
    let options = NeatOptions {
        population_size: 150,
        num_generations: 100,
        num_inputs: 3,
        num_outputs: 1,
        compat_threshold: 3.0,
        disjoint_coeff: 1.0,
        excess_coeff: 1.0,
        mutdiff_coeff: 0.4,
        mutate_only_prob: 0.25,
        mutate_link_weights_prob: 0.9,
        mutate_add_link_prob: 0.08,
        mutate_add_node_prob: 0.03,
        weight_mut_power: 2.5,
        mate_only_prob: 0.2,
        mate_multipoint_prob: 0.6,
        mate_multipoint_avg_prob: 0.4,
        survival_thresh: 0.2,
        dropoff_age: 15,
        ..NeatOptions::default()
    };
    let ctx = Context::new(options);

    let mut population = match Population::spawn(&xor_seed_genome(), &ctx) {
        Ok(population) => population,
        Err(e) => {
            eprintln!("failed to spawn population: {}", e);
            return;
        }
    };
    let executor = match epoch_executor_for(&ctx.options) {
        Ok(executor) => executor,
        Err(e) => {
            eprintln!("{}", e);
            return;
        }
    };
    let evaluator = XorEvaluator;

    for gen in 1..=ctx.options.num_generations {
        let mut generation = Generation::new(gen);
        if let Err(e) = evaluator.evaluate_generation(&ctx, &mut population, &mut generation) {
            eprintln!("evaluation failed: {}", e);
            return;
        }
        println!("{}", generation);

        if generation.solved {
            population.set_final(true);
            if let Some(champion) = &generation.champion {
                println!(
                    "winner found in generation {}: {} nodes, {} genes",
                    gen,
                    champion.nodes().len(),
                    champion.genes().len(),
                );
            }
            break;
        }
        if let Err(e) = executor.next_epoch(&ctx, &mut population) {
            eprintln!("epoch failed: {}", e);
            return;
        }
    }

    if !population.is_final() {
        println!(
            "no winner found within {} generations",
            ctx.options.num_generations
        );
    }
}
