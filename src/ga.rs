use crate::cinfo;
use crate::error::{FsError, Result};
use crate::individual::Individual;
use crate::param;
use crate::utils::mean_and_std;
use log::{debug, info};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Added to every roulette weight so that no individual has a zero chance
pub const ROULETTE_EPSILON: f64 = 1e-10;

/// Feature counts tried by the seeded part of the initial population
const SEED_FEATURE_COUNTS: [usize; 3] = [3, 5, 7];
const MAX_SINGLE_FEATURE_SEEDS: usize = 5;

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GaParams {
    pub population_size: usize,
    pub generations: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub elite_size: usize,
}

impl From<&param::GA> for GaParams {
    fn from(ga: &param::GA) -> Self {
        GaParams {
            population_size: ga.population_size,
            generations: ga.generations,
            crossover_rate: ga.crossover_rate,
            mutation_rate: ga.mutation_rate,
            elite_size: ga.elite_size,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GaState {
    Uninitialized,
    Initialized,
    Evaluating,
    Selecting,
    Terminated,
}

/// Best genome and fitness of each generation, in generation order
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct History {
    pub best_genomes: Vec<Vec<u8>>,
    #[serde(with = "crate::utils::float_format::vec")]
    pub best_fitnesses: Vec<f64>,
}

impl History {
    fn record(&mut self, best: &Individual) {
        self.best_genomes.push(best.genome.clone());
        self.best_fitnesses.push(best.fit());
    }

    pub fn len(&self) -> usize {
        self.best_fitnesses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.best_fitnesses.is_empty()
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GaOutcome {
    pub best_genome: Vec<u8>,
    #[serde(with = "crate::utils::float_format")]
    pub best_fitness: f64,
    pub history: History,
}

pub struct GeneticAlgorithm {
    genome_length: usize,
    params: GaParams,
    rng: ChaCha8Rng,
    population: Vec<Individual>,
    history: History,
    state: GaState,
    generation: usize,
    display_colorful: bool,
}

impl GeneticAlgorithm {
    /// Every random draw of the run (seeding, selection, crossover, mutation) comes from `rng`
    pub fn new(genome_length: usize, params: GaParams, rng: ChaCha8Rng) -> Result<GeneticAlgorithm> {
        if genome_length == 0 {
            return Err(FsError::Config("Cannot run a genetic algorithm on 0 features".to_string()));
        }
        if params.population_size == 0 {
            return Err(FsError::Config("population_size must be >= 1".to_string()));
        }
        if params.elite_size >= params.population_size {
            return Err(FsError::Config(format!(
                "elite_size ({}) must be smaller than population_size ({})",
                params.elite_size, params.population_size
            )));
        }
        for (name, rate) in [("crossover_rate", params.crossover_rate), ("mutation_rate", params.mutation_rate)] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(FsError::Config(format!("{} must be in [0, 1], got {}", name, rate)));
            }
        }

        Ok(GeneticAlgorithm {
            genome_length,
            params,
            rng,
            population: Vec::new(),
            history: History::default(),
            state: GaState::Uninitialized,
            generation: 0,
            display_colorful: false,
        })
    }

    pub fn with_display(mut self, colorful: bool) -> GeneticAlgorithm {
        self.display_colorful = colorful;
        self
    }

    pub fn state(&self) -> GaState {
        self.state
    }

    pub fn population(&self) -> &[Individual] {
        &self.population
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Seed the first generation: the full genome, single-feature seeds on the
    /// leading features, two random genomes for each of 3, 5 and 7 features when
    /// that is fewer than the genome length, then uniformly random genomes.
    /// Only the last two groups consume randomness.
    pub fn initialize_population(&mut self) {
        let n = self.genome_length;
        let mut population = vec![Individual::full(n)];

        for feature in 0..MAX_SINGLE_FEATURE_SEEDS.min(n) {
            population.push(Individual::single(n, feature));
        }

        for k in SEED_FEATURE_COUNTS.iter().copied().filter(|k| *k < n) {
            for _ in 0..2 {
                population.push(Individual::random_k(n, k, &mut self.rng));
            }
        }

        if population.len() > self.params.population_size {
            debug!(
                "{} seeded genomes for a population of {}: keeping the first ones",
                population.len(),
                self.params.population_size
            );
            population.truncate(self.params.population_size);
        }

        while population.len() < self.params.population_size {
            population.push(Individual::random(n, &mut self.rng));
        }

        info!(
            "Population size: {}, k_min {}, k_max {}",
            population.len(),
            population.iter().map(|i| i.k()).min().unwrap_or(0),
            population.iter().map(|i| i.k()).max().unwrap_or(0)
        );

        self.population = population;
        self.state = GaState::Initialized;
    }

    /// Evaluate every individual without a cached fitness, then rank the population
    pub fn evaluate_population<F>(&mut self, fitness_fn: &F) -> Result<()>
    where
        F: Fn(&[u8]) -> Result<f64>,
    {
        if self.state == GaState::Uninitialized {
            return Err(FsError::Config("Population must be initialized before evaluation".to_string()));
        }
        self.state = GaState::Evaluating;
        for individual in self.population.iter_mut().filter(|i| i.fitness.is_none()) {
            individual.evaluate(fitness_fn)?;
        }
        self.population.sort_by(Individual::compare_desc);
        self.state = GaState::Selecting;
        Ok(())
    }

    /// Fitness-proportionate pick, returns an index into the current population
    pub fn select_parent(&mut self) -> usize {
        let weights = roulette_weights(&self.population);
        let total: f64 = weights.iter().sum();
        let pick = self.rng.gen::<f64>() * total;

        let mut current = 0.0;
        for (i, weight) in weights.iter().enumerate() {
            current += weight;
            if current >= pick {
                return i;
            }
        }
        self.population.len() - 1
    }

    /// One generation: elites carried over, children bred by roulette selection,
    /// crossover and mutation, then the population is ranked and cut back to size.
    pub fn step<F>(&mut self, fitness_fn: &F) -> Result<()>
    where
        F: Fn(&[u8]) -> Result<f64>,
    {
        if self.state != GaState::Selecting {
            return Err(FsError::Config(format!(
                "A generation can only start from an evaluated population (state {:?})",
                self.state
            )));
        }

        let mut next: Vec<Individual> = self.population.iter().take(self.params.elite_size).cloned().collect();
        let mut crossovers = 0;

        while next.len() < self.params.population_size {
            let first = self.select_parent();
            let second = self.select_parent();
            let (mut child1, mut child2) = if self.rng.gen::<f64>() < self.params.crossover_rate {
                crossovers += 1;
                Individual::crossover(&self.population[first], &self.population[second], &mut self.rng)
            } else {
                (
                    Individual::new(self.population[first].genome.clone()),
                    Individual::new(self.population[second].genome.clone()),
                )
            };

            child1.mutate(self.params.mutation_rate, &mut self.rng);
            child2.mutate(self.params.mutation_rate, &mut self.rng);

            self.state = GaState::Evaluating;
            child1.evaluate(fitness_fn)?;
            child2.evaluate(fitness_fn)?;

            next.push(child1);
            next.push(child2);
        }

        // at most one child over the target size
        next.sort_by(Individual::compare_desc);
        next.truncate(self.params.population_size);

        self.population = next;
        self.state = GaState::Selecting;
        self.generation += 1;
        self.history.record(&self.population[0]);

        debug!("Generation {}: {} crossovers", self.generation, crossovers);
        cinfo!(self.display_colorful, "{}", self.display_generation());

        Ok(())
    }

    /// Seed (if needed), evaluate, and evolve for the configured number of generations
    pub fn run<F>(&mut self, fitness_fn: F) -> Result<GaOutcome>
    where
        F: Fn(&[u8]) -> Result<f64>,
    {
        let time = Instant::now();

        if self.state == GaState::Uninitialized {
            self.initialize_population();
        }
        self.evaluate_population(&fitness_fn)?;

        for _ in 0..self.params.generations {
            self.step(&fitness_fn)?;
        }
        self.state = GaState::Terminated;

        info!("Genetic algorithm computed {} generations in {:.2?}", self.generation, time.elapsed());

        let best = &self.population[0];
        Ok(GaOutcome { best_genome: best.genome.clone(), best_fitness: best.fit(), history: self.history.clone() })
    }

    fn display_generation(&self) -> String {
        let finite: Vec<f64> = self.population.iter().map(|i| i.fit()).filter(|f| f.is_finite()).collect();
        let (mean, std) = mean_and_std(&finite);
        let best = &self.population[0];
        format!(
            "\x1b[1;93m#{:<4}\x1b[0m best \x1b[1;92m{:.4}\x1b[0m (k={}) | mean {:.4} ± {:.4} | empty genomes {}",
            self.generation,
            best.fit(),
            best.k(),
            mean,
            std,
            self.population.len() - finite.len()
        )
    }
}

/// Roulette weights tolerating negative and infinite fitness values.
///
/// Finite values are shifted by the minimum when it is negative, and all get
/// `ROULETTE_EPSILON` added. Individuals without a finite fitness keep only
/// `ROULETTE_EPSILON`, which makes a population without any finite value uniform.
pub fn roulette_weights(population: &[Individual]) -> Vec<f64> {
    let min = population.iter().map(|i| i.fit()).filter(|f| f.is_finite()).fold(f64::INFINITY, f64::min);
    let shift = if min.is_finite() && min < 0.0 { -min } else { 0.0 };

    population
        .iter()
        .map(|i| {
            let fit = i.fit();
            if fit.is_finite() { fit + shift + ROULETTE_EPSILON } else { ROULETTE_EPSILON }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use std::cell::Cell;

    fn params() -> GaParams {
        GaParams { population_size: 10, generations: 5, crossover_rate: 1.0, mutation_rate: 0.0, elite_size: 1 }
    }

    /// positive weights on even positions, negative on odd ones
    fn weighted_sum(genome: &[u8]) -> Result<f64> {
        if genome.iter().all(|g| *g == 0) {
            return Ok(f64::NEG_INFINITY);
        }
        Ok(genome
            .iter()
            .enumerate()
            .map(|(i, g)| if i % 2 == 0 { *g as f64 } else { -(*g as f64) })
            .sum())
    }

    fn with_fitness(values: &[f64]) -> Vec<Individual> {
        values.iter().map(|v| Individual { genome: vec![1], fitness: Some(*v) }).collect()
    }

    #[test]
    fn test_new_rejects_invalid_configuration() {
        let rng = || ChaCha8Rng::seed_from_u64(0);
        assert!(GeneticAlgorithm::new(0, params(), rng()).is_err());
        assert!(GeneticAlgorithm::new(4, GaParams { population_size: 0, elite_size: 0, ..params() }, rng()).is_err());
        assert!(GeneticAlgorithm::new(4, GaParams { elite_size: 10, ..params() }, rng()).is_err());
        assert!(GeneticAlgorithm::new(4, GaParams { crossover_rate: 1.1, ..params() }, rng()).is_err());
        assert!(GeneticAlgorithm::new(4, GaParams { mutation_rate: -0.5, ..params() }, rng()).is_err());
        assert!(GeneticAlgorithm::new(4, params(), rng()).is_ok());
    }

    #[test]
    fn test_initialize_population_seeding_order() {
        let p = GaParams { population_size: 20, ..params() };
        let mut ga = GeneticAlgorithm::new(10, p, ChaCha8Rng::seed_from_u64(42)).unwrap();
        ga.initialize_population();
        assert_eq!(ga.state(), GaState::Initialized);

        let pop = ga.population();
        assert_eq!(pop.len(), 20);
        assert_eq!(pop[0].genome, vec![1; 10]);
        for feature in 0..5 {
            assert_eq!(pop[1 + feature].selected_indices(), vec![feature]);
        }
        let seeded_k: Vec<usize> = pop[6..12].iter().map(|i| i.k()).collect();
        assert_eq!(seeded_k, vec![3, 3, 5, 5, 7, 7]);
        assert!(pop.iter().all(|i| i.genome.len() == 10 && i.fitness.is_none()));
    }

    #[test]
    fn test_initialize_population_small_genome() {
        // 4 features: all-ones, 4 single-feature seeds, two with 3 features; 5 and 7 are skipped
        let p = GaParams { population_size: 7, elite_size: 1, ..params() };
        let mut ga = GeneticAlgorithm::new(4, p.clone(), ChaCha8Rng::seed_from_u64(1)).unwrap();
        ga.initialize_population();
        let ks: Vec<usize> = ga.population().iter().map(|i| i.k()).collect();
        assert_eq!(ks, vec![4, 1, 1, 1, 1, 3, 3]);

        // more seeds than slots: truncated to the population size
        let mut ga = GeneticAlgorithm::new(4, GaParams { population_size: 3, ..p }, ChaCha8Rng::seed_from_u64(1)).unwrap();
        ga.initialize_population();
        assert_eq!(ga.population().len(), 3);
    }

    #[test]
    fn test_roulette_weights_shift_negative_values() {
        let weights = roulette_weights(&with_fitness(&[-0.5, 0.0, 1.5]));
        assert!((weights[0] - ROULETTE_EPSILON).abs() < 1e-15);
        assert!((weights[1] - (0.5 + ROULETTE_EPSILON)).abs() < 1e-15);
        assert!((weights[2] - (2.0 + ROULETTE_EPSILON)).abs() < 1e-15);

        let weights = roulette_weights(&with_fitness(&[0.2, 0.4]));
        assert!((weights[0] - (0.2 + ROULETTE_EPSILON)).abs() < 1e-15);
    }

    #[test]
    fn test_roulette_weights_negative_infinity() {
        let weights = roulette_weights(&with_fitness(&[f64::NEG_INFINITY, 0.3, -0.1]));
        assert_eq!(weights[0], ROULETTE_EPSILON);
        assert!(weights.iter().all(|w| w.is_finite() && *w > 0.0));

        let weights = roulette_weights(&with_fitness(&[f64::NEG_INFINITY, f64::NEG_INFINITY]));
        assert_eq!(weights, vec![ROULETTE_EPSILON, ROULETTE_EPSILON]);
    }

    #[test]
    fn test_select_parent_stays_in_population_and_favours_fitter() {
        let mut ga = GeneticAlgorithm::new(1, GaParams { population_size: 3, ..params() }, ChaCha8Rng::seed_from_u64(7)).unwrap();
        ga.population = with_fitness(&[10.0, 0.0, f64::NEG_INFINITY]);
        ga.state = GaState::Selecting;

        let mut counts = [0usize; 3];
        for _ in 0..1000 {
            counts[ga.select_parent()] += 1;
        }
        assert_eq!(counts.iter().sum::<usize>(), 1000);
        assert!(counts[0] > 990, "the only positive weight must dominate: {:?}", counts);
    }

    #[test]
    fn test_run_history_and_elitism() {
        let mut ga = GeneticAlgorithm::new(6, params(), ChaCha8Rng::seed_from_u64(42)).unwrap();
        let outcome = ga.run(weighted_sum).unwrap();

        assert_eq!(ga.state(), GaState::Terminated);
        assert_eq!(outcome.history.best_genomes.len(), 5);
        assert_eq!(outcome.history.best_fitnesses.len(), 5);
        assert_eq!(outcome.best_genome.len(), 6);
        for w in outcome.history.best_fitnesses.windows(2) {
            assert!(w[1] >= w[0], "best fitness must never decrease: {:?}", outcome.history.best_fitnesses);
        }
        assert_eq!(outcome.best_fitness, *outcome.history.best_fitnesses.last().unwrap());
        assert_eq!(ga.population().len(), 10);
        // the all-ones genome scores 0 and single even-feature seeds score 1
        assert!(outcome.best_fitness >= 1.0);
    }

    #[test]
    fn test_run_is_reproducible() {
        let run = |seed| {
            let p = GaParams { mutation_rate: 0.1, crossover_rate: 0.8, ..params() };
            GeneticAlgorithm::new(8, p, ChaCha8Rng::seed_from_u64(seed)).unwrap().run(weighted_sum).unwrap()
        };
        assert_eq!(run(3), run(3));
    }

    #[test]
    fn test_no_drift_without_crossover_and_mutation() {
        let p = GaParams { population_size: 12, generations: 1, crossover_rate: 0.0, mutation_rate: 0.0, elite_size: 2 };
        let mut ga = GeneticAlgorithm::new(8, p, ChaCha8Rng::seed_from_u64(5)).unwrap();
        ga.initialize_population();
        ga.evaluate_population(&weighted_sum).unwrap();
        let initial: Vec<Vec<u8>> = ga.population().iter().map(|i| i.genome.clone()).collect();
        let elites: Vec<Vec<u8>> = initial[..2].to_vec();

        ga.step(&weighted_sum).unwrap();
        for individual in ga.population() {
            assert!(initial.contains(&individual.genome), "{} is not a copy of an initial genome", individual);
        }
        for elite in elites {
            assert!(ga.population().iter().any(|i| i.genome == elite));
        }
    }

    #[test]
    fn test_single_gene_genome_runs() {
        let p = GaParams { population_size: 4, generations: 3, crossover_rate: 1.0, mutation_rate: 0.5, elite_size: 1 };
        let outcome = GeneticAlgorithm::new(1, p, ChaCha8Rng::seed_from_u64(2)).unwrap().run(weighted_sum).unwrap();
        assert_eq!(outcome.best_genome, vec![1]);
        assert_eq!(outcome.best_fitness, 1.0);
    }

    #[test]
    fn test_fitness_error_aborts_run() {
        let calls = Cell::new(0);
        let failing = |genome: &[u8]| {
            calls.set(calls.get() + 1);
            if calls.get() > 12 {
                Err(FsError::Evaluation("fold failure".to_string()))
            } else {
                weighted_sum(genome)
            }
        };
        let mut ga = GeneticAlgorithm::new(6, params(), ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert!(matches!(ga.run(failing), Err(FsError::Evaluation(_))));
        assert_eq!(calls.get(), 13, "no retry after the failing evaluation");
    }

    #[test]
    fn test_step_requires_evaluated_population() {
        let mut ga = GeneticAlgorithm::new(3, params(), ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert!(ga.step(&weighted_sum).is_err());
        ga.initialize_population();
        assert!(ga.step(&weighted_sum).is_err());
    }

    #[test]
    fn test_empty_genome_never_best_when_finite_exists() {
        let p = GaParams { population_size: 6, generations: 4, crossover_rate: 0.9, mutation_rate: 0.3, elite_size: 1 };
        let outcome = GeneticAlgorithm::new(3, p, ChaCha8Rng::seed_from_u64(8)).unwrap().run(weighted_sum).unwrap();
        assert!(outcome.history.best_fitnesses.iter().all(|f| f.is_finite()));
        assert!(outcome.history.best_genomes.iter().all(|g| g.iter().any(|b| *b == 1)));
    }
}
