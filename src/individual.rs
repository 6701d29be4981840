use crate::error::Result;
use rand::seq::index;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A feature subset candidate: one bit per feature, in feature order
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Individual {
    /// 1 when the feature at this position is selected
    pub genome: Vec<u8>,
    /// Cached fitness, None until evaluated or after the genome changed
    pub fitness: Option<f64>,
}

impl Individual {
    pub fn new(genome: Vec<u8>) -> Individual {
        Individual { genome, fitness: None }
    }

    /// Every feature selected
    pub fn full(genome_length: usize) -> Individual {
        Individual::new(vec![1; genome_length])
    }

    /// A single-feature seed genome
    pub fn single(genome_length: usize, feature: usize) -> Individual {
        let mut genome = vec![0; genome_length];
        genome[feature] = 1;
        Individual::new(genome)
    }

    /// Generates an Individual with exactly `k` features, drawn uniformly without replacement
    ///
    /// # Arguments
    ///
    /// * `genome_length` - Number of features
    /// * `k` - Number of selected features, must not exceed `genome_length`
    /// * `rng` - Random number generator
    ///
    /// # Examples
    ///
    /// ```
    /// # use genfs::individual::Individual;
    /// # use rand_chacha::ChaCha8Rng;
    /// # use rand::SeedableRng;
    /// let mut rng = ChaCha8Rng::seed_from_u64(42);
    /// let i = Individual::random_k(10, 3, &mut rng);
    /// assert_eq!(i.k(), 3);
    /// ```
    pub fn random_k(genome_length: usize, k: usize, rng: &mut ChaCha8Rng) -> Individual {
        let mut genome = vec![0; genome_length];
        for idx in index::sample(rng, genome_length, k).iter() {
            genome[idx] = 1;
        }
        Individual::new(genome)
    }

    /// Each bit independently set with probability 1/2
    pub fn random(genome_length: usize, rng: &mut ChaCha8Rng) -> Individual {
        Individual::new((0..genome_length).map(|_| rng.gen_bool(0.5) as u8).collect())
    }

    /// Compute and cache the fitness of the current genome
    pub fn evaluate<F>(&mut self, fitness_fn: F) -> Result<f64>
    where
        F: Fn(&[u8]) -> Result<f64>,
    {
        let fitness = fitness_fn(&self.genome)?;
        self.fitness = Some(fitness);
        Ok(fitness)
    }

    /// Cached fitness, NaN when not evaluated
    pub fn fit(&self) -> f64 {
        self.fitness.unwrap_or(f64::NAN)
    }

    /// Single-point crossover
    ///
    /// The cut point is drawn uniformly in `1..=L-1` so that each child takes at least one gene
    /// from each parent: `a[..p] + b[p..]` and `b[..p] + a[p..]`.
    /// Genomes shorter than 2 have no interior cut point and are cloned instead.
    ///
    /// # Arguments
    ///
    /// * `a`, `b` - Parents, with genomes of the same length
    /// * `rng` - Random number generator
    ///
    /// # Returns
    ///
    /// Two unevaluated children
    pub fn crossover(a: &Individual, b: &Individual, rng: &mut ChaCha8Rng) -> (Individual, Individual) {
        let length = a.genome.len();
        if length < 2 || b.genome.len() != length {
            return (Individual::new(a.genome.clone()), Individual::new(b.genome.clone()));
        }

        let point = rng.gen_range(1..length);
        let first = a.genome[..point].iter().chain(&b.genome[point..]).copied().collect();
        let second = b.genome[..point].iter().chain(&a.genome[point..]).copied().collect();
        (Individual::new(first), Individual::new(second))
    }

    /// Flip each gene with probability `rate` and forget the cached fitness
    pub fn mutate(&mut self, rate: f64, rng: &mut ChaCha8Rng) {
        for gene in self.genome.iter_mut() {
            if rng.gen::<f64>() < rate {
                *gene = 1 - *gene;
            }
        }
        self.fitness = None;
    }

    pub fn selected_indices(&self) -> Vec<usize> {
        self.genome.iter().enumerate().filter(|(_, g)| **g == 1).map(|(i, _)| i).collect()
    }

    pub fn k(&self) -> usize {
        self.genome.iter().filter(|g| **g == 1).count()
    }

    /// Descending fitness, NaN last
    pub fn compare_desc(a: &Individual, b: &Individual) -> Ordering {
        match (a.fit().is_nan(), b.fit().is_nan()) {
            (true, true) => Ordering::Equal,
            (true, false) => Ordering::Greater,
            (false, true) => Ordering::Less,
            (false, false) => b.fit().partial_cmp(&a.fit()).unwrap_or(Ordering::Equal),
        }
    }
}

impl fmt::Display for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self.genome.iter().map(|g| if *g == 1 { '1' } else { '0' }).collect();
        match self.fitness {
            Some(fit) => write!(f, "[{}] k={} fit={:.4}", bits, self.k(), fit),
            None => write!(f, "[{}] k={} fit=?", bits, self.k()),
        }
    }
}

impl fmt::Debug for Individual {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}
