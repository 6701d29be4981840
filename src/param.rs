use crate::error::{FsError, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub ga: GA,
    #[serde(default)]
    pub cv: CV,
    #[serde(default)]
    pub pipeline: Pipeline,
    #[serde(default)]
    pub output: Output,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    /// size of the fold evaluation pool, all available cores by default
    #[serde(default = "thread_number_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "n_features_to_display_default")]
    pub n_features_to_display: usize,
    #[serde(default = "empty_string")]
    pub save_exp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub X: String,
    #[serde(default = "empty_string")]
    pub target: String,
    #[serde(default = "delimiter_default")]
    pub delimiter: char,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct GA {
    #[serde(default = "pop_size_default")]
    pub population_size: usize,
    #[serde(default = "generations_default")]
    pub generations: usize,
    #[serde(default = "crossover_rate_default")]
    pub crossover_rate: f64,
    #[serde(default = "mutation_rate_default")]
    pub mutation_rate: f64,
    #[serde(default = "elite_size_default")]
    pub elite_size: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CV {
    #[serde(default = "folds_default")]
    pub folds: usize,
    #[serde(default = "scoring_default")]
    pub scoring: String,
    #[serde(default = "true_default")]
    pub stratified: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Pipeline {
    #[serde(default = "empty_string")]
    pub config: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Output {
    #[serde(default = "output_dir_default")]
    pub dir: String,
    #[serde(default = "moving_average_window_default")]
    pub moving_average_window: usize,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for GA {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for CV {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Output {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Param {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Read a parameter file (YAML). Validation is left to the caller so that
/// command line overrides can be applied first.
pub fn get(param_file: &str) -> Result<Param> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let config: Param = serde_yaml::from_reader(param_reader)?;

    Ok(config)
}

pub fn validate(param: &mut Param) -> Result<()> {
    if !param.general.log_base.is_empty() {
        param.general.display_colorful = false;
    }

    if param.data.X.is_empty() {
        return Err(FsError::Config("No input file given (data.X / --input).".to_string()));
    }

    if param.data.target.is_empty() {
        return Err(FsError::Config("No target column given (data.target / --target).".to_string()));
    }

    if param.pipeline.config.is_empty() {
        return Err(FsError::Config("No pipeline description given (pipeline.config / --config).".to_string()));
    }

    if param.general.thread_number == 0 {
        warn!("thread_number=0: using all {} available threads.", thread_number_default());
        param.general.thread_number = thread_number_default();
    }

    validate_ga(param)?;
    validate_cv(param)?;

    Ok(())
}

fn validate_ga(param: &Param) -> Result<()> {
    let ga = &param.ga;

    if ga.population_size == 0 {
        return Err(FsError::Config("Invalid population_size=0. Must be >= 1.".to_string()));
    }

    if !(0.0..=1.0).contains(&ga.crossover_rate) {
        return Err(FsError::Config(format!(
            "Invalid crossover_rate={:.3}. Must be in range [0, 1].",
            ga.crossover_rate
        )));
    }

    if !(0.0..=1.0).contains(&ga.mutation_rate) {
        return Err(FsError::Config(format!(
            "Invalid mutation_rate={:.3}. Must be in range [0, 1].",
            ga.mutation_rate
        )));
    }

    if ga.elite_size >= ga.population_size {
        return Err(FsError::Config(format!(
            "Invalid elite_size={}. Must be strictly smaller than population_size={}.",
            ga.elite_size, ga.population_size
        )));
    }

    if ga.elite_size == 0 {
        warn!("elite_size=0: the best score may decrease from one generation to the next.");
    }

    if ga.mutation_rate > 0.5 {
        warn!(
            "mutation_rate={:.2} > 0.5: children will mostly be bit-inverted copies of their parents.",
            ga.mutation_rate
        );
    }

    if ga.generations == 0 {
        warn!("generations=0: only the initial population will be evaluated.");
    }

    Ok(())
}

fn validate_cv(param: &Param) -> Result<()> {
    if param.cv.folds < 2 {
        return Err(FsError::Config(format!(
            "Invalid cv folds={}. Must be >= 2.",
            param.cv.folds
        )));
    }

    crate::scoring::Scoring::from_name(&param.cv.scoring)?;

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn empty_string() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn delimiter_default() -> char {
    ','
}
fn output_dir_default() -> String {
    "results".to_string()
}
fn moving_average_window_default() -> usize {
    5
}
fn n_features_to_display_default() -> usize {
    30
}
fn scoring_default() -> String {
    "accuracy".to_string()
}
fn folds_default() -> usize {
    5
}
fn true_default() -> bool {
    true
}
fn thread_number_default() -> usize {
    rayon::current_num_threads()
}
fn pop_size_default() -> usize {
    50
}
fn generations_default() -> usize {
    20
}
fn crossover_rate_default() -> f64 {
    0.8
}
fn mutation_rate_default() -> f64 {
    0.01
}
fn elite_size_default() -> usize {
    2
}
