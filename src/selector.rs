use crate::cv::KFold;
use crate::data::Data;
use crate::error::{FsError, Result};
use crate::estimator::Estimator;
use crate::fitness::evaluate_fitness;
use crate::ga::{GaParams, GeneticAlgorithm, History};
use crate::param::Param;
use crate::scoring::Scoring;
use log::{info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Stream of the seed used for fold assignment, the GA uses the default stream 0
const FOLD_STREAM: u64 = 1;

#[derive(Clone, Debug, PartialEq)]
pub struct SelectorParams {
    pub ga: GaParams,
    pub folds: usize,
    pub scoring: Scoring,
    pub stratified: bool,
    pub seed: u64,
    pub display_colorful: bool,
}

impl SelectorParams {
    pub fn from_param(param: &Param) -> Result<SelectorParams> {
        Ok(SelectorParams {
            ga: GaParams::from(&param.ga),
            folds: param.cv.folds,
            scoring: Scoring::from_name(&param.cv.scoring)?,
            stratified: param.cv.stratified,
            seed: param.general.seed,
            display_colorful: param.general.display_colorful,
        })
    }
}

/// Wrapper feature selection: a genetic algorithm over feature subsets, each
/// subset scored by cross-validating the estimator on the selected columns.
pub struct FeatureSelector {
    params: SelectorParams,
    estimator: Box<dyn Estimator>,
    kfold: Option<KFold>,
    history: Option<History>,
    best_genome: Option<Vec<u8>>,
    best_score: Option<f64>,
    selected_indices: Vec<usize>,
    selected_names: Vec<String>,
}

impl FeatureSelector {
    /// `estimator` is a prototype: it is never fitted itself, each fold fits a clone
    pub fn new(params: SelectorParams, estimator: Box<dyn Estimator>) -> FeatureSelector {
        FeatureSelector {
            params,
            estimator,
            kfold: None,
            history: None,
            best_genome: None,
            best_score: None,
            selected_indices: Vec::new(),
            selected_names: Vec::new(),
        }
    }

    /// Run the search on `data` and return the selected feature indices (ascending)
    /// with the best cross-validated score.
    pub fn fit(&mut self, data: &Data) -> Result<(Vec<usize>, f64)> {
        if data.features.len() != data.feature_len || data.X.iter().any(|row| row.len() != data.feature_len) {
            return Err(FsError::Data("Feature names and matrix columns do not match".to_string()));
        }

        let scoring = self.params.scoring;
        if scoring.is_classification() != self.estimator.is_classifier() {
            warn!(
                "Scoring '{}' is a {} metric but {} is a {}.",
                scoring.name(),
                if scoring.is_classification() { "classification" } else { "regression" },
                self.estimator.name(),
                if self.estimator.is_classifier() { "classifier" } else { "regressor" }
            );
        }

        let mut fold_rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        fold_rng.set_stream(FOLD_STREAM);
        let stratified = self.params.stratified && self.estimator.is_classifier();
        let kfold = KFold::new(data, self.params.folds, stratified, &mut fold_rng)?;

        info!(
            "Searching {} features with {} on {}-fold{} CV ({})",
            data.feature_len,
            self.estimator.name(),
            kfold.n_folds(),
            if kfold.stratified { " stratified" } else { "" },
            scoring.name()
        );

        let estimator: &dyn Estimator = self.estimator.as_ref();
        let fitness = |genome: &[u8]| evaluate_fitness(genome, data, estimator, &kfold, scoring);

        let ga_rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let mut ga = GeneticAlgorithm::new(data.feature_len, self.params.ga.clone(), ga_rng)?
            .with_display(self.params.display_colorful);
        let outcome = ga.run(fitness)?;

        let selected: Vec<usize> =
            outcome.best_genome.iter().enumerate().filter(|(_, g)| **g == 1).map(|(i, _)| i).collect();

        info!(
            "Selected {} of {} features | best {} {:.4}",
            selected.len(),
            data.feature_len,
            scoring.name(),
            outcome.best_fitness
        );

        self.selected_names = selected.iter().map(|&i| data.features[i].clone()).collect();
        self.selected_indices = selected.clone();
        self.best_genome = Some(outcome.best_genome);
        self.best_score = Some(outcome.best_fitness);
        self.history = Some(outcome.history);
        self.kfold = Some(kfold);

        Ok((selected, outcome.best_fitness))
    }

    /// Per-generation record of the last `fit`
    pub fn history(&self) -> Option<&History> {
        self.history.as_ref()
    }

    pub fn best_genome(&self) -> Option<&[u8]> {
        self.best_genome.as_deref()
    }

    pub fn best_score(&self) -> Option<f64> {
        self.best_score
    }

    pub fn selected_indices(&self) -> &[usize] {
        &self.selected_indices
    }

    pub fn selected_feature_names(&self) -> &[String] {
        &self.selected_names
    }

    pub fn kfold(&self) -> Option<&KFold> {
        self.kfold.as_ref()
    }

    pub fn estimator(&self) -> &dyn Estimator {
        self.estimator.as_ref()
    }
}
