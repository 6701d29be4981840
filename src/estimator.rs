use crate::error::{FsError, Result};
use argmin::core::{CostFunction, Error as ArgminError, Executor, Gradient};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::quasinewton::LBFGS;
use nalgebra::{DMatrix, DVector};
use statrs::distribution::{Continuous, Normal};
use statrs::function::logistic::logistic;
use std::cmp::Ordering;
use std::fmt;

//-----------------------------------------------------------------------------
// Traits
//-----------------------------------------------------------------------------

/// A preprocessing step: learns its parameters on a matrix, then rewrites matrices.
pub trait Transformer: Send + Sync {
    fn fit(&mut self, X: &[Vec<f64>]) -> Result<()>;
    fn transform(&self, X: &[Vec<f64>]) -> Result<Vec<Vec<f64>>>;
    fn name(&self) -> &'static str;
    fn box_clone(&self) -> Box<dyn Transformer>;
}

/// A predictive model. Instances kept in a pipeline description are prototypes:
/// each cross-validation fold fits its own `box_clone()`.
pub trait Estimator: Send + Sync {
    fn fit(&mut self, X: &[Vec<f64>], y: &[f64]) -> Result<()>;
    fn predict(&self, X: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Continuous scores for the positive class of a binary problem, used by roc_auc
    fn decision_scores(&self, _X: &[Vec<f64>]) -> Result<Vec<f64>> {
        Err(FsError::Evaluation(format!("{} does not provide decision scores", self.name())))
    }

    fn is_classifier(&self) -> bool;
    fn name(&self) -> &'static str;
    fn box_clone(&self) -> Box<dyn Estimator>;
}

impl Clone for Box<dyn Transformer> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

impl Clone for Box<dyn Estimator> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

//-----------------------------------------------------------------------------
// Shape helpers
//-----------------------------------------------------------------------------

fn n_columns(X: &[Vec<f64>]) -> Result<usize> {
    let n = X
        .first()
        .map(|row| row.len())
        .ok_or_else(|| FsError::Evaluation("Found array with 0 sample(s)".to_string()))?;
    if X.iter().any(|row| row.len() != n) {
        return Err(FsError::Evaluation("Rows of the feature matrix have different lengths".to_string()));
    }
    if n == 0 {
        return Err(FsError::Evaluation("Found array with 0 feature(s)".to_string()));
    }
    Ok(n)
}

fn check_xy(X: &[Vec<f64>], y: &[f64]) -> Result<usize> {
    if X.len() != y.len() {
        return Err(FsError::Evaluation(format!(
            "Found input variables with inconsistent numbers of samples: [{}, {}]",
            X.len(),
            y.len()
        )));
    }
    n_columns(X)
}

fn check_fitted(n_features: Option<usize>, X: &[Vec<f64>], name: &str) -> Result<()> {
    let expected = n_features.ok_or_else(|| FsError::Evaluation(format!("{} is not fitted yet", name)))?;
    let got = n_columns(X)?;
    if got != expected {
        return Err(FsError::Evaluation(format!(
            "{} was fitted with {} features but received {}",
            name, expected, got
        )));
    }
    Ok(())
}

fn sorted_classes(y: &[f64]) -> Vec<f64> {
    let mut classes = y.to_vec();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    classes.dedup();
    classes
}

fn require_two_classes(classes: &[f64], name: &str) -> Result<()> {
    if classes.len() < 2 {
        return Err(FsError::Evaluation(format!(
            "{} needs samples of at least 2 classes in the data, but the data contains only one class: {:?}",
            name, classes
        )));
    }
    Ok(())
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_v), (i, &v)| if v > best_v { (i, v) } else { (best, best_v) })
        .0
}

//-----------------------------------------------------------------------------
// Transformers
//-----------------------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct StandardScaler {
    pub with_mean: bool,
    pub with_std: bool,
    mean: Vec<f64>,
    scale: Vec<f64>,
    n_features: Option<usize>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        StandardScaler { with_mean: true, with_std: true, mean: Vec::new(), scale: Vec::new(), n_features: None }
    }
}

impl Transformer for StandardScaler {
    fn fit(&mut self, X: &[Vec<f64>]) -> Result<()> {
        let p = n_columns(X)?;
        let n = X.len() as f64;
        let mean: Vec<f64> = (0..p).map(|j| X.iter().map(|row| row[j]).sum::<f64>() / n).collect();
        // constant columns keep a unit scale
        self.scale = (0..p)
            .map(|j| {
                let sd = (X.iter().map(|row| (row[j] - mean[j]).powi(2)).sum::<f64>() / n).sqrt();
                if sd > 0.0 { sd } else { 1.0 }
            })
            .collect();
        self.mean = mean;
        self.n_features = Some(p);
        Ok(())
    }

    fn transform(&self, X: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_fitted(self.n_features, X, self.name())?;
        Ok(X.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, v)| {
                        let centered = if self.with_mean { v - self.mean[j] } else { *v };
                        if self.with_std { centered / self.scale[j] } else { centered }
                    })
                    .collect()
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "StandardScaler"
    }

    fn box_clone(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }
}

#[derive(Clone, Debug)]
pub struct MinMaxScaler {
    pub feature_range: (f64, f64),
    data_min: Vec<f64>,
    data_range: Vec<f64>,
    n_features: Option<usize>,
}

impl Default for MinMaxScaler {
    fn default() -> Self {
        MinMaxScaler { feature_range: (0.0, 1.0), data_min: Vec::new(), data_range: Vec::new(), n_features: None }
    }
}

impl Transformer for MinMaxScaler {
    fn fit(&mut self, X: &[Vec<f64>]) -> Result<()> {
        let p = n_columns(X)?;
        self.data_min = (0..p).map(|j| X.iter().map(|row| row[j]).fold(f64::INFINITY, f64::min)).collect();
        self.data_range = (0..p)
            .map(|j| {
                let max = X.iter().map(|row| row[j]).fold(f64::NEG_INFINITY, f64::max);
                let range = max - self.data_min[j];
                if range > 0.0 { range } else { 1.0 }
            })
            .collect();
        self.n_features = Some(p);
        Ok(())
    }

    fn transform(&self, X: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_fitted(self.n_features, X, self.name())?;
        let (low, high) = self.feature_range;
        Ok(X.iter()
            .map(|row| {
                row.iter()
                    .enumerate()
                    .map(|(j, v)| low + (v - self.data_min[j]) / self.data_range[j] * (high - low))
                    .collect()
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "MinMaxScaler"
    }

    fn box_clone(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }
}

//-----------------------------------------------------------------------------
// Estimators
//-----------------------------------------------------------------------------

/// Past updates kept by L-BFGS to approximate the curvature
const LBFGS_MEMORY: usize = 7;

fn softplus(z: f64) -> f64 {
    if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() }
}

/// Mean log-loss of one binary sub-problem plus `|w|² / (2 C n)`.
/// The parameter vector holds the weights followed by the intercept.
struct LogLoss<'a> {
    X: &'a [Vec<f64>],
    targets: &'a [f64],
    c: f64,
    fit_intercept: bool,
}

impl LogLoss<'_> {
    fn margin(param: &[f64], row: &[f64]) -> f64 {
        let (w, b) = param.split_at(row.len());
        dot(w, row) + b[0]
    }
}

impl CostFunction for LogLoss<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, param: &Self::Param) -> std::result::Result<Self::Output, ArgminError> {
        let n = self.X.len() as f64;
        let p = param.len() - 1;
        let loss: f64 = self
            .X
            .iter()
            .zip(self.targets)
            .map(|(row, t)| {
                let z = Self::margin(param, row);
                softplus(z) - t * z
            })
            .sum();
        let penalty = param[..p].iter().map(|w| w * w).sum::<f64>() / (2.0 * self.c * n);
        Ok(loss / n + penalty)
    }
}

impl Gradient for LogLoss<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, param: &Self::Param) -> std::result::Result<Self::Gradient, ArgminError> {
        let n = self.X.len() as f64;
        let p = param.len() - 1;
        let mut grad = vec![0.0; p + 1];
        for (row, t) in self.X.iter().zip(self.targets) {
            let err = logistic(Self::margin(param, row)) - t;
            for (g, x) in grad[..p].iter_mut().zip(row) {
                *g += err * x;
            }
            grad[p] += err;
        }
        for (g, w) in grad[..p].iter_mut().zip(&param[..p]) {
            *g = *g / n + w / (self.c * n);
        }
        // a zero intercept gradient keeps the intercept at its initial 0
        grad[p] = if self.fit_intercept { grad[p] / n } else { 0.0 };
        Ok(grad)
    }
}

/// L2-regularised logistic regression minimised with L-BFGS, one-vs-rest
/// above two classes. `c` is the inverse regularisation strength.
#[derive(Clone, Debug)]
pub struct LogisticRegression {
    pub c: f64,
    pub max_iter: usize,
    /// gradient norm under which the optimisation stops
    pub tol: f64,
    pub fit_intercept: bool,
    classes: Vec<f64>,
    models: Vec<(Vec<f64>, f64)>,
    n_features: Option<usize>,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        LogisticRegression {
            c: 1.0,
            max_iter: 100,
            tol: 1e-4,
            fit_intercept: true,
            classes: Vec::new(),
            models: Vec::new(),
            n_features: None,
        }
    }
}

impl LogisticRegression {
    fn fit_binary(&self, X: &[Vec<f64>], targets: &[f64]) -> Result<(Vec<f64>, f64)> {
        let p = X[0].len();
        let problem = LogLoss { X, targets, c: self.c, fit_intercept: self.fit_intercept };
        let failed = |e: ArgminError| FsError::Evaluation(format!("{}: optimisation failed: {}", self.name(), e));

        let linesearch: MoreThuenteLineSearch<Vec<f64>, Vec<f64>, f64> =
            MoreThuenteLineSearch::new().with_c(1e-4, 0.9).map_err(failed)?;
        let solver = LBFGS::new(linesearch, LBFGS_MEMORY).with_tolerance_grad(self.tol).map_err(failed)?;

        let result = Executor::new(problem, solver)
            .configure(|state| state.param(vec![0.0; p + 1]).max_iters(self.max_iter as u64))
            .run()
            .map_err(failed)?;

        let param = result
            .state
            .best_param
            .or(result.state.param)
            .ok_or_else(|| FsError::Evaluation(format!("{}: optimisation returned no solution", self.name())))?;
        Ok((param[..p].to_vec(), param[p]))
    }

    fn decision_matrix(&self, X: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_fitted(self.n_features, X, self.name())?;
        Ok(X.iter().map(|row| self.models.iter().map(|(w, b)| dot(w, row) + b).collect()).collect())
    }
}

impl Estimator for LogisticRegression {
    fn fit(&mut self, X: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let p = check_xy(X, y)?;
        let classes = sorted_classes(y);
        require_two_classes(&classes, self.name())?;

        let positives: Vec<&f64> = if classes.len() == 2 { classes[1..].iter().collect() } else { classes.iter().collect() };
        self.models = positives
            .into_iter()
            .map(|c| {
                let targets: Vec<f64> = y.iter().map(|v| if v == c { 1.0 } else { 0.0 }).collect();
                self.fit_binary(X, &targets)
            })
            .collect::<Result<Vec<_>>>()?;
        self.classes = classes;
        self.n_features = Some(p);
        Ok(())
    }

    fn predict(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        let decisions = self.decision_matrix(X)?;
        Ok(decisions
            .iter()
            .map(|d| {
                if self.classes.len() == 2 {
                    if d[0] > 0.0 { self.classes[1] } else { self.classes[0] }
                } else {
                    self.classes[argmax(d)]
                }
            })
            .collect())
    }

    fn decision_scores(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.classes.len() > 2 {
            return Err(FsError::Evaluation("decision scores are only defined for binary targets".to_string()));
        }
        Ok(self.decision_matrix(X)?.into_iter().map(|d| d[0]).collect())
    }

    fn is_classifier(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "LogisticRegression"
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

/// Gaussian naive Bayes with variance smoothing
#[derive(Clone, Debug)]
pub struct GaussianNB {
    pub var_smoothing: f64,
    classes: Vec<f64>,
    log_priors: Vec<f64>,
    distributions: Vec<Vec<Normal>>,
    n_features: Option<usize>,
}

impl Default for GaussianNB {
    fn default() -> Self {
        GaussianNB { var_smoothing: 1e-9, classes: Vec::new(), log_priors: Vec::new(), distributions: Vec::new(), n_features: None }
    }
}

impl GaussianNB {
    fn joint_log_likelihood(&self, X: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        check_fitted(self.n_features, X, self.name())?;
        Ok(X.iter()
            .map(|row| {
                self.log_priors
                    .iter()
                    .zip(&self.distributions)
                    .map(|(prior, dists)| prior + dists.iter().zip(row).map(|(d, x)| d.ln_pdf(*x)).sum::<f64>())
                    .collect()
            })
            .collect())
    }
}

impl Estimator for GaussianNB {
    fn fit(&mut self, X: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let p = check_xy(X, y)?;
        let n = X.len() as f64;
        let classes = sorted_classes(y);

        let variance = |rows: &[&Vec<f64>], j: usize| {
            let m = rows.iter().map(|r| r[j]).sum::<f64>() / rows.len() as f64;
            (m, rows.iter().map(|r| (r[j] - m).powi(2)).sum::<f64>() / rows.len() as f64)
        };

        let all_rows: Vec<&Vec<f64>> = X.iter().collect();
        let max_var = (0..p).map(|j| variance(&all_rows, j).1).fold(0.0, f64::max);
        let epsilon = (self.var_smoothing * max_var).max(1e-12);

        self.log_priors = Vec::with_capacity(classes.len());
        self.distributions = Vec::with_capacity(classes.len());
        for c in &classes {
            let rows: Vec<&Vec<f64>> = X.iter().zip(y).filter(|(_, v)| *v == c).map(|(r, _)| r).collect();
            self.log_priors.push((rows.len() as f64 / n).ln());
            let dists = (0..p)
                .map(|j| {
                    let (mean, var) = variance(&rows, j);
                    Normal::new(mean, (var + epsilon).sqrt())
                        .map_err(|e| FsError::Evaluation(format!("{} could not fit feature {}: {}", self.name(), j, e)))
                })
                .collect::<Result<Vec<Normal>>>()?;
            self.distributions.push(dists);
        }
        self.classes = classes;
        self.n_features = Some(p);
        Ok(())
    }

    fn predict(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        Ok(self.joint_log_likelihood(X)?.iter().map(|jll| self.classes[argmax(jll)]).collect())
    }

    fn decision_scores(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.classes.len() != 2 {
            return Err(FsError::Evaluation("decision scores are only defined for binary targets".to_string()));
        }
        Ok(self.joint_log_likelihood(X)?.iter().map(|jll| jll[1] - jll[0]).collect())
    }

    fn is_classifier(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "GaussianNB"
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KnnWeights {
    Uniform,
    Distance,
}

/// Brute-force k nearest neighbours (euclidean), as classifier or regressor
#[derive(Clone, Debug)]
pub struct KNeighbors {
    pub n_neighbors: usize,
    pub weights: KnnWeights,
    regression: bool,
    X_train: Vec<Vec<f64>>,
    y_train: Vec<f64>,
    classes: Vec<f64>,
    n_features: Option<usize>,
}

impl KNeighbors {
    pub fn classifier() -> KNeighbors {
        KNeighbors {
            n_neighbors: 5,
            weights: KnnWeights::Uniform,
            regression: false,
            X_train: Vec::new(),
            y_train: Vec::new(),
            classes: Vec::new(),
            n_features: None,
        }
    }

    pub fn regressor() -> KNeighbors {
        KNeighbors { regression: true, ..KNeighbors::classifier() }
    }

    /// (weight, target) of the k closest training samples
    fn neighbours(&self, row: &[f64]) -> Vec<(f64, f64)> {
        let mut distances: Vec<(f64, f64)> = self
            .X_train
            .iter()
            .zip(&self.y_train)
            .map(|(train, y)| (train.iter().zip(row).map(|(a, b)| (a - b).powi(2)).sum::<f64>().sqrt(), *y))
            .collect();
        distances.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
        distances.truncate(self.n_neighbors);

        match self.weights {
            KnnWeights::Uniform => distances.into_iter().map(|(_, y)| (1.0, y)).collect(),
            KnnWeights::Distance => {
                // exact matches take all the weight
                if distances.iter().any(|(d, _)| *d == 0.0) {
                    distances.into_iter().map(|(d, y)| (if d == 0.0 { 1.0 } else { 0.0 }, y)).collect()
                } else {
                    distances.into_iter().map(|(d, y)| (1.0 / d, y)).collect()
                }
            }
        }
    }

    fn class_weights(&self, row: &[f64]) -> Vec<f64> {
        let mut votes = vec![0.0; self.classes.len()];
        for (w, y) in self.neighbours(row) {
            if let Some(idx) = self.classes.iter().position(|c| *c == y) {
                votes[idx] += w;
            }
        }
        votes
    }
}

impl Estimator for KNeighbors {
    fn fit(&mut self, X: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let p = check_xy(X, y)?;
        if self.n_neighbors == 0 || self.n_neighbors > X.len() {
            return Err(FsError::Evaluation(format!(
                "Expected 0 < n_neighbors <= n_samples, but n_samples = {}, n_neighbors = {}",
                X.len(),
                self.n_neighbors
            )));
        }
        self.X_train = X.to_vec();
        self.y_train = y.to_vec();
        self.classes = if self.regression { Vec::new() } else { sorted_classes(y) };
        self.n_features = Some(p);
        Ok(())
    }

    fn predict(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_fitted(self.n_features, X, self.name())?;
        Ok(X.iter()
            .map(|row| {
                if self.regression {
                    let neighbours = self.neighbours(row);
                    let total: f64 = neighbours.iter().map(|(w, _)| w).sum();
                    neighbours.iter().map(|(w, y)| w * y).sum::<f64>() / total
                } else {
                    // ties go to the smallest label
                    self.classes[argmax(&self.class_weights(row))]
                }
            })
            .collect())
    }

    fn decision_scores(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        if self.regression || self.classes.len() != 2 {
            return Err(FsError::Evaluation("decision scores are only defined for binary classification".to_string()));
        }
        check_fitted(self.n_features, X, self.name())?;
        Ok(X.iter()
            .map(|row| {
                let votes = self.class_weights(row);
                votes[1] / (votes[0] + votes[1])
            })
            .collect())
    }

    fn is_classifier(&self) -> bool {
        !self.regression
    }

    fn name(&self) -> &'static str {
        if self.regression { "KNeighborsRegressor" } else { "KNeighborsClassifier" }
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

/// Least squares with an L2 penalty `alpha`, solved in closed form on centered data
/// (Cholesky factorisation of the regularised gram matrix).
/// `alpha = 0` is ordinary least squares.
#[derive(Clone, Debug)]
pub struct Ridge {
    pub alpha: f64,
    pub fit_intercept: bool,
    kind: &'static str,
    coef: Vec<f64>,
    intercept: f64,
    n_features: Option<usize>,
}

impl Ridge {
    pub fn new(alpha: f64) -> Ridge {
        Ridge { alpha, fit_intercept: true, kind: "Ridge", coef: Vec::new(), intercept: 0.0, n_features: None }
    }

    pub fn linear_regression() -> Ridge {
        Ridge { kind: "LinearRegression", ..Ridge::new(0.0) }
    }

    pub fn coefficients(&self) -> (&[f64], f64) {
        (&self.coef, self.intercept)
    }
}

impl Estimator for Ridge {
    fn fit(&mut self, X: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let p = check_xy(X, y)?;
        let n = X.len() as f64;
        let (x_mean, y_mean) = if self.fit_intercept {
            ((0..p).map(|j| X.iter().map(|r| r[j]).sum::<f64>() / n).collect::<Vec<f64>>(), y.iter().sum::<f64>() / n)
        } else {
            (vec![0.0; p], 0.0)
        };

        let centered = DMatrix::from_fn(X.len(), p, |i, j| X[i][j] - x_mean[j]);
        let target = DVector::from_fn(y.len(), |i, _| y[i] - y_mean);
        let gram = centered.transpose() * &centered + DMatrix::<f64>::identity(p, p) * self.alpha;
        let rhs = centered.transpose() * target;

        let singular = || {
            FsError::Evaluation(format!(
                "{}: singular system (collinear or constant features), use Ridge with alpha > 0",
                self.kind
            ))
        };
        // rank check first: a semi-definite gram can still pass a Cholesky factorisation with a tiny pivot
        let tolerance = 1e-10 * gram.diagonal().amax().max(1.0);
        if gram.rank(tolerance) < p {
            return Err(singular());
        }
        let coef = gram.cholesky().ok_or_else(singular)?.solve(&rhs);
        self.coef = coef.iter().copied().collect();
        self.intercept = y_mean - dot(&self.coef, &x_mean);
        self.n_features = Some(p);
        Ok(())
    }

    fn predict(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        check_fitted(self.n_features, X, self.name())?;
        Ok(X.iter().map(|row| dot(&self.coef, row) + self.intercept).collect())
    }

    fn is_classifier(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str {
        self.kind
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

//-----------------------------------------------------------------------------
// Pipeline
//-----------------------------------------------------------------------------

/// Named transformers applied in order, then a final estimator
#[derive(Clone)]
pub struct Pipeline {
    pub transformers: Vec<(String, Box<dyn Transformer>)>,
    pub estimator: (String, Box<dyn Estimator>),
}

impl Pipeline {
    pub fn new(transformers: Vec<(String, Box<dyn Transformer>)>, estimator: (String, Box<dyn Estimator>)) -> Pipeline {
        Pipeline { transformers, estimator }
    }

    fn transform_chain(&self, X: &[Vec<f64>]) -> Result<Vec<Vec<f64>>> {
        let mut current = X.to_vec();
        for (_, transformer) in &self.transformers {
            current = transformer.transform(&current)?;
        }
        Ok(current)
    }
}

impl Estimator for Pipeline {
    fn fit(&mut self, X: &[Vec<f64>], y: &[f64]) -> Result<()> {
        let mut current = X.to_vec();
        for (_, transformer) in self.transformers.iter_mut() {
            transformer.fit(&current)?;
            current = transformer.transform(&current)?;
        }
        self.estimator.1.fit(&current, y)
    }

    fn predict(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.estimator.1.predict(&self.transform_chain(X)?)
    }

    fn decision_scores(&self, X: &[Vec<f64>]) -> Result<Vec<f64>> {
        self.estimator.1.decision_scores(&self.transform_chain(X)?)
    }

    fn is_classifier(&self) -> bool {
        self.estimator.1.is_classifier()
    }

    fn name(&self) -> &'static str {
        "Pipeline"
    }

    fn box_clone(&self) -> Box<dyn Estimator> {
        Box::new(self.clone())
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, transformer) in &self.transformers {
            write!(f, "{}({}) -> ", name, transformer.name())?;
        }
        write!(f, "{}({})", self.estimator.0, self.estimator.1.name())
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipeline[{}]", self)
    }
}
