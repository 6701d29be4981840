use crate::error::{FsError, Result};
use crate::estimator::{Estimator, GaussianNB, KNeighbors, KnnWeights, LogisticRegression, MinMaxScaler, Pipeline, Ridge, StandardScaler, Transformer};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Pipeline description as written in the YAML file
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipelineDescription {
    pub steps: Vec<StepDescription>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StepDescription {
    pub name: String,
    pub class: String,
    #[serde(default)]
    pub parameters: Option<Mapping>,
}

pub type TransformerBuilder = fn(&mut StepParameters) -> Result<Box<dyn Transformer>>;
pub type EstimatorBuilder = fn(&mut StepParameters) -> Result<Box<dyn Estimator>>;

#[derive(Clone, Copy)]
pub enum Kind {
    Transformer(TransformerBuilder),
    Estimator(EstimatorBuilder),
}

// Accepted for compatibility with existing descriptions, without effect
const IGNORED_PARAMETERS: [&str; 3] = ["random_state", "n_jobs", "verbose"];

/// Parameters of one step, consumed key by key by the kind's builder.
/// Whatever is left once the builder returns is reported as unknown.
pub struct StepParameters {
    kind: String,
    map: Mapping,
}

impl StepParameters {
    fn new(kind: &str, map: Mapping) -> StepParameters {
        StepParameters { kind: kind.to_string(), map }
    }

    fn take(&mut self, key: &str) -> Option<Value> {
        self.map.remove(key)
    }

    fn invalid(&self, key: &str, expected: &str, value: &Value) -> FsError {
        FsError::Config(format!("{}: parameter '{}' must be {}, got {:?}", self.kind, key, expected, value))
    }

    pub fn f64_or(&mut self, key: &str, default: f64) -> Result<f64> {
        match self.take(key) {
            None => Ok(default),
            Some(v) => v.as_f64().ok_or_else(|| self.invalid(key, "a number", &v)),
        }
    }

    pub fn positive_f64_or(&mut self, key: &str, default: f64) -> Result<f64> {
        let value = self.f64_or(key, default)?;
        if value > 0.0 {
            Ok(value)
        } else {
            Err(self.invalid(key, "strictly positive", &Value::from(value)))
        }
    }

    pub fn usize_or(&mut self, key: &str, default: usize) -> Result<usize> {
        match self.take(key) {
            None => Ok(default),
            Some(v) => v.as_u64().map(|n| n as usize).ok_or_else(|| self.invalid(key, "a non negative integer", &v)),
        }
    }

    pub fn bool_or(&mut self, key: &str, default: bool) -> Result<bool> {
        match self.take(key) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| self.invalid(key, "a boolean", &v)),
        }
    }

    pub fn string_or(&mut self, key: &str, default: &str) -> Result<String> {
        match self.take(key) {
            None => Ok(default.to_string()),
            Some(v) => v.as_str().map(|s| s.to_string()).ok_or_else(|| self.invalid(key, "a string", &v)),
        }
    }

    pub fn pair_or(&mut self, key: &str, default: (f64, f64)) -> Result<(f64, f64)> {
        match self.take(key) {
            None => Ok(default),
            Some(v) => match v.as_sequence().map(|s| s.iter().filter_map(|x| x.as_f64()).collect::<Vec<f64>>()) {
                Some(pair) if pair.len() == 2 => Ok((pair[0], pair[1])),
                _ => Err(self.invalid(key, "a pair of numbers", &v)),
            },
        }
    }

    fn finish(mut self) -> Result<()> {
        for key in IGNORED_PARAMETERS {
            if self.take(key).is_some() {
                debug!("{}: parameter '{}' ignored", self.kind, key);
            }
        }
        if self.map.is_empty() {
            return Ok(());
        }
        let unknown: Vec<String> = self
            .map
            .keys()
            .map(|k| k.as_str().map(|s| s.to_string()).unwrap_or_else(|| format!("{:?}", k)))
            .collect();
        Err(FsError::Config(format!("{}: unknown parameter(s) {}", self.kind, unknown.join(", "))))
    }
}

/// Map of estimator-kind identifiers to constructors
pub struct EstimatorRegistry {
    kinds: BTreeMap<String, Kind>,
}

impl EstimatorRegistry {
    pub fn empty() -> EstimatorRegistry {
        EstimatorRegistry { kinds: BTreeMap::new() }
    }

    pub fn register(&mut self, name: &str, kind: Kind) {
        self.kinds.insert(name.to_string(), kind);
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.kinds.keys().map(|k| k.as_str()).collect()
    }

    /// Resolve a class name by its last dotted segment
    /// (`sklearn.linear_model.Ridge` and `Ridge` are the same kind)
    pub fn lookup(&self, class: &str) -> Result<Kind> {
        let short = class.rsplit('.').next().unwrap_or(class);
        self.kinds.get(short).copied().ok_or_else(|| {
            FsError::Config(format!("Unknown estimator kind '{}'. Known kinds: {}", class, self.kinds().join(", ")))
        })
    }

    pub fn build(&self, description: &PipelineDescription) -> Result<Pipeline> {
        if description.steps.is_empty() {
            return Err(FsError::Config("Pipeline description has no step".to_string()));
        }

        let last = description.steps.len() - 1;
        let mut transformers: Vec<(String, Box<dyn Transformer>)> = Vec::new();
        let mut estimator: Option<(String, Box<dyn Estimator>)> = None;

        for (i, step) in description.steps.iter().enumerate() {
            if step.name.is_empty() || step.class.is_empty() {
                return Err(FsError::Config(format!("Step #{} must have a non empty 'name' and 'class'", i + 1)));
            }
            let mut parameters = StepParameters::new(&step.class, step.parameters.clone().unwrap_or_default());

            match (self.lookup(&step.class)?, i == last) {
                (Kind::Transformer(build), false) => {
                    let transformer = build(&mut parameters)?;
                    parameters.finish()?;
                    transformers.push((step.name.clone(), transformer));
                }
                (Kind::Estimator(build), true) => {
                    let model = build(&mut parameters)?;
                    parameters.finish()?;
                    estimator = Some((step.name.clone(), model));
                }
                (Kind::Transformer(_), true) => {
                    return Err(FsError::Config(format!(
                        "Last step '{}' ({}) must be an estimator, not a transformer",
                        step.name, step.class
                    )))
                }
                (Kind::Estimator(_), false) => {
                    return Err(FsError::Config(format!(
                        "Step '{}' ({}) is an estimator: only the last step can be one",
                        step.name, step.class
                    )))
                }
            }
        }

        let estimator = estimator.ok_or_else(|| FsError::Config("Pipeline has no final estimator".to_string()))?;
        Ok(Pipeline::new(transformers, estimator))
    }

    pub fn parse(&self, yaml: &str) -> Result<Pipeline> {
        let description: PipelineDescription = serde_yaml::from_str(yaml)
            .map_err(|e| FsError::Config(format!("Invalid pipeline description: {}", e)))?;
        self.build(&description)
    }

    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Pipeline> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)?;
        let pipeline = self
            .parse(&yaml)
            .map_err(|e| match e {
                FsError::Config(msg) => FsError::Config(format!("{}: {}", path.display(), msg)),
                other => other,
            })?;
        info!("Pipeline loaded from {}: {}", path.display(), pipeline);
        Ok(pipeline)
    }
}

impl Default for EstimatorRegistry {
    fn default() -> Self {
        let mut registry = EstimatorRegistry::empty();

        registry.register(
            "StandardScaler",
            Kind::Transformer(|p| {
                let mut scaler = StandardScaler::default();
                scaler.with_mean = p.bool_or("with_mean", true)?;
                scaler.with_std = p.bool_or("with_std", true)?;
                Ok(Box::new(scaler))
            }),
        );
        registry.register(
            "MinMaxScaler",
            Kind::Transformer(|p| {
                let mut scaler = MinMaxScaler::default();
                scaler.feature_range = p.pair_or("feature_range", (0.0, 1.0))?;
                Ok(Box::new(scaler))
            }),
        );
        registry.register(
            "LogisticRegression",
            Kind::Estimator(|p| {
                let mut model = LogisticRegression::default();
                model.c = p.positive_f64_or("C", 1.0)?;
                model.max_iter = p.usize_or("max_iter", 100)?;
                model.tol = p.positive_f64_or("tol", 1e-4)?;
                model.fit_intercept = p.bool_or("fit_intercept", true)?;
                Ok(Box::new(model))
            }),
        );
        registry.register(
            "GaussianNB",
            Kind::Estimator(|p| {
                let mut model = GaussianNB::default();
                model.var_smoothing = p.f64_or("var_smoothing", 1e-9)?;
                Ok(Box::new(model))
            }),
        );
        registry.register("KNeighborsClassifier", Kind::Estimator(|p| knn(p, KNeighbors::classifier())));
        registry.register("KNeighborsRegressor", Kind::Estimator(|p| knn(p, KNeighbors::regressor())));
        registry.register(
            "Ridge",
            Kind::Estimator(|p| {
                let mut ridge = Ridge::new(p.f64_or("alpha", 1.0)?);
                if ridge.alpha < 0.0 {
                    return Err(FsError::Config(format!("Ridge: alpha must be >= 0, got {}", ridge.alpha)));
                }
                ridge.fit_intercept = p.bool_or("fit_intercept", true)?;
                Ok(Box::new(ridge))
            }),
        );
        registry.register(
            "LinearRegression",
            Kind::Estimator(|p| {
                let mut linear = Ridge::linear_regression();
                linear.fit_intercept = p.bool_or("fit_intercept", true)?;
                Ok(Box::new(linear))
            }),
        );

        registry
    }
}

fn knn(p: &mut StepParameters, mut model: KNeighbors) -> Result<Box<dyn Estimator>> {
    model.n_neighbors = p.usize_or("n_neighbors", 5)?;
    model.weights = match p.string_or("weights", "uniform")?.as_str() {
        "uniform" => KnnWeights::Uniform,
        "distance" => KnnWeights::Distance,
        other => return Err(FsError::Config(format!("{}: weights must be 'uniform' or 'distance', got '{}'", model.name(), other))),
    };
    Ok(Box::new(model))
}

/// Load a pipeline description file with the built-in kinds
pub fn load_pipeline<P: AsRef<Path>>(path: P) -> Result<Pipeline> {
    EstimatorRegistry::default().load(path)
}
