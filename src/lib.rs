#![allow(non_snake_case)]

pub mod cv;
pub mod data;
pub mod error;
pub mod estimator;
pub mod experiment;
pub mod fitness;
pub mod ga;
pub mod individual;
pub mod param;
pub mod registry;
pub mod scoring;
pub mod selector;
pub mod utils;

pub use error::{FsError, Result};

use crate::data::Data;
use crate::experiment::Experiment;
use crate::param::Param;
use crate::registry::load_pipeline;
use crate::selector::{FeatureSelector, SelectorParams};
use chrono::Local;
use log::debug;
use std::time::Instant;

/// Version with the git hash captured at build time
pub fn version() -> String {
    format!("{}#{}", env!("CARGO_PKG_VERSION"), option_env!("GENFS_GIT_SHA").unwrap_or("unknown"))
}

/// Load the data and the pipeline described by `param`, run the selection and
/// gather everything into an Experiment. `param` is expected to be validated.
pub fn run(param: &Param) -> Result<Experiment> {
    let start = Instant::now();
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    let mut data = Data::new();
    data.load_data(&param.data.X, &param.data.target, param.data.delimiter)?;
    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", data);

    let pipeline = load_pipeline(&param.pipeline.config)?;
    let pipeline_description = pipeline.to_string();

    let thread_pool = rayon::ThreadPoolBuilder::new()
        .num_threads(param.general.thread_number)
        .build()
        .map_err(|e| FsError::Config(format!("Cannot build a pool of {} threads: {}", param.general.thread_number, e)))?;
    debug!("Cross-validation folds run on {} thread(s)", thread_pool.current_num_threads());

    let mut selector = FeatureSelector::new(SelectorParams::from_param(param)?, Box::new(pipeline));
    let (selected_indices, best_score) = thread_pool.install(|| selector.fit(&data))?;

    let name = param.general.save_exp.split('.').next().filter(|s| !s.is_empty()).unwrap_or("genfs");

    Ok(Experiment {
        id: format!("{}_{}", name, timestamp),
        timestamp,
        genfs_version: version(),
        parameters: param.clone(),

        data_fingerprint: data.fingerprint(),
        feature_names: data.features.clone(),
        sample_len: data.sample_len,
        pipeline: pipeline_description,

        selected_features: selector.selected_feature_names().to_vec(),
        selected_indices,
        best_score,
        history: selector.history().cloned().unwrap_or_default(),

        execution_time: start.elapsed().as_secs_f64(),
    })
}
