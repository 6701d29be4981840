use clap::Parser;
use flexi_logger::{Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle};
use genfs::cinfo;
use genfs::param::{self, Param};
use log::{error, info};
use std::process;

/// Command line flags, applied over the parameter file
#[derive(Parser, Debug)]
#[command(name = "genfs", version, about = "Genetic algorithm wrapper feature selection")]
struct Cli {
    /// YAML parameter file (defaults are used for anything it omits)
    #[arg(short, long)]
    param: Option<String>,

    /// Input CSV file
    #[arg(short, long)]
    input: Option<String>,

    /// Target column name
    #[arg(short, long)]
    target: Option<String>,

    /// Pipeline description (YAML)
    #[arg(short, long)]
    config: Option<String>,

    /// Directory receiving the result files
    #[arg(short, long)]
    output_dir: Option<String>,

    #[arg(long)]
    pop_size: Option<usize>,

    #[arg(long)]
    generations: Option<usize>,

    /// Number of cross-validation folds
    #[arg(long)]
    cv: Option<usize>,

    #[arg(long)]
    crossover_rate: Option<f64>,

    #[arg(long)]
    mutation_rate: Option<f64>,

    #[arg(long)]
    elite_size: Option<usize>,

    /// Cross-validation metric (accuracy, roc_auc, r2, ...)
    #[arg(long)]
    scoring: Option<String>,

    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn apply(&self, param: &mut Param) {
        if let Some(input) = &self.input {
            param.data.X = input.clone();
        }
        if let Some(target) = &self.target {
            param.data.target = target.clone();
        }
        if let Some(config) = &self.config {
            param.pipeline.config = config.clone();
        }
        if let Some(dir) = &self.output_dir {
            param.output.dir = dir.clone();
        }
        if let Some(scoring) = &self.scoring {
            param.cv.scoring = scoring.clone();
        }
        param.ga.population_size = self.pop_size.unwrap_or(param.ga.population_size);
        param.ga.generations = self.generations.unwrap_or(param.ga.generations);
        param.ga.crossover_rate = self.crossover_rate.unwrap_or(param.ga.crossover_rate);
        param.ga.mutation_rate = self.mutation_rate.unwrap_or(param.ga.mutation_rate);
        param.ga.elite_size = self.elite_size.unwrap_or(param.ga.elite_size);
        param.cv.folds = self.cv.unwrap_or(param.cv.folds);
        param.general.seed = self.seed.unwrap_or(param.general.seed);
    }
}

fn start_logger(param: &Param) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(&param.general.log_level)?;
    if param.general.log_base.is_empty() {
        logger.start()
    } else {
        logger
            .log_to_file(
                FileSpec::default()
                    .basename(&param.general.log_base)
                    .suffix(&param.general.log_suffix)
                    .use_timestamp(true),
            )
            .duplicate_to_stderr(Duplicate::All)
            .start()
    }
}

fn execute(param: &Param) -> genfs::Result<()> {
    let experiment = genfs::run(param)?;

    cinfo!(param.general.display_colorful, "{}", experiment.display_results(param.general.n_features_to_display));
    experiment.write_outputs(&param.output.dir)?;

    if !param.general.save_exp.is_empty() {
        experiment.save_auto(&param.general.save_exp)?;
        info!("Experiment saved to {}", param.general.save_exp);
    }

    Ok(())
}

fn main() {
    let cli = Cli::parse();

    let mut param = match &cli.param {
        Some(path) => match param::get(path) {
            Ok(param) => param,
            Err(e) => {
                eprintln!("Cannot read parameter file {}: {}", path, e);
                process::exit(1);
            }
        },
        None => Param::default(),
    };
    cli.apply(&mut param);

    let _logger = match start_logger(&param) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Cannot start logging: {}", e);
            process::exit(1);
        }
    };

    info!("genfs v{}", genfs::version());

    if let Err(e) = param::validate(&mut param) {
        error!("{}", e);
        process::exit(2);
    }

    if let Err(e) = execute(&param) {
        error!("{}", e);
        process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_parameter_file() {
        let cli = Cli::parse_from([
            "genfs", "-i", "data.csv", "-t", "label", "-c", "pipe.yaml", "-o", "out", "--pop-size", "12",
            "--generations", "3", "--cv", "4", "--crossover-rate", "0.5", "--mutation-rate", "0.2",
            "--elite-size", "1", "--seed", "7", "--scoring", "f1",
        ]);
        let mut param = Param::default();
        cli.apply(&mut param);

        assert_eq!(param.data.X, "data.csv");
        assert_eq!(param.data.target, "label");
        assert_eq!(param.pipeline.config, "pipe.yaml");
        assert_eq!(param.output.dir, "out");
        assert_eq!(param.ga.population_size, 12);
        assert_eq!(param.ga.generations, 3);
        assert_eq!(param.cv.folds, 4);
        assert_eq!(param.ga.crossover_rate, 0.5);
        assert_eq!(param.ga.mutation_rate, 0.2);
        assert_eq!(param.ga.elite_size, 1);
        assert_eq!(param.general.seed, 7);
        assert_eq!(param.cv.scoring, "f1");
    }

    #[test]
    fn test_cli_keeps_file_values_when_absent() {
        let cli = Cli::parse_from(["genfs"]);
        let mut param = Param::default();
        param.ga.generations = 99;
        cli.apply(&mut param);
        assert_eq!(param.ga.generations, 99);
        assert_eq!(param.ga.population_size, 50);
    }
}
