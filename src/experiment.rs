use crate::error::Result;
use crate::ga::History;
use crate::param::Param;
use crate::utils::{moving_average, sparkline};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const RESULTS_FILE: &str = "results.json";
pub const HISTORY_FILE: &str = "history.json";
pub const METRICS_FILE: &str = "evolution_metrics.json";

/// GA settings echoed in `results.json`
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RunParameters {
    pub population_size: usize,
    pub generations: usize,
    pub cv: usize,
    pub crossover_rate: f64,
    pub mutation_rate: f64,
    pub elite_size: usize,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ResultsRecord {
    pub selected_features: Vec<String>,
    pub selected_indices: Vec<usize>,
    #[serde(with = "crate::utils::float_format")]
    pub best_score: f64,
    pub parameters: RunParameters,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FeatureUsage {
    pub index: usize,
    pub feature: String,
    /// share of the generations whose best genome selects the feature
    pub frequency: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct EvolutionMetrics {
    #[serde(with = "crate::utils::float_format::vec")]
    pub best_fitnesses: Vec<f64>,
    pub moving_average_window: usize,
    #[serde(with = "crate::utils::float_format::vec")]
    pub moving_average: Vec<f64>,
    pub feature_usage: Vec<FeatureUsage>,
}

/// Complete run record
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    /// Experiment ID, i.e. save name and timestamp
    pub id: String,
    pub timestamp: String,
    /// genfs version and git hash used
    pub genfs_version: String,
    pub parameters: Param,

    /// sha256 of the loaded dataset
    pub data_fingerprint: String,
    pub feature_names: Vec<String>,
    pub sample_len: usize,
    /// Pipeline as `name(Kind) -> ...`
    pub pipeline: String,

    pub selected_indices: Vec<usize>,
    pub selected_features: Vec<String>,
    #[serde(with = "crate::utils::float_format")]
    pub best_score: f64,
    pub history: History,

    /// Execution time in seconds
    pub execution_time: f64,
}

impl Experiment {
    pub fn results_record(&self) -> ResultsRecord {
        let ga = &self.parameters.ga;
        ResultsRecord {
            selected_features: self.selected_features.clone(),
            selected_indices: self.selected_indices.clone(),
            best_score: self.best_score,
            parameters: RunParameters {
                population_size: ga.population_size,
                generations: ga.generations,
                cv: self.parameters.cv.folds,
                crossover_rate: ga.crossover_rate,
                mutation_rate: ga.mutation_rate,
                elite_size: ga.elite_size,
            },
        }
    }

    /// Fitness series, its moving average (window capped by the series length)
    /// and how often each feature appears in the per-generation best genomes.
    pub fn evolution_metrics(&self) -> EvolutionMetrics {
        let fitnesses = &self.history.best_fitnesses;
        let window = self.parameters.output.moving_average_window.min(fitnesses.len());
        EvolutionMetrics {
            best_fitnesses: fitnesses.clone(),
            moving_average_window: window,
            moving_average: moving_average(fitnesses, window),
            feature_usage: self.feature_usage(),
        }
    }

    pub fn feature_usage(&self) -> Vec<FeatureUsage> {
        let generations = self.history.best_genomes.len();
        self.feature_names
            .iter()
            .enumerate()
            .map(|(index, feature)| {
                let hits = self.history.best_genomes.iter().filter(|g| g.get(index) == Some(&1)).count();
                FeatureUsage {
                    index,
                    feature: feature.clone(),
                    frequency: if generations > 0 { hits as f64 / generations as f64 } else { 0.0 },
                }
            })
            .collect()
    }

    /// Write results, history and evolution metrics as JSON files in `dir`
    pub fn write_outputs<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let files = vec![
            (dir.join(RESULTS_FILE), serde_json::to_string_pretty(&self.results_record())?),
            (dir.join(HISTORY_FILE), serde_json::to_string_pretty(&self.history)?),
            (dir.join(METRICS_FILE), serde_json::to_string_pretty(&self.evolution_metrics())?),
        ];

        let mut written = Vec::with_capacity(files.len());
        for (path, content) in files {
            fs::write(&path, content)?;
            info!("Saved {}", path.display());
            written.push(path);
        }
        Ok(written)
    }

    pub fn display_results(&self, n_features_to_display: usize) -> String {
        let mut text = String::new();
        text.push_str(&format!("\n=============== Experiment {} ===============\n\n", self.id));
        text.push_str(&format!("genfs version: v{}\n", self.genfs_version));
        text.push_str(&format!("Timestamp: {}\n", self.timestamp));
        text.push_str(&format!("Execution time: {:.2}s\n", self.execution_time));
        text.push_str(&format!("Data: {} samples, {} features ({})\n", self.sample_len, self.feature_names.len(), &self.data_fingerprint[..self.data_fingerprint.len().min(12)]));
        text.push_str(&format!("Pipeline: {}\n", self.pipeline));
        text.push_str(&format!("Parameters: \x1b[2;97m{:?}\x1b[0m\n\n", self.results_record().parameters));

        text.push_str(&format!(
            "\x1b[1;93mBest {} {:.4}\x1b[0m with {} features: \x1b[96m{}\x1b[0m\n",
            self.parameters.cv.scoring,
            self.best_score,
            self.selected_indices.len(),
            self.selected_features.join(", ")
        ));

        let metrics = self.evolution_metrics();
        if !metrics.best_fitnesses.is_empty() {
            text.push_str(&format!(
                "Best fitness per generation  {}  [{:.4} .. {:.4}]\n",
                sparkline(&metrics.best_fitnesses),
                metrics.best_fitnesses.first().copied().unwrap_or(f64::NAN),
                metrics.best_fitnesses.last().copied().unwrap_or(f64::NAN)
            ));
            text.push_str(&format!(
                "Moving average (window {})   {}\n",
                metrics.moving_average_window,
                sparkline(&metrics.moving_average)
            ));
        }

        text.push_str(&display_feature_usage(&metrics.feature_usage, &self.selected_indices, n_features_to_display));
        text
    }

    /// Saves the experiment in a suitable format based on file extension.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "json" => self.save_json(path),
            "bin" | "bincode" => self.save_bincode(path),
            _ => {
                warn!("Unknown format. Saving experiment in JSON.");
                self.save_json(path.with_extension("json"))
            }
        }
    }

    /// Saves to JSON (human readable, non finite scores are written as "inf", "-inf" or "NaN")
    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Saves as Bincode (compact binary, Rust-only)
    fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, bincode::serialize(self)?)?;
        Ok(())
    }

    /// Loads an experiment, the format being chosen from the file extension
    /// (bincode first then JSON when the extension is unknown).
    pub fn load_auto<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match extension(path).as_str() {
            "json" => Self::load_json(path),
            "bin" | "bincode" => Self::load_bincode(path),
            _ => Self::load_bincode(path).or_else(|_| Self::load_json(path)),
        }
    }

    fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
    }

    fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(bincode::deserialize(&fs::read(path)?)?)
    }
}

fn extension(path: &Path) -> String {
    path.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase()
}

/// Usage frequency bars, most used features first, selected ones highlighted
pub fn display_feature_usage(usage: &[FeatureUsage], selected: &[usize], nb_features: usize) -> String {
    const BAR_WIDTH: usize = 30;

    let mut sorted: Vec<&FeatureUsage> = usage.iter().collect();
    sorted.sort_by(|a, b| b.frequency.partial_cmp(&a.frequency).unwrap_or(std::cmp::Ordering::Equal).then(a.index.cmp(&b.index)));

    let name_width = sorted.iter().take(nb_features).map(|u| u.feature.chars().count()).max().unwrap_or(0).min(30);
    let mut text = format!("\nFeature usage across generations (top {} of {}):\n", nb_features.min(usage.len()), usage.len());
    for u in sorted.iter().take(nb_features) {
        let filled = (u.frequency * BAR_WIDTH as f64).round() as usize;
        let bar = format!("{}{}", "█".repeat(filled), "·".repeat(BAR_WIDTH - filled.min(BAR_WIDTH)));
        let name = format!("{:<width$.width$}", u.feature, width = name_width);
        if selected.contains(&u.index) {
            text.push_str(&format!("  \x1b[96m{}\x1b[0m {} {:>5.1}% *\n", name, bar, u.frequency * 100.0));
        } else {
            text.push_str(&format!("  {} {} {:>5.1}%\n", name, bar, u.frequency * 100.0));
        }
    }
    text
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::utils::strip_ansi;

    impl Experiment {
        pub fn test() -> Experiment {
            Experiment {
                id: "test_2025-01-01_12-00-00".to_string(),
                timestamp: "2025-01-01_12-00-00".to_string(),
                genfs_version: "0.0.0#test".to_string(),
                parameters: Param::default(),
                data_fingerprint: "ab".repeat(32),
                feature_names: crate::string_vec!["signal", "noise", "parity"],
                sample_len: 8,
                pipeline: "model(GaussianNB)".to_string(),
                selected_indices: vec![0, 2],
                selected_features: crate::string_vec!["signal", "parity"],
                best_score: 0.875,
                history: History {
                    best_genomes: vec![vec![1, 1, 1], vec![1, 0, 1], vec![1, 0, 1], vec![1, 0, 1]],
                    best_fitnesses: vec![0.5, 0.75, 0.875, 0.875],
                },
                execution_time: 1.5,
            }
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("genfs_{}_{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_results_record_echoes_parameters() {
        let record = Experiment::test().results_record();
        assert_eq!(record.selected_indices, vec![0, 2]);
        assert_eq!(record.parameters.population_size, 50);
        assert_eq!(record.parameters.cv, 5);
        assert_eq!(record.parameters.elite_size, 2);
    }

    #[test]
    fn test_evolution_metrics() {
        let mut exp = Experiment::test();
        let metrics = exp.evolution_metrics();
        // 4 generations: window capped to 4
        assert_eq!(metrics.moving_average_window, 4);
        assert_eq!(metrics.moving_average.len(), 1);
        assert!((metrics.moving_average[0] - 0.75).abs() < 1e-12);

        let freq: Vec<f64> = metrics.feature_usage.iter().map(|u| u.frequency).collect();
        assert_eq!(freq, vec![1.0, 0.25, 1.0]);

        exp.parameters.output.moving_average_window = 2;
        assert_eq!(exp.evolution_metrics().moving_average, vec![0.625, 0.8125, 0.875]);
    }

    #[test]
    fn test_write_outputs_creates_json_files() {
        let dir = temp_dir("outputs");
        let written = Experiment::test().write_outputs(&dir).unwrap();
        assert_eq!(written.len(), 3);

        let results: serde_json::Value = serde_json::from_str(&fs::read_to_string(dir.join(RESULTS_FILE)).unwrap()).unwrap();
        assert_eq!(results["selected_features"], serde_json::json!(["signal", "parity"]));
        assert_eq!(results["best_score"], serde_json::json!(0.875));
        assert_eq!(results["parameters"]["crossover_rate"], serde_json::json!(0.8));

        let history: History = serde_json::from_str(&fs::read_to_string(dir.join(HISTORY_FILE)).unwrap()).unwrap();
        assert_eq!(history, Experiment::test().history);

        assert!(dir.join(METRICS_FILE).exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_save_and_load_auto() {
        let dir = temp_dir("save");
        fs::create_dir_all(&dir).unwrap();
        let exp = Experiment::test();

        for name in ["exp.json", "exp.bin"] {
            let path = dir.join(name);
            exp.save_auto(&path).unwrap();
            assert_eq!(Experiment::load_auto(&path).unwrap(), exp, "{} must reload identically", name);
        }

        exp.save_auto(dir.join("exp.unknown")).unwrap();
        assert!(dir.join("exp.json").exists());
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_non_finite_fitness_survives_json_and_bincode() {
        let dir = temp_dir("non_finite");
        let mut exp = Experiment::test();
        exp.selected_indices.clear();
        exp.selected_features.clear();
        exp.best_score = f64::NEG_INFINITY;
        exp.history.best_fitnesses[0] = f64::NEG_INFINITY;

        fs::create_dir_all(&dir).unwrap();
        for name in ["exp.json", "exp.bin"] {
            let path = dir.join(name);
            exp.save_auto(&path).unwrap();
            assert_eq!(Experiment::load_auto(&path).unwrap(), exp, "{} must keep -inf", name);
        }

        exp.write_outputs(&dir).unwrap();
        let history_json = fs::read_to_string(dir.join(HISTORY_FILE)).unwrap();
        assert!(history_json.contains("\"-inf\""));
        assert!(!history_json.contains("null"));
        let history: History = serde_json::from_str(&history_json).unwrap();
        assert_eq!(history, exp.history);

        let results: ResultsRecord = serde_json::from_str(&fs::read_to_string(dir.join(RESULTS_FILE)).unwrap()).unwrap();
        assert_eq!(results.best_score, f64::NEG_INFINITY);
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_display_results_mentions_selection() {
        let text = strip_ansi(&Experiment::test().display_results(2));
        assert!(text.contains("Best accuracy 0.8750 with 2 features: signal, parity"));
        assert!(text.contains("top 2 of 3"));
        assert!(text.contains("Moving average (window 4)"));
    }

    #[test]
    fn test_display_feature_usage_orders_by_frequency() {
        let usage = Experiment::test().feature_usage();
        let text = display_feature_usage(&usage, &[0], 3);
        let lines: Vec<String> = strip_ansi(&text).lines().skip(2).map(|l| l.trim().to_string()).collect();
        assert!(lines[0].starts_with("signal"));
        assert!(lines[0].ends_with('*'));
        assert!(lines[1].starts_with("parity"));
        assert!(lines[2].starts_with("noise"));
    }
}
