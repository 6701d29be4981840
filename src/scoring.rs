use crate::error::{FsError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Cross-validation scoring metrics. Higher is always better, so error
/// metrics are negated, as in the `neg_*` naming convention.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[allow(non_camel_case_types)]
pub enum Scoring {
    accuracy,
    balanced_accuracy,
    f1,
    precision,
    recall,
    roc_auc,
    r2,
    neg_mean_squared_error,
    neg_mean_absolute_error,
}

const ALL: [Scoring; 9] = [
    Scoring::accuracy,
    Scoring::balanced_accuracy,
    Scoring::f1,
    Scoring::precision,
    Scoring::recall,
    Scoring::roc_auc,
    Scoring::r2,
    Scoring::neg_mean_squared_error,
    Scoring::neg_mean_absolute_error,
];

impl Scoring {
    pub fn from_name(name: &str) -> Result<Scoring> {
        ALL.iter().copied().find(|s| s.name() == name).ok_or_else(|| {
            FsError::Config(format!(
                "Unknown scoring '{}'. Available: {}",
                name,
                ALL.iter().map(|s| s.name()).collect::<Vec<_>>().join(", ")
            ))
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Scoring::accuracy => "accuracy",
            Scoring::balanced_accuracy => "balanced_accuracy",
            Scoring::f1 => "f1",
            Scoring::precision => "precision",
            Scoring::recall => "recall",
            Scoring::roc_auc => "roc_auc",
            Scoring::r2 => "r2",
            Scoring::neg_mean_squared_error => "neg_mean_squared_error",
            Scoring::neg_mean_absolute_error => "neg_mean_absolute_error",
        }
    }

    pub fn is_classification(&self) -> bool {
        !matches!(self, Scoring::r2 | Scoring::neg_mean_squared_error | Scoring::neg_mean_absolute_error)
    }

    /// roc_auc ranks continuous decision scores instead of predicted labels
    pub fn needs_decision_scores(&self) -> bool {
        *self == Scoring::roc_auc
    }

    /// Score a fold. `predictions` are labels, regression values, or decision
    /// scores when `needs_decision_scores()` is true.
    pub fn score(&self, y_true: &[f64], predictions: &[f64]) -> Result<f64> {
        if y_true.len() != predictions.len() {
            return Err(FsError::Evaluation(format!(
                "{} targets but {} predictions",
                y_true.len(),
                predictions.len()
            )));
        }
        if y_true.is_empty() {
            return Err(FsError::Evaluation("Cannot score an empty fold".to_string()));
        }

        let score = match self {
            Scoring::accuracy => accuracy(y_true, predictions),
            Scoring::balanced_accuracy => balanced_accuracy(y_true, predictions),
            Scoring::f1 => {
                let (tp, fp, fn_count) = binary_counts(y_true, predictions, self.name())?;
                ratio(2.0 * tp, 2.0 * tp + fp + fn_count)
            }
            Scoring::precision => {
                let (tp, fp, _) = binary_counts(y_true, predictions, self.name())?;
                ratio(tp, tp + fp)
            }
            Scoring::recall => {
                let (tp, _, fn_count) = binary_counts(y_true, predictions, self.name())?;
                ratio(tp, tp + fn_count)
            }
            Scoring::roc_auc => roc_auc(y_true, predictions)?,
            Scoring::r2 => r2(y_true, predictions),
            Scoring::neg_mean_squared_error => {
                -y_true.iter().zip(predictions).map(|(t, p)| (t - p).powi(2)).sum::<f64>() / y_true.len() as f64
            }
            Scoring::neg_mean_absolute_error => {
                -y_true.iter().zip(predictions).map(|(t, p)| (t - p).abs()).sum::<f64>() / y_true.len() as f64
            }
        };

        Ok(score)
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den > 0.0 {
        num / den
    } else {
        0.0
    }
}

fn same_label(a: f64, b: f64) -> bool {
    a.round() == b.round()
}

fn accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| same_label(**t, **p)).count();
    correct as f64 / y_true.len() as f64
}

/// mean of the per-class recalls, over classes present in y_true
fn balanced_accuracy(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mut classes: Vec<f64> = y_true.iter().map(|v| v.round()).collect();
    classes.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    classes.dedup();

    let recalls: Vec<f64> = classes
        .iter()
        .map(|&c| {
            let (hit, total) = y_true.iter().zip(y_pred).filter(|(t, _)| same_label(**t, c)).fold(
                (0usize, 0usize),
                |(hit, total), (_, p)| (hit + same_label(*p, c) as usize, total + 1),
            );
            hit as f64 / total as f64
        })
        .collect();

    recalls.iter().sum::<f64>() / recalls.len() as f64
}

fn is_binary_label(v: f64) -> bool {
    same_label(v, 0.0) || same_label(v, 1.0)
}

/// (tp, fp, fn) with 1 as the positive label. Labels outside {0, 1} on
/// either side are an error rather than being counted as negatives.
fn binary_counts(y_true: &[f64], y_pred: &[f64], metric: &str) -> Result<(f64, f64, f64)> {
    if !y_true.iter().chain(y_pred).all(|v| is_binary_label(*v)) {
        return Err(FsError::Evaluation(format!(
            "Target is multiclass but {} only supports binary 0/1 labels",
            metric
        )));
    }

    let mut tp = 0.0;
    let mut fp = 0.0;
    let mut fn_count = 0.0;
    for (t, p) in y_true.iter().zip(y_pred) {
        match (same_label(*t, 1.0), same_label(*p, 1.0)) {
            (true, true) => tp += 1.0,
            (false, true) => fp += 1.0,
            (true, false) => fn_count += 1.0,
            (false, false) => {}
        }
    }
    Ok((tp, fp, fn_count))
}

/// Mann-Whitney formulation of the AUC with averaged ranks for ties
fn roc_auc(y_true: &[f64], scores: &[f64]) -> Result<f64> {
    if !y_true.iter().all(|t| is_binary_label(*t)) {
        return Err(FsError::Evaluation("roc_auc only supports binary 0/1 targets".to_string()));
    }
    let n1 = y_true.iter().filter(|t| same_label(**t, 1.0)).count();
    let n0 = y_true.len() - n1;
    if n0 == 0 || n1 == 0 {
        return Err(FsError::Evaluation(
            "Only one class present in a fold: roc_auc is not defined in that case".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].partial_cmp(&scores[b]).unwrap_or(Ordering::Equal));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let start = i;
        while i + 1 < order.len() && scores[order[i]] == scores[order[i + 1]] {
            i += 1;
        }
        let rank = (start + i + 2) as f64 / 2.0;
        for &idx in &order[start..=i] {
            ranks[idx] = rank;
        }
        i += 1;
    }

    let rank_sum_1: f64 = ranks.iter().zip(y_true).filter(|(_, t)| same_label(**t, 1.0)).map(|(r, _)| r).sum();
    let (n0, n1) = (n0 as f64, n1 as f64);
    Ok((rank_sum_1 - n1 * (n1 + 1.0) / 2.0) / (n0 * n1))
}

fn r2(y_true: &[f64], y_pred: &[f64]) -> f64 {
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    if ss_tot == 0.0 {
        // constant target: perfect predictions score 1, anything else 0
        if ss_res == 0.0 { 1.0 } else { 0.0 }
    } else {
        1.0 - ss_res / ss_tot
    }
}
