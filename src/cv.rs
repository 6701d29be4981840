use crate::data::Data;
use crate::error::{FsError, Result};
use crate::estimator::Estimator;
use crate::scoring::Scoring;
use crate::utils;
use log::{debug, warn};
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// K-fold layout over sample indices. Built once and reused, so that every
/// feature subset is scored on identical splits.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct KFold {
    pub validation_folds: Vec<Vec<usize>>,
    pub sample_len: usize,
    pub stratified: bool,
}

impl KFold {
    pub fn new(data: &Data, n_folds: usize, stratified: bool, rng: &mut ChaCha8Rng) -> Result<KFold> {
        if n_folds < 2 || n_folds > data.sample_len {
            return Err(FsError::Evaluation(format!(
                "Too few samples for the requested fold count: {} folds on {} samples (need 2 <= folds <= samples)",
                n_folds, data.sample_len
            )));
        }

        let labels = if stratified { data.class_labels() } else { None };
        if stratified && labels.is_none() {
            warn!("Target is not made of class labels: using non stratified folds.");
        }

        let stratified = labels.is_some();
        let validation_folds = match labels {
            Some(labels) => {
                let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
                for (i, label) in labels.iter().enumerate() {
                    by_class.entry(*label).or_default().push(i);
                }

                // classes are dealt one after the other on consecutive folds so that
                // each fold keeps the class proportions and none stays empty
                let mut folds = vec![Vec::new(); n_folds];
                let mut position = 0;
                for (_, mut indices) in by_class {
                    indices.shuffle(rng);
                    for i in indices {
                        folds[position % n_folds].push(i);
                        position += 1;
                    }
                }
                folds
            }
            None => utils::split_into_balanced_random_chunks((0..data.sample_len).collect(), n_folds, rng),
        };

        debug!(
            "Fold sizes: {:?}",
            validation_folds.iter().map(|f| f.len()).collect::<Vec<usize>>()
        );

        Ok(KFold { validation_folds, sample_len: data.sample_len, stratified })
    }

    pub fn n_folds(&self) -> usize {
        self.validation_folds.len()
    }

    /// Indices of every sample outside validation fold `fold`, ascending
    pub fn training_indices(&self, fold: usize) -> Vec<usize> {
        let mut indices: Vec<usize> = self
            .validation_folds
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != fold)
            .flat_map(|(_, f)| f.iter().copied())
            .collect();
        indices.sort_unstable();
        indices
    }
}

/// Score a fresh clone of `estimator` on each fold, folds running in parallel on
/// the current rayon pool. Returns one score per fold, in fold order.
pub fn cross_val_score(estimator: &dyn Estimator, data: &Data, kfold: &KFold, scoring: Scoring) -> Result<Vec<f64>> {
    if kfold.sample_len != data.sample_len {
        return Err(FsError::Evaluation(format!(
            "Folds were built on {} samples but data has {}",
            kfold.sample_len, data.sample_len
        )));
    }

    (0..kfold.n_folds())
        .into_par_iter()
        .map(|fold| {
            let train = data.subset(&kfold.training_indices(fold));
            let validation = data.subset(&kfold.validation_folds[fold]);

            let mut model = estimator.box_clone();
            model.fit(&train.X, &train.y)?;
            let predictions = if scoring.needs_decision_scores() {
                model.decision_scores(&validation.X)?
            } else {
                model.predict(&validation.X)?
            };
            scoring.score(&validation.y, &predictions)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::{GaussianNB, KNeighbors, Ridge};
    use rand::SeedableRng;

    fn imbalanced() -> Data {
        let mut data = Data::test();
        data.y = vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0];
        data
    }

    #[test]
    fn test_kfold_covers_every_sample_once() {
        let data = Data::test();
        let kfold = KFold::new(&data, 3, true, &mut ChaCha8Rng::seed_from_u64(42)).unwrap();
        assert_eq!(kfold.n_folds(), 3);
        let mut all: Vec<usize> = kfold.validation_folds.iter().flatten().copied().collect();
        all.sort();
        assert_eq!(all, (0..8).collect::<Vec<usize>>());
        assert!(kfold.validation_folds.iter().all(|f| !f.is_empty()));
    }

    #[test]
    fn test_kfold_stratification_keeps_minority_class_spread() {
        let data = imbalanced();
        let kfold = KFold::new(&data, 2, true, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert!(kfold.stratified);
        for fold in &kfold.validation_folds {
            let positives = fold.iter().filter(|&&i| data.y[i] == 1.0).count();
            assert_eq!(positives, 1, "each fold must get one of the two positive samples");
            assert_eq!(fold.len(), 4);
        }
    }

    #[test]
    fn test_kfold_non_class_target_falls_back_to_plain_folds() {
        let mut data = Data::test();
        data.y = vec![0.5, 1.5, 2.5, 3.5, 4.5, 5.5, 6.5, 7.5];
        let kfold = KFold::new(&data, 4, true, &mut ChaCha8Rng::seed_from_u64(1)).unwrap();
        assert!(!kfold.stratified);
        assert!(kfold.validation_folds.iter().all(|f| f.len() == 2));
    }

    #[test]
    fn test_kfold_reproducible() {
        let data = Data::test();
        let a = KFold::new(&data, 4, true, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        let b = KFold::new(&data, 4, true, &mut ChaCha8Rng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_kfold_rejects_bad_fold_counts() {
        let data = Data::test();
        let mut rng = ChaCha8Rng::seed_from_u64(0);
        assert!(matches!(KFold::new(&data, 1, true, &mut rng), Err(FsError::Evaluation(_))));
        assert!(matches!(KFold::new(&data, 9, false, &mut rng), Err(FsError::Evaluation(_))));
    }

    #[test]
    fn test_training_indices_complement_validation() {
        let data = Data::test();
        let kfold = KFold::new(&data, 2, false, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let train = kfold.training_indices(0);
        let mut validation = kfold.validation_folds[1].clone();
        validation.sort();
        assert_eq!(train, validation);
    }

    #[test]
    fn test_cross_val_score_one_score_per_fold() {
        let data = Data::test().select_columns(&[0]);
        let kfold = KFold::new(&data, 2, true, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let mut knn = KNeighbors::classifier();
        knn.n_neighbors = 1;
        let scores = cross_val_score(&knn, &data, &kfold, Scoring::accuracy).unwrap();
        assert_eq!(scores, vec![1.0, 1.0]);

        let auc = cross_val_score(&knn, &data, &kfold, Scoring::roc_auc).unwrap();
        assert_eq!(auc, vec![1.0, 1.0]);
    }

    #[test]
    fn test_cross_val_score_propagates_estimator_errors() {
        let data = Data::test();
        let kfold = KFold::new(&data, 2, true, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        // roc_auc needs decision scores that Ridge does not provide
        let result = cross_val_score(&Ridge::new(1.0), &data, &kfold, Scoring::roc_auc);
        assert!(matches!(result, Err(FsError::Evaluation(_))));
    }

    #[test]
    fn test_cross_val_score_leaves_prototype_untouched() {
        let data = Data::test();
        let kfold = KFold::new(&data, 2, true, &mut ChaCha8Rng::seed_from_u64(3)).unwrap();
        let prototype = GaussianNB::default();
        cross_val_score(&prototype, &data, &kfold, Scoring::accuracy).unwrap();
        assert!(prototype.predict(&data.X).is_err());
    }
}
