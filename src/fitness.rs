use crate::cv::{cross_val_score, KFold};
use crate::data::Data;
use crate::error::{FsError, Result};
use crate::estimator::Estimator;
use crate::scoring::Scoring;
use log::debug;

/// Mean cross-validated score of `estimator` trained on the features whose
/// genome bit is set. A genome selecting nothing scores negative infinity:
/// a valid, always-last fitness rather than an error.
pub fn evaluate_fitness(genome: &[u8], data: &Data, estimator: &dyn Estimator, kfold: &KFold, scoring: Scoring) -> Result<f64> {
    if genome.len() != data.feature_len {
        return Err(FsError::Evaluation(format!(
            "Genome of length {} does not match the {} features of the data",
            genome.len(),
            data.feature_len
        )));
    }

    let selected: Vec<usize> = genome.iter().enumerate().filter(|(_, g)| **g == 1).map(|(i, _)| i).collect();
    if selected.is_empty() {
        return Ok(f64::NEG_INFINITY);
    }

    let scores = cross_val_score(estimator, &data.select_columns(&selected), kfold, scoring)?;
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    debug!("k={} {:?} -> {:.4}", selected.len(), scores, mean);

    Ok(mean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimator::KNeighbors;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn setup() -> (Data, KNeighbors, KFold) {
        let data = Data::test();
        let mut knn = KNeighbors::classifier();
        knn.n_neighbors = 1;
        let kfold = KFold::new(&data, 2, true, &mut ChaCha8Rng::seed_from_u64(11)).unwrap();
        (data, knn, kfold)
    }

    #[test]
    fn test_empty_genome_scores_negative_infinity() {
        let (data, knn, kfold) = setup();
        assert_eq!(evaluate_fitness(&[0, 0, 0], &data, &knn, &kfold, Scoring::accuracy).unwrap(), f64::NEG_INFINITY);
    }

    #[test]
    fn test_informative_feature_scores_perfectly() {
        let (data, knn, kfold) = setup();
        assert_eq!(evaluate_fitness(&[1, 0, 0], &data, &knn, &kfold, Scoring::accuracy).unwrap(), 1.0);
    }

    #[test]
    fn test_genome_length_mismatch_is_an_error() {
        let (data, knn, kfold) = setup();
        let result = evaluate_fitness(&[1, 0], &data, &knn, &kfold, Scoring::accuracy);
        assert!(matches!(result, Err(FsError::Evaluation(_))));
    }

    #[test]
    fn test_estimator_errors_are_not_downgraded() {
        let (data, _, kfold) = setup();
        // 4 training samples per fold cannot feed 5 neighbours
        let result = evaluate_fitness(&[1, 1, 0], &data, &KNeighbors::classifier(), &kfold, Scoring::accuracy);
        assert!(matches!(result, Err(FsError::Evaluation(_))));
    }
}
