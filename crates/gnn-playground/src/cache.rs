use graph_nets::{InferenceError, Prediction, predict_graph};

use crate::store::Store;
use crate::versioned::Memoized;

/// Model output for every dataset example; `None` where the example
/// could not be decoded or the model failed on it.
pub type DatasetPredictions = Vec<Option<Prediction>>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatasetScores {
    pub predictions: DatasetPredictions,
    /// ROC AUC over the labelled examples that got a prediction.
    pub auc: Option<f32>,
}

pub struct Cache {
    pub dataset_scores: Memoized<Store, (u64, u64), DatasetScores>,
}

impl Cache {
    pub fn new() -> Self {
        let dataset_scores = Memoized::new(
            |s: &Store| (s.dataset.version(), s.model.version()),
            |s: &Store| score_dataset(s),
        );

        Self { dataset_scores }
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

fn score_dataset(store: &Store) -> DatasetScores {
    let model = store.model.get();
    let dataset = store.dataset.get();
    let predictions: DatasetPredictions = dataset
        .all_tensors()
        .into_iter()
        .enumerate()
        .map(|(i, tensors)| {
            let result = tensors
                .map_err(InferenceError::from)
                .and_then(|t| predict_graph(model.as_ref(), &t));
            match result {
                Ok(p) => Some(p),
                Err(e) => {
                    log::warn!("no prediction for example {}: {}", i, e);
                    None
                }
            }
        })
        .collect();

    let scored: Vec<(f32, bool)> = predictions
        .iter()
        .enumerate()
        .filter_map(|(i, p)| Some((p.as_ref()?.score, dataset.label(i)? >= 0.5)))
        .collect();
    let auc = roc_auc(&scored);
    log::info!(
        "predicted {} dataset examples, auc {:?}",
        predictions.len(),
        auc
    );
    DatasetScores { predictions, auc }
}

/// Probability that a random positive outscores a random negative, ties
/// counting half. `None` unless both classes are present.
pub fn roc_auc(scored: &[(f32, bool)]) -> Option<f32> {
    let positives: Vec<f32> = scored.iter().filter(|s| s.1).map(|s| s.0).collect();
    let negatives: Vec<f32> = scored.iter().filter(|s| !s.1).map(|s| s.0).collect();
    if positives.is_empty() || negatives.is_empty() {
        return None;
    }
    let mut wins = 0.0_f64;
    for &p in &positives {
        for &n in &negatives {
            if p > n {
                wins += 1.0;
            } else if p == n {
                wins += 0.5;
            }
        }
    }
    Some((wins / (positives.len() * negatives.len()) as f64) as f32)
}
