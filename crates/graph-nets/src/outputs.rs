use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Display-ready model result for the first graph of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub score: f32,
    pub embedding: [f32; 2],
}

impl Prediction {
    /// Pick the prediction and embedding out of the raw model outputs.
    ///
    /// The model does not promise an output order, so the two-column
    /// array is taken as the embedding and the other one as the score.
    pub fn from_outputs(outputs: &[Array2<f32>]) -> Result<Self, OutputError> {
        let [a, b] = outputs else {
            return Err(OutputError::WrongCount(outputs.len()));
        };

        let (embedding, score) = match (a.ncols() == 2, b.ncols() == 2) {
            (true, false) => (a, b),
            (false, true) => (b, a),
            (true, true) => return Err(OutputError::Ambiguous),
            (false, false) => return Err(OutputError::MissingEmbedding),
        };

        if embedding.nrows() == 0 {
            return Err(OutputError::Empty("embedding"));
        }
        let score = score
            .first()
            .copied()
            .ok_or(OutputError::Empty("prediction"))?;

        Ok(Self {
            score,
            embedding: [embedding[[0, 0]], embedding[[0, 1]]],
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    #[error("model returned {0} outputs, expected 2")]
    WrongCount(usize),
    #[error("both model outputs are two columns wide")]
    Ambiguous,
    #[error("no two-column embedding among the model outputs")]
    MissingEmbedding,
    #[error("{0} output is empty")]
    Empty(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_embedding_found_in_either_position() {
        let pred = array![[0.75]];
        let emb = array![[1.5, -2.0]];

        let forward = Prediction::from_outputs(&[pred.clone(), emb.clone()])
            .expect("valid outputs");
        let backward =
            Prediction::from_outputs(&[emb, pred]).expect("valid outputs");

        assert_eq!(forward, backward);
        assert_eq!(forward.score, 0.75);
        assert_eq!(forward.embedding, [1.5, -2.0]);
    }

    #[test]
    fn test_wrong_output_count_is_rejected() {
        assert!(matches!(
            Prediction::from_outputs(&[array![[0.5]]]),
            Err(OutputError::WrongCount(1))
        ));
    }

    #[test]
    fn test_two_embeddings_are_ambiguous() {
        let emb = array![[0.0, 1.0]];

        assert!(matches!(
            Prediction::from_outputs(&[emb.clone(), emb]),
            Err(OutputError::Ambiguous)
        ));
    }
}
