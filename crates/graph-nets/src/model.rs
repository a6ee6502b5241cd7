use ndarray::Array2;

use crate::outputs::{OutputError, Prediction};
use crate::tensors::{DecodeError, GraphTensors};

/// A pre-trained graph model, treated as a black box.
///
/// `predict` returns the raw output arrays; their order is not part of the
/// contract (see [`Prediction::from_outputs`]).
pub trait GraphModel: Send + Sync {
    fn predict(
        &self,
        inputs: &GraphTensors,
    ) -> Result<Vec<Array2<f32>>, InferenceError>;
}

/// Run the model and turn its outputs into a [`Prediction`].
pub fn predict_graph(
    model: &dyn GraphModel,
    inputs: &GraphTensors,
) -> Result<Prediction, InferenceError> {
    let outputs = model.predict(inputs)?;
    Ok(Prediction::from_outputs(&outputs)?)
}

#[derive(thiserror::Error, Debug)]
pub enum InferenceError {
    #[error("invalid model input: {0}")]
    Input(#[from] DecodeError),
    #[error("`{tensor}` has {found} features, the model expects {expected}")]
    FeatureWidth {
        tensor: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("`{tensor}` index {index} is outside 0..{bound}")]
    IndexOutOfRange {
        tensor: &'static str,
        index: i32,
        bound: usize,
    },
    #[error("invalid model output: {0}")]
    Output(#[from] OutputError),
    #[error("inference worker stopped: {0}")]
    Worker(String),
}

impl From<ndarray::ShapeError> for InferenceError {
    fn from(e: ndarray::ShapeError) -> Self {
        InferenceError::Input(DecodeError::Shape(e))
    }
}
