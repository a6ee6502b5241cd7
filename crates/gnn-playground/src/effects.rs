use graph_nets::GraphTensors;
use std::path::PathBuf;

use crate::store::Store;

/// Deferred effects that must run outside the main reducer (file IO, inference)
#[derive(Debug, Clone)]
pub enum Effect {
    /// Save the edited molecule to disk
    SaveToFile { path: PathBuf },
    /// Load a saved molecule from disk
    LoadFromFile { path: PathBuf },
    /// Replace the dataset with a file from disk
    LoadDataset { path: PathBuf },
    /// Hand encoded tensors to the model
    RunInference { tensors: GraphTensors },
}

/// Execute a single effect against the store
pub fn run(store: &mut Store, effect: Effect) {
    match effect {
        Effect::SaveToFile { path } => {
            if let Err(e) = store.save_to_file(&path) {
                store.error_message = Some(e);
            }
        }
        Effect::LoadFromFile { path } => match store.load_from_file(&path) {
            Ok(()) => {
                let tensors = store.encode_current();
                store.request_inference(tensors);
            }
            Err(e) => store.error_message = Some(e),
        },
        Effect::LoadDataset { path } => match store.load_dataset(&path) {
            Ok(()) => {
                let tensors = store.encode_current();
                store.request_inference(tensors);
            }
            Err(e) => store.error_message = Some(e),
        },
        Effect::RunInference { tensors } => store.request_inference(tensors),
    }
}
