use graph_nets::{GraphModel, GraphNetwork, GraphTensors, NetworkConfig, Prediction};
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

use crate::dataset::Dataset;
use crate::editor::MoleculeEditor;
use crate::featurization::encode;
use crate::inference::{Accepted, InferenceRunner, PredictionTracker, RequestToken};
use crate::molecule::{ExampleError, Molecule};
use crate::onehot::Vocabulary;
use crate::serialization::{self, SerializableMolecule};
use crate::settings::PlaygroundSettings;
use crate::versioned::Versioned;

#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    pub message: String,
    pub since: f64,
}

/// Encoded molecules produced by the editor callback, waiting to be
/// turned into inference effects.
pub type Outbox = Rc<RefCell<Vec<GraphTensors>>>;

pub struct Store {
    pub settings: PlaygroundSettings,
    pub editor: MoleculeEditor,
    pub dataset: Versioned<Dataset>,
    pub model: Versioned<Arc<dyn GraphModel>>,
    pub runner: InferenceRunner,
    pub tracker: PredictionTracker,
    /// Dataset example the editor was loaded from; `None` for molecules
    /// read from a file.
    pub selected: Option<usize>,
    pub warning: Option<Warning>,
    pub error_message: Option<String>,
    /// Seconds since startup, as of the last frame.
    pub time: f64,
    /// First request that can describe the molecule now in the editor.
    loaded_at: RequestToken,
    outbox: Outbox,
}

impl Store {
    pub fn new(settings: PlaygroundSettings) -> Self {
        let dataset = initial_dataset(&settings);
        let model = initial_model(&settings);

        let vocab = settings.vocabulary.clone();
        let (first, selected) = match dataset.molecule(0, &vocab) {
            Ok(m) => (m, Some(0)),
            Err(e) => {
                log::warn!("starting with an empty molecule: {}", e);
                (Molecule::new(), None)
            }
        };

        let mut editor = MoleculeEditor::new(
            first,
            vocab.clone(),
            settings.interaction.clone(),
            settings.forces.clone(),
        );
        let outbox: Outbox = Rc::new(RefCell::new(Vec::new()));
        let sink = outbox.clone();
        editor.set_on_change(move |molecule| {
            sink.borrow_mut().push(encode(molecule, &vocab));
        });

        let tracker = PredictionTracker::default();
        Self {
            settings,
            editor,
            dataset: Versioned::new(dataset),
            runner: InferenceRunner::new(model.clone()),
            model: Versioned::new(model),
            loaded_at: tracker.next_token(),
            tracker,
            selected,
            warning: None,
            error_message: None,
            time: 0.0,
            outbox,
        }
    }

    pub fn take_outbox(&self) -> Vec<GraphTensors> {
        std::mem::take(&mut *self.outbox.borrow_mut())
    }

    pub fn encode_current(&self) -> GraphTensors {
        encode(self.editor.molecule(), self.editor.vocabulary())
    }

    pub fn request_inference(&mut self, tensors: GraphTensors) {
        let token = self.tracker.issue();
        self.runner.submit(token, tensors);
    }

    /// Apply finished inference results, newest request only.
    pub fn poll_inference(&mut self) {
        for completion in self.runner.drain() {
            match self.tracker.accept(completion) {
                Accepted::Applied(p) => {
                    log::debug!("prediction {:.3} at {:?}", p.score, p.embedding);
                }
                Accepted::Stale => log::debug!("dropped a stale prediction"),
                Accepted::Failed(e) => {
                    log::warn!("prediction failed: {}", e);
                    self.set_warning(format!("Prediction failed: {}", e));
                }
            }
        }
    }

    /// Latest prediction, unless it still describes a molecule that was
    /// replaced since.
    pub fn live_prediction(&self) -> Option<Prediction> {
        self.tracker.current_since(self.loaded_at)
    }

    /// Ground truth only describes a dataset example as it was loaded.
    pub fn ground_truth(&self) -> Option<f32> {
        if self.editor.is_edited() {
            return None;
        }
        self.dataset.get().label(self.selected?)
    }

    pub fn set_warning(&mut self, message: String) {
        self.warning = Some(Warning {
            message,
            since: self.time,
        });
    }

    pub fn expire_warning(&mut self) {
        if let Some(w) = &self.warning
            && self.time - w.since > self.settings.warning_seconds
        {
            self.warning = None;
        }
    }

    /// Put dataset example `index` into the editor. On failure the editor
    /// keeps its molecule.
    pub fn load_example(&mut self, index: usize) -> Result<(), ExampleError> {
        let molecule = self
            .dataset
            .get()
            .molecule(index, &self.settings.vocabulary)?;
        self.install(molecule, Some(index));
        log::info!("loaded {}", self.dataset.get().display_name(index));
        Ok(())
    }

    /// Switch to `dataset` and its first example. A dataset whose first
    /// example cannot be loaded is rejected and the current one stays.
    pub fn set_dataset(&mut self, dataset: Dataset) -> Result<(), ExampleError> {
        let molecule = dataset.molecule(0, &self.settings.vocabulary)?;
        self.dataset.set(dataset);
        self.install(molecule, Some(0));
        log::info!("switched to a dataset of {} examples", self.dataset.get().len());
        Ok(())
    }

    fn install(&mut self, molecule: Molecule, selected: Option<usize>) {
        self.editor.replace(molecule);
        self.selected = selected;
        self.loaded_at = self.tracker.next_token();
    }

    pub fn set_network_config(&mut self, config: NetworkConfig) {
        let config = sized_for(config, &self.settings.vocabulary);
        log::info!("rebuilding network: {:?}", config);
        self.settings.network = config.clone();
        self.set_model(Arc::new(GraphNetwork::seeded(config)));
    }

    pub fn set_model(&mut self, model: Arc<dyn GraphModel>) {
        self.runner.set_model(model.clone());
        self.model.set(model);
    }

    pub fn save_to_file(&self, path: &Path) -> Result<(), String> {
        serialization::save_molecule(
            self.editor.molecule(),
            self.editor.vocabulary(),
            path,
        )
        .map_err(|e| e.to_string())
    }

    pub fn load_from_file(&mut self, path: &Path) -> Result<(), String> {
        let saved: SerializableMolecule =
            serialization::load_json(path).map_err(|e| e.to_string())?;
        let molecule =
            serialization::serializable_to_molecule(&saved, &self.settings.vocabulary)
                .map_err(|e| format!("Failed to read molecule: {}", e))?;
        self.install(molecule, None);
        log::info!("loaded molecule from {}", path.display());
        Ok(())
    }

    pub fn load_dataset(&mut self, path: &Path) -> Result<(), String> {
        let dataset = Dataset::load(path).map_err(|e| e.to_string())?;
        self.set_dataset(dataset)
            .map_err(|e| format!("Failed to load first example: {}", e))
    }
}

fn initial_dataset(settings: &PlaygroundSettings) -> Dataset {
    if let Some(path) = &settings.dataset_path {
        match Dataset::load(path) {
            Ok(dataset) if !dataset.is_empty() => return dataset,
            Ok(_) => log::warn!("{} has no examples", path.display()),
            Err(e) => log::warn!("falling back to built-in molecules: {}", e),
        }
    }
    Dataset::builtin(&settings.vocabulary)
}

fn initial_model(settings: &PlaygroundSettings) -> Arc<dyn GraphModel> {
    if let Some(path) = &settings.weights_path {
        let loaded = serialization::read_file(path)
            .map_err(|e| e.to_string())
            .and_then(|json| GraphNetwork::from_json(&json).map_err(|e| e.to_string()));
        match loaded {
            Ok(network) => {
                log::info!("loaded weights from {}", path.display());
                return Arc::new(network);
            }
            Err(e) => log::warn!("using seeded weights: {}", e),
        }
    }
    let config = sized_for(settings.network.clone(), &settings.vocabulary);
    Arc::new(GraphNetwork::seeded(config))
}

/// Input widths always follow the vocabulary.
fn sized_for(mut config: NetworkConfig, vocab: &Vocabulary) -> NetworkConfig {
    config.node_features = vocab.atoms.len();
    config.edge_features = vocab.bonds.len();
    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn wait_for_prediction(store: &mut Store) -> Prediction {
        for _ in 0..500 {
            store.poll_inference();
            if !store.tracker.is_pending()
                && let Some(p) = store.tracker.current()
            {
                return p;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        panic!("no prediction arrived");
    }

    #[test]
    fn test_editor_callback_fills_outbox() {
        let mut store = Store::new(PlaygroundSettings::default());
        let anchor = store.editor.molecule().atom_ids()[0];
        let start = store.editor.molecule().atom(anchor).unwrap().pos;

        store.editor.begin_drag(anchor, start);
        store.editor.end_drag(start, None);

        let outbox = store.take_outbox();
        assert_eq!(outbox.len(), 1);
        assert_eq!(outbox[0], store.encode_current());
        assert!(store.take_outbox().is_empty(), "outbox is drained");
    }

    #[test]
    fn test_ground_truth_hidden_after_edit() {
        let mut store = Store::new(PlaygroundSettings::default());
        assert_eq!(store.ground_truth(), Some(0.0), "ethanol is not pungent");

        let atom = store.editor.molecule().atom_ids()[0];
        store.editor.remove_atom(atom);

        assert_eq!(store.ground_truth(), None);
    }

    #[test]
    fn test_bad_example_keeps_current_molecule() {
        let mut store = Store::new(PlaygroundSettings::default());
        let before = store.editor.molecule().clone();

        let result = store.load_example(999);

        assert!(matches!(result, Err(ExampleError::NoSuchExample(999))));
        assert!(store.editor.molecule().same_structure(&before));
        assert_eq!(store.selected, Some(0));
    }

    #[test]
    fn test_rejected_dataset_keeps_previous_one() {
        let mut store = Store::new(PlaygroundSettings::default());
        let before = store.editor.molecule().clone();
        let one_way = Dataset::from_json(
            r#"[[
                {"name": "nodes", "dtype": "float32", "value": [[1, 0, 0, 0], [1, 0, 0, 0]]},
                {"name": "edges", "dtype": "float32", "value": [[1, 0, 0, 0]]},
                {"name": "senders", "dtype": "int32", "value": [0]},
                {"name": "receivers", "dtype": "int32", "value": [1]},
                {"name": "globals", "dtype": "float32", "value": [[0]]},
                {"name": "n_node", "dtype": "int32", "value": [2]},
                {"name": "n_edge", "dtype": "int32", "value": [1]}
            ]]"#,
        )
        .expect("well-formed file");

        let result = store.set_dataset(one_way);

        assert!(matches!(result, Err(ExampleError::UnpairedEdge { .. })));
        assert_eq!(store.dataset.version(), 0);
        assert_eq!(store.dataset.get().len(), 9);
        assert_eq!(store.selected, Some(0));
        assert!(store.editor.molecule().same_structure(&before));
    }

    #[test]
    fn test_molecule_from_file_has_no_ground_truth() {
        let mut store = Store::new(PlaygroundSettings::default());
        store.load_example(1).expect("acetic acid");
        assert_eq!(store.ground_truth(), Some(1.0));
        let path = std::env::temp_dir()
            .join(format!("gnn-playground-store-{}.json", std::process::id()));
        store.save_to_file(&path).expect("writable");

        let loaded = store.load_from_file(&path);
        let _ = std::fs::remove_file(&path);

        assert!(loaded.is_ok());
        assert_eq!(store.selected, None);
        assert!(!store.editor.is_edited());
        assert_eq!(store.ground_truth(), None);
    }

    #[test]
    fn test_custom_vocabulary_still_starts_with_a_molecule() {
        let mut settings = PlaygroundSettings::default();
        settings.vocabulary.atoms.push("Fluorine".into());

        let store = Store::new(settings);

        assert_eq!(store.selected, Some(0));
        assert_eq!(store.editor.molecule().atom_count(), 3, "ethanol");
        assert_eq!(store.encode_current().nodes.ncols(), 5);
    }

    #[test]
    fn test_live_prediction_waits_for_the_new_molecule() {
        let mut store = Store::new(PlaygroundSettings::default());
        let tensors = store.encode_current();
        store.request_inference(tensors);
        wait_for_prediction(&mut store);
        assert!(store.live_prediction().is_some());

        store.load_example(2).expect("acetone");
        assert!(store.tracker.current().is_some());
        assert_eq!(store.live_prediction(), None);

        let tensors = store.encode_current();
        store.request_inference(tensors);
        let fresh = wait_for_prediction(&mut store);
        assert_eq!(store.live_prediction(), Some(fresh));
    }

    #[test]
    fn test_inference_round_trip() {
        let mut store = Store::new(PlaygroundSettings::default());

        let tensors = store.encode_current();
        store.request_inference(tensors);
        let p = wait_for_prediction(&mut store);

        assert!((0.0..=1.0).contains(&p.score));
    }

    #[test]
    fn test_warning_expires() {
        let mut store = Store::new(PlaygroundSettings::default());
        store.set_warning("slow".into());

        store.time = 3.0;
        store.expire_warning();
        assert!(store.warning.is_some());

        store.time = 7.5;
        store.expire_warning();
        assert!(store.warning.is_none());
    }
}
