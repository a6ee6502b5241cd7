use eframe::egui::Pos2;
use graph_nets::NetworkConfig;
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use std::path::PathBuf;

use crate::dataset::Dataset;
use crate::editor::{EditMode, Element};
use crate::effects::Effect;
use crate::layout_force::ForceSettings;
use crate::settings::InteractionSettings;
use crate::store::Store;

/// Actions that can be dispatched to modify the playground state
#[derive(Debug, Clone)]
pub enum Action {
    // Gestures
    /// Pointer pressed on an atom
    BeginDrag { atom: NodeIndex, pos: Pos2 },
    /// Pointer moved while pressed
    DragTo { pos: Pos2 },
    /// Pointer released, possibly over another atom
    EndDrag { pos: Pos2, over: Option<NodeIndex> },
    /// Pointer left the canvas mid-drag
    CancelDrag,
    /// Pointer clicked a bond
    ClickBond { bond: EdgeIndex },
    /// Remove an atom and its bonds
    RemoveAtom { atom: NodeIndex },
    /// Remove a single bond
    RemoveBond { bond: EdgeIndex },
    /// Element under the pointer changed
    Hover { element: Option<Element> },
    /// Switch between Add and Remove
    SetMode { mode: EditMode },

    // Molecule and dataset
    /// Restore the molecule as it was loaded
    ResetMolecule,
    /// Load a dataset example into the editor
    LoadExample { index: usize },
    /// Replace the dataset with already-read JSON
    LoadDatasetJson { json: String },

    // Model and layout
    /// Rebuild the network with new hyper-parameters
    SetNetworkConfig { config: NetworkConfig },
    /// Change the force layout parameters and reheat it
    SetForceSettings { settings: ForceSettings },
    /// Change the click threshold and hit sizes
    SetInteractionSettings { settings: InteractionSettings },
    /// Per-frame tick: physics, inference results, warning expiry
    AdvanceFrame { time: f64 },

    // File Operations
    /// Save current molecule to file
    SaveToFile { path: PathBuf },
    /// Load a molecule from file
    LoadFromFile { path: PathBuf },
    /// Load a dataset from file
    LoadDataset { path: PathBuf },
    /// Clear any error message
    ClearErrorMessage,
    /// Dismiss the transient warning
    ClearWarning,
}

/// Apply a single action to modify the store state
pub fn update(store: &mut Store, action: Action) -> Vec<Effect> {
    let mut effects = match action {
        // Gestures
        Action::BeginDrag { atom, pos } => {
            store.editor.begin_drag(atom, pos);
            vec![]
        }
        Action::DragTo { pos } => {
            store.editor.drag_to(pos);
            vec![]
        }
        Action::EndDrag { pos, over } => {
            let outcome = store.editor.end_drag(pos, over);
            log::debug!("drag ended: {:?}", outcome);
            vec![]
        }
        Action::CancelDrag => {
            store.editor.cancel_drag();
            vec![]
        }
        Action::ClickBond { bond } => {
            store.editor.click_bond(bond);
            vec![]
        }
        Action::RemoveAtom { atom } => {
            store.editor.remove_atom(atom);
            vec![]
        }
        Action::RemoveBond { bond } => {
            store.editor.remove_bond(bond);
            vec![]
        }
        Action::Hover { element } => {
            store.editor.hover(element);
            vec![]
        }
        Action::SetMode { mode } => {
            store.editor.set_mode(mode);
            vec![]
        }

        // Molecule and dataset
        Action::ResetMolecule => {
            store.editor.reset();
            vec![]
        }
        Action::LoadExample { index } => match store.load_example(index) {
            Ok(()) => vec![Effect::RunInference {
                tensors: store.encode_current(),
            }],
            Err(e) => {
                log::warn!("cannot load example {}: {}", index, e);
                store.set_warning(format!("Cannot load example: {}", e));
                vec![]
            }
        },
        Action::LoadDatasetJson { json } => {
            let loaded = Dataset::from_json(&json)
                .map_err(|e| format!("Failed to parse dataset: {}", e))
                .and_then(|dataset| {
                    store
                        .set_dataset(dataset)
                        .map_err(|e| format!("Failed to load first example: {}", e))
                });
            match loaded {
                Ok(()) => vec![Effect::RunInference {
                    tensors: store.encode_current(),
                }],
                Err(e) => {
                    store.error_message = Some(e);
                    vec![]
                }
            }
        }

        // Model and layout
        Action::SetNetworkConfig { config } => {
            store.set_network_config(config);
            vec![Effect::RunInference {
                tensors: store.encode_current(),
            }]
        }
        Action::SetForceSettings { settings } => {
            store.settings.forces = settings.clone();
            store.editor.layout.set_settings(settings);
            store.editor.layout.restart();
            vec![]
        }
        Action::SetInteractionSettings { settings } => {
            store.settings.interaction = settings.clone();
            store.editor.interaction = settings;
            vec![]
        }
        Action::AdvanceFrame { time } => {
            store.time = time;
            store.editor.tick();
            store.poll_inference();
            store.expire_warning();
            vec![]
        }

        // File Operations
        Action::SaveToFile { path } => vec![Effect::SaveToFile { path }],
        Action::LoadFromFile { path } => vec![Effect::LoadFromFile { path }],
        Action::LoadDataset { path } => vec![Effect::LoadDataset { path }],
        Action::ClearErrorMessage => {
            store.error_message = None;
            vec![]
        }
        Action::ClearWarning => {
            store.warning = None;
            vec![]
        }
    };

    // Molecules encoded by the editor callback, in mutation order.
    effects.extend(
        store
            .take_outbox()
            .into_iter()
            .map(|tensors| Effect::RunInference { tensors }),
    );
    effects
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::PlaygroundSettings;

    fn inference_count(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::RunInference { .. }))
            .count()
    }

    #[test]
    fn test_committed_gesture_queues_one_inference() {
        let mut store = Store::new(PlaygroundSettings::default());
        let atom = store.editor.molecule().atom_ids()[0];
        let pos = store.editor.molecule().atom(atom).unwrap().pos;

        let begin = update(&mut store, Action::BeginDrag { atom, pos });
        let drag = update(&mut store, Action::DragTo { pos: pos + eframe::egui::vec2(0.0, 60.0) });
        let end = update(
            &mut store,
            Action::EndDrag {
                pos: pos + eframe::egui::vec2(0.0, 60.0),
                over: None,
            },
        );

        assert_eq!(inference_count(&begin) + inference_count(&drag), 0);
        assert_eq!(inference_count(&end), 1);
        assert_eq!(store.editor.molecule().atom_count(), 4);
    }

    #[test]
    fn test_failed_example_load_warns() {
        let mut store = Store::new(PlaygroundSettings::default());

        let effects = update(&mut store, Action::LoadExample { index: 42 });

        assert!(effects.is_empty());
        assert!(store.warning.is_some());
    }

    #[test]
    fn test_loading_example_requests_inference() {
        let mut store = Store::new(PlaygroundSettings::default());

        let effects = update(&mut store, Action::LoadExample { index: 3 });

        assert_eq!(inference_count(&effects), 1);
        assert_eq!(store.selected, Some(3));
        assert_eq!(store.editor.molecule().atom_count(), 6, "benzene");
    }

    #[test]
    fn test_bad_dataset_json_sets_error() {
        let mut store = Store::new(PlaygroundSettings::default());

        update(
            &mut store,
            Action::LoadDatasetJson {
                json: "{not json".into(),
            },
        );

        assert!(store.error_message.is_some());
        assert_eq!(store.dataset.version(), 0);
    }

    #[test]
    fn test_dataset_with_unloadable_first_example_is_rejected() {
        let mut store = Store::new(PlaygroundSettings::default());
        let json = r#"{"examples": [{"name": "dangling", "tensors": [
            {"name": "nodes", "dtype": "float32", "value": [[1, 0, 0, 0], [0, 1, 0, 0]]},
            {"name": "edges", "dtype": "float32", "value": [[1, 0, 0, 0]]},
            {"name": "senders", "dtype": "int32", "value": [0]},
            {"name": "receivers", "dtype": "int32", "value": [1]},
            {"name": "globals", "dtype": "float32", "value": [[0]]},
            {"name": "n_node", "dtype": "int32", "value": [2]},
            {"name": "n_edge", "dtype": "int32", "value": [1]}
        ]}]}"#;

        let effects = update(
            &mut store,
            Action::LoadDatasetJson {
                json: json.into(),
            },
        );

        assert_eq!(inference_count(&effects), 0);
        assert!(store.error_message.is_some());
        assert_eq!(store.dataset.version(), 0);
        assert_eq!(store.selected, Some(0));
        assert_eq!(store.dataset.get().display_name(0), "ethanol");
    }

    #[test]
    fn test_interaction_settings_reach_the_editor() {
        let mut store = Store::new(PlaygroundSettings::default());
        let mut settings = store.settings.interaction.clone();
        settings.click_threshold = 4.0;

        update(
            &mut store,
            Action::SetInteractionSettings {
                settings: settings.clone(),
            },
        );

        assert_eq!(store.editor.interaction, settings);
        assert_eq!(store.settings.interaction, settings);
    }
}
