//! Interactive molecule editor wired to a graph network. Every edit is
//! re-encoded as graph tensors and scored in the background; the side
//! panel shows the score and where the molecule lands among the dataset
//! embeddings.

pub mod actions;
pub mod app;
pub mod cache;
pub mod dataset;
pub mod editor;
pub mod effects;
pub mod embedding_view;
pub mod featurization;
pub mod graph_view;
pub mod inference;
pub mod layout_force;
pub mod molecule;
pub mod native;
pub mod onehot;
pub mod serialization;
pub mod settings;
pub mod state;
pub mod store;
pub mod versioned;
pub mod web;

pub use app::PlaygroundApp;

use settings::PlaygroundSettings;
use state::State;
use store::Store;

/// Build the app with settings from disk, or defaults in the browser.
pub fn create_app(_cc: &eframe::CreationContext<'_>) -> PlaygroundApp {
    let settings = PlaygroundSettings::load_or_default();
    let mut store = Store::new(settings);
    store.request_inference(store.encode_current());
    PlaygroundApp::new(State::new(store))
}
