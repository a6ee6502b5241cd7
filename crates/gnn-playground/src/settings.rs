use graph_nets::NetworkConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::layout_force::ForceSettings;
use crate::onehot::Vocabulary;
use crate::serialization::{self, FileError};

/// Common slider metadata so bounds live in one place.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SliderRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

impl SliderRange {
    pub const fn new(min: f32, max: f32, step: f32) -> Self {
        Self { min, max, step }
    }
}

// Force ranges
pub const CHARGE_RANGE: SliderRange =
    SliderRange::new(0.0, 600.0, 5.0);
pub const SPRING_RANGE: SliderRange =
    SliderRange::new(0.005, 0.5, 0.005);
pub const MAX_FORCE_RANGE: SliderRange =
    SliderRange::new(10.0, 400.0, 5.0);
pub const DAMPING_RANGE: SliderRange =
    SliderRange::new(0.5, 0.99, 0.01);

// Interaction ranges
pub const CLICK_THRESHOLD_RANGE: SliderRange =
    SliderRange::new(1.0, 60.0, 1.0);
pub const ATOM_RADIUS_RANGE: SliderRange =
    SliderRange::new(3.0, 20.0, 0.5);

pub const SETTINGS_FILE: &str = "playground.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionSettings {
    /// A gesture that moves less than this on both axes is a click.
    pub click_threshold: f32,
    pub atom_radius: f32,
    /// Distance from a bond's line within which the pointer hits it.
    pub bond_hit_width: f32,
}

impl Default for InteractionSettings {
    fn default() -> Self {
        Self {
            click_threshold: 20.0,
            atom_radius: 7.0,
            bond_hit_width: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaygroundSettings {
    pub vocabulary: Vocabulary,
    pub interaction: InteractionSettings,
    pub forces: ForceSettings,
    pub network: NetworkConfig,
    /// Dataset to load at startup instead of the built-in molecules.
    pub dataset_path: Option<PathBuf>,
    /// Trained weights; a seeded network is used when absent.
    pub weights_path: Option<PathBuf>,
    pub prediction_label: String,
    pub warning_seconds: f64,
}

impl Default for PlaygroundSettings {
    fn default() -> Self {
        Self {
            vocabulary: Vocabulary::default(),
            interaction: InteractionSettings::default(),
            forces: ForceSettings::default(),
            network: NetworkConfig::default(),
            dataset_path: None,
            weights_path: None,
            prediction_label: "pungent".to_string(),
            warning_seconds: 7.0,
        }
    }
}

impl PlaygroundSettings {
    pub fn load(path: &Path) -> Result<Self, FileError> {
        serialization::load_json(path)
    }

    /// Settings from `playground.json` when it exists, defaults otherwise.
    pub fn load_or_default() -> Self {
        let path = Path::new(SETTINGS_FILE);
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => {
                log::info!("loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                log::warn!("ignoring {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}
