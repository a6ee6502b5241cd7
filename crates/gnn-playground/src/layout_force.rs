use eframe::egui::{Vec2, pos2};
use force_graph::{EdgeData, ForceGraph, NodeData, SimulationParameters};
use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};

use crate::molecule::Molecule;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForceSettings {
    /// Repulsion between every pair of atoms.
    pub charge: f32,
    /// Pull along each bond.
    pub spring: f32,
    /// Cap on any single force component.
    pub max_force: f32,
    pub node_speed: f32,
    /// Fraction of velocity kept between steps.
    pub damping: f32,
    pub atom_mass: f32,
    /// Simulated seconds per frame.
    pub time_step: f32,
    pub alpha_min: f32,
    pub alpha_decay: f32,
}

impl Default for ForceSettings {
    fn default() -> Self {
        let alpha_min = 0.001_f32;
        Self {
            charge: 150.0,
            spring: 0.05,
            max_force: 100.0,
            node_speed: 3000.0,
            damping: 0.9,
            atom_mass: 10.0,
            time_step: 0.05,
            alpha_min,
            // Reaches alpha_min after about 300 ticks.
            alpha_decay: 1.0 - alpha_min.powf(1.0 / 300.0),
        }
    }
}

impl ForceSettings {
    fn parameters(&self) -> SimulationParameters {
        SimulationParameters {
            force_charge: self.charge,
            force_spring: self.spring,
            force_max: self.max_force,
            node_speed: self.node_speed,
            damping_factor: self.damping,
        }
    }
}

/// Simulation graph mirroring one molecule's atoms and bonds.
struct Mirror {
    graph: ForceGraph<NodeIndex, ()>,
    atoms: Vec<NodeIndex>,
    bonds: Vec<(NodeIndex, NodeIndex)>,
}

impl Mirror {
    fn build(
        molecule: &Molecule,
        atoms: Vec<NodeIndex>,
        bonds: Vec<(NodeIndex, NodeIndex)>,
        settings: &ForceSettings,
    ) -> Self {
        let mut graph = ForceGraph::new(settings.parameters());
        let mut slots = std::collections::HashMap::new();
        for &id in &atoms {
            let Some(atom) = molecule.atom(id) else {
                continue;
            };
            let idx = graph.add_node(NodeData {
                x: atom.pos.x,
                y: atom.pos.y,
                mass: settings.atom_mass,
                is_anchor: false,
                user_data: id,
            });
            slots.insert(id, idx);
        }
        for &(a, b) in &bonds {
            if let (Some(&a), Some(&b)) = (slots.get(&a), slots.get(&b)) {
                graph.add_edge(a, b, EdgeData::default());
            }
        }
        Self {
            graph,
            atoms,
            bonds,
        }
    }
}

/// Force-directed layout of the molecule being edited.
///
/// Physics runs on a `force_graph` simulation rebuilt whenever the atoms
/// or bonds change. Positions in the molecule stay authoritative: they are
/// pushed into the simulation before each step and read back after, so a
/// swapped molecule is never laid out from stale state.
pub struct ForceLayout {
    settings: ForceSettings,
    alpha: f32,
    running: bool,
    mirror: Option<Mirror>,
}

impl ForceLayout {
    pub fn new(settings: ForceSettings) -> Self {
        Self {
            settings,
            alpha: 1.0,
            running: true,
            mirror: None,
        }
    }

    pub fn settings(&self) -> &ForceSettings {
        &self.settings
    }

    /// New parameters take effect on the next tick.
    pub fn set_settings(&mut self, settings: ForceSettings) {
        self.settings = settings;
        self.mirror = None;
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_running(&self) -> bool {
        self.running && self.alpha >= self.settings.alpha_min
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Reheat to full energy.
    pub fn restart(&mut self) {
        self.alpha = 1.0;
        self.running = true;
    }

    /// Continue from the current energy.
    pub fn resume(&mut self) {
        self.running = true;
    }

    /// Advance one step. Returns `false` when the layout is idle.
    pub fn tick(&mut self, molecule: &mut Molecule) -> bool {
        if !self.is_running() {
            return false;
        }
        self.alpha += (0.0 - self.alpha) * self.settings.alpha_decay;
        if molecule.is_empty() {
            return true;
        }

        let atoms = molecule.atom_ids();
        let bonds: Vec<(NodeIndex, NodeIndex)> =
            molecule.bonds().map(|(_, a, b, _)| (a, b)).collect();
        let stale = self
            .mirror
            .as_ref()
            .is_none_or(|m| m.atoms != atoms || m.bonds != bonds);
        if stale {
            self.mirror = Some(Mirror::build(molecule, atoms, bonds, &self.settings));
        }
        let Some(mirror) = self.mirror.as_mut() else {
            return true;
        };

        mirror.graph.visit_nodes_mut(|node| {
            if let Some(atom) = molecule.atom(node.data.user_data) {
                node.data.x = atom.pos.x;
                node.data.y = atom.pos.y;
            }
        });
        mirror.graph.update(self.settings.time_step);
        mirror.graph.visit_nodes(|node| {
            if let Some(atom) = molecule.atom_mut(node.data.user_data) {
                atom.pos = pos2(node.x(), node.y());
            }
        });

        recenter(molecule);
        true
    }
}

/// Keep the centroid on the origin, where the canvas view is centered.
fn recenter(molecule: &mut Molecule) {
    let ids = molecule.atom_ids();
    if ids.is_empty() {
        return;
    }
    let sum = ids
        .iter()
        .filter_map(|id| molecule.atom(*id))
        .fold(Vec2::ZERO, |acc, a| acc + a.pos.to_vec2());
    let centroid = sum / ids.len() as f32;
    for id in ids {
        if let Some(atom) = molecule.atom_mut(id) {
            atom.pos -= centroid;
        }
    }
}

impl Default for ForceLayout {
    fn default() -> Self {
        Self::new(ForceSettings::default())
    }
}
