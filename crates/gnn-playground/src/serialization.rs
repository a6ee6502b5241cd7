use eframe::egui::Pos2;
use graph_nets::{GraphTensors, TensorData};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::featurization::{encode, molecule_from_tensors};
use crate::molecule::{ExampleError, Molecule};
use crate::onehot::Vocabulary;

#[derive(thiserror::Error, Debug)]
pub enum FileError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}

// ------------------------------------------------------------------
// Serialization structures
// ------------------------------------------------------------------

#[derive(Clone, Serialize, Deserialize)]
pub struct SerializableAtom {
    element: String,
    x: f32,
    y: f32,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SerializableBond {
    source: usize,
    target: usize,
    order: String,
}

/// Human-readable molecule plus the exact tensors the model saw.
#[derive(Clone, Serialize, Deserialize)]
pub struct SerializableMolecule {
    atoms: Vec<SerializableAtom>,
    bonds: Vec<SerializableBond>,
    tensors: Vec<TensorData>,
}

pub fn molecule_to_serializable(
    molecule: &Molecule,
    vocab: &Vocabulary,
) -> SerializableMolecule {
    let dense = molecule.dense_indices();
    let atoms = molecule
        .atoms()
        .map(|(_, atom)| SerializableAtom {
            element: vocab.atom_name(atom.element).to_string(),
            x: atom.pos.x,
            y: atom.pos.y,
        })
        .collect();
    let bonds = molecule
        .bonds()
        .filter_map(|(_, a, b, bond)| {
            Some(SerializableBond {
                source: *dense.get(&a)?,
                target: *dense.get(&b)?,
                order: vocab.bond_name(bond.order).to_string(),
            })
        })
        .collect();
    SerializableMolecule {
        atoms,
        bonds,
        tensors: encode(molecule, vocab).to_named(),
    }
}

impl SerializableMolecule {
    pub fn atom_positions(&self) -> Vec<Pos2> {
        self.atoms.iter().map(|a| Pos2::new(a.x, a.y)).collect()
    }
}

/// Rebuild a saved molecule from its tensors, restoring atom positions
/// when the file still has one per atom.
pub fn serializable_to_molecule(
    saved: &SerializableMolecule,
    vocab: &Vocabulary,
) -> Result<Molecule, ExampleError> {
    let tensors = GraphTensors::from_named(&saved.tensors)?;
    let mut molecule = molecule_from_tensors(&tensors, vocab)?;
    let positions = saved.atom_positions();
    if positions.len() == molecule.atom_count() {
        for (id, pos) in molecule.atom_ids().into_iter().zip(positions) {
            if let Some(atom) = molecule.atom_mut(id) {
                atom.pos = pos;
            }
        }
    }
    Ok(molecule)
}

// ------------------------------------------------------------------
// File I/O operations
// ------------------------------------------------------------------

pub fn read_file(path: &Path) -> Result<String, FileError> {
    std::fs::read_to_string(path).map_err(|source| FileError::Read {
        path: path.display().to_string(),
        source,
    })
}

pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, FileError> {
    let json = read_file(path)?;
    Ok(serde_json::from_str(&json)?)
}

pub fn save_json<T: Serialize>(value: &T, path: &Path) -> Result<(), FileError> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|source| FileError::Write {
        path: path.display().to_string(),
        source,
    })
}

pub fn save_molecule(
    molecule: &Molecule,
    vocab: &Vocabulary,
    path: &Path,
) -> Result<(), FileError> {
    save_json(&molecule_to_serializable(molecule, vocab), path)
}

// ------------------------------------------------------------------
// Tests
// ------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::onehot::OneHot;
    use eframe::egui::pos2;

    fn acetic_acid() -> Molecule {
        let mut m = Molecule::new();
        let c = |i| OneHot::new(i, 4).unwrap();
        let a = m.add_atom(c(0), pos2(-20.0, 0.0));
        let b = m.add_atom(c(0), pos2(20.0, 0.0));
        let o1 = m.add_atom(c(2), pos2(40.0, 20.0));
        let o2 = m.add_atom(c(2), pos2(40.0, -20.0));
        m.add_bond(a, b, c(0));
        m.add_bond(b, o1, c(1));
        m.add_bond(b, o2, c(0));
        m
    }

    #[test]
    fn test_serializable_molecule_names_categories() {
        let vocab = Vocabulary::default();
        let s = molecule_to_serializable(&acetic_acid(), &vocab);

        assert_eq!(s.atoms.len(), 4);
        assert_eq!(s.atoms[2].element, "Oxygen");
        assert_eq!(s.bonds[1].order, "Double");
        assert_eq!((s.bonds[1].source, s.bonds[1].target), (1, 2));
        assert_eq!(s.atom_positions()[0], pos2(-20.0, 0.0));
    }

    #[test]
    fn test_saved_tensors_load_back() {
        let vocab = Vocabulary::default();
        let path = std::env::temp_dir()
            .join(format!("gnn-playground-{}.json", std::process::id()));

        save_molecule(&acetic_acid(), &vocab, &path).expect("writable");
        let loaded: SerializableMolecule = load_json(&path).expect("readable");
        let _ = std::fs::remove_file(&path);

        let tensors = GraphTensors::from_named(&loaded.tensors).expect("valid");
        assert_eq!(tensors, encode(&acetic_acid(), &vocab));

        let restored =
            serializable_to_molecule(&loaded, &vocab).expect("resolvable");
        assert!(restored.same_structure(&acetic_acid()));
        let first = restored.atom_ids()[0];
        assert_eq!(restored.atom(first).unwrap().pos, pos2(-20.0, 0.0));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = read_file(Path::new("/definitely/not/here.json"))
            .expect_err("file does not exist");

        assert!(err.to_string().contains("/definitely/not/here.json"));
    }
}
