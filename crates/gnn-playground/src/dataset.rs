use eframe::egui::Pos2;
use graph_nets::{DecodeError, GraphTensors, TensorData};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::featurization::{encode, molecule_from_tensors};
use crate::molecule::{ExampleError, Molecule};
use crate::onehot::{OneHot, OneHotError, Vocabulary};
use crate::serialization::{self, FileError};

/// One graph of a dataset, kept in its named-tensor form until selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleRecord {
    #[serde(default)]
    pub name: Option<String>,
    pub tensors: Vec<TensorData>,
    /// Ground truth for the predicted property, 0 or 1.
    #[serde(default)]
    pub label: Option<f32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DatasetFile {
    /// A bare list of named-tensor lists, one per graph.
    Bare(Vec<Vec<TensorData>>),
    Records { examples: Vec<ExampleRecord> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Dataset {
    pub examples: Vec<ExampleRecord>,
}

// Heavy-atom skeletons. Indices name categories of the default vocabulary
// (C, N, O, S; single, double, triple, aromatic) and are looked up by name
// in the active one.
struct Builtin {
    name: &'static str,
    atoms: &'static [usize],
    bonds: &'static [(usize, usize, usize)],
    label: f32,
}

const BUILTIN: &[Builtin] = &[
    Builtin {
        name: "ethanol",
        atoms: &[0, 0, 2],
        bonds: &[(0, 1, 0), (1, 2, 0)],
        label: 0.0,
    },
    Builtin {
        name: "acetic acid",
        atoms: &[0, 0, 2, 2],
        bonds: &[(0, 1, 0), (1, 2, 1), (1, 3, 0)],
        label: 1.0,
    },
    Builtin {
        name: "acetone",
        atoms: &[0, 0, 0, 2],
        bonds: &[(0, 1, 0), (1, 2, 0), (1, 3, 1)],
        label: 0.0,
    },
    Builtin {
        name: "benzene",
        atoms: &[0, 0, 0, 0, 0, 0],
        bonds: &[(0, 1, 3), (1, 2, 3), (2, 3, 3), (3, 4, 3), (4, 5, 3), (5, 0, 3)],
        label: 0.0,
    },
    Builtin {
        name: "phenol",
        atoms: &[0, 0, 0, 0, 0, 0, 2],
        bonds: &[
            (0, 1, 3),
            (1, 2, 3),
            (2, 3, 3),
            (3, 4, 3),
            (4, 5, 3),
            (5, 0, 3),
            (0, 6, 0),
        ],
        label: 0.0,
    },
    Builtin {
        name: "pyridine",
        atoms: &[1, 0, 0, 0, 0, 0],
        bonds: &[(0, 1, 3), (1, 2, 3), (2, 3, 3), (3, 4, 3), (4, 5, 3), (5, 0, 3)],
        label: 1.0,
    },
    Builtin {
        name: "acetonitrile",
        atoms: &[0, 0, 1],
        bonds: &[(0, 1, 0), (1, 2, 2)],
        label: 0.0,
    },
    Builtin {
        name: "methanethiol",
        atoms: &[0, 3],
        bonds: &[(0, 1, 0)],
        label: 1.0,
    },
    Builtin {
        name: "dimethyl sulfide",
        atoms: &[0, 3, 0],
        bonds: &[(0, 1, 0), (1, 2, 0)],
        label: 1.0,
    },
];

/// Category `index` of `known`, moved to wherever the same name sits in
/// `active`. Unknown names keep their index.
fn translate(known: &[String], active: &[String], index: usize) -> Result<OneHot, OneHotError> {
    let index = known
        .get(index)
        .and_then(|name| active.iter().position(|n| n == name))
        .unwrap_or(index);
    OneHot::new(index, active.len())
}

impl Builtin {
    fn molecule(&self, vocab: &Vocabulary) -> Result<Molecule, ExampleError> {
        let known = Vocabulary::default();
        let mut m = Molecule::new();
        let mut ids = Vec::with_capacity(self.atoms.len());
        for &a in self.atoms {
            let element = translate(&known.atoms, &vocab.atoms, a)?;
            ids.push(m.add_atom(element, Pos2::ZERO));
        }
        for &(a, b, order) in self.bonds {
            let order = translate(&known.bonds, &vocab.bonds, order)?;
            if m.add_bond(ids[a], ids[b], order).is_none() {
                return Err(ExampleError::DuplicateBond(a, b));
            }
        }
        Ok(m)
    }
}

impl Dataset {
    /// A handful of small molecules, encoded with `vocab`.
    pub fn builtin(vocab: &Vocabulary) -> Self {
        let examples = BUILTIN
            .iter()
            .filter_map(|b| match b.molecule(vocab) {
                Ok(m) => Some(ExampleRecord {
                    name: Some(b.name.to_string()),
                    tensors: encode(&m, vocab).to_named(),
                    label: Some(b.label),
                }),
                Err(e) => {
                    log::warn!("skipping built-in {}: {}", b.name, e);
                    None
                }
            })
            .collect();
        Self { examples }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let examples = match serde_json::from_str(json)? {
            DatasetFile::Bare(graphs) => graphs
                .into_iter()
                .map(|tensors| ExampleRecord {
                    name: None,
                    tensors,
                    label: None,
                })
                .collect(),
            DatasetFile::Records { examples } => examples,
        };
        Ok(Self { examples })
    }

    pub fn load(path: &Path) -> Result<Self, FileError> {
        let json = serialization::read_file(path)?;
        let dataset = Self::from_json(&json)?;
        log::info!(
            "loaded {} examples from {}",
            dataset.len(),
            path.display()
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn label(&self, index: usize) -> Option<f32> {
        self.examples.get(index)?.label
    }

    pub fn display_name(&self, index: usize) -> String {
        match self.examples.get(index).and_then(|e| e.name.clone()) {
            Some(name) => name,
            None => format!("example {}", index + 1),
        }
    }

    pub fn tensors(&self, index: usize) -> Result<GraphTensors, ExampleError> {
        let record = self
            .examples
            .get(index)
            .ok_or(ExampleError::NoSuchExample(index))?;
        Ok(GraphTensors::from_named(&record.tensors)?)
    }

    pub fn molecule(
        &self,
        index: usize,
        vocab: &Vocabulary,
    ) -> Result<Molecule, ExampleError> {
        molecule_from_tensors(&self.tensors(index)?, vocab)
    }

    /// Decode every example up front, for batch predictions.
    pub fn all_tensors(&self) -> Vec<Result<GraphTensors, DecodeError>> {
        self.examples
            .iter()
            .map(|e| GraphTensors::from_named(&e.tensors))
            .collect()
    }
}
