use graph_nets::GraphTensors;
use ndarray::Array2;

use crate::molecule::{ExampleError, Molecule};
use crate::onehot::Vocabulary;

/// Flatten a molecule into the model's input tensors.
///
/// Node rows follow graph order; edge rows list every bond forward then
/// reverse, so each bond occupies two consecutive rows.
pub fn encode(molecule: &Molecule, vocab: &Vocabulary) -> GraphTensors {
    let dense = molecule.dense_indices();
    let atom_width = vocab.atoms.len();
    let bond_width = vocab.bonds.len();

    let mut nodes = Array2::<f32>::zeros((molecule.atom_count(), atom_width));
    for (row, (_, atom)) in molecule.atoms().enumerate() {
        debug_assert!(
            atom.element.index() < atom_width,
            "element {} outside a vocabulary of {}",
            atom.element.index(),
            atom_width
        );
        if atom.element.index() < atom_width {
            nodes[[row, atom.element.index()]] = 1.0;
        }
    }

    let directed = molecule.directed_edges();
    let mut edges = Array2::<f32>::zeros((directed.len(), bond_width));
    let mut senders = Vec::with_capacity(directed.len());
    let mut receivers = Vec::with_capacity(directed.len());
    for (row, edge) in directed.iter().enumerate() {
        debug_assert!(
            edge.order.index() < bond_width,
            "bond order {} outside a vocabulary of {}",
            edge.order.index(),
            bond_width
        );
        if edge.order.index() < bond_width {
            edges[[row, edge.order.index()]] = 1.0;
        }
        // Bonds only ever join live atoms.
        senders.push(dense.get(&edge.source).copied().unwrap_or_default());
        receivers.push(dense.get(&edge.target).copied().unwrap_or_default());
    }

    GraphTensors::single(nodes, edges, senders, receivers)
}

/// Decode tensors and resolve them into a molecule laid out on a circle.
pub fn molecule_from_tensors(
    tensors: &GraphTensors,
    vocab: &Vocabulary,
) -> Result<Molecule, ExampleError> {
    let decoded = tensors.decode()?;
    Molecule::from_decoded(&decoded, vocab)
}
