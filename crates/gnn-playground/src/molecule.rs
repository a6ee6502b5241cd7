use eframe::egui::{Pos2, pos2};
use graph_nets::{DecodeError, DecodedGraph};
use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};
use std::collections::HashMap;

use crate::onehot::{OneHot, OneHotError, Vocabulary};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Atom {
    pub element: OneHot,
    pub pos: Pos2,
}

impl Atom {
    pub fn new(element: OneHot, pos: Pos2) -> Self {
        Self { element, pos }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bond {
    pub order: OneHot,
}

/// One direction of a bond, as seen by the model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DirectedEdge {
    pub bond: EdgeIndex,
    pub source: NodeIndex,
    pub target: NodeIndex,
    pub order: OneHot,
}

type MoleculeGraph = StableUnGraph<Atom, Bond>;

/// Atoms and bonds of the molecule being edited.
///
/// A bond is stored once. Its two directed copies are generated by
/// [`Molecule::directed_edges`], so they can never disagree.
#[derive(Debug, Clone, Default)]
pub struct Molecule {
    graph: MoleculeGraph,
}

impl Molecule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn atom_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn bond_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    pub fn atom(&self, id: NodeIndex) -> Option<&Atom> {
        self.graph.node_weight(id)
    }

    pub fn atom_mut(&mut self, id: NodeIndex) -> Option<&mut Atom> {
        self.graph.node_weight_mut(id)
    }

    pub fn bond(&self, id: EdgeIndex) -> Option<&Bond> {
        self.graph.edge_weight(id)
    }

    pub fn bond_endpoints(
        &self,
        id: EdgeIndex,
    ) -> Option<(NodeIndex, NodeIndex)> {
        self.graph.edge_endpoints(id)
    }

    pub fn atoms(&self) -> impl Iterator<Item = (NodeIndex, &Atom)> {
        self.graph
            .node_indices()
            .filter_map(|id| self.graph.node_weight(id).map(|a| (id, a)))
    }

    pub fn atom_ids(&self) -> Vec<NodeIndex> {
        self.graph.node_indices().collect()
    }

    /// Bonds in graph order with their endpoints.
    pub fn bonds(
        &self,
    ) -> impl Iterator<Item = (EdgeIndex, NodeIndex, NodeIndex, &Bond)> {
        self.graph.edge_references().map(|e| {
            (e.id(), e.source(), e.target(), e.weight())
        })
    }

    pub fn degree(&self, id: NodeIndex) -> usize {
        self.graph.edges(id).count()
    }

    pub fn bond_between(
        &self,
        a: NodeIndex,
        b: NodeIndex,
    ) -> Option<EdgeIndex> {
        self.graph.find_edge(a, b)
    }

    pub fn add_atom(&mut self, element: OneHot, pos: Pos2) -> NodeIndex {
        self.graph.add_node(Atom::new(element, pos))
    }

    /// Connect two distinct atoms. Returns `None` when either atom is gone,
    /// the atoms are the same, or they are already bonded.
    pub fn add_bond(
        &mut self,
        a: NodeIndex,
        b: NodeIndex,
        order: OneHot,
    ) -> Option<EdgeIndex> {
        if a == b
            || !self.graph.contains_node(a)
            || !self.graph.contains_node(b)
            || self.graph.find_edge(a, b).is_some()
        {
            return None;
        }
        Some(self.graph.add_edge(a, b, Bond { order }))
    }

    /// Remove an atom together with every bond touching it.
    pub fn remove_atom(&mut self, id: NodeIndex) -> Option<Atom> {
        self.graph.remove_node(id)
    }

    pub fn remove_bond(&mut self, id: EdgeIndex) -> Option<Bond> {
        self.graph.remove_edge(id)
    }

    pub fn cycle_element(&mut self, id: NodeIndex) -> bool {
        match self.graph.node_weight_mut(id) {
            Some(atom) => {
                atom.element.cycle();
                true
            }
            None => false,
        }
    }

    pub fn cycle_order(&mut self, id: EdgeIndex) -> bool {
        match self.graph.edge_weight_mut(id) {
            Some(bond) => {
                bond.order.cycle();
                true
            }
            None => false,
        }
    }

    /// Forward then reverse copy of every bond, in bond order.
    pub fn directed_edges(&self) -> Vec<DirectedEdge> {
        self.bonds()
            .flat_map(|(bond, a, b, data)| {
                [
                    DirectedEdge {
                        bond,
                        source: a,
                        target: b,
                        order: data.order,
                    },
                    DirectedEdge {
                        bond,
                        source: b,
                        target: a,
                        order: data.order,
                    },
                ]
            })
            .collect()
    }

    /// Position of every atom in graph order, i.e. its row in `nodes`.
    pub fn dense_indices(&self) -> HashMap<NodeIndex, usize> {
        self.graph
            .node_indices()
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect()
    }

    /// Same atoms and bonds with the same categories, ignoring positions.
    pub fn same_structure(&self, other: &Molecule) -> bool {
        self.structure() == other.structure()
    }

    fn structure(&self) -> (Vec<OneHot>, Vec<(usize, usize, OneHot)>) {
        let dense = self.dense_indices();
        let elements = self.atoms().map(|(_, a)| a.element).collect();
        let mut bonds: Vec<_> = self
            .bonds()
            .filter_map(|(_, a, b, bond)| {
                let (a, b) = (*dense.get(&a)?, *dense.get(&b)?);
                Some((a.min(b), a.max(b), bond.order))
            })
            .collect();
        bonds.sort_by_key(|&(a, b, o)| (a, b, o.index()));
        (elements, bonds)
    }

    /// Spread the atoms evenly on a circle around the origin.
    pub fn place_on_circle(&mut self, radius: f32) {
        let ids = self.atom_ids();
        let n = ids.len().max(1) as f32;
        for (i, id) in ids.into_iter().enumerate() {
            if let Some(atom) = self.graph.node_weight_mut(id) {
                let angle = std::f32::consts::TAU * i as f32 / n;
                atom.pos = pos2(radius * angle.cos(), radius * angle.sin());
            }
        }
    }

    /// Resolve a decoded graph into a molecule.
    ///
    /// Every directed edge must be matched by a reverse edge with the same
    /// category; each matched pair becomes one bond.
    pub fn from_decoded(
        decoded: &DecodedGraph,
        vocab: &Vocabulary,
    ) -> Result<Self, ExampleError> {
        let mut molecule = Molecule::new();
        let num_atoms = decoded.nodes.len();

        let mut ids = Vec::with_capacity(num_atoms);
        for row in &decoded.nodes {
            check_width("nodes", vocab.atoms.len(), row.len())?;
            let element = OneHot::from_vector(row)?;
            ids.push(molecule.add_atom(element, Pos2::ZERO));
        }

        // Unmatched directed edges waiting for their reverse, by
        // (sender, receiver, category).
        let mut open: HashMap<(usize, usize, OneHot), Vec<usize>> =
            HashMap::new();
        let mut pairs: Vec<(usize, usize, OneHot, bool)> = Vec::new();

        for edge in &decoded.edges {
            let (s, r) = (edge.sender, edge.receiver);
            for index in [s, r] {
                if index >= num_atoms {
                    return Err(ExampleError::EndpointOutOfRange {
                        index,
                        atoms: num_atoms,
                    });
                }
            }
            if s == r {
                return Err(ExampleError::SelfLoop(s));
            }
            check_width("edges", vocab.bonds.len(), edge.features.len())?;
            let order = OneHot::from_vector(&edge.features)?;

            let reverse = open
                .get_mut(&(r, s, order))
                .and_then(|slots| slots.pop());
            match reverse {
                Some(slot) => pairs[slot].3 = true,
                None => {
                    open.entry((s, r, order)).or_default().push(pairs.len());
                    pairs.push((s, r, order, false));
                }
            }
        }

        for (s, r, order, matched) in pairs {
            if !matched {
                return Err(ExampleError::UnpairedEdge {
                    sender: s,
                    receiver: r,
                });
            }
            if molecule.add_bond(ids[s], ids[r], order).is_none() {
                return Err(ExampleError::DuplicateBond(s, r));
            }
        }

        molecule.place_on_circle(100.0);
        Ok(molecule)
    }
}

fn check_width(
    tensor: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), ExampleError> {
    if expected == found {
        Ok(())
    } else {
        Err(ExampleError::WidthMismatch {
            tensor,
            expected,
            found,
        })
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ExampleError {
    #[error("there is no example {0}")]
    NoSuchExample(usize),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("edge endpoint {index} does not name one of the {atoms} atoms")]
    EndpointOutOfRange { index: usize, atoms: usize },
    #[error("atom {0} is bonded to itself")]
    SelfLoop(usize),
    #[error("`{tensor}` rows have {found} features, the vocabulary has {expected}")]
    WidthMismatch {
        tensor: &'static str,
        expected: usize,
        found: usize,
    },
    #[error(transparent)]
    Category(#[from] OneHotError),
    #[error("edge {sender} -> {receiver} has no matching reverse edge")]
    UnpairedEdge { sender: usize, receiver: usize },
    #[error("atoms {0} and {1} are bonded twice")]
    DuplicateBond(usize, usize),
}

#[cfg(test)]
mod tests {
    use super::*;
    use graph_nets::DecodedEdge;

    fn element(i: usize) -> OneHot {
        OneHot::new(i, 4).unwrap()
    }

    fn triangle() -> (Molecule, [NodeIndex; 3]) {
        let mut m = Molecule::new();
        let a = m.add_atom(element(0), Pos2::ZERO);
        let b = m.add_atom(element(1), pos2(10.0, 0.0));
        let c = m.add_atom(element(2), pos2(0.0, 10.0));
        m.add_bond(a, b, element(0)).unwrap();
        m.add_bond(b, c, element(1)).unwrap();
        m.add_bond(c, a, element(3)).unwrap();
        (m, [a, b, c])
    }

    fn edge(sender: usize, receiver: usize, hot: usize) -> DecodedEdge {
        DecodedEdge {
            sender,
            receiver,
            features: element(hot).to_vector(),
        }
    }

    #[test]
    fn test_every_directed_edge_has_a_matching_reverse() {
        let (m, _) = triangle();
        let edges = m.directed_edges();

        assert_eq!(edges.len(), 2 * m.bond_count());
        for e in &edges {
            assert!(
                edges.iter().any(|r| r.source == e.target
                    && r.target == e.source
                    && r.order == e.order),
                "edge {:?} has no reverse",
                e
            );
        }
        assert_eq!(edges[0].source, edges[1].target, "reverse follows forward");
    }

    #[test]
    fn test_add_bond_rejects_self_loops_and_duplicates() {
        let (mut m, [a, b, _]) = triangle();

        assert!(m.add_bond(a, a, element(0)).is_none());
        assert!(m.add_bond(b, a, element(0)).is_none());
        assert_eq!(m.bond_count(), 3);
    }

    #[test]
    fn test_remove_atom_drops_its_bonds() {
        let (mut m, [a, b, _]) = triangle();
        let degree = m.degree(a);

        m.remove_atom(a).expect("atom exists");

        assert_eq!(m.bond_count(), 3 - degree);
        assert!(m.atom(a).is_none());
        assert!(m.atom(b).is_some(), "other atoms keep their ids");
        assert!(m.remove_atom(a).is_none(), "second removal is a no-op");
    }

    #[test]
    fn test_cycle_order_changes_both_directions() {
        let (mut m, [a, b, _]) = triangle();
        let bond = m.bond_between(a, b).unwrap();

        m.cycle_order(bond);

        let copies: Vec<_> = m
            .directed_edges()
            .into_iter()
            .filter(|e| e.bond == bond)
            .collect();
        assert_eq!(copies.len(), 2);
        assert!(copies.iter().all(|e| e.order.index() == 1));
    }

    #[test]
    fn test_from_decoded_pairs_reverse_edges_into_bonds() {
        let decoded = DecodedGraph {
            nodes: vec![element(0).to_vector(), element(2).to_vector()],
            edges: vec![edge(1, 0, 1), edge(0, 1, 1)],
        };

        let m = Molecule::from_decoded(&decoded, &Vocabulary::default())
            .expect("valid example");

        assert_eq!(m.atom_count(), 2);
        assert_eq!(m.bond_count(), 1);
        let (_, _, _, bond) = m.bonds().next().unwrap();
        assert_eq!(bond.order.index(), 1);
    }

    #[test]
    fn test_from_decoded_rejects_bad_edges() {
        let vocab = Vocabulary::default();
        let nodes = vec![element(0).to_vector(), element(0).to_vector()];
        let with = |edges| DecodedGraph {
            nodes: nodes.clone(),
            edges,
        };

        assert!(matches!(
            Molecule::from_decoded(&with(vec![edge(0, 1, 0)]), &vocab),
            Err(ExampleError::UnpairedEdge { sender: 0, receiver: 1 })
        ));
        assert!(matches!(
            Molecule::from_decoded(
                &with(vec![edge(0, 1, 0), edge(1, 0, 2)]),
                &vocab
            ),
            Err(ExampleError::UnpairedEdge { .. })
        ));
        assert!(matches!(
            Molecule::from_decoded(&with(vec![edge(0, 5, 0)]), &vocab),
            Err(ExampleError::EndpointOutOfRange { index: 5, atoms: 2 })
        ));
        assert!(matches!(
            Molecule::from_decoded(&with(vec![edge(1, 1, 0)]), &vocab),
            Err(ExampleError::SelfLoop(1))
        ));
    }

    #[test]
    fn test_from_decoded_rejects_wrong_feature_width() {
        let decoded = DecodedGraph {
            nodes: vec![vec![1.0, 0.0]],
            edges: vec![],
        };

        assert!(matches!(
            Molecule::from_decoded(&decoded, &Vocabulary::default()),
            Err(ExampleError::WidthMismatch { tensor: "nodes", .. })
        ));
    }

    #[test]
    fn test_same_structure_ignores_positions() {
        let (a, _) = triangle();
        let mut b = a.clone();
        b.place_on_circle(100.0);

        assert!(a.same_structure(&b));

        let first = b.atom_ids()[0];
        b.cycle_element(first);
        assert!(!a.same_structure(&b));
    }
}
