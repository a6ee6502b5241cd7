use eframe::egui::{Pos2, Vec2, vec2};
use petgraph::stable_graph::{EdgeIndex, NodeIndex};
use serde::{Deserialize, Serialize};

use crate::layout_force::{ForceLayout, ForceSettings};
use crate::molecule::Molecule;
use crate::onehot::{OneHot, Vocabulary};
use crate::settings::InteractionSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EditMode {
    /// Drag from an atom to grow the molecule, click to cycle categories.
    #[default]
    Add,
    /// Click an atom or bond to delete it.
    Remove,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    Atom(NodeIndex),
    Bond(EdgeIndex),
}

/// Atom and bond that exist only while a drag is in flight.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingAtom {
    pub anchor: NodeIndex,
    pub start: Pos2,
    pub pos: Pos2,
    pub element: OneHot,
    pub order: OneHot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragOutcome {
    /// No drag was in progress.
    Ignored,
    /// The drag was dropped without changing the molecule.
    Discarded,
    /// The gesture was a click: the anchor moved to its next element.
    CycledElement(NodeIndex),
    /// Released over another atom: a bond between the two.
    Connected(EdgeIndex),
    /// Released on empty canvas: the pending atom and its bond were kept.
    Committed { atom: NodeIndex, bond: EdgeIndex },
}

type ChangeCallback = Box<dyn FnMut(&Molecule)>;

/// Gesture state machine around the edited molecule.
///
/// Every committed mutation ends with the registered callback, invoked
/// after the mutation and any layout restart have been applied.
pub struct MoleculeEditor {
    molecule: Molecule,
    pristine: Molecule,
    vocab: Vocabulary,
    pub interaction: InteractionSettings,
    pub layout: ForceLayout,
    mode: EditMode,
    pending: Option<PendingAtom>,
    hovered: Option<Element>,
    edited: bool,
    on_change: Option<ChangeCallback>,
}

impl MoleculeEditor {
    pub fn new(
        molecule: Molecule,
        vocab: Vocabulary,
        interaction: InteractionSettings,
        forces: ForceSettings,
    ) -> Self {
        Self {
            pristine: molecule.clone(),
            molecule,
            vocab,
            interaction,
            layout: ForceLayout::new(forces),
            mode: EditMode::default(),
            pending: None,
            hovered: None,
            edited: false,
            on_change: None,
        }
    }

    pub fn set_on_change(&mut self, callback: impl FnMut(&Molecule) + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn molecule(&self) -> &Molecule {
        &self.molecule
    }

    pub fn pristine(&self) -> &Molecule {
        &self.pristine
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    pub fn pending(&self) -> Option<&PendingAtom> {
        self.pending.as_ref()
    }

    pub fn hovered(&self) -> Option<Element> {
        self.hovered
    }

    /// True once the molecule differs from what was loaded.
    pub fn is_edited(&self) -> bool {
        self.edited
    }

    pub fn set_mode(&mut self, mode: EditMode) {
        if self.mode != mode && self.pending.take().is_some() {
            self.layout.resume();
        }
        self.mode = mode;
    }

    pub fn hover(&mut self, element: Option<Element>) {
        self.hovered = element.filter(|e| self.is_alive(*e));
    }

    fn is_alive(&self, element: Element) -> bool {
        match element {
            Element::Atom(id) => self.molecule.atom(id).is_some(),
            Element::Bond(id) => self.molecule.bond(id).is_some(),
        }
    }

    fn changed(&mut self) {
        self.edited = true;
        self.emit();
    }

    fn emit(&mut self) {
        if let Some(callback) = self.on_change.as_mut() {
            callback(&self.molecule);
        }
    }

    // ------------------------------------------------------------------
    // Gestures
    // ------------------------------------------------------------------

    /// Start growing a new atom out of `anchor`. Only meaningful in
    /// [`EditMode::Add`]; returns whether a drag started.
    pub fn begin_drag(&mut self, anchor: NodeIndex, pos: Pos2) -> bool {
        if self.mode != EditMode::Add || self.molecule.atom(anchor).is_none() {
            return false;
        }
        let (Ok(element), Ok(order)) =
            (self.vocab.default_atom(), self.vocab.default_bond())
        else {
            log::warn!("vocabulary has no categories, ignoring drag");
            return false;
        };
        self.pending = Some(PendingAtom {
            anchor,
            start: pos,
            pos,
            element,
            order,
        });
        self.layout.stop();
        true
    }

    pub fn drag_to(&mut self, pos: Pos2) {
        if let Some(pending) = self.pending.as_mut() {
            pending.pos = pos;
        }
    }

    /// Finish the drag at `pos`, with `over` the atom under the pointer.
    pub fn end_drag(&mut self, pos: Pos2, over: Option<NodeIndex>) -> DragOutcome {
        let Some(pending) = self.pending.take() else {
            return DragOutcome::Ignored;
        };
        let anchor = pending.anchor;
        if self.molecule.atom(anchor).is_none() {
            self.layout.resume();
            return DragOutcome::Discarded;
        }

        let delta = pos - pending.start;
        let threshold = self.interaction.click_threshold;
        if delta.x.abs() < threshold && delta.y.abs() < threshold {
            self.molecule.cycle_element(anchor);
            self.layout.resume();
            self.changed();
            log::debug!("cycled element of atom {}", anchor.index());
            return DragOutcome::CycledElement(anchor);
        }

        if let Some(target) = over.filter(|t| *t != anchor) {
            return match self.molecule.add_bond(anchor, target, pending.order) {
                Some(bond) => {
                    self.layout.restart();
                    self.changed();
                    log::debug!(
                        "bonded atoms {} and {}",
                        anchor.index(),
                        target.index()
                    );
                    DragOutcome::Connected(bond)
                }
                None => {
                    self.layout.resume();
                    DragOutcome::Discarded
                }
            };
        }

        let atom = self.molecule.add_atom(pending.element, pos);
        let Some(bond) = self.molecule.add_bond(anchor, atom, pending.order) else {
            // Fresh atoms cannot already be bonded; undo and bail out.
            self.molecule.remove_atom(atom);
            self.layout.resume();
            return DragOutcome::Discarded;
        };
        self.layout.restart();
        self.changed();
        log::debug!("added atom {} next to {}", atom.index(), anchor.index());
        DragOutcome::Committed { atom, bond }
    }

    /// Drop an in-flight drag without touching the molecule.
    pub fn cancel_drag(&mut self) {
        if self.pending.take().is_some() {
            self.layout.resume();
        }
    }

    /// Add mode cycles the bond order, Remove mode deletes the bond.
    pub fn click_bond(&mut self, bond: EdgeIndex) -> bool {
        match self.mode {
            EditMode::Remove => self.remove_bond(bond),
            EditMode::Add => {
                if !self.molecule.cycle_order(bond) {
                    return false;
                }
                self.changed();
                log::debug!("cycled order of bond {}", bond.index());
                true
            }
        }
    }

    pub fn remove_atom(&mut self, atom: NodeIndex) -> bool {
        if self.molecule.remove_atom(atom).is_none() {
            return false;
        }
        if self.pending.is_some_and(|p| p.anchor == atom) {
            self.pending = None;
        }
        self.hovered = None;
        self.layout.restart();
        self.changed();
        log::debug!("removed atom {}", atom.index());
        true
    }

    pub fn remove_bond(&mut self, bond: EdgeIndex) -> bool {
        if self.molecule.remove_bond(bond).is_none() {
            return false;
        }
        self.hovered = None;
        self.layout.restart();
        self.changed();
        log::debug!("removed bond {}", bond.index());
        true
    }

    /// Remove whatever the dismiss control is attached to.
    pub fn dismiss(&mut self, element: Element) -> bool {
        match element {
            Element::Atom(id) => self.remove_atom(id),
            Element::Bond(id) => self.remove_bond(id),
        }
    }

    /// Go back to the molecule as it was loaded.
    pub fn reset(&mut self) {
        self.molecule = self.pristine.clone();
        self.pending = None;
        self.hovered = None;
        self.edited = false;
        self.layout.restart();
        self.emit();
    }

    /// Swap in a different molecule, which becomes the new reset target.
    /// The callback is not invoked; callers decide whether to re-run the
    /// model.
    pub fn replace(&mut self, molecule: Molecule) {
        self.layout.stop();
        self.pristine = molecule.clone();
        self.molecule = molecule;
        self.pending = None;
        self.hovered = None;
        self.edited = false;
        self.layout.restart();
    }

    /// One physics step; returns whether anything moved.
    pub fn tick(&mut self) -> bool {
        self.layout.tick(&mut self.molecule)
    }

    // ------------------------------------------------------------------
    // Hit testing (world coordinates)
    // ------------------------------------------------------------------

    pub fn atom_at(&self, pos: Pos2) -> Option<NodeIndex> {
        let r = self.interaction.atom_radius;
        self.molecule
            .atoms()
            .filter(|(_, a)| a.pos.distance_sq(pos) <= r * r)
            .min_by(|(_, a), (_, b)| {
                a.pos.distance_sq(pos).total_cmp(&b.pos.distance_sq(pos))
            })
            .map(|(id, _)| id)
    }

    pub fn bond_at(&self, pos: Pos2) -> Option<EdgeIndex> {
        let half = self.interaction.bond_hit_width / 2.0;
        self.molecule
            .bonds()
            .filter_map(|(id, a, b, _)| {
                let a = self.molecule.atom(a)?.pos;
                let b = self.molecule.atom(b)?.pos;
                let d = distance_to_segment(pos, a, b);
                (d <= half).then_some((id, d))
            })
            .min_by(|x, y| x.1.total_cmp(&y.1))
            .map(|(id, _)| id)
    }

    /// Atoms win over bonds where both are under the pointer.
    pub fn element_at(&self, pos: Pos2) -> Option<Element> {
        self.atom_at(pos)
            .map(Element::Atom)
            .or_else(|| self.bond_at(pos).map(Element::Bond))
    }

    /// Where the dismiss control of `element` is drawn.
    pub fn dismiss_anchor(&self, element: Element) -> Option<Pos2> {
        match element {
            Element::Atom(id) => {
                let r = self.interaction.atom_radius;
                Some(self.molecule.atom(id)?.pos + vec2(r, -r))
            }
            Element::Bond(id) => {
                let (a, b) = self.molecule.bond_endpoints(id)?;
                let a = self.molecule.atom(a)?.pos;
                let b = self.molecule.atom(b)?.pos;
                let d = b - a;
                Some(a.lerp(b, 0.5) + vec2(d.y.abs(), d.x.abs()) / 4.0)
            }
        }
    }

    /// The hovered element whose dismiss control is under `pos`.
    pub fn dismiss_at(&self, pos: Pos2) -> Option<Element> {
        let element = self.hovered?;
        let anchor = self.dismiss_anchor(element)?;
        let r = self.interaction.atom_radius;
        (anchor.distance_sq(pos) <= r * r).then_some(element)
    }
}

fn distance_to_segment(p: Pos2, a: Pos2, b: Pos2) -> f32 {
    let ab: Vec2 = b - a;
    let len_sq = ab.length_sq();
    if len_sq == 0.0 {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eframe::egui::pos2;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct Fixture {
        editor: MoleculeEditor,
        calls: Rc<RefCell<Vec<(usize, usize)>>>,
        a: NodeIndex,
        b: NodeIndex,
    }

    /// Two bonded carbons and a callback that records atom/bond counts.
    fn fixture() -> Fixture {
        let carbon = OneHot::first(4).unwrap();
        let mut m = Molecule::new();
        let a = m.add_atom(carbon, pos2(0.0, 0.0));
        let b = m.add_atom(carbon, pos2(50.0, 0.0));
        m.add_bond(a, b, carbon).unwrap();

        let mut editor = MoleculeEditor::new(
            m,
            Vocabulary::default(),
            InteractionSettings::default(),
            ForceSettings::default(),
        );
        let calls = Rc::new(RefCell::new(Vec::new()));
        let sink = calls.clone();
        editor.set_on_change(move |m| {
            sink.borrow_mut().push((m.atom_count(), m.bond_count()))
        });
        Fixture {
            editor,
            calls,
            a,
            b,
        }
    }

    #[test]
    fn test_click_without_drag_cycles_only_the_anchor() {
        let mut f = fixture();

        assert!(f.editor.begin_drag(f.a, pos2(0.0, 0.0)));
        f.editor.drag_to(pos2(5.0, -3.0));
        let outcome = f.editor.end_drag(pos2(19.0, 19.0), None);

        let m = f.editor.molecule();
        assert_eq!(outcome, DragOutcome::CycledElement(f.a));
        assert_eq!(m.atom(f.a).unwrap().element.index(), 1);
        assert_eq!(m.atom(f.b).unwrap().element.index(), 0);
        assert_eq!((m.atom_count(), m.bond_count()), (2, 1));
        assert_eq!(f.calls.borrow().len(), 1);
        assert!(f.editor.pending().is_none());
    }

    #[test]
    fn test_drag_to_empty_space_commits_one_atom_and_one_bond() {
        let mut f = fixture();

        f.editor.begin_drag(f.a, pos2(0.0, 0.0));
        assert!(!f.editor.layout.is_running(), "layout stops during a drag");
        assert_eq!(f.editor.molecule().atom_count(), 2, "pending atom is not committed");

        let outcome = f.editor.end_drag(pos2(0.0, 80.0), None);

        let DragOutcome::Committed { atom, .. } = outcome else {
            panic!("expected a commit, got {:?}", outcome);
        };
        let m = f.editor.molecule();
        assert_eq!((m.atom_count(), m.bond_count()), (3, 2));
        assert_eq!(m.atom(atom).unwrap().pos, pos2(0.0, 80.0));
        assert!(m.bond_between(f.a, atom).is_some());
        assert!(f.editor.layout.is_running());
        assert_eq!(*f.calls.borrow(), vec![(3, 2)]);
    }

    #[test]
    fn test_drag_onto_other_atom_adds_bond_only() {
        let carbon = OneHot::first(4).unwrap();
        let mut f = fixture();
        let c = {
            let mut m = f.editor.molecule().clone();
            let c = m.add_atom(carbon, pos2(0.0, 100.0));
            f.editor.replace(m);
            c
        };

        f.editor.begin_drag(f.a, pos2(0.0, 0.0));
        let outcome = f.editor.end_drag(pos2(0.0, 100.0), Some(c));

        let m = f.editor.molecule();
        assert!(matches!(outcome, DragOutcome::Connected(_)));
        assert_eq!((m.atom_count(), m.bond_count()), (3, 2));
        assert_eq!(f.calls.borrow().len(), 1, "replace does not notify");
    }

    #[test]
    fn test_drag_onto_bonded_atom_changes_nothing() {
        let mut f = fixture();

        f.editor.begin_drag(f.a, pos2(0.0, 0.0));
        let outcome = f.editor.end_drag(pos2(50.0, 0.0), Some(f.b));

        assert_eq!(outcome, DragOutcome::Discarded);
        assert_eq!(f.editor.molecule().bond_count(), 1);
        assert!(f.calls.borrow().is_empty());
        assert!(!f.editor.is_edited());
    }

    #[test]
    fn test_remove_mode_ignores_drags_and_deletes_on_click() {
        let mut f = fixture();
        f.editor.set_mode(EditMode::Remove);

        assert!(!f.editor.begin_drag(f.a, pos2(0.0, 0.0)));
        assert_eq!(f.editor.end_drag(pos2(0.0, 90.0), None), DragOutcome::Ignored);

        let bond = f.editor.molecule().bond_between(f.a, f.b).unwrap();
        assert!(f.editor.click_bond(bond));
        assert_eq!(f.editor.molecule().bond_count(), 0);
        assert_eq!(f.calls.borrow().len(), 1);
    }

    #[test]
    fn test_click_bond_cycles_order_once() {
        let mut f = fixture();
        let bond = f.editor.molecule().bond_between(f.a, f.b).unwrap();

        assert!(f.editor.click_bond(bond));

        let order = f.editor.molecule().bond(bond).unwrap().order;
        assert_eq!(order.index(), 1);
        assert_eq!(f.calls.borrow().len(), 1);
    }

    #[test]
    fn test_removing_atom_removes_its_bonds() {
        let mut f = fixture();
        // Hang two more atoms off `a` so it has degree 3.
        for y in [80.0, -80.0] {
            f.editor.begin_drag(f.a, pos2(0.0, 0.0));
            f.editor.end_drag(pos2(0.0, y), None);
        }
        let degree = f.editor.molecule().degree(f.a);
        let bonds = f.editor.molecule().bond_count();
        assert_eq!(degree, 3);

        assert!(f.editor.dismiss(Element::Atom(f.a)));

        let m = f.editor.molecule();
        assert_eq!(m.bond_count(), bonds - degree);
        assert_eq!(m.directed_edges().len(), 2 * (bonds - degree));
        assert!(!f.editor.remove_atom(f.a), "stale ids are ignored");
        assert_eq!(f.calls.borrow().len(), 3);
    }

    #[test]
    fn test_reset_restores_pristine_molecule() {
        let mut f = fixture();
        f.editor.begin_drag(f.a, pos2(0.0, 0.0));
        f.editor.end_drag(pos2(0.0, 80.0), None);
        f.editor.remove_atom(f.b);
        assert!(f.editor.is_edited());

        f.editor.reset();

        assert!(f.editor.molecule().same_structure(f.editor.pristine()));
        assert!(!f.editor.is_edited());
        assert_eq!(f.calls.borrow().last(), Some(&(2, 1)));
    }

    #[test]
    fn test_reset_undoes_cycled_element_and_bond_order() {
        let mut f = fixture();
        let bond = f.editor.molecule().bond_between(f.a, f.b).unwrap();
        f.editor.click_bond(bond);
        f.editor.begin_drag(f.b, pos2(50.0, 0.0));
        assert_eq!(
            f.editor.end_drag(pos2(50.0, 0.0), None),
            DragOutcome::CycledElement(f.b)
        );
        assert!(f.editor.is_edited());
        assert!(!f.editor.molecule().same_structure(f.editor.pristine()));

        f.editor.reset();

        let m = f.editor.molecule();
        assert!(m.same_structure(f.editor.pristine()));
        assert!(!f.editor.is_edited());
        assert_eq!(m.atom(f.b).unwrap().element.index(), 0);
        let bond = m.bond_between(f.a, f.b).unwrap();
        assert_eq!(m.bond(bond).unwrap().order.index(), 0);
    }

    #[test]
    fn test_hover_and_dismiss_hit_testing() {
        let mut f = fixture();
        // Positions are exact here because the layout has not ticked.
        assert_eq!(f.editor.element_at(pos2(1.0, 1.0)), Some(Element::Atom(f.a)));
        let bond = f.editor.molecule().bond_between(f.a, f.b).unwrap();
        assert_eq!(f.editor.element_at(pos2(25.0, 3.0)), Some(Element::Bond(bond)));
        assert_eq!(f.editor.element_at(pos2(25.0, 30.0)), None);

        f.editor.hover(Some(Element::Atom(f.a)));
        assert_eq!(f.editor.dismiss_at(pos2(7.0, -7.0)), Some(Element::Atom(f.a)));

        f.editor.remove_atom(f.a);
        assert_eq!(f.editor.hovered(), None);
    }
}
