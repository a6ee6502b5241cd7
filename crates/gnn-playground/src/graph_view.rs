use eframe::egui::{
    self, Align2, Color32, FontId, Painter, Pos2, Shape, Stroke, Vec2, pos2,
};

use crate::editor::{Element, MoleculeEditor};

// Rendering constants
const BOND_COLOR: Color32 = Color32::from_rgb(70, 70, 70);
const BOND_GAP_COLOR: Color32 = Color32::WHITE;
const HOVER_COLOR: Color32 = Color32::from_rgb(255, 160, 40);
const OUTLINE_WIDTH: f32 = 2.0;
const PENDING_ALPHA: f32 = 0.4;
const DISMISS_RADIUS: f32 = 6.0;

const ATOM_COLORS: [Color32; 4] = [
    Color32::from_rgb(0x60, 0xc4, 0xa0),
    Color32::from_rgb(0x35, 0x5c, 0xa1),
    Color32::from_rgb(0xe3, 0x42, 0x42),
    Color32::from_rgb(0xe3, 0xd6, 0x42),
];

/// Fill color of an element category. Vocabularies longer than the
/// built-in palette continue with a categorical scheme.
pub fn atom_color(index: usize) -> Color32 {
    match ATOM_COLORS.get(index) {
        Some(c) => *c,
        None => {
            let c = colorous::CATEGORY10[index % colorous::CATEGORY10.len()];
            Color32::from_rgb(c.r, c.g, c.b)
        }
    }
}

/// Maps world coordinates (origin at the molecule's center) onto the canvas.
#[derive(Debug, Clone, Copy)]
pub struct View {
    origin: Pos2,
}

impl View {
    pub fn new(origin: Pos2) -> Self {
        Self { origin }
    }

    pub fn to_screen(&self, world: Pos2) -> Pos2 {
        self.origin + world.to_vec2()
    }

    pub fn to_world(&self, screen: Pos2) -> Pos2 {
        (screen - self.origin).to_pos2()
    }
}

/// Stroke layers of a bond, widest first. Double and triple bonds are
/// drawn as a wide dark line with narrower white lines on top.
fn bond_layers(order: usize) -> &'static [(f32, Color32)] {
    match order {
        1 => &[(6.0, BOND_COLOR), (2.0, BOND_GAP_COLOR)],
        2 => &[(10.0, BOND_COLOR), (6.0, BOND_GAP_COLOR), (2.0, BOND_COLOR)],
        _ => &[(2.0, BOND_COLOR)],
    }
}

fn paint_bond(painter: &Painter, a: Pos2, b: Pos2, order: usize, hovered: bool) {
    if hovered {
        let width = bond_layers(order)[0].0 + 2.0 * OUTLINE_WIDTH;
        painter.line_segment([a, b], Stroke::new(width, HOVER_COLOR));
    }
    // Aromatic
    if order == 3 {
        painter.extend(Shape::dashed_line(
            &[a, b],
            Stroke::new(8.0, BOND_COLOR),
            4.0,
            3.0,
        ));
        return;
    }
    for &(width, color) in bond_layers(order) {
        painter.line_segment([a, b], Stroke::new(width, color));
    }
}

fn paint_dismiss(painter: &Painter, center: Pos2) {
    painter.circle_filled(center, DISMISS_RADIUS, Color32::from_gray(240));
    painter.circle_stroke(center, DISMISS_RADIUS, Stroke::new(1.0, Color32::GRAY));
    painter.text(
        center,
        Align2::CENTER_CENTER,
        "×",
        FontId::proportional(10.0),
        Color32::DARK_GRAY,
    );
}

pub fn paint_molecule(painter: &Painter, editor: &MoleculeEditor, view: View) {
    let molecule = editor.molecule();
    let radius = editor.interaction.atom_radius;
    let hovered = editor.hovered();
    let pending = editor.pending();

    for (id, a, b, bond) in molecule.bonds() {
        let (Some(a), Some(b)) = (molecule.atom(a), molecule.atom(b)) else {
            continue;
        };
        paint_bond(
            painter,
            view.to_screen(a.pos),
            view.to_screen(b.pos),
            bond.order.index(),
            hovered == Some(Element::Bond(id)),
        );
    }

    if let Some(p) = pending
        && let Some(anchor) = molecule.atom(p.anchor)
    {
        let from = view.to_screen(anchor.pos);
        let to = view.to_screen(p.pos);
        let faded = BOND_COLOR.gamma_multiply(PENDING_ALPHA);
        painter.extend(Shape::dashed_line(&[from, to], Stroke::new(2.0, faded), 5.0, 4.0));
        painter.circle_filled(
            to,
            radius,
            atom_color(p.element.index()).gamma_multiply(PENDING_ALPHA),
        );
    }

    for (id, atom) in molecule.atoms() {
        let center = view.to_screen(atom.pos);
        painter.circle_filled(center, radius, atom_color(atom.element.index()));
        let outlined = hovered == Some(Element::Atom(id))
            || pending.is_some_and(|p| p.anchor == id);
        if outlined {
            painter.circle_stroke(center, radius, Stroke::new(OUTLINE_WIDTH, HOVER_COLOR));
        }
    }

    if pending.is_none()
        && let Some(element) = hovered
        && let Some(anchor) = editor.dismiss_anchor(element)
    {
        paint_dismiss(painter, view.to_screen(anchor));
    }
}

/// Swatch row for the side panel legend.
pub fn legend_entry(ui: &mut egui::Ui, color: Color32, label: &str) {
    ui.horizontal(|ui| {
        let (rect, _) = ui.allocate_exact_size(Vec2::splat(12.0), egui::Sense::hover());
        ui.painter().circle_filled(rect.center(), 5.0, color);
        ui.label(label);
    });
}

/// Small sample of each bond style, drawn the same way as on the canvas.
pub fn bond_legend_entry(ui: &mut egui::Ui, order: usize, label: &str) {
    ui.horizontal(|ui| {
        let (rect, _) =
            ui.allocate_exact_size(egui::vec2(28.0, 12.0), egui::Sense::hover());
        let y = rect.center().y;
        paint_bond(
            ui.painter(),
            pos2(rect.left() + 2.0, y),
            pos2(rect.right() - 2.0, y),
            order,
            false,
        );
        ui.label(label);
    });
}
