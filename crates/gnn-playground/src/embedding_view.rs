use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Stroke, pos2};
use graph_nets::Prediction;

use crate::dataset::Dataset;

const POINT_RADIUS: f32 = 4.0;
const PADDING: f32 = 12.0;
const NEGATIVE: Color32 = Color32::from_rgb(0x8a, 0xb0, 0xb5);
const POSITIVE: Color32 = Color32::from_rgb(0xf1, 0x55, 0x55);
const UNKNOWN: Color32 = Color32::from_gray(0x77);

/// Linear blend between the "not" and "is" colors of the predicted label.
pub fn score_color(t: f32) -> Color32 {
    let t = t.clamp(0.0, 1.0);
    let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
    Color32::from_rgb(
        mix(NEGATIVE.r(), POSITIVE.r()),
        mix(NEGATIVE.g(), POSITIVE.g()),
        mix(NEGATIVE.b(), POSITIVE.b()),
    )
}

pub fn label_color(label: Option<f32>) -> Color32 {
    label.map_or(UNKNOWN, score_color)
}

/// Bounding box of the embeddings, used to fit them into the plot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    min: [f32; 2],
    max: [f32; 2],
}

impl Extent {
    pub fn of<'a>(points: impl IntoIterator<Item = &'a [f32; 2]>) -> Option<Self> {
        let mut extent: Option<Extent> = None;
        for p in points {
            let e = extent.get_or_insert(Extent { min: *p, max: *p });
            for axis in 0..2 {
                e.min[axis] = e.min[axis].min(p[axis]);
                e.max[axis] = e.max[axis].max(p[axis]);
            }
        }
        extent
    }

    pub fn include(mut self, p: [f32; 2]) -> Self {
        for axis in 0..2 {
            self.min[axis] = self.min[axis].min(p[axis]);
            self.max[axis] = self.max[axis].max(p[axis]);
        }
        self
    }

    /// Map into `rect`, y pointing up. Degenerate axes land in the middle.
    pub fn to_screen(&self, p: [f32; 2], rect: Rect) -> Pos2 {
        let inner = rect.shrink(PADDING);
        let scale = |v: f32, axis: usize| {
            let span = self.max[axis] - self.min[axis];
            if span > f32::EPSILON {
                (v - self.min[axis]) / span
            } else {
                0.5
            }
        };
        pos2(
            inner.left() + scale(p[0], 0) * inner.width(),
            inner.bottom() - scale(p[1], 1) * inner.height(),
        )
    }
}

/// Where example `i` is plotted. The selected example follows the live
/// prediction while it is edited, and its cached one until then.
fn plotted(
    i: usize,
    predictions: &[Option<Prediction>],
    selected: Option<usize>,
    live: Option<Prediction>,
) -> Option<Prediction> {
    let cached = predictions.get(i).copied().flatten();
    if selected == Some(i) {
        live.or(cached)
    } else {
        cached
    }
}

/// Scatter of every example's embedding. Returns the index of a clicked
/// point.
pub fn show(
    ui: &mut egui::Ui,
    dataset: &Dataset,
    predictions: &[Option<Prediction>],
    selected: Option<usize>,
    live: Option<Prediction>,
) -> Option<usize> {
    let side = ui.available_width().min(ui.available_height()).max(120.0);
    let (rect, response) =
        ui.allocate_exact_size(egui::vec2(side, side), Sense::click());
    let painter = ui.painter_at(rect);
    painter.rect_filled(rect, 4.0, Color32::from_gray(250));

    let points: Vec<(usize, Prediction)> = (0..dataset.len())
        .filter_map(|i| plotted(i, predictions, selected, live).map(|p| (i, p)))
        .collect();
    let Some(mut extent) = Extent::of(points.iter().map(|(_, p)| &p.embedding)) else {
        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            "no embeddings",
            FontId::proportional(11.0),
            UNKNOWN,
        );
        return None;
    };
    if selected.is_some()
        && let Some(p) = live
    {
        extent = extent.include(p.embedding);
    }

    let hover = response.hover_pos();
    let mut nearest: Option<(usize, f32)> = None;
    for &(i, p) in &points {
        let pos = extent.to_screen(p.embedding, rect);
        if let Some(h) = hover {
            let d = pos.distance(h);
            if d <= POINT_RADIUS * 2.0 && nearest.is_none_or(|(_, best)| d < best) {
                nearest = Some((i, d));
            }
        }
        if selected == Some(i) {
            continue;
        }
        painter.circle(
            pos,
            POINT_RADIUS,
            score_color(p.score),
            Stroke::new(1.5, label_color(dataset.label(i))),
        );
    }

    // Selected point last, on top and twice as large.
    if let Some(&(i, p)) = points.iter().find(|(i, _)| selected == Some(*i)) {
        let pos = extent.to_screen(p.embedding, rect);
        painter.circle(
            pos,
            POINT_RADIUS * 2.0,
            score_color(p.score),
            Stroke::new(2.0, label_color(dataset.label(i))),
        );
    }

    if let Some((i, _)) = nearest {
        if let Some(h) = hover {
            painter.text(
                h + egui::vec2(8.0, -8.0),
                Align2::LEFT_BOTTOM,
                dataset.display_name(i),
                FontId::proportional(11.0),
                Color32::DARK_GRAY,
            );
        }
        if response.clicked() {
            return Some(i);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extent_maps_corners_inside_padding() {
        let extent = Extent::of(&[[0.0, 0.0], [2.0, 4.0]]).unwrap();
        let rect = Rect::from_min_size(Pos2::ZERO, egui::vec2(124.0, 124.0));

        assert_eq!(extent.to_screen([0.0, 0.0], rect), pos2(12.0, 112.0));
        assert_eq!(extent.to_screen([2.0, 4.0], rect), pos2(112.0, 12.0));
    }

    #[test]
    fn test_single_point_is_centered() {
        let extent = Extent::of(&[[3.0, 3.0]]).unwrap();
        let rect = Rect::from_min_size(Pos2::ZERO, egui::vec2(100.0, 100.0));

        assert_eq!(extent.to_screen([3.0, 3.0], rect), rect.center());
    }

    fn at(x: f32) -> Prediction {
        Prediction {
            score: 0.5,
            embedding: [x, 0.0],
        }
    }

    #[test]
    fn test_selected_point_falls_back_to_cached_prediction() {
        let cached = [Some(at(1.0)), Some(at(2.0))];

        assert_eq!(plotted(1, &cached, Some(1), Some(at(9.0))), Some(at(9.0)));
        assert_eq!(plotted(1, &cached, Some(1), None), Some(at(2.0)));
        assert_eq!(plotted(0, &cached, Some(1), Some(at(9.0))), Some(at(1.0)));
        assert_eq!(plotted(0, &cached, None, Some(at(9.0))), Some(at(1.0)));
    }

    #[test]
    fn test_score_color_endpoints() {
        assert_eq!(score_color(0.0), NEGATIVE);
        assert_eq!(score_color(1.0), POSITIVE);
        assert_eq!(label_color(None), UNKNOWN);
        assert!(Extent::of(&[] as &[[f32; 2]]).is_none());
    }
}
