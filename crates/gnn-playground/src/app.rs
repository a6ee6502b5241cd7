use eframe::egui::{self, Color32, RichText, Sense};
use graph_nets::network::{
    DEPTH_OPTIONS, EDGE_DIM_OPTIONS, GLOBAL_DIM_OPTIONS, NODE_DIM_OPTIONS,
};
use graph_nets::Aggregation;

use crate::actions::Action;
use crate::editor::{EditMode, Element};
use crate::embedding_view::{self, label_color, score_color};
use crate::graph_view::{self, View, atom_color};
use crate::settings::{
    ATOM_RADIUS_RANGE, CHARGE_RANGE, CLICK_THRESHOLD_RANGE, DAMPING_RANGE,
    MAX_FORCE_RANGE, SPRING_RANGE, SliderRange,
};
use crate::state::State;

pub struct PlaygroundApp {
    state: State,
    /// Dataset JSON read by the browser file dialog, picked up next frame.
    #[cfg(target_arch = "wasm32")]
    pub(crate) dataset_inbox: std::rc::Rc<std::cell::RefCell<Option<String>>>,
}

impl PlaygroundApp {
    pub fn new(state: State) -> Self {
        Self {
            state,
            #[cfg(target_arch = "wasm32")]
            dataset_inbox: Default::default(),
        }
    }

    fn dispatch(&mut self, action: Action) {
        self.state.dispatch(action);
    }

    fn menu_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    #[cfg(not(target_arch = "wasm32"))]
                    {
                        if ui.button("Save molecule").clicked() {
                            ui.close();
                            if let Some(path) = rfd::FileDialog::new()
                                .add_filter("JSON", &["json"])
                                .save_file()
                            {
                                self.dispatch(Action::SaveToFile { path });
                            }
                        }

                        if ui.button("Open molecule").clicked() {
                            ui.close();
                            if let Some(path) = rfd::FileDialog::new()
                                .add_filter("JSON", &["json"])
                                .pick_file()
                            {
                                self.dispatch(Action::LoadFromFile { path });
                            }
                        }

                        if ui.button("Load dataset").clicked() {
                            ui.close();
                            if let Some(path) = rfd::FileDialog::new()
                                .add_filter("JSON", &["json"])
                                .pick_file()
                            {
                                self.dispatch(Action::LoadDataset { path });
                            }
                        }
                    }

                    #[cfg(target_arch = "wasm32")]
                    if ui.button("Load dataset").clicked() {
                        ui.close();
                        crate::web::open_dataset_dialog(
                            ui.ctx().clone(),
                            self.dataset_inbox.clone(),
                        );
                    }
                });
            });
        });
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        let auc = self.state.cache.dataset_scores.get(&self.state.store).auc;
        let store = &self.state.store;
        let mut actions = Vec::new();

        ui.heading("Molecule");
        ui.horizontal(|ui| {
            let mut mode = store.editor.mode();
            ui.selectable_value(&mut mode, EditMode::Add, "Add");
            ui.selectable_value(&mut mode, EditMode::Remove, "Remove");
            if mode != store.editor.mode() {
                actions.push(Action::SetMode { mode });
            }
            if ui
                .add_enabled(store.editor.is_edited(), egui::Button::new("Reset"))
                .clicked()
            {
                actions.push(Action::ResetMolecule);
            }
        });

        let dataset = store.dataset.get();
        let current = match store.selected {
            Some(i) => dataset.display_name(i),
            None => "From file".to_string(),
        };
        egui::ComboBox::from_label("Example")
            .selected_text(current)
            .show_ui(ui, |ui| {
                for i in 0..dataset.len() {
                    if ui
                        .selectable_label(store.selected == Some(i), dataset.display_name(i))
                        .clicked()
                    {
                        actions.push(Action::LoadExample { index: i });
                    }
                }
            });

        ui.separator();
        let label = &store.settings.prediction_label;
        match store.live_prediction() {
            Some(p) => {
                ui.label(
                    RichText::new(format!("{:.0}% {}", p.score * 100.0, label))
                        .size(18.0)
                        .color(score_color(p.score)),
                );
            }
            None => {
                ui.label("Predicting…");
            }
        }
        let truth = store.ground_truth();
        let truth_text = match truth {
            Some(t) if t >= 0.5 => label.clone(),
            Some(_) => format!("not {}", label),
            None => "unknown".to_string(),
        };
        ui.horizontal(|ui| {
            ui.label("Ground truth:");
            ui.label(RichText::new(truth_text).color(label_color(truth)));
        });
        if let Some(w) = &store.warning {
            ui.colored_label(Color32::from_rgb(200, 120, 0), &w.message);
        }

        ui.separator();
        ui.heading("Legend");
        let vocab = store.editor.vocabulary();
        for (i, name) in vocab.atoms.iter().enumerate() {
            graph_view::legend_entry(ui, atom_color(i), name);
        }
        for (i, name) in vocab.bonds.iter().enumerate() {
            graph_view::bond_legend_entry(ui, i, name);
        }

        ui.separator();
        egui::CollapsingHeader::new("Model")
            .default_open(true)
            .show(ui, |ui| {
                ui.label(match auc {
                    Some(auc) => format!("Dataset AUC: {:.2}", auc),
                    None => "Dataset AUC: needs both labels".to_string(),
                });
                let mut config = store.settings.network.clone();
                choose(ui, "Depth", &mut config.depth, &DEPTH_OPTIONS);
                egui::ComboBox::from_label("Aggregation")
                    .selected_text(config.aggregation.label())
                    .show_ui(ui, |ui| {
                        for a in Aggregation::ALL {
                            ui.selectable_value(&mut config.aggregation, a, a.label());
                        }
                    });
                ui.horizontal(|ui| {
                    ui.checkbox(&mut config.learn_nodes, "");
                    choose(ui, "Node embedding", &mut config.node_dim, &NODE_DIM_OPTIONS);
                });
                ui.horizontal(|ui| {
                    ui.checkbox(&mut config.learn_edges, "");
                    choose(ui, "Edge embedding", &mut config.edge_dim, &EDGE_DIM_OPTIONS);
                });
                ui.horizontal(|ui| {
                    ui.checkbox(&mut config.learn_globals, "");
                    choose(
                        ui,
                        "Global embedding",
                        &mut config.global_dim,
                        &GLOBAL_DIM_OPTIONS,
                    );
                });
                if config != store.settings.network {
                    actions.push(Action::SetNetworkConfig { config });
                }
            });

        egui::CollapsingHeader::new("Layout").show(ui, |ui| {
            let mut forces = store.settings.forces.clone();
            slider(ui, "Charge", &mut forces.charge, CHARGE_RANGE);
            slider(ui, "Spring", &mut forces.spring, SPRING_RANGE);
            slider(ui, "Max force", &mut forces.max_force, MAX_FORCE_RANGE);
            slider(ui, "Damping", &mut forces.damping, DAMPING_RANGE);
            if forces != store.settings.forces {
                actions.push(Action::SetForceSettings { settings: forces });
            }
        });

        egui::CollapsingHeader::new("Interaction").show(ui, |ui| {
            let mut interaction = store.settings.interaction.clone();
            slider(
                ui,
                "Click threshold",
                &mut interaction.click_threshold,
                CLICK_THRESHOLD_RANGE,
            );
            slider(ui, "Atom radius", &mut interaction.atom_radius, ATOM_RADIUS_RANGE);
            if interaction != store.settings.interaction {
                actions.push(Action::SetInteractionSettings {
                    settings: interaction,
                });
            }
        });

        for action in actions {
            self.dispatch(action);
        }
    }

    fn scatter(&mut self, ui: &mut egui::Ui) {
        ui.heading("Embeddings");
        let store = &self.state.store;
        let scores = self.state.cache.dataset_scores.get(store);
        let clicked = embedding_view::show(
            ui,
            store.dataset.get(),
            &scores.predictions,
            store.selected,
            store.live_prediction(),
        );
        ui.label("Fill: prediction. Outline: ground truth.");
        if let Some(index) = clicked {
            self.dispatch(Action::LoadExample { index });
        }
    }

    fn canvas(&mut self, ui: &mut egui::Ui) {
        let (rect, _response) =
            ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());
        let view = View::new(rect.center());
        let editor = &self.state.store.editor;
        let pointer = ui.input(|i| i.pointer.clone());
        let mut actions = Vec::new();

        let hover_world = pointer
            .hover_pos()
            .filter(|p| rect.contains(*p))
            .map(|p| view.to_world(p));
        if editor.pending().is_none() {
            let element = hover_world
                .and_then(|w| editor.dismiss_at(w).or_else(|| editor.element_at(w)));
            if element != editor.hovered() {
                actions.push(Action::Hover { element });
            }
        }

        if pointer.primary_pressed()
            && let Some(press) = pointer.interact_pos()
            && rect.contains(press)
        {
            let world = view.to_world(press);
            if let Some(element) = editor.dismiss_at(world) {
                actions.push(match element {
                    Element::Atom(atom) => Action::RemoveAtom { atom },
                    Element::Bond(bond) => Action::RemoveBond { bond },
                });
            } else {
                match (editor.element_at(world), editor.mode()) {
                    (Some(Element::Atom(atom)), EditMode::Add) => {
                        actions.push(Action::BeginDrag { atom, pos: world })
                    }
                    (Some(Element::Atom(atom)), EditMode::Remove) => {
                        actions.push(Action::RemoveAtom { atom })
                    }
                    (Some(Element::Bond(bond)), _) => {
                        actions.push(Action::ClickBond { bond })
                    }
                    (None, _) => {}
                }
            }
        }

        if editor.pending().is_some() {
            if pointer.primary_down()
                && let Some(p) = pointer.hover_pos()
            {
                actions.push(Action::DragTo {
                    pos: view.to_world(p),
                });
            }
            if pointer.primary_released() {
                match pointer.hover_pos().or(pointer.interact_pos()) {
                    Some(p) => {
                        let world = view.to_world(p);
                        actions.push(Action::EndDrag {
                            pos: world,
                            over: editor.atom_at(world),
                        });
                    }
                    None => actions.push(Action::CancelDrag),
                }
            }
        }

        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::WHITE);
        graph_view::paint_molecule(&painter, editor, view);

        for action in actions {
            self.dispatch(action);
        }
    }
}

fn choose(ui: &mut egui::Ui, label: &str, value: &mut usize, options: &[usize]) {
    egui::ComboBox::from_label(label)
        .selected_text(value.to_string())
        .show_ui(ui, |ui| {
            for &option in options {
                ui.selectable_value(value, option, option.to_string());
            }
        });
}

fn slider(ui: &mut egui::Ui, label: &str, value: &mut f32, range: SliderRange) {
    ui.add(
        egui::Slider::new(value, range.min..=range.max)
            .step_by(range.step as f64)
            .text(label),
    );
}

impl eframe::App for PlaygroundApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        #[cfg(target_arch = "wasm32")]
        if let Some(json) = self.dataset_inbox.borrow_mut().take() {
            self.dispatch(Action::LoadDatasetJson { json });
        }

        let time = ctx.input(|i| i.time);
        self.dispatch(Action::AdvanceFrame { time });

        self.menu_bar(ctx);

        egui::SidePanel::left("controls")
            .resizable(true)
            .default_width(260.0)
            .show(ctx, |ui| {
                egui::ScrollArea::vertical().show(ui, |ui| self.controls(ui));
            });

        egui::SidePanel::right("embeddings")
            .resizable(true)
            .default_width(300.0)
            .show(ctx, |ui| self.scatter(ui));

        egui::CentralPanel::default().show(ctx, |ui| self.canvas(ui));

        // Display error dialog if there's an error message
        if let Some(error) = self.state.store.error_message.clone() {
            egui::Window::new("Error")
                .collapsible(false)
                .resizable(false)
                .show(ctx, |ui| {
                    ui.label(&error);
                    if ui.button("OK").clicked() {
                        self.dispatch(Action::ClearErrorMessage);
                    }
                });
        }

        self.state.flush_actions();
        self.state.flush_effects();

        let store = &self.state.store;
        if store.editor.layout.is_running()
            || store.tracker.is_pending()
            || store.warning.is_some()
        {
            ctx.request_repaint();
        }
    }
}
