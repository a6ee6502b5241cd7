#![cfg(target_arch = "wasm32")]

use std::cell::RefCell;
use std::rc::Rc;

use crate::create_app;
use eframe::{WebRunner, egui};
use wasm_bindgen::JsCast;
use wasm_bindgen::JsValue;
use wasm_bindgen::prelude::*;

/// Launch the egui app inside the canvas referenced by `index.html`.
#[wasm_bindgen]
pub async fn start() -> Result<(), JsValue> {
    use web_sys::HtmlCanvasElement;

    console_error_panic_hook::set_once();
    if let Err(e) = console_log::init_with_level(log::Level::Debug) {
        web_sys::console::warn_1(&JsValue::from_str(&e.to_string()));
    }

    let document = web_sys::window()
        .ok_or("No window")?
        .document()
        .ok_or("No document")?;

    let canvas = document
        .get_element_by_id("the_canvas_id")
        .ok_or("Canvas not found")?
        .dyn_into::<HtmlCanvasElement>()?;

    let web_options = eframe::WebOptions::default();

    WebRunner::new()
        .start(canvas, web_options, Box::new(|cc| Ok(Box::new(create_app(cc)))))
        .await
}

/// Ask the browser for a dataset file. Its text lands in `inbox` and is
/// dispatched on the next frame.
pub fn open_dataset_dialog(ctx: egui::Context, inbox: Rc<RefCell<Option<String>>>) {
    use rfd::AsyncFileDialog;
    use wasm_bindgen_futures::spawn_local;

    let task = AsyncFileDialog::new()
        .add_filter("JSON", &["json"])
        .pick_file();

    spawn_local(async move {
        if let Some(file) = task.await {
            let bytes = file.read().await;
            match String::from_utf8(bytes) {
                Ok(json) => *inbox.borrow_mut() = Some(json),
                Err(e) => log::error!("{} is not UTF-8: {}", file.file_name(), e),
            }
            ctx.request_repaint();
        }
    });
}
