use eframe::egui::{self, Color32, RichText, Ui};

use crate::classify::ModelKind;
use crate::state::AppState;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp", "bmp"];

// ---------------------------------------------------------------------------
// Left side panel – inputs
// ---------------------------------------------------------------------------

/// Render the input controls: upload, URL, model and top-K.
pub fn side_panel(ui: &mut Ui, state: &mut AppState) {
    ui.heading("Image");
    ui.separator();

    ui.horizontal(|ui: &mut Ui| {
        if ui.button("Open image…").clicked() {
            open_file_dialog(state);
        }
        let has_upload = state.upload.is_some();
        if ui
            .add_enabled(has_upload, egui::Button::new("Clear"))
            .clicked()
        {
            state.clear_upload();
        }
    });
    match &state.upload {
        Some(upload) => ui.label(RichText::new(&upload.name).italics()),
        None => ui.weak("…or drop an image file onto the window"),
    };

    ui.add_space(8.0);
    ui.label("Remote image URL");
    ui.add(
        egui::TextEdit::singleline(&mut state.url)
            .hint_text("Enter a URL to a remote image")
            .desired_width(f32::INFINITY),
    );
    if ui.button("Submit").clicked() {
        state.submit();
    }

    ui.add_space(12.0);
    ui.heading("Model");
    ui.separator();

    let current = state.model;
    egui::ComboBox::from_id_salt("model")
        .selected_text(current.label())
        .show_ui(ui, |ui: &mut Ui| {
            for kind in ModelKind::ALL {
                if ui.selectable_label(current == kind, kind.label()).clicked() {
                    state.set_model(kind);
                }
            }
        });

    ui.add_space(12.0);
    ui.strong("Top K");
    let range = state.top_k.min..=state.top_k.max;
    if ui
        .add(egui::Slider::new(&mut state.k, range).step_by(1.0))
        .changed()
    {
        state.mark_dirty();
    }
}

// ---------------------------------------------------------------------------
// Top bar
// ---------------------------------------------------------------------------

/// Render the title / status strip.
pub fn top_bar(ui: &mut Ui, state: &AppState) {
    ui.horizontal(|ui: &mut Ui| {
        ui.strong("CVDash");
        ui.separator();

        if let Some(chart) = &state.display.chart {
            ui.label(format!("{} · top {}", chart.model.label(), chart.len()));
        }

        if let Some(msg) = &state.status_message {
            ui.separator();
            ui.label(RichText::new(msg).color(Color32::RED));
        }
    });
}

// ---------------------------------------------------------------------------
// Displayed image
// ---------------------------------------------------------------------------

pub fn image_panel(ui: &mut Ui, state: &AppState) {
    let shown = &state.display.image;
    ui.vertical_centered(|ui: &mut Ui| {
        ui.add(
            egui::Image::from_bytes(shown.uri.clone(), shown.bytes.clone())
                .max_width(ui.available_width())
                .max_height(ui.available_height())
                .maintain_aspect_ratio(true),
        );
        ui.weak(format!("{}×{}", shown.width(), shown.height()));
    });
}

// ---------------------------------------------------------------------------
// Uploads
// ---------------------------------------------------------------------------

pub fn open_file_dialog(state: &mut AppState) {
    let file = rfd::FileDialog::new()
        .set_title("Open image")
        .add_filter("Images", IMAGE_EXTENSIONS)
        .pick_file();

    if let Some(path) = file {
        match std::fs::read(&path) {
            Ok(bytes) => state.set_upload(path.display().to_string(), bytes),
            Err(e) => {
                log::error!("Failed to read {}: {e}", path.display());
                state.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}

/// Accept the first file dropped onto the window as an upload.
pub fn handle_dropped_files(ctx: &egui::Context, state: &mut AppState) {
    let dropped = ctx.input(|i| i.raw.dropped_files.clone());
    let Some(file) = dropped.into_iter().next() else {
        return;
    };

    if let Some(bytes) = file.bytes {
        state.set_upload(file.name, bytes);
        return;
    }
    if let Some(path) = file.path {
        match std::fs::read(&path) {
            Ok(bytes) => state.set_upload(path.display().to_string(), bytes),
            Err(e) => {
                log::error!("Failed to read dropped file {}: {e}", path.display());
                state.status_message = Some(format!("Error: {e}"));
            }
        }
    }
}
