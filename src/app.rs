use eframe::egui;

use crate::classify::Classify;
use crate::data::remote::FetchImage;
use crate::state::AppState;
use crate::ui::{panels, plot};

// ---------------------------------------------------------------------------
// eframe App implementation
// ---------------------------------------------------------------------------

pub struct CvDashApp {
    pub state: AppState,
    classifier: Box<dyn Classify>,
    fetcher: Box<dyn FetchImage>,
}

impl CvDashApp {
    pub fn new(state: AppState, classifier: Box<dyn Classify>, fetcher: Box<dyn FetchImage>) -> Self {
        Self {
            state,
            classifier,
            fetcher,
        }
    }
}

impl eframe::App for CvDashApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        panels::handle_dropped_files(ctx, &mut self.state);

        // ---- Top panel: title and status ----
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            panels::top_bar(ui, &self.state);
        });

        // ---- Left side panel: inputs ----
        egui::SidePanel::left("input_panel")
            .default_width(260.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::side_panel(ui, &mut self.state);
            });

        // Inputs are read above; recompute before drawing the outputs so the
        // same frame shows the result.
        let shown = self.state.display.image.uri.clone();
        self.state
            .refresh_if_dirty(self.classifier.as_ref(), self.fetcher.as_ref());
        if self.state.display.image.uri != shown {
            ctx.forget_image(&shown);
        }

        // ---- Right side panel: displayed image ----
        egui::SidePanel::right("image_panel")
            .default_width(420.0)
            .resizable(true)
            .show(ctx, |ui| {
                panels::image_panel(ui, &self.state);
            });

        // ---- Central panel: bar chart ----
        egui::CentralPanel::default().show(ctx, |ui| {
            plot::prediction_plot(ui, &self.state);
        });
    }
}
