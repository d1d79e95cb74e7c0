use eframe::egui::Ui;
use egui_plot::{Bar, BarChart, Plot};

use crate::color::bar_colors;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Top-K bar chart
// ---------------------------------------------------------------------------

/// Render the class-probability bar chart.
pub fn prediction_plot(ui: &mut Ui, state: &AppState) {
    let chart = match &state.display.chart {
        Some(chart) if !chart.is_empty() => chart,
        _ => {
            ui.centered_and_justified(|ui: &mut Ui| {
                ui.heading("No prediction yet");
            });
            return;
        }
    };

    let colors = bar_colors(chart.len());
    let bars: Vec<Bar> = chart
        .bars
        .iter()
        .zip(colors)
        .enumerate()
        .map(|(i, (bar, color))| {
            Bar::new(i as f64, bar.probability as f64)
                .name(&bar.label)
                .fill(color)
                .width(0.7)
        })
        .collect();

    // Axis ticks fall on bar positions; show the class label there.
    let labels: Vec<String> = chart.bars.iter().map(|b| b.label.clone()).collect();

    Plot::new("prediction_plot")
        .x_axis_label("Class")
        .y_axis_label("Probability")
        .include_y(0.0)
        .include_y(1.0)
        .x_axis_formatter(move |mark, _range| {
            let pos = mark.value;
            if pos < 0.0 || pos.fract() != 0.0 {
                return String::new();
            }
            labels.get(pos as usize).cloned().unwrap_or_default()
        })
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).name(chart.model.label()));
        });
}
