mod app;
mod classify;
mod color;
mod config;
mod data;
mod state;
mod ui;
mod update;

use anyhow::{anyhow, Context, Result};
use app::CvDashApp;
use classify::engine::BurnClassifier;
use config::DashConfig;
use data::bitmap::{LoadedImage, DEFAULT_IMAGE};
use data::remote::HttpFetcher;
use eframe::egui;
use state::AppState;

fn main() -> Result<()> {
    env_logger::init();

    let config = DashConfig::load().context("loading configuration")?;
    let default_image = load_default_image(&config)?;
    let classifier = BurnClassifier::load(&config.models_dir)?;
    log::info!(
        "Models available: {:?}",
        classifier.available().map(|m| m.id()).collect::<Vec<_>>()
    );
    let fetcher = HttpFetcher::new(&config.fetch);
    let state = AppState::new(&config, default_image)?;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 760.0])
            .with_min_inner_size([720.0, 420.0])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "CVDash – Image Classification",
        options,
        Box::new(move |cc| {
            // Install image loaders so egui can render png/jpg/etc.
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(CvDashApp::new(
                state,
                Box::new(classifier),
                Box::new(fetcher),
            )))
        }),
    )
    .map_err(|e| anyhow!("running the dashboard: {e}"))
}

fn load_default_image(config: &DashConfig) -> Result<LoadedImage> {
    match &config.default_image {
        Some(path) => {
            let bytes = std::fs::read(path)
                .with_context(|| format!("reading default image {}", path.display()))?;
            LoadedImage::decode("default", bytes)
                .with_context(|| format!("decoding default image {}", path.display()))
        }
        None => LoadedImage::decode("default", DEFAULT_IMAGE).context("decoding bundled image"),
    }
}
