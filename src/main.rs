use eframe::egui;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use image_converter::app::ConverterApp;
use image_converter::config::AppSettings;

fn main() -> eframe::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let settings = AppSettings::load();
    tracing::info!(?settings, "starting image converter");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([900.0, 760.0])
            .with_min_inner_size([520.0, 480.0])
            .with_drag_and_drop(true)
            .with_title("Image Converter"),
        ..Default::default()
    };

    eframe::run_native(
        "Image Converter",
        options,
        Box::new(|cc| Ok(Box::new(ConverterApp::new(cc, settings)))),
    )
}
