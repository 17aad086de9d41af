use eframe::egui;
use std::path::Path;

use crate::config::AppSettings;
use crate::modules::image_converter::ImageConverter;
use crate::style::{self, ColorPalette, ThemeMode};

pub struct ConverterApp {
    converter: ImageConverter,
    settings: AppSettings,
    theme_mode: ThemeMode,
}

impl ConverterApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        let theme_mode = ThemeMode::from_dark_mode(settings.dark_mode);
        style::apply_theme(&cc.egui_ctx, theme_mode);

        Self {
            converter: ImageConverter::new(&settings),
            settings,
            theme_mode,
        }
    }

    fn toggle_theme(&mut self, ctx: &egui::Context) {
        self.theme_mode = flip_theme(self.theme_mode, &mut self.settings, &AppSettings::get_config_path());
        style::apply_theme(ctx, self.theme_mode);
    }

    fn top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.add_space(4.0);
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new("Image Converter").strong());
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let label = if self.theme_mode.is_dark() { "Toggle Light Mode" } else { "Toggle Dark Mode" };
                    let button = egui::Button::new(egui::RichText::new(label).color(egui::Color32::BLACK))
                        .fill(ColorPalette::AMBER_500)
                        .corner_radius(6.0);
                    if ui.add(button).clicked() {
                        self.toggle_theme(ctx);
                    }
                });
            });
            ui.add_space(4.0);
        });
    }
}

/// Switches to the other theme and persists the choice to `path`.
fn flip_theme(current: ThemeMode, settings: &mut AppSettings, path: &Path) -> ThemeMode {
    let next = ThemeMode::from_dark_mode(!current.is_dark());
    settings.dark_mode = next.is_dark();
    settings.save_or_warn(path);
    next
}

impl eframe::App for ConverterApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.top_bar(ctx);

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.set_max_width(720.0);
                self.converter.ui(ui, ctx);
            });
        });

        if self.converter.format() != self.settings.format {
            self.settings.format = self.converter.format();
            self.settings.save();
        }
    }
}
