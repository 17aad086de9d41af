use eframe::egui;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::AppSettings;
use crate::converter::{
    ConversionOutcome, ConversionState, ConversionWorker, Converter, ConverterState, DefaultBackend,
    IncomingFile, IntakeItem, ItemId, ObjectStore, OutputFormat,
};
use crate::style::{self, ColorPalette, PanelColors, ThemeMode};

const PICKER_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp", "tiff", "tif", "ico"];
const PREVIEW_SIZE: f32 = 80.0;

/// Preview textures keyed by intake item. `None` marks a preview that failed
/// to decode so it is not retried every frame.
type PreviewCache = HashMap<ItemId, Option<egui::TextureHandle>>;

pub struct ImageConverter {
    state: ConverterState,
    converter: Converter,
    worker: ConversionWorker,
    previews: PreviewCache,
    drag_hover: bool,
    status: Option<String>,
}

impl ImageConverter {
    pub fn new(settings: &AppSettings) -> Self {
        let mut state = ConverterState::new(ObjectStore::new(), settings.accept_filter());
        state.set_select_new_files(settings.select_new_files);
        state.set_format(settings.format);

        Self {
            state,
            converter: Converter::new(Arc::new(DefaultBackend::default()), settings.convert_options()),
            worker: ConversionWorker::new(),
            previews: HashMap::new(),
            drag_hover: false,
            status: None,
        }
    }

    pub fn format(&self) -> OutputFormat {
        self.state.format()
    }

    pub fn add_files(&mut self, files: Vec<IncomingFile>) {
        if files.is_empty() {
            return;
        }
        self.previews.clear();
        self.state.intake(files);
        self.status = None;
    }

    fn pick_files(&mut self) {
        if let Some(paths) = rfd::FileDialog::new()
            .add_filter("Images", PICKER_EXTENSIONS)
            .pick_files()
        {
            self.add_files(paths.into_iter().map(IncomingFile::from_path).collect());
        }
    }

    fn collect_dropped_files(&mut self, ctx: &egui::Context) {
        let (hovering, dropped) = ctx.input(|i| (!i.raw.hovered_files.is_empty(), i.raw.dropped_files.clone()));
        self.drag_hover = hovering;

        if dropped.is_empty() {
            return;
        }

        let files = dropped
            .into_iter()
            .map(|f| {
                let name = if f.name.is_empty() {
                    f.path
                        .as_ref()
                        .and_then(|p| p.file_name())
                        .and_then(|n| n.to_str())
                        .unwrap_or("Unknown")
                        .to_string()
                } else {
                    f.name
                };
                IncomingFile {
                    name,
                    path: f.path,
                    bytes: f.bytes,
                    media_type: Some(f.mime).filter(|m| !m.is_empty()),
                }
            })
            .collect();
        self.add_files(files);
    }

    fn start_conversion(&mut self) {
        if !self.state.can_convert() || self.worker.is_running() {
            return;
        }
        let jobs = self.state.jobs();
        self.worker.start(
            self.converter.clone(),
            jobs,
            self.state.format(),
            self.state.store().clone(),
        );
    }

    fn poll_worker(&mut self) {
        if let Some(batch) = self.worker.take_finished() {
            self.state.apply_batch(batch);
        }
    }

    fn download(&mut self, index: usize) {
        let Some(ConversionOutcome::Converted(item)) = self.state.outcomes().get(index) else {
            return;
        };
        let suggested = item.download_name();
        let path: Option<PathBuf> = rfd::FileDialog::new()
            .set_file_name(&suggested)
            .add_filter(item.format.as_str(), &[item.format.extension()])
            .save_file();

        let Some(path) = path else { return };
        self.status = Some(match item.save_to(&path) {
            Ok(()) => format!("Saved {}", path.display()),
            Err(e) => {
                tracing::warn!(error = %e, "download failed");
                format!("Failed to save {}: {}", suggested, e)
            }
        });
    }

    fn preview_texture(previews: &mut PreviewCache, ctx: &egui::Context, item: &IntakeItem) -> Option<egui::TextureId> {
        previews
            .entry(item.id)
            .or_insert_with(|| {
                let bytes = item.preview()?.bytes()?;
                let img = match image::load_from_memory(&bytes) {
                    Ok(img) => img,
                    Err(e) => {
                        tracing::debug!(name = %item.name, error = %e, "no preview");
                        return None;
                    }
                };
                let rgba = img.thumbnail(PREVIEW_SIZE as u32 * 2, PREVIEW_SIZE as u32 * 2).to_rgba8();
                let (w, h) = (rgba.width() as usize, rgba.height() as usize);
                let color_image = egui::ColorImage {
                    size: [w, h],
                    source_size: egui::vec2(w as f32, h as f32),
                    pixels: rgba
                        .pixels()
                        .map(|p| egui::Color32::from_rgba_unmultiplied(p.0[0], p.0[1], p.0[2], p.0[3]))
                        .collect(),
                };
                Some(ctx.load_texture(format!("preview-{:?}", item.id), color_image, egui::TextureOptions::LINEAR))
            })
            .as_ref()
            .map(|t| t.id())
    }

    fn render_header(&mut self, ui: &mut egui::Ui, colors: PanelColors) {
        ui.vertical(|ui| {
            ui.add_space(12.0);
            ui.label(egui::RichText::new("Image Converter").size(24.0).color(colors.text));
            ui.add_space(4.0);
            ui.label(
                egui::RichText::new("Convert images to JPEG, PNG or WebP on this machine")
                    .size(13.0)
                    .color(colors.weak),
            );
            ui.add_space(12.0);
        });
    }

    fn render_drop_zone(&mut self, ui: &mut egui::Ui, theme: ThemeMode, colors: PanelColors) {
        let drop_zone_bg = match (self.drag_hover, theme) {
            (true, ThemeMode::Dark) => ColorPalette::ZINC_700,
            (true, ThemeMode::Light) => ColorPalette::GRAY_200,
            (false, ThemeMode::Dark) => ColorPalette::ZINC_900,
            (false, ThemeMode::Light) => egui::Color32::WHITE,
        };
        let drop_zone_border = if self.drag_hover {
            ColorPalette::BLUE_500
        } else if theme.is_dark() {
            ColorPalette::ZINC_600
        } else {
            ColorPalette::GRAY_400
        };

        let (rect, response) = ui.allocate_exact_size(egui::vec2(ui.available_width(), 120.0), egui::Sense::click());

        ui.painter().rect_filled(rect, 12.0, drop_zone_bg);
        ui.painter().rect_stroke(rect, 12.0, egui::Stroke::new(4.0, drop_zone_border), egui::StrokeKind::Inside);
        ui.painter().text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            "Drag & Drop images here, or click to select files",
            egui::FontId::proportional(14.0),
            colors.weak,
        );

        if response.clicked() {
            self.pick_files();
        }
    }

    fn render_format_selector(&mut self, ui: &mut egui::Ui, theme: ThemeMode, colors: PanelColors) {
        ui.label(egui::RichText::new("Select Format").size(14.0).color(colors.text));
        ui.add_space(4.0);

        let formats = OutputFormat::all();
        let width = (ui.available_width() - ui.spacing().item_spacing.x * (formats.len() - 1) as f32) / formats.len() as f32;

        ui.horizontal(|ui| {
            for format in formats {
                let is_selected = self.state.format() == format;
                let (bg_color, txt_color) = match (is_selected, theme) {
                    (true, _) => (ColorPalette::RED_600, egui::Color32::WHITE),
                    (false, ThemeMode::Dark) => (ColorPalette::ZINC_700, ColorPalette::ZINC_300),
                    (false, ThemeMode::Light) => (ColorPalette::GRAY_200, ColorPalette::GRAY_800),
                };

                let button = egui::Button::new(egui::RichText::new(format.as_str()).size(13.0).color(txt_color))
                    .fill(bg_color)
                    .stroke(egui::Stroke::new(1.0, ColorPalette::RED_500))
                    .corner_radius(6.0)
                    .min_size(egui::vec2(width, 32.0));

                if ui.add(button).clicked() {
                    self.state.set_format(format);
                }
            }
        });
    }

    fn render_image_list(&mut self, ui: &mut egui::Ui, ctx: &egui::Context, colors: PanelColors) {
        let toggle_text = if self.state.all_selected() { "Deselect All" } else { "Select All" };
        let toggle = egui::Button::new(egui::RichText::new(toggle_text).color(egui::Color32::BLACK))
            .fill(ColorPalette::AMBER_500)
            .corner_radius(6.0);
        if ui.add(toggle).clicked() {
            self.state.toggle_all();
        }

        ui.add_space(4.0);

        let format = self.state.format();
        let mut to_toggle = None;

        for item in self.state.visible_items() {
            let selected = self.state.is_selected(item.id);
            let texture = Self::preview_texture(&mut self.previews, ctx, item);
            let estimate = self.state.estimate_kb(item);

            let response = egui::Frame::new()
                .fill(if selected { colors.selected_bg } else { colors.item_bg })
                .stroke(egui::Stroke::new(1.0, colors.border))
                .corner_radius(6.0)
                .inner_margin(8.0)
                .show(ui, |ui| {
                    ui.set_width(ui.available_width());
                    ui.horizontal(|ui| {
                        let (rect, _) = ui.allocate_exact_size(egui::vec2(PREVIEW_SIZE, PREVIEW_SIZE), egui::Sense::hover());
                        match texture {
                            Some(tex) => {
                                ui.painter().image(
                                    tex,
                                    rect,
                                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                                    egui::Color32::WHITE,
                                );
                            }
                            None => {
                                ui.painter().rect_filled(rect, 4.0, colors.border);
                            }
                        }

                        ui.vertical(|ui| {
                            ui.label(egui::RichText::new(&item.name).strong().size(13.0).color(colors.text));
                            let line = |text: String| egui::RichText::new(text).size(11.0).color(colors.weak);
                            ui.label(line(format!("Format: {}", format.as_str())));
                            ui.label(line(format!("Original Size: {} KB", item.size_label())));
                            ui.label(line(format!("Estimated New Size: {:.2} KB", estimate)));
                        });
                    });
                })
                .response
                .interact(egui::Sense::click());

            if response.clicked() {
                to_toggle = Some(item.id);
            }
            ui.add_space(4.0);
        }

        if let Some(id) = to_toggle {
            self.state.toggle(id);
        }
    }

    fn render_progress(&self, ui: &mut egui::Ui, theme: ThemeMode, colors: PanelColors) {
        let progress = self.worker.progress();
        if progress.state == ConversionState::Idle {
            return;
        }

        let progress_bg = if theme.is_dark() { ColorPalette::ZINC_700 } else { ColorPalette::GRAY_200 };
        let progress_fill = match progress.state {
            ConversionState::Converting => ColorPalette::BLUE_500,
            ConversionState::Completed => ColorPalette::GREEN_500,
            ConversionState::CompletedWithFailures => ColorPalette::RED_500,
            ConversionState::Idle => ColorPalette::ZINC_500,
        };
        let fraction = progress.fraction();

        let (rect, _) = ui.allocate_exact_size(egui::vec2(ui.available_width(), 20.0), egui::Sense::hover());
        ui.painter().rect_filled(rect, 4.0, progress_bg);
        let fill_rect = egui::Rect::from_min_size(rect.min, egui::vec2(rect.width() * fraction, rect.height()));
        ui.painter().rect_filled(fill_rect, 4.0, progress_fill);
        ui.painter().text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            format!("{:.0}%", fraction * 100.0),
            egui::FontId::proportional(12.0),
            egui::Color32::WHITE,
        );

        ui.label(egui::RichText::new(&progress.message).size(12.0).color(colors.text));
    }

    fn render_results(&mut self, ui: &mut egui::Ui, colors: PanelColors) {
        let Some(batch) = self.state.results() else { return };
        if batch.outcomes.is_empty() {
            return;
        }

        ui.label(
            egui::RichText::new(format!("Converted at {}", batch.completed_at.format("%H:%M:%S")))
                .size(11.0)
                .color(colors.weak),
        );

        let mut to_download = None;
        for (idx, outcome) in batch.outcomes.iter().enumerate() {
            egui::Frame::new()
                .fill(colors.item_bg)
                .stroke(egui::Stroke::new(1.0, colors.border))
                .corner_radius(6.0)
                .inner_margin(8.0)
                .show(ui, |ui| {
                    ui.horizontal(|ui| match outcome {
                        ConversionOutcome::Converted(item) => {
                            let label = format!("Download {}", item.name);
                            let button = egui::Button::new(egui::RichText::new(label).color(egui::Color32::WHITE))
                                .fill(ColorPalette::GREEN_600)
                                .corner_radius(6.0)
                                .min_size(egui::vec2(ui.available_width() * 0.6, 28.0));
                            if ui.add(button).on_hover_text(item.download_name()).clicked() {
                                to_download = Some(idx);
                            }
                            ui.label(
                                egui::RichText::new(format!(
                                    "{} KB -> Converted Size: {} KB",
                                    item.original_size_label(),
                                    item.converted_size_label()
                                ))
                                    .color(colors.text),
                            );
                        }
                        ConversionOutcome::Failed(failed) => {
                            ui.label(
                                egui::RichText::new(format!("{}: {}", failed.name, failed.error))
                                    .color(ColorPalette::RED_500),
                            );
                        }
                    });
                });
            ui.add_space(4.0);
        }

        if let Some(idx) = to_download {
            self.download(idx);
        }
    }

    pub fn ui(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) {
        let theme = ThemeMode::from_dark_mode(ui.visuals().dark_mode);
        let colors = PanelColors::for_theme(theme);

        self.collect_dropped_files(ctx);
        self.poll_worker();

        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                self.render_header(ui, colors);
                self.render_drop_zone(ui, theme, colors);

                ui.add_space(12.0);
                self.render_format_selector(ui, theme, colors);

                ui.add_space(12.0);
                self.render_image_list(ui, ctx, colors);

                ui.add_space(8.0);
                let can_convert = self.state.can_convert() && !self.worker.is_running();
                if style::filled_button(ui, "Convert Selected", ColorPalette::RED_600, can_convert).clicked() {
                    self.start_conversion();
                }

                ui.add_space(8.0);
                self.render_progress(ui, theme, colors);

                if let Some(status) = &self.status {
                    ui.label(egui::RichText::new(status).size(12.0).color(colors.weak));
                }

                ui.add_space(8.0);
                self.render_results(ui, colors);
                ui.add_space(16.0);
            });

        if self.worker.is_running() {
            ctx.request_repaint();
        }
    }
}
