use eframe::egui;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThemeMode {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn from_dark_mode(dark: bool) -> Self {
        if dark { ThemeMode::Dark } else { ThemeMode::Light }
    }

    pub fn is_dark(self) -> bool {
        matches!(self, ThemeMode::Dark)
    }
}

pub struct ColorPalette;

impl ColorPalette {
    pub const BLUE_400: egui::Color32 = egui::Color32::from_rgb(96, 165, 250);
    pub const BLUE_500: egui::Color32 = egui::Color32::from_rgb(59, 130, 246);
    pub const BLUE_600: egui::Color32 = egui::Color32::from_rgb(37, 99, 235);

    pub const SLATE_100: egui::Color32 = egui::Color32::from_rgb(241, 245, 249);
    pub const SLATE_200: egui::Color32 = egui::Color32::from_rgb(226, 232, 240);
    pub const SLATE_300: egui::Color32 = egui::Color32::from_rgb(203, 213, 225);

    pub const GRAY_50: egui::Color32 = egui::Color32::from_rgb(249, 250, 251);
    pub const GRAY_100: egui::Color32 = egui::Color32::from_rgb(243, 244, 246);
    pub const GRAY_200: egui::Color32 = egui::Color32::from_rgb(229, 231, 235);
    pub const GRAY_300: egui::Color32 = egui::Color32::from_rgb(209, 213, 219);
    pub const GRAY_400: egui::Color32 = egui::Color32::from_rgb(156, 163, 175);
    pub const GRAY_500: egui::Color32 = egui::Color32::from_rgb(107, 114, 128);
    pub const GRAY_700: egui::Color32 = egui::Color32::from_rgb(55, 65, 81);
    pub const GRAY_800: egui::Color32 = egui::Color32::from_rgb(31, 41, 55);
    pub const GRAY_900: egui::Color32 = egui::Color32::from_rgb(17, 24, 39);

    pub const ZINC_200: egui::Color32 = egui::Color32::from_rgb(228, 228, 231);
    pub const ZINC_300: egui::Color32 = egui::Color32::from_rgb(212, 212, 216);
    pub const ZINC_400: egui::Color32 = egui::Color32::from_rgb(161, 161, 170);
    pub const ZINC_500: egui::Color32 = egui::Color32::from_rgb(113, 113, 122);
    pub const ZINC_600: egui::Color32 = egui::Color32::from_rgb(82, 82, 91);
    pub const ZINC_700: egui::Color32 = egui::Color32::from_rgb(63, 63, 70);
    pub const ZINC_800: egui::Color32 = egui::Color32::from_rgb(39, 39, 42);
    pub const ZINC_900: egui::Color32 = egui::Color32::from_rgb(24, 24, 27);

    pub const GREEN_500: egui::Color32 = egui::Color32::from_rgb(34, 197, 94);
    pub const GREEN_600: egui::Color32 = egui::Color32::from_rgb(22, 163, 74);

    pub const RED_500: egui::Color32 = egui::Color32::from_rgb(239, 68, 68);
    pub const RED_600: egui::Color32 = egui::Color32::from_rgb(220, 38, 38);

    pub const AMBER_500: egui::Color32 = egui::Color32::from_rgb(245, 158, 11);
}

/// Colors shared by every framed section of the converter panel.
#[derive(Debug, Clone, Copy)]
pub struct PanelColors {
    pub item_bg: egui::Color32,
    pub border: egui::Color32,
    pub text: egui::Color32,
    pub weak: egui::Color32,
    pub selected_bg: egui::Color32,
}

impl PanelColors {
    pub fn for_theme(theme: ThemeMode) -> Self {
        match theme {
            ThemeMode::Dark => Self {
                item_bg: ColorPalette::ZINC_900,
                border: ColorPalette::ZINC_700,
                text: ColorPalette::ZINC_200,
                weak: ColorPalette::ZINC_400,
                selected_bg: ColorPalette::ZINC_600,
            },
            ThemeMode::Light => Self {
                item_bg: egui::Color32::WHITE,
                border: ColorPalette::GRAY_300,
                text: ColorPalette::GRAY_800,
                weak: ColorPalette::ZINC_500,
                selected_bg: ColorPalette::GRAY_200,
            },
        }
    }
}

pub fn apply_theme(ctx: &egui::Context, theme: ThemeMode) {
    let mut style = (*ctx.style()).clone();

    style.visuals.widgets.noninteractive.corner_radius = egui::CornerRadius::same(4);
    style.visuals.widgets.inactive.corner_radius = egui::CornerRadius::same(4);
    style.visuals.widgets.hovered.corner_radius = egui::CornerRadius::same(4);
    style.visuals.widgets.active.corner_radius = egui::CornerRadius::same(4);

    style.spacing.item_spacing = egui::vec2(8.0, 8.0);
    style.spacing.button_padding = egui::vec2(12.0, 6.0);
    style.spacing.window_margin = egui::Margin::same(10);

    match theme {
        ThemeMode::Dark => apply_dark_theme(&mut style),
        ThemeMode::Light => apply_light_theme(&mut style),
    }

    ctx.set_style(style);
}

fn apply_dark_theme(style: &mut egui::Style) {
    style.visuals.dark_mode = true;

    style.visuals.panel_fill = ColorPalette::ZINC_900;
    style.visuals.window_fill = ColorPalette::ZINC_900;
    style.visuals.faint_bg_color = ColorPalette::ZINC_800;
    style.visuals.extreme_bg_color = egui::Color32::from_rgb(12, 12, 15);

    style.visuals.widgets.noninteractive.bg_fill = ColorPalette::ZINC_800;
    style.visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, ColorPalette::ZINC_700);
    style.visuals.widgets.inactive.weak_bg_fill = ColorPalette::ZINC_800;
    style.visuals.widgets.inactive.bg_stroke = egui::Stroke::new(1.0, ColorPalette::ZINC_600);
    style.visuals.widgets.hovered.bg_stroke = egui::Stroke::new(1.0, ColorPalette::ZINC_500);
    style.visuals.widgets.active.bg_stroke = egui::Stroke::new(1.0, ColorPalette::ZINC_400);

    style.visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, ColorPalette::SLATE_300);
    style.visuals.widgets.inactive.fg_stroke = egui::Stroke::new(1.0, ColorPalette::SLATE_200);
    style.visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.0, ColorPalette::SLATE_100);
    style.visuals.widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::WHITE);

    style.visuals.hyperlink_color = ColorPalette::BLUE_400;
}

fn apply_light_theme(style: &mut egui::Style) {
    style.visuals.dark_mode = false;

    style.visuals.panel_fill = ColorPalette::GRAY_50;
    style.visuals.window_fill = ColorPalette::GRAY_50;
    style.visuals.faint_bg_color = ColorPalette::GRAY_100;
    style.visuals.extreme_bg_color = egui::Color32::WHITE;

    style.visuals.widgets.noninteractive.bg_fill = egui::Color32::WHITE;
    style.visuals.widgets.noninteractive.bg_stroke = egui::Stroke::new(1.0, ColorPalette::GRAY_300);
    style.visuals.widgets.inactive.weak_bg_fill = ColorPalette::GRAY_100;
    style.visuals.widgets.inactive.bg_stroke = egui::Stroke::new(1.0, ColorPalette::GRAY_300);
    style.visuals.widgets.hovered.bg_stroke = egui::Stroke::new(1.0, ColorPalette::GRAY_400);
    style.visuals.widgets.active.bg_stroke = egui::Stroke::new(1.0, ColorPalette::GRAY_500);

    style.visuals.widgets.noninteractive.fg_stroke = egui::Stroke::new(1.0, ColorPalette::GRAY_700);
    style.visuals.widgets.inactive.fg_stroke = egui::Stroke::new(1.0, ColorPalette::GRAY_800);
    style.visuals.widgets.hovered.fg_stroke = egui::Stroke::new(1.0, ColorPalette::GRAY_900);
    style.visuals.widgets.active.fg_stroke = egui::Stroke::new(1.0, egui::Color32::BLACK);

    style.visuals.hyperlink_color = ColorPalette::BLUE_600;
}

/// Filled button with white text, used for the main actions.
pub fn filled_button(ui: &mut egui::Ui, text: &str, fill: egui::Color32, enabled: bool) -> egui::Response {
    let (bg, fg) = if enabled {
        (fill, egui::Color32::WHITE)
    } else {
        (ColorPalette::GRAY_400, ColorPalette::GRAY_100)
    };

    let button = egui::Button::new(egui::RichText::new(text).size(14.0).color(fg))
        .fill(bg)
        .stroke(egui::Stroke::NONE)
        .corner_radius(6.0)
        .min_size(egui::vec2(ui.available_width(), 36.0));

    ui.add_enabled(enabled, button)
}
