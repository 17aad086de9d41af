use serde::{Deserialize, Serialize};

/// Target encoding for a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "JPEG",
            OutputFormat::Png => "PNG",
            OutputFormat::Webp => "WEBP",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }

    /// Rough output/input size ratio used for the pre-conversion estimate.
    /// Placeholder constants, not measured codec behaviour.
    pub fn size_multiplier(&self) -> f64 {
        match self {
            OutputFormat::Jpeg => 0.8,
            OutputFormat::Png => 1.0,
            OutputFormat::Webp => 0.6,
        }
    }

    pub fn estimate_kb(&self, size_kb: f64) -> f64 {
        size_kb * self.size_multiplier()
    }

    pub fn all() -> [OutputFormat; 3] {
        [OutputFormat::Jpeg, OutputFormat::Png, OutputFormat::Webp]
    }
}

/// Replaces the last extension of `name` with the format's extension,
/// appending one when the name has none.
pub fn download_name(name: &str, format: OutputFormat) -> String {
    match name.rfind('.') {
        Some(idx) => format!("{}.{}", &name[..idx], format.extension()),
        None => format!("{}.{}", name, format.extension()),
    }
}

/// Two-decimal KB label, matching how sizes are shown in the list.
pub fn kb_label(bytes: u64) -> String {
    format!("{:.2}", bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimates_use_per_format_multiplier() {
        assert_eq!(format!("{:.2}", OutputFormat::Webp.estimate_kb(100.0)), "60.00");
        assert_eq!(format!("{:.2}", OutputFormat::Webp.estimate_kb(200.0)), "120.00");
        assert_eq!(format!("{:.2}", OutputFormat::Jpeg.estimate_kb(100.0)), "80.00");
        assert_eq!(format!("{:.2}", OutputFormat::Png.estimate_kb(123.45)), "123.45");
    }

    #[test]
    fn download_name_swaps_last_extension() {
        assert_eq!(download_name("photo.png", OutputFormat::Webp), "photo.webp");
        assert_eq!(download_name("archive.tar.gif", OutputFormat::Png), "archive.tar.png");
        assert_eq!(download_name("scan", OutputFormat::Jpeg), "scan.jpeg");
        assert_eq!(download_name("trailing.", OutputFormat::Png), "trailing.png");
    }

    #[test]
    fn kb_label_rounds_to_two_decimals() {
        assert_eq!(kb_label(102_400), "100.00");
        assert_eq!(kb_label(1_500), "1.46");
        assert_eq!(kb_label(0), "0.00");
    }

    #[test]
    fn format_round_trips_through_settings_json() {
        let json = serde_json::to_string(&OutputFormat::Webp).unwrap();
        assert_eq!(json, "\"webp\"");
        let parsed: OutputFormat = serde_json::from_str("\"png\"").unwrap();
        assert_eq!(parsed, OutputFormat::Png);
    }
}
