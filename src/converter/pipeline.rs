use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, Local};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, RgbaImage};

use super::error::{ConvertError, ConvertResult};
use super::format::{OutputFormat, download_name, kb_label};
use super::intake::{ItemId, SourceFile};
use super::objects::{ObjectRef, ObjectStore};

pub const DEFAULT_QUALITY: f32 = 0.5;
pub const DEFAULT_DECODE_TIMEOUT: Duration = Duration::from_secs(30);

/// Drawable target sized to the source bitmap.
#[derive(Debug, Clone)]
pub struct Surface {
    pixels: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> ConvertResult<Self> {
        if width == 0 || height == 0 {
            return Err(ConvertError::EmptySurface { width, height });
        }
        Ok(Self { pixels: RgbaImage::new(width, height) })
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut RgbaImage {
        &mut self.pixels
    }
}

/// The imaging operations a conversion run relies on.
pub trait ImageBackend: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, image::ImageError>;

    /// Resamples `source` onto `target`, filling it completely.
    fn resize(&self, source: &DynamicImage, target: &mut Surface) -> ConvertResult<()>;

    /// `quality` is on a 0 to 1 scale; codecs without a quality knob ignore it.
    fn encode(&self, surface: &Surface, format: OutputFormat, quality: f32) -> ConvertResult<Vec<u8>>;
}

/// Backend built on the `image` crate.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBackend {
    pub filter: FilterType,
}

impl Default for DefaultBackend {
    fn default() -> Self {
        Self { filter: FilterType::Lanczos3 }
    }
}

impl ImageBackend for DefaultBackend {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
        image::load_from_memory(bytes)
    }

    fn resize(&self, source: &DynamicImage, target: &mut Surface) -> ConvertResult<()> {
        let (w, h) = (target.width(), target.height());
        let rgba = source.to_rgba8();
        *target.pixels_mut() = if rgba.dimensions() == (w, h) {
            rgba
        } else {
            image::imageops::resize(&rgba, w, h, self.filter)
        };
        Ok(())
    }

    fn encode(&self, surface: &Surface, format: OutputFormat, quality: f32) -> ConvertResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        let (w, h) = (surface.width(), surface.height());
        let encode_err = |source: image::ImageError| ConvertError::Encode { format: format.as_str(), source };

        match format {
            OutputFormat::Jpeg => {
                let rgb = DynamicImage::ImageRgba8(surface.pixels().clone()).to_rgb8();
                let mut encoder = JpegEncoder::new_with_quality(&mut buf, jpeg_quality(quality));
                encoder
                    .encode(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                    .map_err(encode_err)?;
            }
            OutputFormat::Png => {
                let encoder = PngEncoder::new_with_quality(&mut buf, CompressionType::Default, PngFilter::Adaptive);
                encoder
                    .write_image(surface.pixels().as_raw(), w, h, ExtendedColorType::Rgba8)
                    .map_err(encode_err)?;
            }
            OutputFormat::Webp => {
                // The bundled WebP encoder is lossless only.
                let encoder = WebPEncoder::new_lossless(&mut buf);
                encoder
                    .encode(surface.pixels().as_raw(), w, h, ExtendedColorType::Rgba8)
                    .map_err(encode_err)?;
            }
        }

        Ok(buf.into_inner())
    }
}

fn jpeg_quality(quality: f32) -> u8 {
    (quality.clamp(0.0, 1.0) * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Runs `backend.decode` on a helper thread and waits at most `timeout`.
/// A decode that overruns is abandoned; its eventual result is discarded.
pub fn decode_with_timeout(
    backend: &Arc<dyn ImageBackend>,
    bytes: Arc<[u8]>,
    timeout: Duration,
) -> ConvertResult<DynamicImage> {
    let (tx, rx) = mpsc::sync_channel(1);
    let backend = Arc::clone(backend);

    thread::Builder::new()
        .name("image-decode".to_string())
        .spawn(move || {
            let _ = tx.send(backend.decode(&bytes));
        })?;

    match rx.recv_timeout(timeout) {
        Ok(Ok(img)) => Ok(img),
        Ok(Err(e)) => Err(ConvertError::Decode(e)),
        Err(RecvTimeoutError::Timeout) => Err(ConvertError::DecodeTimeout(timeout)),
        Err(RecvTimeoutError::Disconnected) => Err(ConvertError::DecodeWorkerLost),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertOptions {
    pub quality: f32,
    pub decode_timeout: Duration,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self { quality: DEFAULT_QUALITY, decode_timeout: DEFAULT_DECODE_TIMEOUT }
    }
}

/// Snapshot of one selected item, detached from UI state.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub id: ItemId,
    pub name: String,
    pub file: Option<SourceFile>,
    pub original_size_bytes: u64,
}

#[derive(Debug)]
pub struct ConvertedItem {
    pub id: ItemId,
    pub name: String,
    pub format: OutputFormat,
    pub result: ObjectRef,
    pub original_size_bytes: u64,
    pub converted_size_bytes: u64,
    pub width: u32,
    pub height: u32,
}

impl ConvertedItem {
    pub fn download_name(&self) -> String {
        download_name(&self.name, self.format)
    }

    pub fn original_size_label(&self) -> String {
        kb_label(self.original_size_bytes)
    }

    pub fn converted_size_label(&self) -> String {
        kb_label(self.converted_size_bytes)
    }

    /// Writes the encoded bytes to `path`.
    pub fn save_to(&self, path: &Path) -> ConvertResult<()> {
        let bytes = self.result.bytes().ok_or_else(|| ConvertError::Released(self.result.uri()))?;
        std::fs::write(path, &bytes)?;
        tracing::info!(name = %self.name, path = %path.display(), bytes = bytes.len(), "saved converted image");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct FailedItem {
    pub id: ItemId,
    pub name: String,
    pub error: String,
}

#[derive(Debug)]
pub enum ConversionOutcome {
    Converted(ConvertedItem),
    Failed(FailedItem),
}

impl ConversionOutcome {
    pub fn name(&self) -> &str {
        match self {
            ConversionOutcome::Converted(c) => &c.name,
            ConversionOutcome::Failed(f) => &f.name,
        }
    }

    pub fn as_converted(&self) -> Option<&ConvertedItem> {
        match self {
            ConversionOutcome::Converted(c) => Some(c),
            ConversionOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug)]
pub struct ConversionBatch {
    pub format: OutputFormat,
    pub outcomes: Vec<ConversionOutcome>,
    pub completed_at: DateTime<Local>,
}

impl ConversionBatch {
    pub fn converted(&self) -> impl Iterator<Item = &ConvertedItem> {
        self.outcomes.iter().filter_map(ConversionOutcome::as_converted)
    }

    pub fn failure_count(&self) -> usize {
        self.outcomes.len() - self.converted().count()
    }
}

/// Sequential decode, resize, encode loop.
#[derive(Clone)]
pub struct Converter {
    backend: Arc<dyn ImageBackend>,
    options: ConvertOptions,
}

impl Converter {
    pub fn new(backend: Arc<dyn ImageBackend>, options: ConvertOptions) -> Self {
        Self { backend, options }
    }

    pub fn with_defaults() -> Self {
        Self::new(Arc::new(DefaultBackend::default()), ConvertOptions::default())
    }

    /// Decodes, redraws at natural size and encodes a single file.
    pub fn convert_file(&self, file: &SourceFile, format: OutputFormat) -> ConvertResult<(Vec<u8>, u32, u32)> {
        let bitmap = decode_with_timeout(&self.backend, Arc::clone(&file.bytes), self.options.decode_timeout)?;
        let mut surface = Surface::new(bitmap.width(), bitmap.height())?;
        self.backend.resize(&bitmap, &mut surface)?;
        let encoded = self.backend.encode(&surface, format, self.options.quality)?;
        Ok((encoded, surface.width(), surface.height()))
    }

    /// Processes `jobs` one at a time, in order. Jobs without a source file are
    /// skipped; every other job yields exactly one outcome. `on_progress` is
    /// called before each job with its 1-based position.
    pub fn run(
        &self,
        jobs: &[ConversionJob],
        format: OutputFormat,
        store: &ObjectStore,
        mut on_progress: impl FnMut(usize, usize, &str),
    ) -> ConversionBatch {
        let total = jobs.len();
        tracing::info!(total, format = format.as_str(), "conversion run started");

        let mut outcomes = Vec::with_capacity(total);
        for (idx, job) in jobs.iter().enumerate() {
            on_progress(idx + 1, total, &job.name);

            let Some(file) = &job.file else {
                tracing::debug!(name = %job.name, "skipping item without a source file");
                continue;
            };

            match self.convert_file(file, format) {
                Ok((encoded, width, height)) => {
                    let converted_size_bytes = encoded.len() as u64;
                    let result = store.register(Arc::from(encoded), format.mime_type());
                    tracing::debug!(
                        name = %job.name,
                        original = job.original_size_bytes,
                        converted = converted_size_bytes,
                        "converted"
                    );
                    outcomes.push(ConversionOutcome::Converted(ConvertedItem {
                        id: job.id,
                        name: job.name.clone(),
                        format,
                        result,
                        original_size_bytes: job.original_size_bytes,
                        converted_size_bytes,
                        width,
                        height,
                    }));
                }
                Err(e) => {
                    tracing::warn!(name = %job.name, error = %e, "conversion failed");
                    outcomes.push(ConversionOutcome::Failed(FailedItem {
                        id: job.id,
                        name: job.name.clone(),
                        error: e.to_string(),
                    }));
                }
            }
        }

        let batch = ConversionBatch { format, outcomes, completed_at: Local::now() };
        tracing::info!(
            converted = batch.converted().count(),
            failed = batch.failure_count(),
            "conversion run finished"
        );
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn png_bytes(w: u32, h: u32) -> Vec<u8> {
        let img = RgbaImage::from_pixel(w, h, Rgba([200, 40, 40, 255]));
        let mut buf = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(img)
            .write_to(&mut buf, image::ImageFormat::Png)
            .unwrap();
        buf.into_inner()
    }

    fn source(name: &str, bytes: Vec<u8>) -> SourceFile {
        SourceFile { name: name.to_string(), bytes: Arc::from(bytes), media_type: "image/png".to_string() }
    }

    #[test]
    fn jpeg_quality_maps_unit_scale() {
        assert_eq!(jpeg_quality(0.5), 50);
        assert_eq!(jpeg_quality(0.0), 1);
        assert_eq!(jpeg_quality(2.0), 100);
    }

    #[test]
    fn surface_rejects_zero_dimensions() {
        assert!(matches!(Surface::new(0, 5), Err(ConvertError::EmptySurface { .. })));
    }

    #[test]
    fn every_format_round_trips_through_decoder() {
        let converter = Converter::with_defaults();
        let file = source("red.png", png_bytes(12, 7));

        for format in OutputFormat::all() {
            let (encoded, w, h) = converter.convert_file(&file, format).unwrap();
            assert_eq!((w, h), (12, 7));
            let decoded = image::load_from_memory(&encoded).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (12, 7));
            let guessed = image::guess_format(&encoded).unwrap();
            assert_eq!(guessed.to_mime_type(), format.mime_type());
        }
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let converter = Converter::with_defaults();
        let err = converter
            .convert_file(&source("junk.png", b"not an image".to_vec()), OutputFormat::Png)
            .unwrap_err();
        assert!(matches!(err, ConvertError::Decode(_)));
    }

    struct StallingBackend;

    impl ImageBackend for StallingBackend {
        fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, image::ImageError> {
            thread::sleep(Duration::from_millis(500));
            image::load_from_memory(bytes)
        }

        fn resize(&self, source: &DynamicImage, target: &mut Surface) -> ConvertResult<()> {
            DefaultBackend::default().resize(source, target)
        }

        fn encode(&self, surface: &Surface, format: OutputFormat, quality: f32) -> ConvertResult<Vec<u8>> {
            DefaultBackend::default().encode(surface, format, quality)
        }
    }

    #[test]
    fn slow_decode_times_out() {
        let backend: Arc<dyn ImageBackend> = Arc::new(StallingBackend);
        let err = decode_with_timeout(&backend, Arc::from(png_bytes(2, 2)), Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, ConvertError::DecodeTimeout(_)));
    }
}
