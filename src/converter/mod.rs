//! Image intake, selection and the sequential conversion loop.
//!
//! Nothing in here knows about egui: the panel in
//! [`crate::modules::image_converter`] drives [`ConverterState`] and
//! [`ConversionWorker`] and only adds rendering on top.

pub mod error;
pub mod format;
pub mod intake;
pub mod objects;
pub mod pipeline;
pub mod selection;
pub mod state;
pub mod worker;

pub use error::{ConvertError, ConvertResult};
pub use format::{OutputFormat, download_name, kb_label};
pub use intake::{AcceptFilter, IncomingFile, IntakeItem, ItemId, SourceFile};
pub use objects::{Blob, ObjectRef, ObjectStore};
pub use pipeline::{
    ConversionBatch, ConversionJob, ConversionOutcome, ConvertOptions, ConvertedItem, Converter,
    DefaultBackend, FailedItem, ImageBackend, Surface,
};
pub use selection::Selection;
pub use state::ConverterState;
pub use worker::{ConversionProgress, ConversionState, ConversionWorker};
