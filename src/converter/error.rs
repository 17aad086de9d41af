use std::time::Duration;
use thiserror::Error;

pub type ConvertResult<T> = Result<T, ConvertError>;

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to decode image: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Decoding did not finish within {0:?}")]
    DecodeTimeout(Duration),

    #[error("Decode worker exited without a result")]
    DecodeWorkerLost,

    #[error("Failed to encode {format}: {source}")]
    Encode {
        format: &'static str,
        #[source]
        source: image::ImageError,
    },

    #[error("Image has no pixels ({width}x{height})")]
    EmptySurface { width: u32, height: u32 },

    #[error("Result {0} has already been released")]
    Released(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
