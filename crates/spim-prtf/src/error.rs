use spim_fft::FftError;
use spim_image::{GridShape, ImageError};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PrtfError {
    #[error("PRTF needs at least {required} reconstructions, got {actual}")]
    InsufficientEnsemble { required: usize, actual: usize },
    #[error("reconstruction {index} has shape {actual}, expected {expected}")]
    ShapeMismatch {
        index: usize,
        expected: GridShape,
        actual: GridShape,
    },
    #[error("invalid configuration `{field}`: {detail}")]
    InvalidConfig { field: &'static str, detail: String },
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("fourier transform failed: {0}")]
    Fft(#[from] FftError),
}
