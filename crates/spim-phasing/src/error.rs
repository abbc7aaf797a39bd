use spim_fft::FftError;
use spim_image::ImageError;
use thiserror::Error;

pub type PhasingResult<T> = Result<T, PhasingError>;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhasingError {
    #[error(transparent)]
    Image(#[from] ImageError),
    #[error("fourier transform failed: {0}")]
    Fft(#[from] FftError),
    #[error("invalid configuration `{field}`: {detail}")]
    InvalidConfig { field: &'static str, detail: String },
    #[error("support mask selects no samples")]
    EmptySupport,
    #[error("non-finite input: {message}")]
    NonFiniteInput { message: String },
}

impl PhasingError {
    pub(crate) fn config(field: &'static str, detail: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            detail: detail.into(),
        }
    }
}
