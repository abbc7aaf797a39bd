#![forbid(unsafe_code)]

//! Array types shared by the phasing and PRTF layers.
//!
//! | Module     | Contents                                                  |
//! |------------|-----------------------------------------------------------|
//! | `shape`    | [`GridShape`] (2D / 3D extents) and [`ImageError`]        |
//! | `image`    | [`ComplexImage`] buffer with layout and scaling flags     |
//! | `mask`     | [`SupportMask`]                                           |
//! | `modulus`  | [`MeasuredModulus`] with its known/unknown sample mask    |
//! | `detector` | [`Detector`] geometry for resolution conversion           |

pub mod detector;
pub mod image;
pub mod mask;
pub mod modulus;
pub mod shape;

pub use detector::Detector;
pub use image::ComplexImage;
pub use mask::SupportMask;
pub use modulus::MeasuredModulus;
pub use num_complex::Complex64;
pub use shape::{GridShape, ImageError, ImageResult};
