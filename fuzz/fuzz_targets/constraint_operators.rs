#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spim_image::{Complex64, ComplexImage, GridShape, MeasuredModulus, SupportMask};
use spim_phasing::{RealSpaceConstraint, apply_modulus, apply_support_with};

#[derive(Debug, Arbitrary)]
struct ConstraintInput {
    rows: u8,
    cols: u8,
    positive: bool,
    values: Vec<(f64, f64)>,
    amplitudes: Vec<f64>,
    mask: Vec<bool>,
}

fn fill<T: Copy>(len: usize, source: &[T], default: T) -> Vec<T> {
    let mut out = vec![default; len];
    for (slot, value) in out.iter_mut().zip(source) {
        *slot = *value;
    }
    out
}

fuzz_target!(|input: ConstraintInput| {
    let shape = GridShape::new_2d(usize::from(input.rows % 9), usize::from(input.cols % 9));
    let len = shape.len();
    let data = fill(len, &input.values, (0.0, 0.0))
        .into_iter()
        .map(|(re, im)| Complex64::new(re, im))
        .collect();
    let Ok(image) = ComplexImage::from_vec(shape, data) else {
        return;
    };
    let constraint = if input.positive {
        RealSpaceConstraint::Positive
    } else {
        RealSpaceConstraint::Real
    };
    if let Ok(mask) = SupportMask::from_vec(shape, fill(len, &input.mask, true)) {
        let _ = apply_support_with(&image, &mask, constraint);
    }
    if let Ok(measured) = MeasuredModulus::from_amplitudes(shape, fill(len, &input.amplitudes, 1.0))
    {
        let _ = apply_modulus(&image, &measured);
    }
});
