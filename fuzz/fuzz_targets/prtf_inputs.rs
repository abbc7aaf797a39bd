#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use spim_fft::{FftContext, FftOptions, Normalization};
use spim_image::{Complex64, ComplexImage, GridShape};
use spim_prtf::{AlignmentMode, PrtfConfig, compute_prtf};
use spim_runtime::RuntimeMode;

#[derive(Debug, Arbitrary)]
struct PrtfInput {
    members: Vec<(u8, u8, Vec<(f64, f64)>)>,
    radial_bins: u8,
    alignment: u8,
    enantiomorphs: bool,
    hardened: bool,
}

fuzz_target!(|input: PrtfInput| {
    let images = input
        .members
        .iter()
        .take(6)
        .filter_map(|(rows, cols, values)| {
            let shape = GridShape::new_2d(usize::from(rows % 6), usize::from(cols % 6));
            let mut data = vec![Complex64::new(0.0, 0.0); shape.len()];
            for (slot, &(re, im)) in data.iter_mut().zip(values) {
                *slot = Complex64::new(re, im);
            }
            ComplexImage::from_vec(shape, data).ok()
        })
        .collect::<Vec<_>>();
    let alignment = match input.alignment % 3 {
        0 => AlignmentMode::None,
        1 => AlignmentMode::Phase,
        _ => AlignmentMode::PhaseAndTranslation,
    };
    let mode = if input.hardened {
        RuntimeMode::Hardened
    } else {
        RuntimeMode::Strict
    };
    let config = PrtfConfig::default()
        .with_radial_bins(usize::from(input.radial_bins % 16))
        .with_alignment(alignment)
        .with_enantiomorphs(input.enantiomorphs)
        .with_mode(mode);
    let mut fft = FftContext::new(FftOptions::default().with_normalization(Normalization::Ortho));
    let _ = compute_prtf(&images, &config, &mut fft);
});
