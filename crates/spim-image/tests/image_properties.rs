//! Property tests for spim-image grids, masks and moduli.
//!
//! Convention: test_{module}_{function}_{scenario}
//!
//! Reproduce: `PROPTEST_SEED=<seed> cargo test -p spim-image --test image_properties`

use proptest::prelude::*;
use spim_image::{ComplexImage, GridShape, MeasuredModulus, SupportMask};
use spim_runtime::{TestLogEntry, TestResult};

fn grid_2d() -> impl Strategy<Value = GridShape> {
    (1usize..12, 1usize..12).prop_map(|(rows, cols)| GridShape::new_2d(rows, cols))
}

fn grid_any() -> impl Strategy<Value = GridShape> {
    prop_oneof![
        grid_2d(),
        (1usize..5, 1usize..6, 1usize..7)
            .prop_map(|(depth, rows, cols)| GridShape::new_3d(depth, rows, cols)),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn test_shape_coords_roundtrip_every_index(shape in grid_any()) {
        for flat in 0..shape.len() {
            prop_assert_eq!(shape.flat_index(&shape.coords(flat)), Some(flat));
        }
    }

    #[test]
    fn test_image_center_then_shift_is_identity(shape in grid_any(), seed in 0u64..1000) {
        let values = (0..shape.len())
            .map(|i| ((i as u64 * 31 + seed) % 97) as f64)
            .collect::<Vec<_>>();
        let image = ComplexImage::from_real(shape, &values).expect("valid image");
        let roundtrip = image
            .to_shifted()
            .expect("shift")
            .to_centered()
            .expect("center");
        prop_assert_eq!(roundtrip.data(), image.data());
    }

    #[test]
    fn test_mask_centered_box_count_is_product_of_extents(
        shape in grid_2d(),
        fr in 0.0f64..1.0,
        fc in 0.0f64..1.0,
    ) {
        let rows = ((shape.dims()[0] as f64 * fr) as usize).max(1);
        let cols = ((shape.dims()[1] as f64 * fc) as usize).max(1);
        let support = SupportMask::centered_box(shape, &[rows, cols]).expect("box fits");
        prop_assert_eq!(support.count(), rows * cols);
        prop_assert_eq!(support.to_shifted().expect("shift").count(), rows * cols);
    }

    #[test]
    fn test_modulus_intensities_are_never_negative(
        intensities in proptest::collection::vec(-10.0f64..10.0, 16),
    ) {
        let modulus = MeasuredModulus::from_intensities(GridShape::new_2d(4, 4), &intensities)
            .expect("finite intensities");
        for (&amp, &intensity) in modulus.amplitudes().iter().zip(&intensities) {
            prop_assert!(amp >= 0.0);
            if intensity > 0.0 {
                prop_assert!((amp * amp - intensity).abs() <= 1e-12 * intensity.max(1.0));
            }
        }
    }
}

#[test]
fn test_modulus_serde_roundtrip_keeps_known_mask() {
    let modulus = MeasuredModulus::from_amplitudes(GridShape::new_2d(2, 2), vec![1.0, 2.0, 3.0, 4.0])
        .expect("valid")
        .with_known_mask(vec![true, false, true, true])
        .expect("mask fits");
    let json = serde_json::to_string(&modulus).expect("serialize");
    let back: MeasuredModulus = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(back, modulus);

    let entry = TestLogEntry::new(
        "test_modulus_serde_roundtrip_keeps_known_mask",
        "spim_image",
        "measured modulus survives a JSON round trip",
    )
    .with_result(TestResult::from_pass(back == modulus));
    let parsed: serde_json::Value =
        serde_json::from_str(&entry.to_json_line()).expect("structured log must be valid JSON");
    assert_eq!(parsed["module"], "spim_image");
}
