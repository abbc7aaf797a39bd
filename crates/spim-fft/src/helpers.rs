use crate::transforms::FftError;

/// Sample frequencies for the length-`n` complex FFT.
pub fn fftfreq(n: usize, sample_spacing: f64) -> Result<Vec<f64>, FftError> {
    validate_frequency_args(n, sample_spacing)?;
    let scale = 1.0 / (n as f64 * sample_spacing);
    let split = n.div_ceil(2);

    let mut freqs = Vec::with_capacity(n);
    for idx in 0..n {
        if idx < split {
            freqs.push(idx as f64 * scale);
        } else {
            freqs.push(-((n - idx) as f64) * scale);
        }
    }
    Ok(freqs)
}

/// Shift zero-frequency component to the center for 1D input.
#[must_use]
pub fn fftshift_1d<T: Clone>(input: &[T]) -> Vec<T> {
    rotate_left_owned(input, input.len().div_ceil(2))
}

/// Inverse shift for [`fftshift_1d`] over 1D input.
#[must_use]
pub fn ifftshift_1d<T: Clone>(input: &[T]) -> Vec<T> {
    rotate_left_owned(input, input.len() / 2)
}

/// Move the origin of a row-major nd array from the corner to the center.
pub fn fftshift_nd<T: Clone>(input: &[T], shape: &[usize]) -> Result<Vec<T>, FftError> {
    shift_nd(input, shape, |n| n.div_ceil(2))
}

/// Inverse of [`fftshift_nd`]; the two coincide for even extents.
pub fn ifftshift_nd<T: Clone>(input: &[T], shape: &[usize]) -> Result<Vec<T>, FftError> {
    shift_nd(input, shape, |n| n / 2)
}

fn shift_nd<T: Clone>(
    input: &[T],
    shape: &[usize],
    shift_for: impl Fn(usize) -> usize,
) -> Result<Vec<T>, FftError> {
    if shape.is_empty() || shape.contains(&0) {
        return Err(FftError::InvalidShape {
            detail: "shift shape dimensions must be greater than zero",
        });
    }
    let expected = shape.iter().product::<usize>();
    if input.len() != expected {
        return Err(FftError::LengthMismatch {
            expected,
            actual: input.len(),
        });
    }

    let mut strides = vec![1usize; shape.len()];
    for axis in (0..shape.len().saturating_sub(1)).rev() {
        strides[axis] = strides[axis + 1] * shape[axis + 1];
    }

    // out[i] = in[(i + shift) mod n] per axis, same rotation as the 1D helpers.
    let mut output = Vec::with_capacity(expected);
    for flat in 0..expected {
        let mut source = 0usize;
        let mut rem = flat;
        for (&extent, &stride) in shape.iter().zip(&strides) {
            let coord = rem / stride;
            rem %= stride;
            let shifted = (coord + shift_for(extent)) % extent;
            source += shifted * stride;
        }
        output.push(input[source].clone());
    }
    Ok(output)
}

fn validate_frequency_args(n: usize, sample_spacing: f64) -> Result<(), FftError> {
    if n == 0 {
        return Err(FftError::InvalidShape {
            detail: "n must be greater than zero",
        });
    }
    if !(sample_spacing.is_finite() && sample_spacing > 0.0) {
        return Err(FftError::NonPositiveSampleSpacing);
    }
    Ok(())
}

fn rotate_left_owned<T: Clone>(input: &[T], shift: usize) -> Vec<T> {
    if input.is_empty() {
        return Vec::new();
    }
    let split = shift % input.len();
    input[split..]
        .iter()
        .cloned()
        .chain(input[..split].iter().cloned())
        .collect()
}
