pub mod params;

/// Output length of a convolution or pooling window sliding over `input`,
/// dropping windows that do not fully fit.
///
/// Returns `None` when not even a single window fits.
pub fn window_output_size(
    input: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
) -> Option<usize> {
    let padded = input + 2 * padding;
    if stride == 0 || padded < kernel {
        return None;
    }
    Some((padded - kernel) / stride + 1)
}
