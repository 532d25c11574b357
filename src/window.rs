use core::f32::consts::PI;
use libm::cosf;

/// Hann coefficient for position `index` of an `n`-point window.
///
/// Coefficients are recomputed on demand, nothing is tabulated. Zero at
/// both ends, unity at the midpoint.
pub fn hann(index: usize, n: usize) -> f32 {
    debug_assert!(n > 1);

    0.5 * (1.0 - cosf(2.0 * PI * index as f32 / (n - 1) as f32))
}
