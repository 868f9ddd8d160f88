//! Splitting of `f64` coordinates into `f32` hi/lo pairs.
//!
//! GPU vertex arithmetic runs at `f32` precision, which is not enough to
//! place points accurately when the data range is tiny compared to its
//! magnitude (deep zoom). Each `f64` value is split into a primary `f32`
//! and a residual `f32` whose sum reconstructs the original; the shader
//! re-sums them after scaling so placement stays double-precision accurate.

/// Split a value into `(hi, lo)` with `hi + lo ≈ v` at `f64` precision.
///
/// `hi` alone is the best `f32` approximation of `v`; `lo` is the rounding
/// residual. Splitting an exactly representable value yields `lo == 0`.
#[inline]
pub fn split(v: f64) -> (f32, f32) {
    let hi = v as f32;
    let lo = (v - hi as f64) as f32;
    (hi, lo)
}

/// Split both components of a 2D value.
#[inline]
pub fn split2(v: [f64; 2]) -> ([f32; 2], [f32; 2]) {
    let (hx, lx) = split(v[0]);
    let (hy, ly) = split(v[1]);
    ([hx, hy], [lx, ly])
}

/// Split every element of a slice into parallel hi/lo vectors.
pub fn split_slice(values: &[f64]) -> (Vec<f32>, Vec<f32>) {
    let mut hi = Vec::with_capacity(values.len());
    let mut lo = Vec::with_capacity(values.len());
    for &v in values {
        let (h, l) = split(v);
        hi.push(h);
        lo.push(l);
    }
    (hi, lo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_reconstructs() {
        for &v in &[0.0, 1.5, -2.25, 1e9 + 0.1234567, -123456789.987654321] {
            let (hi, lo) = split(v);
            let rebuilt = hi as f64 + lo as f64;
            // The residual recovers everything the f32 rounding lost.
            assert!((rebuilt - v).abs() <= (v * f32::EPSILON as f64).abs());
        }
    }

    #[test]
    fn test_split_idempotent() {
        let (hi, _) = split(1e9 + 0.1234567);
        let (hi2, lo2) = split(hi as f64);
        assert_eq!(hi, hi2);
        assert_eq!(lo2, 0.0);
    }

    #[test]
    fn test_split_exact_values() {
        let (hi, lo) = split(42.0);
        assert_eq!(hi, 42.0);
        assert_eq!(lo, 0.0);
    }

    #[test]
    fn test_split_slice_parallel() {
        let values = [0.0, 1.0, 1e9 + 0.25];
        let (hi, lo) = split_slice(&values);
        assert_eq!(hi.len(), 3);
        assert_eq!(lo.len(), 3);
        for i in 0..3 {
            assert_eq!((hi[i], lo[i]), split(values[i]));
        }
    }
}
