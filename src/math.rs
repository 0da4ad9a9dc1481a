use crate::my_types::*;

/// Lower-middle element of `values` in sorted order. The slice is reordered.
pub fn median(values: &mut [f64]) -> f64 {
    assert!(!values.is_empty(), "median of an empty sequence");
    let mid = (values.len() - 1) / 2;
    let (_, m, _) = values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
    *m
}

/// Smaller eigenvalue of a symmetric 2x2 matrix
pub fn min_eigenvalue(m: &Matrix2d) -> f64 {
    let a = m[(0, 0)];
    let b = m[(0, 1)];
    let c = m[(1, 1)];
    0.5 * (a + c) - (0.5 * (a - c)).hypot(b)
}
