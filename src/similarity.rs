use crate::image::ImageView;

/// Normalized cross-correlation of two single-channel patches of equal size,
/// in [-1, 1]. A patch without any intensity variation correlates with
/// nothing and scores 0.
pub fn normalized_cross_correlation(r0: &ImageView, r1: &ImageView) -> f64 {
    assert!(r0.channels == 1 && r1.channels == 1, "patches must be single channel");
    assert!(
        r0.width == r1.width && r0.height == r1.height,
        "patch sizes differ: {} x {} and {} x {}",
        r0.width,
        r0.height,
        r1.width,
        r1.height
    );
    let n = (r0.width * r0.height) as f64;
    let mut sum0 = 0u32;
    let mut sum1 = 0u32;
    for y in 0..r0.height {
        for x in 0..r0.width {
            sum0 += r0.value(x, y) as u32;
            sum1 += r1.value(x, y) as u32;
        }
    }
    let mr0 = sum0 as f64 / n;
    let mr1 = sum1 as f64 / n;
    let mut r0r1 = 0.;
    let mut r0r0 = 0.;
    let mut r1r1 = 0.;
    for y in 0..r0.height {
        for x in 0..r0.width {
            let r0f = r0.value(x, y) as f64 - mr0;
            let r1f = r1.value(x, y) as f64 - mr1;
            r0r1 += r0f * r1f;
            r0r0 += r0f * r0f;
            r1r1 += r1f * r1f;
        }
    }
    let denominator = (r0r0 * r1r1).sqrt();
    if denominator == 0. {
        return 0.;
    }
    r0r1 / denominator
}
