use log::debug;

use crate::bbox::{BoundingBox, Rect, Size};
use crate::config::TldParams;

/// Sliding windows around a reference box, split by their overlap with it
#[derive(Clone, Debug, Default)]
pub struct Candidates {
    /// Admissible window sizes, indexed by scale id
    pub scales: Vec<Size>,
    /// Windows overlapping the reference by more than `include_overlap`
    pub good: Vec<BoundingBox>,
    /// Windows overlapping the reference by less than `exclude_overlap`
    pub bad: Vec<BoundingBox>,
    /// The first good window with the highest overlap
    pub best: Option<BoundingBox>,
}

/// Enumerate windows scale by scale, rows then columns
pub fn generate(image_size: Size, rect: Rect, params: &TldParams) -> Candidates {
    let image_width = image_size.width as i32;
    let image_height = image_size.height as i32;
    let mut candidates = Candidates::default();
    let mut max_overlap = f64::NEG_INFINITY;

    for factor in &params.scales {
        let width = (rect.width as f64 * factor + 0.5) as i32;
        let height = (rect.height as f64 * factor + 0.5) as i32;
        let min_side = i32::min(width, height);
        if min_side <= 0
            || min_side < params.min_win as i32
            || width > image_width
            || height > image_height
        {
            continue;
        }
        candidates.scales.push(Size::new(width as usize, height as usize));
        let scale = candidates.scales.len() - 1;
        let step = params.shift * min_side as f64;

        let mut y = 0.;
        while y < (image_height - height) as f64 {
            let mut x = 0.;
            while x < (image_width - width) as f64 {
                let window = BoundingBox {
                    scale,
                    rect: Rect::new((x + 0.5) as i32, (y + 0.5) as i32, width, height),
                };
                let overlap = window.rect.overlap(&rect);
                if overlap > params.include_overlap {
                    if overlap > max_overlap {
                        max_overlap = overlap;
                        candidates.best = Some(window);
                    }
                    candidates.good.push(window);
                } else if overlap < params.exclude_overlap {
                    candidates.bad.push(window);
                }
                x += step;
            }
            y += step;
        }
    }

    debug!(
        "{} scales, {} good and {} bad windows around {:?}",
        candidates.scales.len(),
        candidates.good.len(),
        candidates.bad.len(),
        rect
    );
    candidates
}
