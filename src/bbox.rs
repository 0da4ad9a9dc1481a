use std::str::FromStr;

use anyhow::{anyhow, bail};
use serde::{Deserialize, Serialize};

use crate::my_types::*;

/// Axis-aligned rectangle in integer pixels. A zero-sized rectangle means
/// tracking failed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Rect {
        Rect {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn empty() -> Rect {
        Rect::new(0, 0, 0, 0)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Edges are widened so that huge boxes cannot overflow
    pub fn right(&self) -> i64 {
        self.x as i64 + self.width as i64
    }

    pub fn bottom(&self) -> i64 {
        self.y as i64 + self.height as i64
    }

    pub fn area(&self) -> f64 {
        self.width as f64 * self.height as f64
    }

    pub fn center(&self) -> Vector2d {
        Vector2d::new(
            self.x as f64 + self.width as f64 * 0.5,
            self.y as f64 + self.height as f64 * 0.5,
        )
    }

    /// Whether the rectangle lies entirely inside a `width` x `height` image
    pub fn fits_in(&self, width: usize, height: usize) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.width >= 0
            && self.height >= 0
            && self.right() <= width as i64
            && self.bottom() <= height as i64
    }

    /// Intersection over union
    pub fn overlap(&self, other: &Rect) -> f64 {
        let iw = i64::max(i64::min(self.right(), other.right()) - i32::max(self.x, other.x) as i64, 0);
        let ih = i64::max(i64::min(self.bottom(), other.bottom()) - i32::max(self.y, other.y) as i64, 0);
        let intersection = iw as f64 * ih as f64;
        let union = self.area() + other.area() - intersection;
        if union <= 0. {
            return 0.;
        }
        intersection / union
    }
}

/// Parses `x,y,width,height`
impl FromStr for Rect {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| v.trim().parse::<i32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| anyhow!("invalid rectangle {s:?}: {err}"))?;
        if values.len() != 4 {
            bail!("rectangle {s:?} needs four comma separated values");
        }
        Ok(Rect::new(values[0], values[1], values[2], values[3]))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: usize,
    pub height: usize,
}

impl Size {
    pub const fn new(width: usize, height: usize) -> Size {
        Size { width, height }
    }
}

/// A candidate window. `scale` indexes the scale list the window was generated
/// from and selects the classifier's per-scale feature layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub scale: usize,
    pub rect: Rect,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn rect_strategy() -> impl Strategy<Value = Rect> {
        (-50..150i32, -50..150i32, 0..120i32, 0..120i32).prop_map(|(x, y, w, h)| Rect::new(x, y, w, h))
    }

    #[test]
    fn test_overlap() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.overlap(&a), 1.);
        assert_eq!(a.overlap(&Rect::new(10, 0, 10, 10)), 0.);
        assert_eq!(a.overlap(&Rect::new(30, 30, 5, 5)), 0.);
        // 50 shared pixels out of 150
        assert!((a.overlap(&Rect::new(5, 0, 10, 10)) - 1. / 3.).abs() < 1e-12);
        assert_eq!(Rect::empty().overlap(&Rect::empty()), 0.);
    }

    #[test]
    fn test_parse() {
        assert_eq!("40,40,20,20".parse::<Rect>().unwrap(), Rect::new(40, 40, 20, 20));
        assert_eq!(" 1, 2 ,3,4".parse::<Rect>().unwrap(), Rect::new(1, 2, 3, 4));
        assert!("1,2,3".parse::<Rect>().is_err());
        assert!("a,b,c,d".parse::<Rect>().is_err());
    }

    #[test]
    fn test_fits_in() {
        assert!(Rect::new(0, 0, 100, 100).fits_in(100, 100));
        assert!(!Rect::new(1, 0, 100, 100).fits_in(100, 100));
        assert!(!Rect::new(-1, 0, 10, 10).fits_in(100, 100));
        assert!(!Rect::new(i32::MAX - 5, 0, 20, 20).fits_in(100, 100));
        assert!(!Rect::new(0, i32::MAX, 10, i32::MAX).fits_in(100, 100));
    }

    #[test]
    fn test_overlap_of_huge_rects() {
        let far = Rect::new(i32::MAX - 5, i32::MAX - 5, 20, 20);
        assert_eq!(far.overlap(&Rect::new(0, 0, 10, 10)), 0.);
        assert_eq!(far.overlap(&far), 1.);
    }

    proptest! {
        #[test]
        fn overlap_is_bounded(a in rect_strategy(), b in rect_strategy()) {
            let o = a.overlap(&b);
            prop_assert!((0. ..=1.).contains(&o));
            prop_assert_eq!(o, b.overlap(&a));
        }

        #[test]
        fn overlap_with_itself_is_one(a in rect_strategy()) {
            prop_assume!(!a.is_empty());
            prop_assert_eq!(a.overlap(&a), 1.);
        }

        #[test]
        fn disjoint_rects_do_not_overlap(a in rect_strategy(), gap in 0..20i32) {
            let b = Rect::new(a.right() as i32 + gap, a.y, 10, 10);
            prop_assert_eq!(a.overlap(&b), 0.);
        }
    }
}
