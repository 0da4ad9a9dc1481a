use crate::image::{Image, ImageView};

#[derive(Debug)]
pub struct Pyramid {
    pub levels: Vec<Image>,
    pub parent_size: [usize; 2],
}

impl Pyramid {
    pub fn empty() -> Self {
        Self {
            levels: vec![],
            parent_size: [0; 2],
        }
    }

    pub fn compute(&mut self, frame: &ImageView, level_count: usize) {
        self.compute_levels(frame, level_count);
        self.parent_size = [frame.width, frame.height];
    }

    fn compute_levels(&mut self, frame: &ImageView, level_count: usize) {
        self.levels.truncate(level_count);
        while self.levels.len() < level_count {
            self.levels.push(Image::empty())
        }
        if level_count == 0 {
            return;
        }
        downscale(frame, &mut self.levels[0]);
        for i in 1..level_count {
            let (parents, children) = self.levels.split_at_mut(i);
            downscale(&parents[i - 1].view(), &mut children[0]);
        }
    }
}

/// downscale the parent image and store the result in child. Odd sizes round
/// up, so a level never shrinks below one pixel.
fn downscale(parent: &ImageView, child: &mut Image) {
    let w = parent.width as i32;
    let h = parent.height as i32;

    let w_half = (w + 1) / 2;
    let h_half = (h + 1) / 2;
    child.data.clear();
    child.width = w_half as usize;
    child.height = h_half as usize;
    child.channels = 1;
    child.step = w_half as usize;

    let v = |x: i32, y: i32| -> u16 {
        // prevent pixel out of bounds
        let x = x.clamp(0, w - 1);
        let y = y.clamp(0, h - 1);
        parent.value(x as usize, y as usize) as u16
    };

    for y in 0..h_half {
        let y2 = 2 * y;
        for x in 0..w_half {
            let x2 = 2 * x;
            // 1-2-1 binomial kernel in both directions
            let value = v(x2, y2) / 4
                + (v(x2 + 1, y2) + v(x2 - 1, y2) + v(x2, y2 + 1) + v(x2, y2 - 1)) / 8
                + (v(x2 + 1, y2 + 1) + v(x2 - 1, y2 - 1) + v(x2 - 1, y2 + 1) + v(x2 + 1, y2 - 1)) / 16;
            child.data.push(value as u8);
        }
    }
}
