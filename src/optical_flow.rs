use nalgebra as na;

use crate::config::TldParams;
use crate::feature::FlowPoint;
use crate::frame::PyramidFrame;
use crate::image::ImageView;
use crate::math::min_eigenvalue;
use crate::my_types::*;

type Range = [[i16; 2]; 2];

/// Sparse point tracking between two frames
pub trait PointTracker {
    /// Follow `points` from `frame0` into `frame1`. `tracked` is overwritten
    /// with exactly one entry per input point, in input order.
    fn track(
        &mut self,
        frame0: &PyramidFrame,
        frame1: &PyramidFrame,
        points: &[Vector2d],
        tracked: &mut Vec<FlowPoint>,
    );
}

/// Pyramidal Lucas-Kanade
pub struct OpticalFlow {
    lk_iters: usize,
    lk_levels: usize,
    lk_win_size: usize,
    lk_term: f64,
    lk_min_eig: f64,
    ix: Matrixd,
    iy: Matrixd,
    it: Matrixd,
    grid: Matrixd,
}

impl OpticalFlow {
    pub fn new(params: &TldParams) -> OpticalFlow {
        let lk_win_size = params.win_size;
        OpticalFlow {
            lk_iters: params.lk_iterations,
            lk_levels: params.level,
            lk_win_size,
            lk_term: params.lk_epsilon,
            lk_min_eig: params.min_eigen,
            ix: na::DMatrix::zeros(lk_win_size, lk_win_size),
            iy: na::DMatrix::zeros(lk_win_size, lk_win_size),
            it: na::DMatrix::zeros(lk_win_size, lk_win_size),
            grid: na::DMatrix::zeros(lk_win_size + 2, lk_win_size + 2),
        }
    }

    /// Coarsest level that still holds a whole integration window
    fn usable_levels(&self, frame: &PyramidFrame) -> usize {
        let max_levels = usize::min(self.lk_levels, frame.level_count());
        let mut levels = 0;
        while levels < max_levels {
            let next = frame.get_image_at_level(levels + 1);
            if next.width < self.lk_win_size || next.height < self.lk_win_size {
                break;
            }
            levels += 1;
        }
        levels
    }

    /// ref http://robots.stanford.edu/cs223b04/algo_tracking.pdf
    fn process_feature(
        &mut self,
        pyramid_frame0: &PyramidFrame,
        pyramid_frame1: &PyramidFrame,
        point0: Vector2d,
    ) -> Option<Vector2d> {
        let lk_term2 = self.lk_term.powi(2);
        let r = (self.lk_win_size - 1) / 2;
        let levels = usize::min(
            self.usable_levels(pyramid_frame0),
            self.usable_levels(pyramid_frame1),
        );

        // displacement carried down from the coarser levels
        let mut g = Vector2d::zeros();
        let mut d = Vector2d::zeros();
        for level in (0..levels + 1).rev() {
            let level0 = pyramid_frame0.get_image_at_level(level);
            let level1 = pyramid_frame1.get_image_at_level(level);
            let mut u = point0 / u32::pow(2, level as u32) as f64;
            if level > 0 {
                // levels round their size up, the last row or column may be cut
                u = clamp_to_level(&level0, u);
            }
            let range = integration_range(&level0, u, r, 1)?;
            // compute the derivative
            scharr(
                &level0,
                u,
                range,
                &mut self.ix,
                &mut self.iy,
                &mut self.grid,
            );
            let gradient = spatial_gradient(&self.ix, &self.iy);
            let pixels = (self.ix.nrows() * self.ix.ncols()) as f64;
            if min_eigenvalue(&gradient) / (pixels * 255. * 255.) < self.lk_min_eig {
                return None;
            }
            let mut nu = Vector2d::zeros();
            for _ in 0..self.lk_iters {
                image_difference(&self.grid, &mut self.it, &level1, range, u + g + nu);
                let eta = flow_vector(&gradient, &self.ix, &self.iy, &self.it)?;
                nu += eta;
                if eta.norm_squared() < lk_term2 {
                    break;
                }
            }

            d = nu;
            if level > 0 {
                g = 2. * (g + d)
            }
        }

        let point1 = point0 + g + d;
        let image1 = pyramid_frame1.image;
        if !point1.x.is_finite()
            || !point1.y.is_finite()
            || point1.x < 0.
            || point1.y < 0.
            || point1.x > (image1.width - 1) as f64
            || point1.y > (image1.height - 1) as f64
        {
            return None;
        }
        Some(point1)
    }
}

impl PointTracker for OpticalFlow {
    fn track(
        &mut self,
        frame0: &PyramidFrame,
        frame1: &PyramidFrame,
        points: &[Vector2d],
        tracked: &mut Vec<FlowPoint>,
    ) {
        tracked.clear();
        tracked.reserve(points.len());
        for &point in points {
            tracked.push(match self.process_feature(frame0, frame1, point) {
                Some(point) => FlowPoint {
                    point,
                    status: true,
                },
                None => FlowPoint {
                    point,
                    status: false,
                },
            });
        }
    }
}

fn flow_vector(gradient: &Matrix2d, ix: &Matrixd, iy: &Matrixd, it: &Matrixd) -> Option<Vector2d> {
    let mut b = Vector2d::zeros();

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            b[0] += it[(y, x)] * ix[(y, x)];
            b[1] += it[(y, x)] * iy[(y, x)];
        }
    }

    gradient.try_inverse().map(|inv_g| inv_g * b)
}

/// it = I0 - I1 over the integration window, I1 sampled around `center`
fn image_difference(i0: &Matrixd, it: &mut Matrixd, level: &ImageView, range: Range, center: Vector2d) {
    fill_grid(level, range, center, it);
    let (rows, cols) = it.shape();
    *it *= -1.;
    *it += i0.view((1, 1), (rows, cols));
}

fn spatial_gradient(ix: &Matrixd, iy: &Matrixd) -> Matrix2d {
    assert_eq!(ix.nrows(), iy.nrows());
    assert_eq!(ix.ncols(), iy.ncols());

    let mut x2 = 0.;
    let mut y2 = 0.;
    let mut xy = 0.;

    for y in 0..iy.nrows() {
        for x in 0..ix.ncols() {
            x2 += ix[(y, x)] * ix[(y, x)];
            y2 += iy[(y, x)] * iy[(y, x)];
            xy += ix[(y, x)] * iy[(y, x)];
        }
    }

    Matrix2d::new(x2, xy, xy, y2)
}

/// ref https://theailearner.com/tag/scharr-operator/
fn scharr(
    level: &ImageView,
    center: Vector2d,
    range: Range,
    out_x: &mut Matrixd,
    out_y: &mut Matrixd,
    grid: &mut Matrixd,
) {
    let grange = [
        [range[0][0] - 1, range[0][1] + 1],
        [range[1][0] - 1, range[1][1] + 1],
    ];
    fill_grid(level, grange, center, grid);

    *out_x = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    *out_y = Matrixd::zeros(grid.nrows() - 2, grid.ncols() - 2);
    for y in 1..(grid.nrows() - 1) {
        for x in 1..(grid.ncols() - 1) {
            out_x[(y - 1, x - 1)] =
                (10. * grid[(y, x + 1)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y - 1, x + 1)]
                    - 10. * grid[(y, x - 1)]
                    - 3. * grid[(y + 1, x - 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
            out_y[(y - 1, x - 1)] =
                (10. * grid[(y + 1, x)] + 3. * grid[(y + 1, x + 1)] + 3. * grid[(y + 1, x - 1)]
                    - 10. * grid[(y - 1, x)]
                    - 3. * grid[(y - 1, x + 1)]
                    - 3. * grid[(y - 1, x - 1)])
                    / 32.;
        }
    }
}

fn fill_grid(level: &ImageView, range: Range, center: Vector2d, grid: &mut Matrixd) {
    *grid = na::DMatrix::zeros(
        (range[1][1] - range[1][0] + 1) as usize,
        (range[0][1] - range[0][0] + 1) as usize,
    );

    for (y_ind, y) in (range[1][0]..=range[1][1]).enumerate() {
        for (x_ind, x) in (range[0][0]..=range[0][1]).enumerate() {
            grid[(y_ind, x_ind)] = level.bilinear(center.x + x as f64, center.y + y as f64);
        }
    }
}

fn clamp_to_level(level: &ImageView, u: Vector2d) -> Vector2d {
    Vector2d::new(
        u.x.clamp(0., (level.width - 1) as f64),
        u.y.clamp(0., (level.height - 1) as f64),
    )
}

/// Returns closed range of integer steps that can be taken without going outside
/// the image borders. Returns None if the center point is outside the level
/// boundaries or no step fits.
fn integration_range(level: &ImageView, center: Vector2d, r: usize, padding: i16) -> Option<Range> {
    let r = r as i16;
    let mut range = [[0, 0], [0, 0]];
    for i in 0..2 {
        let s = if i == 0 { level.width } else { level.height };
        if !(center[i] >= 0.) || center[i] > (s - 1) as f64 {
            return None;
        }
        let n = center[i] as i16;
        let fract = if center[i].fract() > 0. { 1 } else { 0 };
        range[i] = [
            i16::max(-r, -n + padding),
            i16::min(r, s as i16 - n - padding - 1 - fract),
        ];
        if range[i][0] > range[i][1] {
            return None;
        }
    }
    Some(range)
}
