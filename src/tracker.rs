use log::debug;

use crate::bbox::Rect;
use crate::config::TldParams;
use crate::feature::{FlowPoint, PointTrack};
use crate::frame::PyramidFrame;
use crate::image::{Image, ImageView};
use crate::math::median;
use crate::my_types::*;
use crate::optical_flow::PointTracker;
use crate::similarity::normalized_cross_correlation;

/// A round-tripped point with its appearance and consistency scores
#[derive(Clone, Copy, Debug)]
struct ScoredTrack {
    track: PointTrack,
    similarity: f64,
    error: f64,
}

/// Predicts where a box moves between two frames from a grid of tracked
/// points. All scratch storage lives for a single `track` call.
pub struct ShortTermTracker<F: PointTracker> {
    flow: F,
}

impl<F: PointTracker> ShortTermTracker<F> {
    pub fn new(flow: F) -> Self {
        ShortTermTracker { flow }
    }

    /// Box in `b` matching `rect` in `a`, or an empty rect when the points
    /// cannot be trusted.
    pub fn track(&mut self, a: &ImageView, b: &ImageView, rect: Rect, params: &TldParams) -> Rect {
        assert!(
            a.width == b.width && a.height == b.height,
            "frames differ in size: {} x {} and {} x {}",
            a.width,
            a.height,
            b.width,
            b.height
        );
        if rect.is_empty() {
            return Rect::empty();
        }

        let frame_a = PyramidFrame::new(*a, params.level);
        let frame_b = PyramidFrame::new(*b, params.level);

        let mut tracks = seed_grid(rect, params.grid_sparsity);
        let mut points: Vec<Vector2d> = tracks.iter().map(|t| t.source).collect();
        let mut flow_points: Vec<FlowPoint> = Vec::with_capacity(tracks.len());

        self.flow.track(&frame_a, &frame_b, &points, &mut flow_points);
        assert_eq!(flow_points.len(), tracks.len());
        for (track, flow) in tracks.iter_mut().zip(&flow_points) {
            track.forward = flow.point;
            track.forward_status = flow.status;
        }

        points.clear();
        points.extend(tracks.iter().map(|t| t.forward));
        self.flow.track(&frame_b, &frame_a, &points, &mut flow_points);
        assert_eq!(flow_points.len(), tracks.len());
        for (track, flow) in tracks.iter_mut().zip(&flow_points) {
            track.backward = flow.point;
            track.backward_status = flow.status;
        }

        let scored = score_tracks(a, b, &tracks, params.patch_size);
        let survivors = match filter_tracks(&scored, params.min_forward_backward_error) {
            Some(survivors) => survivors,
            None => return Rect::empty(),
        };

        let (dx, dy) = estimate_translation(&survivors);
        match estimate_scale(&survivors) {
            Some(ds) => Rect::new(
                round(rect.x as f64 + dx - rect.width as f64 * (ds - 1.) * 0.5),
                round(rect.y as f64 + dy - rect.height as f64 * (ds - 1.) * 0.5),
                round(rect.width as f64 * ds),
                round(rect.height as f64 * ds),
            ),
            None => Rect::new(
                round(rect.x as f64 + dx),
                round(rect.y as f64 + dy),
                rect.width,
                rect.height,
            ),
        }
    }
}

fn round(v: f64) -> i32 {
    (v + 0.5).floor() as i32
}

/// `sparsity` x `sparsity` points at the cell centers of a grid over `rect`
fn seed_grid(rect: Rect, sparsity: usize) -> Vec<PointTrack> {
    let gapx = rect.width as f64 / sparsity as f64;
    let gapy = rect.height as f64 / sparsity as f64;
    let mut tracks = Vec::with_capacity(sparsity * sparsity);
    for i in 0..sparsity {
        for j in 0..sparsity {
            tracks.push(PointTrack::new(Vector2d::new(
                rect.x as f64 + (i as f64 + 0.5) * gapx,
                rect.y as f64 + (j as f64 + 0.5) * gapy,
            )));
        }
    }
    tracks
}

/// Patch similarity and forward-backward error of every round-tripped point
fn score_tracks(a: &ImageView, b: &ImageView, tracks: &[PointTrack], patch_size: usize) -> Vec<ScoredTrack> {
    let half = (patch_size as f64 - 1.) * 0.5;
    let mut r0 = Image::new(patch_size, patch_size, 1);
    let mut r1 = Image::new(patch_size, patch_size, 1);
    let mut scored = Vec::with_capacity(tracks.len());
    for track in tracks.iter().filter(|t| t.is_tracked()) {
        a.decimal_slice_into(track.source.x - half, track.source.y - half, &mut r0);
        b.decimal_slice_into(track.forward.x - half, track.forward.y - half, &mut r1);
        scored.push(ScoredTrack {
            track: *track,
            similarity: normalized_cross_correlation(&r0.view(), &r1.view()),
            error: track.forward_backward_error(),
        });
    }
    scored
}

/// Keep the points that look alike in both frames and round-trip
/// consistently. None when nothing trustworthy remains.
fn filter_tracks(scored: &[ScoredTrack], max_error: f64) -> Option<Vec<PointTrack>> {
    if scored.is_empty() {
        debug!("no grid point survived forward-backward tracking");
        return None;
    }

    let mut scratch: Vec<f64> = scored.iter().map(|s| s.similarity).collect();
    let similarity_median = median(&mut scratch);
    let mut similar: Vec<ScoredTrack> = scored
        .iter()
        .filter(|s| s.similarity > similarity_median)
        .copied()
        .collect();
    if similar.is_empty() {
        // the upper half is tied at the median
        similar = scored
            .iter()
            .filter(|s| s.similarity >= similarity_median)
            .copied()
            .collect();
    }

    scratch.clear();
    scratch.extend(similar.iter().map(|s| s.error));
    let error_median = median(&mut scratch);
    if error_median >= max_error {
        debug!("median forward-backward error {error_median} reaches {max_error}");
        return None;
    }

    let survivors: Vec<PointTrack> = similar
        .iter()
        .filter(|s| s.error <= error_median)
        .map(|s| s.track)
        .collect();
    if survivors.is_empty() {
        debug!("no grid point below the median forward-backward error");
        return None;
    }
    Some(survivors)
}

/// Median displacement along each axis
fn estimate_translation(tracks: &[PointTrack]) -> (f64, f64) {
    let mut offsets: Vec<f64> = tracks.iter().map(|t| t.displacement().x).collect();
    let dx = median(&mut offsets);
    offsets.clear();
    offsets.extend(tracks.iter().map(|t| t.displacement().y));
    let dy = median(&mut offsets);
    (dx, dy)
}

/// Median ratio of pairwise point distances after and before. None with
/// fewer than two distinct points.
fn estimate_scale(tracks: &[PointTrack]) -> Option<f64> {
    if tracks.len() < 2 {
        return None;
    }
    let mut ratios = Vec::with_capacity(tracks.len() * (tracks.len() - 1) / 2);
    for (i, ti) in tracks.iter().enumerate() {
        for tj in &tracks[i + 1..] {
            let before = (ti.source - tj.source).norm_squared();
            if before > 0. {
                ratios.push(((ti.forward - tj.forward).norm_squared() / before).sqrt());
            }
        }
    }
    if ratios.is_empty() {
        return None;
    }
    Some(median(&mut ratios))
}
