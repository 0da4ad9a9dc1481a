use anyhow::{bail, Context as AnyhowContext, Result};
use log::info;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::bbox::{Rect, Size};
use crate::bootstrap::{bootstrap, select_negatives};
use crate::candidates::generate;
use crate::config::TldParams;
use crate::ferns::Ferns;
use crate::image::{Image, ImageView};
use crate::optical_flow::OpticalFlow;
use crate::tracker::ShortTermTracker;

/// Tracking-learning-detection handle. Holds the reference box, the
/// classifier trained on the first frame and the example pools.
#[derive(Debug)]
pub struct Tld {
    params: TldParams,
    rect: Rect,
    scales: Vec<Size>,
    ferns: Ferns,
    /// Example patches for nearest-neighbour verification. They are created
    /// empty and released with the handle.
    positive: Vec<Image>,
    negative: Vec<Image>,
}

impl Tld {
    pub fn new(frame: &ImageView, rect: Rect, params: TldParams) -> Result<Tld> {
        params.validate().context("invalid tracker parameters")?;
        if rect.is_empty() {
            bail!("initial box {rect:?} is empty");
        }
        if !rect.fits_in(frame.width, frame.height) {
            bail!(
                "initial box {rect:?} is not inside the {} x {} frame",
                frame.width,
                frame.height
            );
        }

        let candidates = generate(Size::new(frame.width, frame.height), rect, &params);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
        let mut ferns = Ferns::new(params.structs, params.features, &candidates.scales, &mut rng);

        let mut bad = candidates.bad;
        let negatives = select_negatives(&mut bad, &mut rng);
        let stats = bootstrap(&mut ferns, frame, &candidates.good, negatives, &mut rng);
        info!(
            "tracking {:?} over {} scales, bootstrap corrected {} of {} windows",
            rect,
            candidates.scales.len(),
            stats.corrections(),
            stats.visited
        );

        Ok(Tld {
            params,
            rect,
            scales: candidates.scales,
            ferns,
            positive: vec![],
            negative: vec![],
        })
    }

    /// Box in `curr` following the current box in `prev`. Empty when the
    /// target is lost. The handle is left unchanged.
    pub fn track(&self, prev: &ImageView, curr: &ImageView) -> Rect {
        let mut tracker = ShortTermTracker::new(OpticalFlow::new(&self.params));
        tracker.track(prev, curr, self.rect, &self.params)
    }

    /// Replace the reference box, typically with the result of `track`
    pub fn set_box(&mut self, rect: Rect) {
        self.rect = rect;
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn params(&self) -> &TldParams {
        &self.params
    }

    /// Window sizes the classifier was built for
    pub fn scales(&self) -> &[Size] {
        &self.scales
    }

    pub fn classifier(&self) -> &Ferns {
        &self.ferns
    }

    pub fn positive_examples(&self) -> &[Image] {
        &self.positive
    }

    pub fn negative_examples(&self) -> &[Image] {
        &self.negative
    }
}
