use log::debug;
use rand::seq::SliceRandom;
use rand::Rng;

use crate::bbox::BoundingBox;
use crate::ferns::{Classifier, Label};
use crate::image::ImageView;

/// Describe `window` of `image` with the classifier's features
pub fn window_feature<C: Classifier + ?Sized>(
    classifier: &C,
    image: &ImageView,
    window: &BoundingBox,
    descriptor: &mut [u32],
) {
    let roi = image.roi(window.rect);
    classifier.feature(&roi, window.scale, descriptor);
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BootstrapStats {
    pub visited: usize,
    pub corrected_positive: usize,
    pub corrected_negative: usize,
}

impl BootstrapStats {
    pub fn corrections(&self) -> usize {
        self.corrected_positive + self.corrected_negative
    }
}

/// Shuffle `bad` and keep its first half, rounded up
pub fn select_negatives<'a, R: Rng + ?Sized>(bad: &'a mut [BoundingBox], rng: &mut R) -> &'a [BoundingBox] {
    bad.shuffle(rng);
    let count = (bad.len() + 1) / 2;
    &bad[..count]
}

/// Visit good and bad windows in random order and correct the classifier on
/// every window it currently gets wrong.
pub fn bootstrap<C: Classifier + ?Sized, R: Rng + ?Sized>(
    classifier: &mut C,
    image: &ImageView,
    good: &[BoundingBox],
    bad: &[BoundingBox],
    rng: &mut R,
) -> BootstrapStats {
    let mut order: Vec<usize> = (0..bad.len() + good.len()).collect();
    order.shuffle(rng);

    let mut descriptor = vec![0u32; classifier.descriptor_len()];
    let mut stats = BootstrapStats::default();
    for k in order {
        let (window, label) = if k < bad.len() {
            (&bad[k], Label::Negative)
        } else {
            (&good[k - bad.len()], Label::Positive)
        };
        window_feature(classifier, image, window, &mut descriptor);
        let score = classifier.predict(&descriptor);
        stats.visited += 1;
        match label {
            Label::Negative if score > classifier.threshold() => {
                classifier.correct(&descriptor, Label::Negative, 1);
                stats.corrected_negative += 1;
            }
            Label::Positive if score < classifier.threshold() => {
                classifier.correct(&descriptor, Label::Positive, 1);
                stats.corrected_positive += 1;
            }
            _ => {}
        }
    }

    debug!(
        "bootstrap visited {} windows, corrected {} positive and {} negative",
        stats.visited, stats.corrected_positive, stats.corrected_negative
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    use crate::bbox::{Rect, Size};
    use crate::candidates::generate;
    use crate::config::TldParams;
    use crate::ferns::Ferns;
    use crate::image::Image;

    /// Two channel image whose pixels hold their own coordinates, so a window
    /// can be recovered from the view the classifier receives.
    fn coordinate_image(width: usize, height: usize) -> Image {
        let mut data = vec![0u8; width * height * 2];
        for y in 0..height {
            for x in 0..width {
                data[(y * width + x) * 2] = x as u8;
                data[(y * width + x) * 2 + 1] = y as u8;
            }
        }
        Image::from_raw(data, width, height, 2, width * 2).unwrap()
    }

    /// Scores windows by membership in a fixed positive set
    struct Oracle {
        positives: HashSet<Rect>,
        corrections: Vec<(Rect, Label)>,
    }

    impl Classifier for Oracle {
        fn descriptor_len(&self) -> usize {
            4
        }

        fn feature(&self, roi: &ImageView, _scale: usize, descriptor: &mut [u32]) {
            descriptor[0] = roi.channel_value(0, 0, 0) as u32;
            descriptor[1] = roi.channel_value(0, 0, 1) as u32;
            descriptor[2] = roi.width as u32;
            descriptor[3] = roi.height as u32;
        }

        fn predict(&self, descriptor: &[u32]) -> f32 {
            if self.positives.contains(&to_rect(descriptor)) {
                1.
            } else {
                -1.
            }
        }

        fn correct(&mut self, descriptor: &[u32], label: Label, _weight: u32) {
            self.corrections.push((to_rect(descriptor), label));
        }

        fn threshold(&self) -> f32 {
            0.
        }
    }

    fn to_rect(descriptor: &[u32]) -> Rect {
        Rect::new(
            descriptor[0] as i32,
            descriptor[1] as i32,
            descriptor[2] as i32,
            descriptor[3] as i32,
        )
    }

    fn scene() -> (Image, Vec<BoundingBox>, Vec<BoundingBox>) {
        let image = coordinate_image(160, 120);
        let candidates = generate(Size::new(160, 120), Rect::new(50, 40, 30, 30), &TldParams::default());
        assert!(!candidates.good.is_empty());
        (image, candidates.good, candidates.bad)
    }

    #[test]
    fn test_window_feature_sees_window() {
        let image = coordinate_image(40, 30);
        let oracle = Oracle {
            positives: HashSet::new(),
            corrections: vec![],
        };
        let window = BoundingBox {
            scale: 0,
            rect: Rect::new(7, 11, 20, 15),
        };
        let mut descriptor = [0; 4];
        window_feature(&oracle, &image.view(), &window, &mut descriptor);
        assert_eq!(to_rect(&descriptor), window.rect);
    }

    #[test]
    fn test_trained_classifier_is_left_alone() {
        let (image, good, mut bad) = scene();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let negatives = select_negatives(&mut bad, &mut rng);
        let mut oracle = Oracle {
            positives: good.iter().map(|w| w.rect).collect(),
            corrections: vec![],
        };
        let stats = bootstrap(&mut oracle, &image.view(), &good, negatives, &mut rng);
        assert_eq!(stats.visited, good.len() + negatives.len());
        assert_eq!(stats.corrections(), 0);
        assert!(oracle.corrections.is_empty());
    }

    #[test]
    fn test_only_mistakes_are_corrected() {
        let (image, good, bad) = scene();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        // everything scores positive: only the negatives are mistakes
        let mut oracle = Oracle {
            positives: good.iter().chain(&bad).map(|w| w.rect).collect(),
            corrections: vec![],
        };
        let stats = bootstrap(&mut oracle, &image.view(), &good, &bad, &mut rng);
        assert_eq!(stats.corrected_negative, bad.len());
        assert_eq!(stats.corrected_positive, 0);
        assert!(oracle.corrections.iter().all(|(_, label)| *label == Label::Negative));

        let corrected: HashSet<Rect> = oracle.corrections.iter().map(|(rect, _)| *rect).collect();
        assert!(bad.iter().all(|w| corrected.contains(&w.rect)));
    }

    #[test]
    fn test_select_negatives() {
        let (_, _, mut bad) = scene();
        let total = bad.len();
        let before: HashSet<Rect> = bad.iter().map(|w| w.rect).collect();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);
        let negatives = select_negatives(&mut bad, &mut rng).to_vec();
        assert_eq!(negatives.len(), (total + 1) / 2);
        assert!(negatives.iter().all(|w| before.contains(&w.rect)));

        let mut one = [bad[0]];
        assert_eq!(select_negatives(&mut one, &mut rng).len(), 1);
        assert!(select_negatives(&mut [], &mut rng).is_empty());
    }

    #[test]
    fn test_bootstrap_trains_ferns() {
        let mut image = Image::new(160, 120, 1);
        for y in 0..120 {
            for x in 0..160 {
                image.set_value(x, y, ((x * 31 + y * 17 + x * y) % 256) as u8);
            }
        }
        let params = TldParams::default();
        let candidates = generate(Size::new(160, 120), Rect::new(50, 40, 30, 30), &params);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(params.seed);
        let mut ferns = Ferns::new(params.structs, params.features, &candidates.scales, &mut rng);
        let mut bad = candidates.bad.clone();
        let negatives = select_negatives(&mut bad, &mut rng);
        let stats = bootstrap(&mut ferns, &image.view(), &candidates.good, negatives, &mut rng);
        // an untrained fern scores 0, so the first positive is always a mistake
        assert!(stats.corrected_positive > 0);
        let counts = ferns.label_counts();
        assert_eq!(counts[1], (stats.corrected_positive * params.structs) as u64);
        assert_eq!(counts[0], (stats.corrected_negative * params.structs) as u64);
    }
}
