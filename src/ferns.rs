use rand::Rng;

use crate::bbox::Size;
use crate::image::ImageView;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Label {
    Negative = 0,
    Positive = 1,
}

/// Online binary classifier over windows of an image
pub trait Classifier {
    /// Number of words `feature` writes
    fn descriptor_len(&self) -> usize;

    /// Describe `roi`, a window of scale group `scale`, into `descriptor`
    fn feature(&self, roi: &ImageView, scale: usize, descriptor: &mut [u32]);

    fn predict(&self, descriptor: &[u32]) -> f32;

    /// Move the classifier toward `label` for this descriptor
    fn correct(&mut self, descriptor: &[u32], label: Label, weight: u32);

    /// Scores above this are positive
    fn threshold(&self) -> f32;
}

/// Random fern classifier. Every fern compares `features` pixel pairs inside
/// the window and the comparison bits index a leaf holding per-label counts.
#[derive(Clone, Debug)]
pub struct Ferns {
    structs: usize,
    features: usize,
    scales: usize,
    /// Pixel pairs for every scale, fern and bit, in that order
    comparisons: Vec<[(usize, usize); 2]>,
    /// Negative and positive counts per fern and leaf
    counts: Vec<[u32; 2]>,
    posteriors: Vec<f32>,
    threshold: f32,
}

impl Ferns {
    pub fn new<R: Rng + ?Sized>(structs: usize, features: usize, sizes: &[Size], rng: &mut R) -> Ferns {
        assert!(features > 0 && features < 32, "{features} bits do not fit a leaf index");

        // Pairs are drawn once in normalized window coordinates and kept short
        // and axis aligned, then instantiated for each scale.
        let mut pairs = Vec::with_capacity(structs * features);
        for _ in 0..structs * features {
            let pair = if rng.gen::<bool>() {
                loop {
                    let (x1, x2, y) = (rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>());
                    if (x1 - x2).abs() < 0.2 {
                        break [(x1, y), (x2, y)];
                    }
                }
            } else {
                loop {
                    let (x, y1, y2) = (rng.gen::<f64>(), rng.gen::<f64>(), rng.gen::<f64>());
                    if (y1 - y2).abs() < 0.2 {
                        break [(x, y1), (x, y2)];
                    }
                }
            };
            pairs.push(pair);
        }

        let mut comparisons = Vec::with_capacity(sizes.len() * pairs.len());
        for size in sizes {
            let at = |(x, y): (f64, f64)| {
                (
                    (x * size.width as f64) as usize,
                    (y * size.height as f64) as usize,
                )
            };
            comparisons.extend(pairs.iter().map(|&[p1, p2]| [at(p1), at(p2)]));
        }

        let leaves = structs << features;
        Ferns {
            structs,
            features,
            scales: sizes.len(),
            comparisons,
            counts: vec![[0; 2]; leaves],
            posteriors: vec![0.; leaves],
            threshold: 0.5,
        }
    }

    pub fn structs(&self) -> usize {
        self.structs
    }

    pub fn scales(&self) -> usize {
        self.scales
    }

    /// Total weight every label received so far
    pub fn label_counts(&self) -> [u64; 2] {
        self.counts.iter().fold([0; 2], |acc, c| {
            [acc[0] + c[0] as u64, acc[1] + c[1] as u64]
        })
    }

    fn leaf_index(&self, fern: usize, leaf: u32) -> usize {
        debug_assert!((leaf as usize) < 1 << self.features);
        (fern << self.features) + leaf as usize
    }
}

impl Classifier for Ferns {
    fn descriptor_len(&self) -> usize {
        self.structs
    }

    fn feature(&self, roi: &ImageView, scale: usize, descriptor: &mut [u32]) {
        assert!(scale < self.scales, "scale {scale} out of {}", self.scales);
        assert!(descriptor.len() >= self.structs);
        let per_scale = self.structs * self.features;
        let comparisons = &self.comparisons[scale * per_scale..(scale + 1) * per_scale];
        for (leaf_out, fern) in descriptor.iter_mut().zip(comparisons.chunks(self.features)) {
            let mut leaf = 0u32;
            for &[(x1, y1), (x2, y2)] in fern {
                leaf = (leaf << 1) | (roi.value(x1, y1) > roi.value(x2, y2)) as u32;
            }
            *leaf_out = leaf;
        }
    }

    /// Mean positive posterior over all ferns
    fn predict(&self, descriptor: &[u32]) -> f32 {
        let sum: f32 = descriptor
            .iter()
            .take(self.structs)
            .enumerate()
            .map(|(fern, &leaf)| self.posteriors[self.leaf_index(fern, leaf)])
            .sum();
        sum / self.structs as f32
    }

    fn correct(&mut self, descriptor: &[u32], label: Label, weight: u32) {
        for (fern, &leaf) in descriptor.iter().take(self.structs).enumerate() {
            let index = self.leaf_index(fern, leaf);
            let count = &mut self.counts[index];
            count[label as usize] += weight;
            let total = count[0] + count[1];
            if total > 0 {
                self.posteriors[index] = count[1] as f32 / total as f32;
            }
        }
    }

    fn threshold(&self) -> f32 {
        self.threshold
    }
}
