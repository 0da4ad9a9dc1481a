use crate::image::ImageView;
use crate::pyramid::Pyramid;

#[derive(Debug)]
pub struct PyramidFrame<'a> {
    /// original image
    pub image: ImageView<'a>,
    /// downsized images
    pub pyramid: Pyramid,
}

impl<'a> PyramidFrame<'a> {
    pub fn new(image: ImageView<'a>, level_count: usize) -> Self {
        let mut pyramid = Pyramid::empty();
        pyramid.compute(&image, level_count);
        PyramidFrame { image, pyramid }
    }

    /// Number of levels above the original image
    pub fn level_count(&self) -> usize {
        self.pyramid.levels.len()
    }

    pub fn get_image_at_level(&self, level: usize) -> ImageView<'_> {
        if level == 0 {
            self.image
        } else {
            self.pyramid.levels[level - 1].view()
        }
    }
}
