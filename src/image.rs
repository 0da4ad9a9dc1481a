use anyhow::{bail, Result};

use crate::bbox::Rect;

/// Row-major 8-bit image storage. Rows may be padded, `step` is the distance
/// in bytes between the starts of two consecutive rows.
#[derive(Clone, Debug)]
pub struct Image {
    pub data: Vec<u8>,
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub step: usize,
}

impl Image {
    /// Create an empty image
    pub fn empty() -> Image {
        Image {
            data: vec![],
            width: 0,
            height: 0,
            channels: 1,
            step: 0,
        }
    }

    /// Zero-filled, tightly packed image
    pub fn new(width: usize, height: usize, channels: usize) -> Image {
        Image {
            data: vec![0; width * height * channels],
            width,
            height,
            channels,
            step: width * channels,
        }
    }

    pub fn from_gray(width: usize, height: usize, data: Vec<u8>) -> Image {
        assert_eq!(data.len(), width * height, "gray buffer does not match {width} x {height}");
        Image {
            data,
            width,
            height,
            channels: 1,
            step: width,
        }
    }

    /// Wrap an existing buffer, checking that every row fits
    pub fn from_raw(
        data: Vec<u8>,
        width: usize,
        height: usize,
        channels: usize,
        step: usize,
    ) -> Result<Image> {
        if channels == 0 {
            bail!("image needs at least one channel");
        }
        if step < width * channels {
            bail!("row step {step} is shorter than {width} pixels of {channels} channels");
        }
        if height > 0 && data.len() < (height - 1) * step + width * channels {
            bail!("buffer of {} bytes is too small for {width} x {height}", data.len());
        }
        Ok(Image {
            data,
            width,
            height,
            channels,
            step,
        })
    }

    pub fn view(&self) -> ImageView<'_> {
        ImageView {
            data: &self.data,
            width: self.width,
            height: self.height,
            channels: self.channels,
            step: self.step,
        }
    }

    #[inline(always)]
    pub fn value(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.step + x * self.channels]
    }

    #[inline(always)]
    pub fn set_value(&mut self, x: usize, y: usize, value: u8) {
        self.data[y * self.step + x * self.channels] = value;
    }
}

/// Borrowed, read-only window into an image buffer. Shares the row step of the
/// buffer it was cut from.
#[derive(Clone, Copy, Debug)]
pub struct ImageView<'a> {
    data: &'a [u8],
    pub width: usize,
    pub height: usize,
    pub channels: usize,
    pub step: usize,
}

impl<'a> ImageView<'a> {
    /// Zero-copy region of interest. Panics if `rect` leaves the view.
    pub fn roi(&self, rect: Rect) -> ImageView<'a> {
        assert!(
            rect.fits_in(self.width, self.height),
            "region {rect:?} outside {} x {} image",
            self.width,
            self.height
        );
        let data = if rect.is_empty() {
            &self.data[..0]
        } else {
            &self.data[rect.y as usize * self.step + rect.x as usize * self.channels..]
        };
        ImageView {
            data,
            width: rect.width as usize,
            height: rect.height as usize,
            channels: self.channels,
            step: self.step,
        }
    }

    /// First channel of the pixel at (x, y)
    #[inline(always)]
    pub fn value(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.step + x * self.channels]
    }

    #[inline(always)]
    pub fn channel_value(&self, x: usize, y: usize, channel: usize) -> u8 {
        debug_assert!(channel < self.channels);
        self.data[y * self.step + x * self.channels + channel]
    }

    /// Bilinear interpolation of the first channel. Coordinates outside the
    /// image are clamped to the border.
    pub fn bilinear(&self, x: f64, y: f64) -> f64 {
        let x = x.clamp(0., (self.width - 1) as f64);
        let y = y.clamp(0., (self.height - 1) as f64);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = usize::min(x0 + 1, self.width - 1);
        let y1 = usize::min(y0 + 1, self.height - 1);
        let ax = x - x0 as f64;
        let ay = y - y0 as f64;
        (1. - ay) * ((1. - ax) * self.value(x0, y0) as f64 + ax * self.value(x1, y0) as f64)
            + ay * ((1. - ax) * self.value(x0, y1) as f64 + ax * self.value(x1, y1) as f64)
    }

    /// Resample a `width` x `height` single-channel patch whose top-left
    /// corner sits at the fractional coordinate (x, y).
    pub fn decimal_slice(&self, x: f64, y: f64, width: usize, height: usize) -> Image {
        let mut patch = Image::new(width, height, 1);
        self.decimal_slice_into(x, y, &mut patch);
        patch
    }

    /// Same as `decimal_slice`, reusing the storage and size of `patch`
    pub fn decimal_slice_into(&self, x: f64, y: f64, patch: &mut Image) {
        assert_eq!(patch.channels, 1);
        for py in 0..patch.height {
            for px in 0..patch.width {
                let v = self.bilinear(x + px as f64, y + py as f64);
                patch.set_value(px, py, (v + 0.5) as u8);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(width: usize, height: usize) -> Image {
        let mut image = Image::new(width, height, 1);
        for y in 0..height {
            for x in 0..width {
                image.set_value(x, y, (10 * x + y) as u8);
            }
        }
        image
    }

    #[test]
    fn test_roi_keeps_step() {
        let image = ramp(8, 6);
        let roi = image.view().roi(Rect::new(2, 3, 4, 2));
        assert_eq!(roi.step, 8);
        assert_eq!((roi.width, roi.height), (4, 2));
        assert_eq!(roi.value(0, 0), image.value(2, 3));
        assert_eq!(roi.value(3, 1), image.value(5, 4));
        // nested views stay relative to their parent
        let inner = roi.roi(Rect::new(1, 1, 2, 1));
        assert_eq!(inner.value(1, 0), image.value(4, 4));
    }

    #[test]
    fn test_roi_multichannel() {
        let mut data = vec![0u8; 5 * 4 * 2];
        for y in 0..4 {
            for x in 0..5 {
                data[y * 10 + x * 2] = x as u8;
                data[y * 10 + x * 2 + 1] = y as u8;
            }
        }
        let image = Image::from_raw(data, 5, 4, 2, 10).unwrap();
        let roi = image.view().roi(Rect::new(3, 2, 2, 2));
        assert_eq!(roi.channel_value(0, 0, 0), 3);
        assert_eq!(roi.channel_value(0, 0, 1), 2);
        assert_eq!(roi.value(1, 1), 4);
    }

    #[test]
    #[should_panic]
    fn test_roi_outside() {
        let image = ramp(8, 6);
        image.view().roi(Rect::new(5, 0, 4, 2));
    }

    #[test]
    fn test_from_raw_checks_size() {
        assert!(Image::from_raw(vec![0; 10], 4, 3, 1, 4).is_err());
        assert!(Image::from_raw(vec![0; 12], 4, 3, 1, 3).is_err());
        // the last row does not need its padding
        assert!(Image::from_raw(vec![0; 14], 4, 3, 1, 5).is_ok());
    }

    #[test]
    fn test_bilinear() {
        let image = ramp(8, 6);
        let view = image.view();
        assert_eq!(view.bilinear(3., 2.), 32.);
        assert!((view.bilinear(3.5, 2.) - 37.).abs() < 1e-12);
        assert!((view.bilinear(3.5, 2.5) - 37.5).abs() < 1e-12);
        // clamped to the border
        assert_eq!(view.bilinear(-4., -1.), 0.);
        assert_eq!(view.bilinear(20., 20.), image.value(7, 5) as f64);
    }

    #[test]
    fn test_decimal_slice() {
        let image = ramp(8, 6);
        let patch = image.view().decimal_slice(1., 1., 3, 2);
        assert_eq!(patch.data, vec![11, 21, 31, 12, 22, 32]);
        let patch = image.view().decimal_slice(1.5, 1., 2, 1);
        assert_eq!(patch.data, vec![16, 26]);
    }
}
