//! Reduced sensor outputs. All frames use a top-left origin.

use crate::{ClassMask, Image, Resolution, Rgb8};

pub type RgbFrame = Image<Rgb8>;

pub fn new_rgb_frame(res: Resolution) -> RgbFrame {
    Image::new_fill(res.width, res.height, [0; 3])
}

/// Normalized depth per pixel plus a `0`/`1` validity flag.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub values: Image<f32>,
    pub mask: Image<u8>,
}

impl DepthFrame {
    pub fn new(res: Resolution) -> Self {
        Self {
            values: Image::new_fill(res.width, res.height, 0.0),
            mask: Image::new_fill(res.width, res.height, 0),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.values.resolution()
    }

    pub fn ensure(&mut self, res: Resolution) {
        self.values.ensure(res, 0.0);
        self.mask.ensure(res, 0);
    }

    pub fn valid_count(&self) -> usize {
        count_set(&self.mask)
    }
}

/// Class bitmask per pixel plus a `0`/`1` validity flag.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelFrame {
    pub values: Image<ClassMask>,
    pub mask: Image<u8>,
}

impl LabelFrame {
    pub fn new(res: Resolution) -> Self {
        Self {
            values: Image::new_fill(res.width, res.height, ClassMask::EMPTY),
            mask: Image::new_fill(res.width, res.height, 0),
        }
    }

    pub fn resolution(&self) -> Resolution {
        self.values.resolution()
    }

    pub fn ensure(&mut self, res: Resolution) {
        self.values.ensure(res, ClassMask::EMPTY);
        self.mask.ensure(res, 0);
    }

    pub fn valid_count(&self) -> usize {
        count_set(&self.mask)
    }
}

fn count_set(mask: &Image<u8>) -> usize {
    mask.data().iter().filter(|&&m| m != 0).count()
}
