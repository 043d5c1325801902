use bytemuck::Pod;

use crate::{Error, Resolution};

/// Interleaved 8-bit RGB pixel, as read back from a color render target.
pub type Rgb8 = [u8; 3];

#[derive(Debug, Clone, PartialEq)]
pub struct Image<T> {
    width: usize,
    height: usize,
    data: Vec<T>,
}

impl<T> Image<T> {
    pub fn from_vec(width: usize, height: usize, data: Vec<T>) -> Result<Self, Error> {
        let expected = width.checked_mul(height).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;

        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    pub fn row(&self, y: usize) -> &[T] {
        assert!(y < self.height, "row index out of bounds");
        &self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        assert!(y < self.height, "row index out of bounds");
        &mut self.data[y * self.width..(y + 1) * self.width]
    }

    pub fn as_view(&self) -> ImageView<'_, T> {
        ImageView {
            width: self.width,
            height: self.height,
            stride: self.width,
            data: &self.data,
        }
    }
}

impl<T: Clone> Image<T> {
    pub fn new_fill(width: usize, height: usize, value: T) -> Self {
        let len = width.checked_mul(height).expect("image size overflow");
        Self {
            width,
            height,
            data: vec![value; len],
        }
    }

    /// Resizes to `res` if needed, keeping the allocation when possible.
    /// Contents are unspecified afterwards.
    pub fn ensure(&mut self, res: Resolution, value: T) {
        if self.width != res.width || self.height != res.height {
            self.width = res.width;
            self.height = res.height;
            self.data.clear();
            self.data.resize(res.pixel_count(), value);
        }
    }
}

impl<T: Pod> Image<T> {
    /// Raw bytes of the tightly packed pixel data.
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }
}

/// Borrowed, read-only view over a row-major pixel buffer.
///
/// `stride` is in elements and may exceed `width` for padded rows.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a, T> {
    width: usize,
    height: usize,
    stride: usize,
    data: &'a [T],
}

impl<'a, T> ImageView<'a, T> {
    pub fn from_slice(
        width: usize,
        height: usize,
        stride: usize,
        data: &'a [T],
    ) -> Result<Self, Error> {
        if stride < width {
            return Err(Error::InvalidStride);
        }

        let min_len = min_required_len(width, height, stride).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;

        if data.len() < min_len {
            return Err(Error::SizeMismatch {
                expected: min_len,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Tightly packed view; the slice length must equal `width * height`.
    pub fn from_packed(width: usize, height: usize, data: &'a [T]) -> Result<Self, Error> {
        let expected = width.checked_mul(height).ok_or(Error::SizeMismatch {
            expected: usize::MAX,
            actual: data.len(),
        })?;
        if data.len() != expected {
            return Err(Error::SizeMismatch {
                expected,
                actual: data.len(),
            });
        }
        Self::from_slice(width, height, width, data)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn row(&self, y: usize) -> &'a [T] {
        assert!(y < self.height, "row index out of bounds");
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    pub fn subview(
        &self,
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    ) -> Result<ImageView<'a, T>, Error> {
        if x > self.width
            || y > self.height
            || width > (self.width - x)
            || height > (self.height - y)
        {
            return Err(Error::OutOfBounds);
        }

        let start = y
            .checked_mul(self.stride)
            .and_then(|v| v.checked_add(x))
            .ok_or(Error::OutOfBounds)?;
        let min_len = min_required_len(width, height, self.stride).ok_or(Error::OutOfBounds)?;
        let tail = self.data.get(start..).ok_or(Error::OutOfBounds)?;

        if tail.len() < min_len {
            return Err(Error::OutOfBounds);
        }

        Ok(ImageView {
            width,
            height,
            stride: self.stride,
            data: tail,
        })
    }

    pub fn is_contiguous(&self) -> bool {
        self.stride == self.width
    }
}

impl<'a> ImageView<'a, Rgb8> {
    /// Interprets a `glReadPixels(GL_RGB, GL_UNSIGNED_BYTE)` style byte
    /// buffer as an RGB view. The byte length must be exactly
    /// `3 * width * height`.
    pub fn from_rgb_bytes(width: usize, height: usize, bytes: &'a [u8]) -> Result<Self, Error> {
        if !bytes.len().is_multiple_of(3) {
            let expected = width
                .checked_mul(height)
                .and_then(|n| n.checked_mul(3))
                .unwrap_or(usize::MAX);
            return Err(Error::SizeMismatch {
                expected,
                actual: bytes.len(),
            });
        }
        let pixels: &[Rgb8] = bytemuck::cast_slice(bytes);
        Self::from_packed(width, height, pixels)
    }
}

fn min_required_len(width: usize, height: usize, stride: usize) -> Option<usize> {
    if width == 0 || height == 0 {
        return Some(0);
    }

    let rows_before_last = height.checked_sub(1)?;
    let base = rows_before_last.checked_mul(stride)?;
    base.checked_add(width)
}

#[cfg(test)]
mod tests {
    use super::{Image, ImageView, Rgb8};
    use crate::{Error, Resolution};

    #[test]
    fn view_indexing_with_stride() {
        let data = vec![1u8, 2, 3, 99, 4, 5, 6, 88];
        let view = ImageView::from_slice(3, 2, 4, &data).expect("valid view");

        assert_eq!(view.row(0), &[1, 2, 3]);
        assert_eq!(view.row(1), &[4, 5, 6]);
        assert!(!view.is_contiguous());
    }

    #[test]
    fn subview_non_contiguous_parent() {
        let data = vec![
            10u8, 11, 12, 13, 99, // row 0
            20, 21, 22, 23, 98, // row 1
            30, 31, 32, 33, 97, // row 2
        ];
        let parent = ImageView::from_slice(4, 3, 5, &data).expect("valid parent");
        let sub = parent.subview(1, 1, 3, 2).expect("valid subview");

        assert_eq!(sub.resolution(), Resolution::new(3, 2));
        assert_eq!(sub.stride(), 5);
        assert_eq!(sub.row(0), &[21, 22, 23]);
        assert_eq!(sub.row(1), &[31, 32, 33]);
    }

    #[test]
    fn packed_view_rejects_short_and_long_buffers() {
        let data = vec![0.5f32; 5];
        assert_eq!(
            ImageView::from_packed(2, 2, &data).map(|v| v.width()),
            Err(Error::SizeMismatch {
                expected: 4,
                actual: 5
            })
        );
        assert!(ImageView::from_packed(2, 2, &data[..4]).is_ok());
    }

    #[test]
    fn rgb_bytes_are_grouped_per_pixel() {
        let bytes = [1u8, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12];
        let view = ImageView::from_rgb_bytes(2, 2, &bytes).expect("valid rgb view");
        assert_eq!(view.row(1), &[[7, 8, 9], [10, 11, 12]]);

        assert!(ImageView::from_rgb_bytes(2, 2, &bytes[..11]).is_err());
        assert!(ImageView::from_rgb_bytes(2, 1, &bytes).is_err());
    }

    #[test]
    fn rgb_bytes_size_error_saturates_on_overflow() {
        let bytes = [0u8; 4];
        assert!(matches!(
            ImageView::from_rgb_bytes(usize::MAX, 2, &bytes),
            Err(Error::SizeMismatch {
                expected: usize::MAX,
                actual: 4,
            })
        ));
    }

    #[test]
    fn image_bytes_are_tightly_packed() {
        let img: Image<Rgb8> =
            Image::from_vec(2, 1, vec![[1, 2, 3], [4, 5, 6]]).expect("valid image");
        assert_eq!(img.as_bytes(), &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn ensure_reallocates_only_on_resize() {
        let mut img = Image::new_fill(2, 2, 7u8);
        img.ensure(Resolution::new(2, 2), 0);
        assert_eq!(img.data(), &[7, 7, 7, 7]);

        img.ensure(Resolution::new(3, 1), 0);
        assert_eq!(img.resolution(), Resolution::new(3, 1));
        assert_eq!(img.data(), &[0, 0, 0]);
    }
}
