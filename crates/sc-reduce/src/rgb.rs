use sc_core::{Error, ImageView, Rgb8, RgbFrame, Shift, new_rgb_frame};

use crate::block::{assert_block_shape, copy_flipped, top_down_row};

/// Box-filters an oversampled color render down by `2^shift` per axis.
///
/// Each output channel is the block sum shifted right by `2 * shift`, i.e.
/// the mean truncated toward zero. Output rows are top-down.
pub fn reduce_rgb(src: &ImageView<'_, Rgb8>, shift: Shift) -> Result<RgbFrame, Error> {
    let out = src.resolution().reduced(shift)?;
    let mut dst = new_rgb_frame(out);
    reduce_rgb_into(src, shift, &mut dst);
    Ok(dst)
}

/// Like [`reduce_rgb`], writing into a caller-owned frame.
///
/// # Panics
/// If `dst` is not the block-reduced size of `src`.
pub fn reduce_rgb_into(src: &ImageView<'_, Rgb8>, shift: Shift, dst: &mut RgbFrame) {
    assert_block_shape(src.resolution(), shift, dst.resolution());

    if shift.is_none() {
        copy_flipped(src, dst, |px| px);
        return;
    }

    let side = shift.block_side();
    let area = shift.area_shift();
    // Worst case per channel is 2^(2 * MAX_SHIFT) * 255, which fits in u16.
    let mut acc = vec![[0u16; 3]; dst.width()];

    for dy in 0..dst.height() {
        acc.fill([0; 3]);
        for sub in 0..side {
            let src_row = top_down_row(src, dy * side + sub);
            for (block, sum) in src_row.chunks_exact(side).zip(acc.iter_mut()) {
                for px in block {
                    sum[0] += u16::from(px[0]);
                    sum[1] += u16::from(px[1]);
                    sum[2] += u16::from(px[2]);
                }
            }
        }

        for (out, sum) in dst.row_mut(dy).iter_mut().zip(&acc) {
            *out = sum.map(|c| (c >> area) as u8);
        }
    }
}

#[cfg(test)]
mod tests {
    use sc_core::{Image, MAX_SHIFT, Rgb8, Shift, new_rgb_frame};

    use super::{reduce_rgb, reduce_rgb_into};

    fn gradient(width: usize, height: usize) -> Image<Rgb8> {
        let data = (0..width * height)
            .map(|i| [(i % 251) as u8, (i * 7 % 256) as u8, (i / 3 % 256) as u8])
            .collect();
        Image::from_vec(width, height, data).expect("valid image")
    }

    #[test]
    fn shift_zero_is_a_vertical_flip() {
        let src = gradient(5, 4);
        let dst = reduce_rgb(&src.as_view(), Shift::NONE).expect("reduce");

        assert_eq!(dst.resolution(), src.resolution());
        for y in 0..4 {
            assert_eq!(dst.row(y), src.row(3 - y));
        }
    }

    #[test]
    fn uniform_blocks_reduce_exactly_for_every_shift() {
        for k in 0..=MAX_SHIFT {
            let shift = Shift::new(k).expect("valid shift");
            let side = shift.block_side();
            let src = Image::new_fill(3 * side, 2 * side, [255u8, 128, 1]);
            let dst = reduce_rgb(&src.as_view(), shift).expect("reduce");
            assert_eq!(dst.width(), 3);
            assert_eq!(dst.height(), 2);
            assert!(dst.data().iter().all(|&px| px == [255, 128, 1]), "shift {k}");
        }
    }

    #[test]
    fn four_by_four_constant_color_reduces_to_two_by_two() {
        let src = Image::new_fill(4, 4, [200u8, 100, 50]);
        let dst = reduce_rgb(&src.as_view(), Shift::new(1).expect("valid shift")).expect("reduce");
        assert_eq!(dst.data(), &[[200, 100, 50]; 4]);
    }

    #[test]
    fn blocks_are_flipped_and_averaged_with_truncation() {
        // 4x4 source, row 0 is the bottom of the picture.
        #[rustfmt::skip]
        let red = [
            10u8, 11, 90, 90, //
            12, 14, 90, 91, //
            0, 0, 255, 255, //
            0, 1, 255, 254, //
        ];
        let src = Image::from_vec(4, 4, red.iter().map(|&r| [r, 0, r / 2]).collect())
            .expect("valid image");
        let dst = reduce_rgb(&src.as_view(), Shift::new(1).expect("valid shift")).expect("reduce");

        // Top output row comes from the last two source rows.
        assert_eq!(dst.row(0), &[[0, 0, 0], [254, 0, 127]]);
        assert_eq!(dst.row(1), &[[11, 0, 5], [90, 0, 45]]);
    }

    #[test]
    fn reduce_into_matches_allocating_form() {
        let src = gradient(16, 8);
        let shift = Shift::new(2).expect("valid shift");
        let expected = reduce_rgb(&src.as_view(), shift).expect("reduce");

        let mut dst = new_rgb_frame(expected.resolution());
        reduce_rgb_into(&src.as_view(), shift, &mut dst);
        assert_eq!(dst, expected);
    }

    #[test]
    fn strided_views_are_supported() {
        let padded = gradient(6, 4);
        let view = padded.as_view().subview(0, 0, 4, 4).expect("valid subview");
        assert!(!view.is_contiguous());

        let dst = reduce_rgb(&view, Shift::new(1).expect("valid shift")).expect("reduce");
        assert_eq!(dst.resolution(), sc_core::Resolution::new(2, 2));
    }

    #[test]
    fn partial_blocks_are_an_error() {
        let src = Image::new_fill(6, 4, [0u8; 3]);
        assert!(reduce_rgb(&src.as_view(), Shift::new(2).expect("valid shift")).is_err());
    }
}
