use sc_core::{ClassBit, ClassMask, Error, ImageView, LabelFrame, Rgb8, Shift, vote_thresholds};

use crate::block::{assert_block_shape, copy_flipped, top_down_row};

/// Channel of the label render that carries the class bitmask. The other
/// two channels are ignored.
pub const LABEL_CHANNEL: usize = 2;

#[inline]
pub fn decode_label(px: Rgb8) -> ClassMask {
    ClassMask::from_bits(px[LABEL_CHANNEL])
}

/// Reduces a label render (class bits in the blue channel) by per-bit
/// voting over each block.
///
/// Bit `i` survives when at least `ClassBit(i).vote_rule().threshold(n)` of
/// the block's `n` samples carry it. A pixel is valid iff any bit survives.
/// With `shift == 0` the bitmask is copied and every pixel is valid.
pub fn reduce_labels(src: &ImageView<'_, Rgb8>, shift: Shift) -> Result<LabelFrame, Error> {
    let out = src.resolution().reduced(shift)?;
    let mut dst = LabelFrame::new(out);
    reduce_labels_into(src, shift, &mut dst);
    Ok(dst)
}

/// Like [`reduce_labels`], writing into a caller-owned frame.
///
/// # Panics
/// If `dst` is not the block-reduced size of `src`.
pub fn reduce_labels_into(src: &ImageView<'_, Rgb8>, shift: Shift, dst: &mut LabelFrame) {
    assert_block_shape(src.resolution(), shift, dst.values.resolution());
    assert_eq!(
        dst.values.resolution(),
        dst.mask.resolution(),
        "label values and mask must share a resolution"
    );

    if shift.is_none() {
        copy_flipped(src, &mut dst.values, decode_label);
        dst.mask.data_mut().fill(1);
        return;
    }

    let side = shift.block_side();
    let thresholds = vote_thresholds(shift);
    // Up to 256 samples per block, so counts need u16.
    let mut counts = vec![[0u16; 8]; dst.values.width()];

    for dy in 0..dst.values.height() {
        counts.fill([0; 8]);
        for sub in 0..side {
            let src_row = top_down_row(src, dy * side + sub);
            for (block, count) in src_row.chunks_exact(side).zip(counts.iter_mut()) {
                for &px in block {
                    let bits = px[LABEL_CHANNEL];
                    for (i, c) in count.iter_mut().enumerate() {
                        *c += u16::from((bits >> i) & 1);
                    }
                }
            }
        }

        let values = dst.values.row_mut(dy);
        let mask = dst.mask.row_mut(dy);
        for ((value, valid), count) in values.iter_mut().zip(mask.iter_mut()).zip(&counts) {
            *value = ClassBit::ALL
                .into_iter()
                .filter(|b| {
                    let i = usize::from(b.index());
                    usize::from(count[i]) >= thresholds[i]
                })
                .collect();
            *valid = u8::from(!value.is_empty());
        }
    }
}
