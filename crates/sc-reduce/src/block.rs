use sc_core::{Image, ImageView, Resolution, Shift};

/// Source row holding picture row `oy`, counted from the top.
///
/// Render targets store their bottom row first, so this is where the
/// vertical flip happens for every reducer.
#[inline]
pub(crate) fn top_down_row<'a, T>(src: &ImageView<'a, T>, oy: usize) -> &'a [T] {
    src.row(src.height() - 1 - oy)
}

/// Panics unless `dst` is exactly the block-reduced size of `src`.
pub(crate) fn assert_block_shape(src: Resolution, shift: Shift, dst: Resolution) {
    let side = shift.block_side();
    assert!(
        src.width.is_multiple_of(side) && src.height.is_multiple_of(side),
        "{}x{} source does not split into {side}x{side} blocks",
        src.width,
        src.height
    );
    assert_eq!(
        dst,
        Resolution::new(src.width >> shift.get(), src.height >> shift.get()),
        "destination size must equal source size >> shift"
    );
}

/// Shift-0 path: a row-reversed copy with a per-pixel conversion.
pub(crate) fn copy_flipped<S: Copy, D>(
    src: &ImageView<'_, S>,
    dst: &mut Image<D>,
    mut convert: impl FnMut(S) -> D,
) {
    debug_assert_eq!(src.resolution(), dst.resolution());
    for y in 0..dst.height() {
        let src_row = top_down_row(src, y);
        for (out, &px) in dst.row_mut(y).iter_mut().zip(src_row) {
            *out = convert(px);
        }
    }
}
