use crate::shift::MAX_SHIFT;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("out of bounds")]
    OutOfBounds,

    #[error("invalid stride")]
    InvalidStride,

    #[error("shift factor {0} exceeds the supported maximum of {max}", max = MAX_SHIFT)]
    ShiftTooLarge(u32),

    #[error("{width}x{height} buffer does not split into whole {side}x{side} blocks")]
    NonIntegerBlocks {
        width: usize,
        height: usize,
        side: usize,
    },

    #[error("class bit {0} is outside 0..=7")]
    ClassBitOutOfRange(u8),

    #[error("invalid clip planes: near={near}, far={far}")]
    InvalidClipPlanes { near: f32, far: f32 },

    #[error("{channel} buffer is {actual_w}x{actual_h}, expected {expected_w}x{expected_h}")]
    ShapeMismatch {
        channel: &'static str,
        expected_w: usize,
        expected_h: usize,
        actual_w: usize,
        actual_h: usize,
    },

    #[error("balance baseline must be positive and finite, got {0}")]
    InvalidBaseline(f64),
}
