use serde::{Deserialize, Serialize};

use crate::Error;

/// Largest supported shift factor.
///
/// RGB blocks are summed in `u16`, so `2^(2k) * 255` must stay below
/// `u16::MAX`, which holds up to `k = 4` (256 samples per block).
pub const MAX_SHIFT: u32 = 4;

/// Supersampling factor `k`: each output pixel covers a `2^k x 2^k` block of
/// the render buffer. `k = 0` means the render already has output size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Shift(u32);

impl Shift {
    pub const NONE: Self = Self(0);

    pub fn new(k: u32) -> Result<Self, Error> {
        if k > MAX_SHIFT {
            return Err(Error::ShiftTooLarge(k));
        }
        Ok(Self(k))
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Block side length, `2^k`.
    pub fn block_side(self) -> usize {
        1 << self.0
    }

    /// Samples per block, `2^(2k)`.
    pub fn samples_per_block(self) -> usize {
        1 << (2 * self.0)
    }

    /// Right shift that divides a block sum by the sample count.
    pub fn area_shift(self) -> u32 {
        2 * self.0
    }
}

impl TryFrom<u32> for Shift {
    type Error = Error;

    fn try_from(k: u32) -> Result<Self, Self::Error> {
        Self::new(k)
    }
}

impl From<Shift> for u32 {
    fn from(shift: Shift) -> Self {
        shift.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub width: usize,
    pub height: usize,
}

impl Resolution {
    pub const fn new(width: usize, height: usize) -> Self {
        Self { width, height }
    }

    pub fn pixel_count(self) -> usize {
        self.width * self.height
    }

    /// Render-target size that reduces to `self` under `shift`.
    pub fn oversampled(self, shift: Shift) -> Self {
        Self {
            width: self.width << shift.get(),
            height: self.height << shift.get(),
        }
    }

    /// Output size for a render target of size `self`.
    ///
    /// Both dimensions must be whole multiples of the block side; partial
    /// blocks are rejected rather than dropped.
    pub fn reduced(self, shift: Shift) -> Result<Self, Error> {
        let side = shift.block_side();
        if !self.width.is_multiple_of(side) || !self.height.is_multiple_of(side) {
            return Err(Error::NonIntegerBlocks {
                width: self.width,
                height: self.height,
                side,
            });
        }
        Ok(Self {
            width: self.width >> shift.get(),
            height: self.height >> shift.get(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{MAX_SHIFT, Resolution, Shift};
    use crate::Error;

    #[test]
    fn shift_block_geometry() {
        let k2 = Shift::new(2).expect("valid shift");
        assert_eq!(k2.block_side(), 4);
        assert_eq!(k2.samples_per_block(), 16);
        assert_eq!(k2.area_shift(), 4);
        assert!(Shift::NONE.is_none());
        assert_eq!(Shift::NONE.samples_per_block(), 1);
    }

    #[test]
    fn shift_above_accumulator_limit_is_rejected() {
        assert!(Shift::new(MAX_SHIFT).is_ok());
        assert_eq!(Shift::new(MAX_SHIFT + 1), Err(Error::ShiftTooLarge(MAX_SHIFT + 1)));
    }

    #[test]
    fn oversampled_and_reduced_are_inverse() {
        let out = Resolution::new(80, 64);
        let k = Shift::new(2).expect("valid shift");
        let big = out.oversampled(k);
        assert_eq!(big, Resolution::new(320, 256));
        assert_eq!(big.reduced(k), Ok(out));
    }

    #[test]
    fn partial_blocks_are_rejected() {
        let k = Shift::new(1).expect("valid shift");
        let err = Resolution::new(5, 4).reduced(k).expect_err("odd width");
        assert_eq!(
            err,
            Error::NonIntegerBlocks {
                width: 5,
                height: 4,
                side: 2
            }
        );
    }

    #[test]
    fn shift_deserializes_with_validation() {
        let ok: Shift = serde_json::from_str("3").expect("valid shift json");
        assert_eq!(ok.get(), 3);
        assert!(serde_json::from_str::<Shift>("9").is_err());
    }
}
