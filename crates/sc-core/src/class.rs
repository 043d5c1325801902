use core::fmt;
use core::ops::{BitAnd, BitOr, BitOrAssign};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::{Error, Shift};

/// Index of one semantic class bit, `0..=7`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ClassBit(u8);

impl ClassBit {
    pub const FLOOR: Self = Self(0);
    pub const WALL: Self = Self(1);
    pub const MYSELF: Self = Self(2);
    pub const FURNITURE: Self = Self(3);
    pub const HANDLE: Self = Self(4);
    pub const ITEM: Self = Self(5);

    pub const ALL: [Self; 8] = [
        Self(0),
        Self(1),
        Self(2),
        Self(3),
        Self(4),
        Self(5),
        Self(6),
        Self(7),
    ];

    pub fn new(index: u8) -> Result<Self, Error> {
        if index > 7 {
            return Err(Error::ClassBitOutOfRange(index));
        }
        Ok(Self(index))
    }

    pub fn index(self) -> u8 {
        self.0
    }

    pub fn mask(self) -> ClassMask {
        ClassMask(1 << self.0)
    }

    /// Handle and item classes are thin or small and would disappear under a
    /// unanimous vote, so they reduce with the two-thirds rule. Every other
    /// class must cover the whole block.
    pub fn vote_rule(self) -> VoteRule {
        match self {
            Self::HANDLE | Self::ITEM => VoteRule::TwoThirds,
            _ => VoteRule::Unanimous,
        }
    }
}

impl TryFrom<u8> for ClassBit {
    type Error = Error;

    fn try_from(index: u8) -> Result<Self, Self::Error> {
        Self::new(index)
    }
}

impl From<ClassBit> for u8 {
    fn from(bit: ClassBit) -> Self {
        bit.0
    }
}

/// How many samples of a block must carry a class bit for the reduced pixel
/// to carry it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteRule {
    /// All `n` samples.
    Unanimous,
    /// At least `ceil(2n / 3)` samples.
    TwoThirds,
}

impl VoteRule {
    pub fn threshold(self, samples: usize) -> usize {
        match self {
            Self::Unanimous => samples,
            Self::TwoThirds => (2 * samples).div_ceil(3),
        }
    }
}

/// Per-bit vote thresholds for one shift factor.
pub fn vote_thresholds(shift: Shift) -> [usize; 8] {
    let n = shift.samples_per_block();
    ClassBit::ALL.map(|bit| bit.vote_rule().threshold(n))
}

/// Set of present classes, one bit per [`ClassBit`].
///
/// This is the value written into the blue channel by the label render pass
/// and the per-pixel value of a reduced label frame.
#[repr(transparent)]
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ClassMask(u8);

impl ClassMask {
    pub const EMPTY: Self = Self(0);

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, bit: ClassBit) -> bool {
        self.0 & (1 << bit.0) != 0
    }

    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, bit: ClassBit) {
        self.0 |= 1 << bit.0;
    }

    pub fn with(mut self, bit: ClassBit) -> Self {
        self.insert(bit);
        self
    }

    pub fn is_floor(self) -> bool {
        self.contains(ClassBit::FLOOR)
    }

    pub fn is_wall(self) -> bool {
        self.contains(ClassBit::WALL)
    }

    pub fn is_myself(self) -> bool {
        self.contains(ClassBit::MYSELF)
    }

    pub fn is_furniture(self) -> bool {
        self.contains(ClassBit::FURNITURE)
    }

    pub fn is_handle(self) -> bool {
        self.contains(ClassBit::HANDLE)
    }

    pub fn is_item(self) -> bool {
        self.contains(ClassBit::ITEM)
    }

    pub fn iter(self) -> impl Iterator<Item = ClassBit> {
        ClassBit::ALL.into_iter().filter(move |&b| self.contains(b))
    }
}

impl FromIterator<ClassBit> for ClassMask {
    fn from_iter<I: IntoIterator<Item = ClassBit>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

impl From<ClassBit> for ClassMask {
    fn from(bit: ClassBit) -> Self {
        bit.mask()
    }
}

impl BitOr for ClassMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ClassMask {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for ClassMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl fmt::Debug for ClassMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClassMask({:#010b})", self.0)
    }
}
