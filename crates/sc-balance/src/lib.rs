//! Stochastic class balancing for reduced label/depth frames.
//!
//! Indoor scenes are dominated by floor and wall pixels. When background
//! pixels outnumber item pixels (plus a fixed baseline), each background
//! pixel is kept with probability `1 / ratio` and otherwise masked out of
//! both the label and the depth channel. Pixels carrying any item class are
//! never touched, so the item count is invariant.
//!
//! The pass draws from a caller-supplied [`UniformSource`]; seed it to get
//! reproducible masks.

mod rng;

use serde::{Deserialize, Serialize};

use sc_core::{ClassBit, ClassMask, Error, Image, LabelFrame};

pub use rng::{UniformSource, XorShift64};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceConfig {
    pub floor: ClassBit,
    pub wall: ClassBit,
    /// Classes a manipulator can interact with.
    pub items: ClassMask,
    /// Item pixels assumed visible even when none are, so the ratio stays
    /// finite and mild for small items. 50 is about 1% of an 80x64 frame.
    pub item_baseline: f64,
}

impl Default for BalanceConfig {
    fn default() -> Self {
        Self {
            floor: ClassBit::FLOOR,
            wall: ClassBit::WALL,
            items: ClassBit::FURNITURE.mask() | ClassBit::HANDLE.mask() | ClassBit::ITEM.mask(),
            item_baseline: 50.0,
        }
    }
}

impl BalanceConfig {
    pub fn background(&self) -> ClassMask {
        self.floor.mask() | self.wall.mask()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if !(self.item_baseline.is_finite() && self.item_baseline > 0.0) {
            return Err(Error::InvalidBaseline(self.item_baseline));
        }
        Ok(())
    }
}

/// Valid-pixel class counts. A pixel may count toward several classes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ClassCounts {
    pub floor: usize,
    pub wall: usize,
    pub items: usize,
}

impl ClassCounts {
    pub fn background(&self) -> usize {
        self.floor + self.wall
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BalanceOutcome {
    /// Counts before any pixel was dropped.
    pub counts: ClassCounts,
    pub ratio: f64,
    pub keep_probability: f64,
    pub dropped: usize,
}

/// Counts floor, wall and item pixels among those with `mask != 0`.
pub fn count_classes(
    values: &Image<ClassMask>,
    mask: &Image<u8>,
    cfg: &BalanceConfig,
) -> Result<ClassCounts, Error> {
    check_same_shape("label mask", values, mask)?;

    let mut counts = ClassCounts::default();
    for (&v, _) in values.data().iter().zip(mask.data()).filter(|(_, m)| **m != 0) {
        counts.floor += usize::from(v.contains(cfg.floor));
        counts.wall += usize::from(v.contains(cfg.wall));
        counts.items += usize::from(v.intersects(cfg.items));
    }
    Ok(counts)
}

/// Drops over-represented background pixels from `labels.mask` and
/// `depth_mask` in place.
///
/// Must run after both channels are reduced. The label values are left
/// untouched; only validity changes.
pub fn balance<R: UniformSource + ?Sized>(
    labels: &mut LabelFrame,
    depth_mask: &mut Image<u8>,
    cfg: &BalanceConfig,
    rng: &mut R,
) -> Result<BalanceOutcome, Error> {
    cfg.validate()?;
    check_same_shape("depth mask", &labels.values, depth_mask)?;

    let counts = count_classes(&labels.values, &labels.mask, cfg)?;
    let ratio = counts.background() as f64 / (counts.items as f64 + cfg.item_baseline);

    if ratio <= 1.0 {
        return Ok(BalanceOutcome {
            counts,
            ratio,
            keep_probability: 1.0,
            dropped: 0,
        });
    }

    let keep_probability = 1.0 / ratio;
    let background = cfg.background();
    let mut dropped = 0usize;

    let pixels = labels
        .values
        .data()
        .iter()
        .zip(labels.mask.data_mut())
        .zip(depth_mask.data_mut());
    for ((&v, label_valid), depth_valid) in pixels {
        if *label_valid == 0 || !v.intersects(background) || v.intersects(cfg.items) {
            continue;
        }
        if rng.next_unit() < keep_probability {
            continue;
        }
        *label_valid = 0;
        *depth_valid = 0;
        dropped += 1;
    }

    tracing::debug!(
        floor = counts.floor,
        wall = counts.wall,
        items = counts.items,
        ratio,
        dropped,
        "class balance applied"
    );

    Ok(BalanceOutcome {
        counts,
        ratio,
        keep_probability,
        dropped,
    })
}

fn check_same_shape<A, B>(what: &'static str, a: &Image<A>, b: &Image<B>) -> Result<(), Error> {
    if a.resolution() != b.resolution() {
        return Err(Error::ShapeMismatch {
            channel: what,
            expected_w: a.width(),
            expected_h: a.height(),
            actual_w: b.width(),
            actual_h: b.height(),
        });
    }
    Ok(())
}
