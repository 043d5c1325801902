use serde::{Deserialize, Serialize};

use sc_core::{DepthFrame, Error, ImageView, Shift};

use crate::block::{assert_block_shape, copy_flipped, top_down_row};

/// Camera near/far planes, in scene units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipPlanes {
    pub near: f32,
    pub far: f32,
}

impl Default for ClipPlanes {
    fn default() -> Self {
        Self {
            near: 0.1,
            far: 100.0,
        }
    }
}

impl ClipPlanes {
    pub fn new(near: f32, far: f32) -> Result<Self, Error> {
        let planes = Self { near, far };
        planes.validate()?;
        Ok(planes)
    }

    /// Requires finite `0 < near < far`.
    pub fn validate(&self) -> Result<(), Error> {
        let ok = self.near.is_finite()
            && self.far.is_finite()
            && 0.0 < self.near
            && self.near < self.far;
        if !ok {
            return Err(Error::InvalidClipPlanes {
                near: self.near,
                far: self.far,
            });
        }
        Ok(())
    }

    /// Maps a perspective depth-buffer sample `z` in `[0, 1]` to linear
    /// distance normalized over `[near, far]`.
    pub fn linearize(&self, z: f32) -> f32 {
        let (n, f) = (self.near, self.far);
        let eye = n * f / (f - z * (f - n));
        (eye - n) / (f - n)
    }
}

/// How the renderer encoded the samples of the depth render target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthEncoding {
    /// Already linear, `0` at the near plane and `1` at the far plane.
    #[default]
    Normalized,
    /// Raw perspective depth buffer; linearized with the clip planes first.
    Hardware,
}

/// Affine remap `max(min_value, (mean - offset) * scale)`.
///
/// The defaults stretch the `[0.9, 1.0]` band, where a manipulator works with
/// the reference camera optics, over `[-1, 1]`. They are tuned for that
/// near/far/fov regime and are not a general law.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthRemap {
    pub offset: f64,
    pub scale: f64,
    pub min_value: f64,
}

impl Default for DepthRemap {
    fn default() -> Self {
        Self {
            offset: 0.9,
            scale: 10.0,
            min_value: -1.0,
        }
    }
}

impl DepthRemap {
    /// Mean depth at or below which the output sits at `min_value`.
    pub fn floor_mean(&self) -> f64 {
        self.offset + self.min_value / self.scale
    }

    pub fn apply(&self, mean: f64) -> f32 {
        // Samples are f32, so the clamp boundary is matched at f32 precision.
        if mean as f32 <= self.floor_mean() as f32 {
            return self.min_value as f32;
        }
        ((mean - self.offset) * self.scale).max(self.min_value) as f32
    }
}

/// Block acceptance test for oversampled depth.
///
/// High variance means the block straddles a silhouette; a large remapped
/// value means background close to the far plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthValidity {
    pub max_variance: f32,
    pub max_value: f32,
}

impl Default for DepthValidity {
    fn default() -> Self {
        Self {
            max_variance: 2e-6,
            max_value: 0.9,
        }
    }
}

impl DepthValidity {
    pub fn accepts(&self, variance: f32, value: f32) -> bool {
        variance < self.max_variance && value < self.max_value
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepthPolicy {
    pub encoding: DepthEncoding,
    pub remap: DepthRemap,
    pub validity: DepthValidity,
}

/// Reduces an oversampled depth render into remapped values and a validity
/// mask.
///
/// With `shift == 0` there is nothing to measure variance over: every pixel
/// is remapped and marked valid.
pub fn reduce_depth(
    src: &ImageView<'_, f32>,
    shift: Shift,
    planes: ClipPlanes,
    policy: &DepthPolicy,
) -> Result<DepthFrame, Error> {
    planes.validate()?;
    let out = src.resolution().reduced(shift)?;
    let mut dst = DepthFrame::new(out);
    reduce_depth_into(src, shift, planes, policy, &mut dst);
    Ok(dst)
}

/// Like [`reduce_depth`], writing into a caller-owned frame.
///
/// # Panics
/// If `dst` is not the block-reduced size of `src`.
pub fn reduce_depth_into(
    src: &ImageView<'_, f32>,
    shift: Shift,
    planes: ClipPlanes,
    policy: &DepthPolicy,
    dst: &mut DepthFrame,
) {
    assert_block_shape(src.resolution(), shift, dst.values.resolution());
    assert_eq!(
        dst.values.resolution(),
        dst.mask.resolution(),
        "depth values and mask must share a resolution"
    );

    let sample = |z: f32| match policy.encoding {
        DepthEncoding::Normalized => z,
        DepthEncoding::Hardware => planes.linearize(z),
    };

    if shift.is_none() {
        copy_flipped(src, &mut dst.values, |z| policy.remap.apply(f64::from(sample(z))));
        dst.mask.data_mut().fill(1);
        return;
    }

    let side = shift.block_side();
    let inv_n = 1.0 / shift.samples_per_block() as f64;
    let width = dst.values.width();
    // f64 keeps `sum_sq / n - mean^2` meaningful at the 1e-6 scale.
    let mut sum = vec![0.0f64; width];
    let mut sum_sq = vec![0.0f64; width];

    for dy in 0..dst.values.height() {
        sum.fill(0.0);
        sum_sq.fill(0.0);
        for sub in 0..side {
            let src_row = top_down_row(src, dy * side + sub);
            for ((block, s), s2) in src_row
                .chunks_exact(side)
                .zip(sum.iter_mut())
                .zip(sum_sq.iter_mut())
            {
                for &z in block {
                    let d = f64::from(sample(z));
                    *s += d;
                    *s2 += d * d;
                }
            }
        }

        let values = dst.values.row_mut(dy);
        let mask = dst.mask.row_mut(dy);
        for (x, (value, valid)) in values.iter_mut().zip(mask.iter_mut()).enumerate() {
            let mean = sum[x] * inv_n;
            let variance = (sum_sq[x] * inv_n - mean * mean) as f32;
            *value = policy.remap.apply(mean);
            *valid = u8::from(policy.validity.accepts(variance, *value));
        }
    }
}
