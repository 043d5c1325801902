//! Block reducers from oversampled render targets to camera outputs.
//!
//! Every reducer consumes a bottom-up render-target view whose size is the
//! output size shifted left by `k` on each axis, and writes a top-down frame.
//! Each output pixel summarizes one `2^k x 2^k` block:
//!
//! - RGB: per-channel mean, truncated (`sum >> 2k`).
//! - Depth: remapped block mean, valid only for flat, non-background blocks.
//! - Labels: per-bit vote, unanimous for coarse classes and two-thirds for
//!   the fine handle/item classes; valid iff any class survives.
//!
//! Partial blocks are rejected. `k = 0` degenerates to a flipped copy with
//! every pixel valid.
//!
//! Output pixels depend only on their own block, so disjoint output rows can
//! be reduced independently.

mod block;
mod depth;
mod labels;
mod rgb;

pub use depth::{
    ClipPlanes, DepthEncoding, DepthPolicy, DepthRemap, DepthValidity, reduce_depth,
    reduce_depth_into,
};
pub use labels::{LABEL_CHANNEL, decode_label, reduce_labels, reduce_labels_into};
pub use rgb::{reduce_rgb, reduce_rgb_into};
