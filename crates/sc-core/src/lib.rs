//! Foundational types for simulated camera capture.
//!
//! ## Buffers and Stride
//! Images use element stride (not byte stride). `stride` is the distance, in
//! elements, between adjacent row starts and may be greater than `width`.
//! Render-target views are read with row 0 at the *bottom* of the picture
//! (OpenGL read-back order); every output frame has row 0 at the top.
//!
//! ## Shift Factors
//! A [`Shift`] `k` means the render target is `2^k` times larger than the
//! output along each axis, so every output pixel summarizes a `2^k x 2^k`
//! block of `2^(2k)` samples.
//!
//! ## Class Bitmasks
//! Up to eight non-exclusive semantic classes are packed into one byte
//! ([`ClassMask`]). The label render pass writes that byte into the blue
//! channel. Each [`ClassBit`] carries the [`VoteRule`] used when blocks are
//! reduced.

mod class;
mod error;
mod frame;
mod image;
mod shift;

pub use class::{ClassBit, ClassMask, VoteRule, vote_thresholds};
pub use error::Error;
pub use frame::{DepthFrame, LabelFrame, RgbFrame, new_rgb_frame};
pub use image::{Image, ImageView, Rgb8};
pub use shift::{MAX_SHIFT, Resolution, Shift};
