//! Post-processing for a simulated robot camera.
//!
//! A renderer draws each channel into an oversampled render target. This
//! crate turns those targets into sensor outputs:
//!
//! - **RGB**: block-averaged color, see [`reduce_rgb`].
//! - **Depth**: remapped block mean plus a validity mask that rejects blocks
//!   straddling a depth edge or lying too far away, see [`reduce_depth`].
//! - **Labels**: per-class majority votes plus a validity mask, see
//!   [`reduce_labels`].
//!
//! [`SensorCapture`] ties the stages together, reuses output buffers across
//! captures and optionally thins out over-represented floor and wall pixels
//! with [`balance`].
//!
//! ```no_run
//! use sensor_capture::{CaptureConfig, CaptureInputs, Image, SensorCapture};
//!
//! # fn main() -> Result<(), sensor_capture::Error> {
//! let cfg = CaptureConfig::household(320, 240)?;
//! let rgb = Image::new_fill(640, 480, [0u8; 3]);
//! let mut camera = SensorCapture::with_seed(cfg, 1)?;
//! let stats = camera.capture(&CaptureInputs {
//!     rgb: rgb.as_view(),
//!     depth: None,
//!     labels: None,
//! })?;
//! println!("rgb took {:?}", stats.rgb);
//! # Ok(())
//! # }
//! ```

mod capture;

pub use capture::{
    CaptureConfig, CaptureInputs, CaptureStats, SensorCapture, SensorFrame, capture_once,
};

pub use sc_balance::{
    BalanceConfig, BalanceOutcome, ClassCounts, UniformSource, XorShift64, balance, count_classes,
};
pub use sc_core::{
    ClassBit, ClassMask, DepthFrame, Error, Image, ImageView, LabelFrame, MAX_SHIFT, Resolution,
    Rgb8, RgbFrame, Shift, VoteRule,
};
pub use sc_reduce::{
    ClipPlanes, DepthEncoding, DepthPolicy, DepthRemap, DepthValidity, LABEL_CHANNEL,
    decode_label, reduce_depth, reduce_labels, reduce_rgb,
};
