use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use sc_balance::{BalanceConfig, BalanceOutcome, UniformSource, XorShift64, balance};
use sc_core::{
    DepthFrame, Error, ImageView, LabelFrame, Resolution, Rgb8, RgbFrame, Shift, new_rgb_frame,
};
use sc_reduce::{ClipPlanes, DepthPolicy, reduce_depth_into, reduce_labels_into, reduce_rgb_into};

/// Per-camera capture settings.
///
/// `rgb` and `aux` are *output* resolutions; the render targets the caller
/// supplies must be those sizes shifted left by `rgb_shift` / `aux_shift`.
/// Depth and labels share the auxiliary resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub rgb: Resolution,
    pub rgb_shift: Shift,
    pub aux: Resolution,
    pub aux_shift: Shift,
    #[serde(default)]
    pub clip: ClipPlanes,
    #[serde(default)]
    pub depth: DepthPolicy,
    /// `None` disables class balancing.
    #[serde(default)]
    pub balance: Option<BalanceConfig>,
    /// Reduce RGB concurrently with the auxiliary channels.
    #[serde(default)]
    pub parallel: bool,
}

impl CaptureConfig {
    /// Settings of the household robot camera: RGB oversampled 2x, and depth
    /// and labels at half the RGB resolution (truncated) oversampled 4x, with
    /// balancing on. For even sizes all three channels share one render size.
    pub fn household(width: usize, height: usize) -> Result<Self, Error> {
        let rgb_shift = Shift::new(1)?;
        let aux_shift = Shift::new(2)?;
        let rgb = Resolution::new(width, height);
        let aux = Resolution::new(
            (width << rgb_shift.get()) >> aux_shift.get(),
            (height << rgb_shift.get()) >> aux_shift.get(),
        );
        Ok(Self {
            rgb,
            rgb_shift,
            aux,
            aux_shift,
            clip: ClipPlanes::default(),
            depth: DepthPolicy::default(),
            balance: Some(BalanceConfig::default()),
            parallel: false,
        })
    }

    /// Expected size of the color render target.
    pub fn rgb_target(&self) -> Resolution {
        self.rgb.oversampled(self.rgb_shift)
    }

    /// Expected size of the depth and label render targets.
    pub fn aux_target(&self) -> Resolution {
        self.aux.oversampled(self.aux_shift)
    }

    pub fn validate(&self) -> Result<(), Error> {
        self.clip.validate()?;
        if let Some(b) = &self.balance {
            b.validate()?;
        }
        Ok(())
    }
}

/// Render targets for one capture, borrowed for the duration of the call.
/// Row 0 of every view is the bottom of the picture.
#[derive(Debug, Clone, Copy)]
pub struct CaptureInputs<'a> {
    pub rgb: ImageView<'a, Rgb8>,
    pub depth: Option<ImageView<'a, f32>>,
    pub labels: Option<ImageView<'a, Rgb8>>,
}

/// Camera outputs. Channels that were not rendered are `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorFrame {
    pub rgb: RgbFrame,
    pub depth: Option<DepthFrame>,
    pub labels: Option<LabelFrame>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CaptureStats {
    pub rgb: Duration,
    pub depth: Option<Duration>,
    pub labels: Option<Duration>,
    pub balance: Option<Duration>,
    pub balance_outcome: Option<BalanceOutcome>,
}

/// A capture session: configuration, random source and reusable output
/// frames.
#[derive(Debug)]
pub struct SensorCapture<R = XorShift64> {
    config: CaptureConfig,
    rng: R,
    frame: SensorFrame,
}

impl SensorCapture<XorShift64> {
    pub fn with_seed(config: CaptureConfig, seed: u64) -> Result<Self, Error> {
        Self::new(config, XorShift64::new(seed))
    }
}

impl<R: UniformSource> SensorCapture<R> {
    pub fn new(config: CaptureConfig, rng: R) -> Result<Self, Error> {
        config.validate()?;
        let frame = SensorFrame {
            rgb: new_rgb_frame(config.rgb),
            depth: None,
            labels: None,
        };
        Ok(Self { config, rng, frame })
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Outputs of the last successful capture.
    pub fn frame(&self) -> &SensorFrame {
        &self.frame
    }

    pub fn into_frame(self) -> SensorFrame {
        self.frame
    }

    /// Reduces the supplied render targets into the session frame, then runs
    /// class balancing if it is enabled and both auxiliary channels are
    /// present.
    ///
    /// Input sizes are checked before anything is written; on error the
    /// previous frame is left as it was.
    #[tracing::instrument(
        skip_all,
        fields(depth = inputs.depth.is_some(), labels = inputs.labels.is_some())
    )]
    pub fn capture(&mut self, inputs: &CaptureInputs<'_>) -> Result<CaptureStats, Error> {
        let cfg = &self.config;
        check_target("rgb", inputs.rgb.resolution(), cfg.rgb_target())?;
        if let Some(depth) = &inputs.depth {
            check_target("depth", depth.resolution(), cfg.aux_target())?;
        }
        if let Some(labels) = &inputs.labels {
            check_target("labels", labels.resolution(), cfg.aux_target())?;
        }

        let SensorFrame { rgb, depth, labels } = &mut self.frame;
        rgb.ensure(cfg.rgb, [0; 3]);
        sync_channel(depth, inputs.depth.is_some(), cfg.aux, DepthFrame::new, DepthFrame::ensure);
        sync_channel(labels, inputs.labels.is_some(), cfg.aux, LabelFrame::new, LabelFrame::ensure);

        let mut stats = CaptureStats::default();
        let (rgb_time, (depth_time, label_time)) = if cfg.parallel {
            rayon::join(
                || reduce_rgb_timed(inputs, cfg, rgb),
                || reduce_aux_timed(inputs, cfg, depth.as_mut(), labels.as_mut()),
            )
        } else {
            (
                reduce_rgb_timed(inputs, cfg, rgb),
                reduce_aux_timed(inputs, cfg, depth.as_mut(), labels.as_mut()),
            )
        };
        stats.rgb = rgb_time;
        stats.depth = depth_time;
        stats.labels = label_time;

        match (&cfg.balance, labels.as_mut(), depth.as_mut()) {
            (Some(balance_cfg), Some(labels), Some(depth)) => {
                let t = Instant::now();
                let outcome = balance(labels, &mut depth.mask, balance_cfg, &mut self.rng)?;
                stats.balance = Some(t.elapsed());
                stats.balance_outcome = Some(outcome);
            }
            (Some(_), _, _) => {
                tracing::trace!("class balance skipped: needs both depth and labels");
            }
            (None, _, _) => {}
        }

        tracing::debug!(
            rgb_us = stats.rgb.as_micros() as u64,
            depth_us = stats.depth.map(|d| d.as_micros() as u64),
            labels_us = stats.labels.map(|d| d.as_micros() as u64),
            balance_us = stats.balance.map(|d| d.as_micros() as u64),
            "capture reduced"
        );

        Ok(stats)
    }
}

/// One-shot capture with a fresh session.
pub fn capture_once<R: UniformSource>(
    config: CaptureConfig,
    inputs: &CaptureInputs<'_>,
    rng: R,
) -> Result<(SensorFrame, CaptureStats), Error> {
    let mut session = SensorCapture::new(config, rng)?;
    let stats = session.capture(inputs)?;
    Ok((session.into_frame(), stats))
}

fn check_target(channel: &'static str, actual: Resolution, expected: Resolution) -> Result<(), Error> {
    if actual != expected {
        return Err(Error::ShapeMismatch {
            channel,
            expected_w: expected.width,
            expected_h: expected.height,
            actual_w: actual.width,
            actual_h: actual.height,
        });
    }
    Ok(())
}

fn sync_channel<F>(
    slot: &mut Option<F>,
    wanted: bool,
    res: Resolution,
    new: impl FnOnce(Resolution) -> F,
    ensure: impl FnOnce(&mut F, Resolution),
) {
    match (wanted, slot.as_mut()) {
        (false, _) => *slot = None,
        (true, Some(frame)) => ensure(frame, res),
        (true, None) => *slot = Some(new(res)),
    }
}

fn reduce_rgb_timed(inputs: &CaptureInputs<'_>, cfg: &CaptureConfig, dst: &mut RgbFrame) -> Duration {
    let t = Instant::now();
    reduce_rgb_into(&inputs.rgb, cfg.rgb_shift, dst);
    t.elapsed()
}

fn reduce_aux_timed(
    inputs: &CaptureInputs<'_>,
    cfg: &CaptureConfig,
    depth: Option<&mut DepthFrame>,
    labels: Option<&mut LabelFrame>,
) -> (Option<Duration>, Option<Duration>) {
    let depth_time = inputs.depth.as_ref().zip(depth).map(|(src, dst)| {
        let t = Instant::now();
        reduce_depth_into(src, cfg.aux_shift, cfg.clip, &cfg.depth, dst);
        t.elapsed()
    });
    let label_time = inputs.labels.as_ref().zip(labels).map(|(src, dst)| {
        let t = Instant::now();
        reduce_labels_into(src, cfg.aux_shift, dst);
        t.elapsed()
    });
    (depth_time, label_time)
}

#[cfg(test)]
mod tests {
    use sc_balance::{BalanceConfig, UniformSource};
    use sc_core::{ClassBit, ClassMask, Error, Image, Resolution, Rgb8, Shift};
    use sc_reduce::ClipPlanes;

    use super::{CaptureConfig, CaptureInputs, SensorCapture, capture_once};

    struct Constant(f64);

    impl UniformSource for Constant {
        fn next_unit(&mut self) -> f64 {
            self.0
        }
    }

    fn config(rgb: Resolution, rgb_shift: u32, aux: Resolution, aux_shift: u32) -> CaptureConfig {
        CaptureConfig {
            rgb,
            rgb_shift: Shift::new(rgb_shift).expect("valid shift"),
            aux,
            aux_shift: Shift::new(aux_shift).expect("valid shift"),
            clip: ClipPlanes::default(),
            depth: Default::default(),
            balance: None,
            parallel: false,
        }
    }

    fn label(mask: ClassMask) -> Rgb8 {
        [0, 0, mask.bits()]
    }

    /// Bottom-up label render: floor in the lower half, wall above, and an
    /// item with a handle standing on the floor near the left edge.
    fn room_labels(res: Resolution) -> Image<Rgb8> {
        let mut img = Image::new_fill(res.width, res.height, [0u8; 3]);
        for y in 0..res.height {
            for (x, px) in img.row_mut(y).iter_mut().enumerate() {
                let mut m = if y < res.height / 2 {
                    ClassMask::from(ClassBit::FLOOR)
                } else {
                    ClassMask::from(ClassBit::WALL)
                };
                if (2..6).contains(&x) && (1..5).contains(&y) {
                    m = ClassBit::ITEM.mask() | ClassBit::FURNITURE.mask();
                    if x == 5 {
                        m.insert(ClassBit::HANDLE);
                    }
                }
                *px = label(m);
            }
        }
        img
    }

    fn room_depth(res: Resolution) -> Image<f32> {
        let data = (0..res.pixel_count())
            .map(|i| 0.9 + 0.05 * ((i / res.width) as f32 / res.height as f32))
            .collect();
        Image::from_vec(res.width, res.height, data).expect("valid image")
    }

    fn room_rgb(res: Resolution) -> Image<Rgb8> {
        let data = (0..res.pixel_count())
            .map(|i| [(i % 256) as u8, (i / 7 % 256) as u8, 90])
            .collect();
        Image::from_vec(res.width, res.height, data).expect("valid image")
    }

    #[test]
    fn household_preset_reads_aux_from_the_rgb_render() {
        let cfg = CaptureConfig::household(80, 64).expect("preset");
        assert_eq!(cfg.rgb_target(), Resolution::new(160, 128));
        assert_eq!(cfg.aux, Resolution::new(40, 32));
        assert_eq!(cfg.aux_target(), cfg.rgb_target());
        assert!(cfg.balance.is_some());

        let odd = CaptureConfig::household(81, 63).expect("preset");
        assert_eq!(odd.aux, Resolution::new(40, 31));
        assert_eq!(odd.aux_target(), Resolution::new(160, 124));
    }

    #[test]
    fn rgb_and_unshifted_depth_reduce_end_to_end() {
        let cfg = config(Resolution::new(2, 2), 1, Resolution::new(2, 2), 0);
        let rgb = Image::new_fill(4, 4, [200u8, 100, 50]);
        let depth = Image::new_fill(2, 2, 0.95f32);
        let inputs = CaptureInputs {
            rgb: rgb.as_view(),
            depth: Some(depth.as_view()),
            labels: None,
        };

        let (frame, stats) = capture_once(cfg, &inputs, Constant(0.0)).expect("capture");

        assert_eq!(frame.rgb.data(), &[[200, 100, 50]; 4]);
        let depth = frame.depth.expect("depth channel");
        for &v in depth.values.data() {
            assert!((v - 0.5).abs() < 1e-5, "{v}");
        }
        assert_eq!(depth.mask.data(), &[1; 4]);
        assert!(frame.labels.is_none());
        assert!(stats.depth.is_some());
        assert!(stats.labels.is_none());
        assert!(stats.balance_outcome.is_none());
    }

    #[test]
    fn balance_drops_floor_in_both_masks() {
        let mut cfg = config(Resolution::new(2, 2), 0, Resolution::new(8, 8), 0);
        cfg.balance = Some(BalanceConfig::default());
        let rgb = Image::new_fill(2, 2, [0u8; 3]);
        let depth = Image::new_fill(8, 8, 0.92f32);
        let mut labels = Image::new_fill(8, 8, label(ClassBit::FLOOR.mask()));
        labels.row_mut(3)[3] = label(ClassBit::ITEM.mask());
        let inputs = CaptureInputs {
            rgb: rgb.as_view(),
            depth: Some(depth.as_view()),
            labels: Some(labels.as_view()),
        };

        // Every draw lands above the keep probability.
        let (frame, stats) = capture_once(cfg, &inputs, Constant(0.99)).expect("capture");

        let outcome = stats.balance_outcome.expect("balance ran");
        assert_eq!(outcome.counts.floor, 63);
        assert_eq!(outcome.counts.items, 1);
        assert_eq!(outcome.dropped, 63);

        let labels = frame.labels.expect("labels");
        let depth = frame.depth.expect("depth");
        assert_eq!(labels.valid_count(), 1);
        assert_eq!(depth.valid_count(), 1);
        // Source row 3 from the bottom is output row 4.
        assert_eq!(labels.mask.row(4)[3], 1);
        assert_eq!(depth.mask.row(4)[3], 1);
    }

    #[test]
    fn balance_is_skipped_without_depth() {
        let mut cfg = config(Resolution::new(2, 2), 0, Resolution::new(8, 8), 0);
        cfg.balance = Some(BalanceConfig::default());
        let rgb = Image::new_fill(2, 2, [0u8; 3]);
        let labels = Image::new_fill(8, 8, label(ClassBit::FLOOR.mask()));
        let inputs = CaptureInputs {
            rgb: rgb.as_view(),
            depth: None,
            labels: Some(labels.as_view()),
        };

        let (frame, stats) = capture_once(cfg, &inputs, Constant(0.99)).expect("capture");
        assert!(stats.balance_outcome.is_none());
        assert!(stats.balance.is_none());
        assert_eq!(frame.labels.expect("labels").valid_count(), 64);
    }

    #[test]
    fn wrong_target_size_is_rejected_before_writing() {
        let cfg = config(Resolution::new(2, 2), 1, Resolution::new(2, 2), 1);
        let mut session = SensorCapture::new(cfg, Constant(0.0)).expect("session");

        let rgb = Image::new_fill(4, 4, [10u8; 3]);
        let inputs = CaptureInputs {
            rgb: rgb.as_view(),
            depth: None,
            labels: None,
        };
        session.capture(&inputs).expect("capture");

        let other = Image::new_fill(4, 4, [99u8; 3]);
        let depth = Image::new_fill(8, 4, 0.5f32);
        let inputs = CaptureInputs {
            rgb: other.as_view(),
            depth: Some(depth.as_view()),
            labels: None,
        };
        let err = session.capture(&inputs).expect_err("bad depth size");
        assert_eq!(
            err,
            Error::ShapeMismatch {
                channel: "depth",
                expected_w: 4,
                expected_h: 4,
                actual_w: 8,
                actual_h: 4,
            }
        );
        assert_eq!(session.frame().rgb.data(), &[[10; 3]; 4]);
    }

    #[test]
    fn parallel_matches_serial() {
        let mut cfg = CaptureConfig::household(16, 16).expect("preset");
        let target = cfg.aux_target();
        let rgb = room_rgb(cfg.rgb_target());
        let depth = room_depth(target);
        let labels = room_labels(target);
        let inputs = CaptureInputs {
            rgb: rgb.as_view(),
            depth: Some(depth.as_view()),
            labels: Some(labels.as_view()),
        };

        let mut serial = SensorCapture::with_seed(cfg.clone(), 7).expect("session");
        let serial_stats = serial.capture(&inputs).expect("capture");

        cfg.parallel = true;
        let mut parallel = SensorCapture::with_seed(cfg, 7).expect("session");
        let parallel_stats = parallel.capture(&inputs).expect("capture");

        assert_eq!(serial.frame(), parallel.frame());
        assert_eq!(serial_stats.balance_outcome, parallel_stats.balance_outcome);
    }

    #[test]
    fn session_reuses_frames_and_drops_missing_channels() {
        let cfg = CaptureConfig::household(8, 8).expect("preset");
        let target = cfg.aux_target();
        let rgb = room_rgb(cfg.rgb_target());
        let depth = room_depth(target);
        let labels = room_labels(target);
        let mut session = SensorCapture::with_seed(cfg, 3).expect("session");

        let full = CaptureInputs {
            rgb: rgb.as_view(),
            depth: Some(depth.as_view()),
            labels: Some(labels.as_view()),
        };
        session.capture(&full).expect("capture");
        assert!(session.frame().depth.is_some());
        assert!(session.frame().labels.is_some());

        let rgb_only = CaptureInputs {
            depth: None,
            labels: None,
            ..full
        };
        let stats = session.capture(&rgb_only).expect("capture");
        assert!(session.frame().depth.is_none());
        assert!(session.frame().labels.is_none());
        assert!(stats.balance_outcome.is_none());
        assert_eq!(session.frame().rgb.resolution(), Resolution::new(8, 8));
    }

    #[test]
    fn config_from_json_uses_defaults() {
        let json = r#"{
            "rgb": { "width": 4, "height": 4 },
            "rgb_shift": 1,
            "aux": { "width": 2, "height": 2 },
            "aux_shift": 0
        }"#;
        let cfg: CaptureConfig = serde_json::from_str(json).expect("parse");
        assert_eq!(cfg.clip, ClipPlanes::default());
        assert!(cfg.balance.is_none());
        assert!(!cfg.parallel);

        let too_deep = json.replace("\"aux_shift\": 0", "\"aux_shift\": 9");
        assert!(serde_json::from_str::<CaptureConfig>(&too_deep).is_err());
    }

    #[test]
    fn invalid_clip_planes_are_rejected() {
        let mut cfg = config(Resolution::new(2, 2), 0, Resolution::new(2, 2), 0);
        cfg.clip = ClipPlanes { near: 5.0, far: 1.0 };
        assert!(matches!(
            SensorCapture::new(cfg, Constant(0.0)),
            Err(Error::InvalidClipPlanes { .. })
        ));
    }
}
