use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use image::{GrayImage, RgbImage};
use serde::{Deserialize, Serialize};
use sensor_capture::{
    BalanceConfig, CaptureConfig, CaptureInputs, CaptureStats, ClassBit, ClassMask, Image,
    Resolution, Rgb8, SensorCapture, SensorFrame, Shift, UniformSource, XorShift64,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sc_gallery")]
#[command(about = "Run the sensor capture pipeline on a synthetic tabletop scene")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(name = "scene")]
    Scene(SceneArgs),
    #[command(name = "balance")]
    Balance(BalanceArgs),
}

#[derive(Args, Debug, Clone)]
struct CameraArgs {
    #[arg(long, default_value_t = 160)]
    width: usize,
    #[arg(long, default_value_t = 120)]
    height: usize,
    #[arg(long, default_value_t = 1)]
    rgb_shift: u32,
    #[arg(long, default_value_t = 2)]
    aux_shift: u32,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// CaptureConfig JSON; overrides the size and shift flags.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, default_value = "target/sc_gallery")]
    out: PathBuf,
}

#[derive(Args, Debug, Clone)]
struct SceneArgs {
    #[command(flatten)]
    camera: CameraArgs,
}

#[derive(Args, Debug, Clone)]
struct BalanceArgs {
    #[command(flatten)]
    camera: CameraArgs,
    #[arg(long, default_value_t = 32)]
    runs: usize,
}

#[derive(Debug, Clone, Serialize)]
struct MetaScene {
    seed: u64,
    config: CaptureConfig,
    rgb_target: [usize; 2],
    aux_target: [usize; 2],
    depth_valid: usize,
    label_valid: usize,
    stats: CaptureStats,
}

#[derive(Debug, Clone, Serialize)]
struct MetaBalance {
    first_seed: u64,
    runs: usize,
    keep_probability: f64,
    expected_drop_fraction: f64,
    mean_drop_fraction: f64,
    drop_fractions: Vec<f64>,
}

/// Render targets for one capture, rows bottom-up.
struct SceneTargets {
    rgb: Image<Rgb8>,
    depth: Image<f32>,
    labels: Image<Rgb8>,
}

impl SceneTargets {
    fn inputs(&self) -> CaptureInputs<'_> {
        CaptureInputs {
            rgb: self.rgb.as_view(),
            depth: Some(self.depth.as_view()),
            labels: Some(self.labels.as_view()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Surface {
    Floor,
    Wall,
    Crate,
    Handle,
}

const HORIZON: f32 = 0.45;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::Scene(args) => run_scene(args),
        Command::Balance(args) => run_balance(args),
    }
}

fn run_scene(args: SceneArgs) -> Result<()> {
    let camera = &args.camera;
    let cfg = load_config(camera)?;
    let case_dir = prepare_case(&camera.out, "scene")?;

    let scene = render_scene(&cfg, camera.seed);
    let mut session =
        SensorCapture::with_seed(cfg.clone(), camera.seed).context("creating capture session")?;
    let stats = session.capture(&scene.inputs()).context("capturing scene")?;
    let frame = session.frame();

    save_rgb(case_dir.join("rgb.png"), &frame.rgb)?;
    let (depth_valid, label_valid) = save_aux_channels(&case_dir, frame)?;

    let rgb_target = cfg.rgb_target();
    let aux_target = cfg.aux_target();
    write_json(
        case_dir.join("meta.json"),
        &MetaScene {
            seed: camera.seed,
            config: cfg,
            rgb_target: [rgb_target.width, rgb_target.height],
            aux_target: [aux_target.width, aux_target.height],
            depth_valid,
            label_valid,
            stats,
        },
    )?;

    tracing::info!(dir = %case_dir.display(), depth_valid, label_valid, "scene written");
    Ok(())
}

fn run_balance(args: BalanceArgs) -> Result<()> {
    if args.runs == 0 {
        bail!("--runs must be at least 1.");
    }
    let camera = &args.camera;
    let mut cfg = load_config(camera)?;
    if cfg.balance.is_none() {
        cfg.balance = Some(BalanceConfig::default());
    }
    let case_dir = prepare_case(&camera.out, "balance")?;

    let scene = render_scene(&cfg, camera.seed);
    let inputs = scene.inputs();

    let mut drop_fractions = Vec::with_capacity(args.runs);
    let mut keep_probability = 1.0;
    for run in 0..args.runs {
        let seed = camera.seed.wrapping_add(run as u64);
        let mut session =
            SensorCapture::with_seed(cfg.clone(), seed).context("creating capture session")?;
        let stats = session
            .capture(&inputs)
            .with_context(|| format!("capturing run {run}"))?;
        let outcome = stats
            .balance_outcome
            .context("balance did not run; depth and labels are both required")?;

        keep_probability = outcome.keep_probability;
        let background = outcome.counts.background();
        let fraction = if background == 0 {
            0.0
        } else {
            outcome.dropped as f64 / background as f64
        };
        drop_fractions.push(fraction);
    }

    let mean_drop_fraction = drop_fractions.iter().sum::<f64>() / drop_fractions.len() as f64;
    write_json(
        case_dir.join("balance.json"),
        &MetaBalance {
            first_seed: camera.seed,
            runs: args.runs,
            keep_probability,
            expected_drop_fraction: 1.0 - keep_probability,
            mean_drop_fraction,
            drop_fractions,
        },
    )?;

    println!(
        "mean drop fraction {:.4} over {} runs (expected {:.4})",
        mean_drop_fraction,
        args.runs,
        1.0 - keep_probability
    );
    Ok(())
}

fn load_config(camera: &CameraArgs) -> Result<CaptureConfig> {
    let cfg = match &camera.config {
        Some(path) => {
            let cfg: CaptureConfig = read_json(path)
                .with_context(|| format!("reading capture config {}", path.display()))?;
            cfg.validate()
                .with_context(|| format!("validating capture config {}", path.display()))?;
            cfg
        }
        None => {
            let rgb_shift = Shift::new(camera.rgb_shift).context("parsing --rgb-shift")?;
            let aux_shift = Shift::new(camera.aux_shift).context("parsing --aux-shift")?;
            let rgb = Resolution::new(camera.width, camera.height);
            let render = rgb.oversampled(rgb_shift);
            CaptureConfig {
                rgb,
                rgb_shift,
                aux: Resolution::new(
                    render.width >> aux_shift.get(),
                    render.height >> aux_shift.get(),
                ),
                aux_shift,
                clip: Default::default(),
                depth: Default::default(),
                balance: Some(BalanceConfig::default()),
                parallel: true,
            }
        }
    };
    if cfg.rgb.pixel_count() == 0 || cfg.aux.pixel_count() == 0 {
        bail!(
            "empty output: rgb {}x{}, aux {}x{}.",
            cfg.rgb.width,
            cfg.rgb.height,
            cfg.aux.width,
            cfg.aux.height
        );
    }
    Ok(cfg)
}

fn prepare_case(out: &Path, case_name: &str) -> Result<PathBuf> {
    let case_dir = out.join(case_name);
    fs::create_dir_all(&case_dir)
        .with_context(|| format!("creating output directory {}", case_dir.display()))?;
    Ok(case_dir)
}

fn render_scene(cfg: &CaptureConfig, seed: u64) -> SceneTargets {
    let mut rng = XorShift64::new(seed);
    let rgb = rasterize(cfg.rgb_target(), |s, _| {
        let base = surface_color(s);
        base.map(|c| jitter(c, &mut rng))
    });
    let depth = rasterize(cfg.aux_target(), surface_depth);
    let labels = rasterize(cfg.aux_target(), |s, _| [0, 0, surface_classes(s).bits()]);
    SceneTargets { rgb, depth, labels }
}

/// Samples every pixel center; `v` runs from 0 at the bottom row to 1 at the
/// top, matching render-target row order.
fn rasterize<T: Clone + Default>(
    res: Resolution,
    mut shade: impl FnMut(Surface, f32) -> T,
) -> Image<T> {
    let mut img = Image::new_fill(res.width, res.height, T::default());
    for y in 0..res.height {
        let v = (y as f32 + 0.5) / res.height as f32;
        for (x, px) in img.row_mut(y).iter_mut().enumerate() {
            let u = (x as f32 + 0.5) / res.width as f32;
            *px = shade(surface_at(u, v), v);
        }
    }
    img
}

fn surface_at(u: f32, v: f32) -> Surface {
    let on_crate = (0.30..0.56).contains(&u) && (0.12..0.52).contains(&v);
    if on_crate {
        if (0.50..0.54).contains(&u) && (0.28..0.36).contains(&v) {
            Surface::Handle
        } else {
            Surface::Crate
        }
    } else if v < HORIZON {
        Surface::Floor
    } else {
        Surface::Wall
    }
}

fn surface_color(s: Surface) -> Rgb8 {
    match s {
        Surface::Floor => [122, 98, 76],
        Surface::Wall => [212, 206, 192],
        Surface::Crate => [46, 92, 158],
        Surface::Handle => [232, 232, 228],
    }
}

/// Normalized distance. The floor recedes toward the horizon; the wall sits
/// just inside the valid range.
fn surface_depth(s: Surface, v: f32) -> f32 {
    match s {
        Surface::Floor => 0.9 + 0.08 * (v / HORIZON),
        Surface::Wall => 0.985,
        Surface::Crate => 0.915 + 0.01 * v,
        Surface::Handle => 0.912,
    }
}

fn surface_classes(s: Surface) -> ClassMask {
    match s {
        Surface::Floor => ClassBit::FLOOR.mask(),
        Surface::Wall => ClassBit::WALL.mask(),
        Surface::Crate => ClassBit::ITEM.mask(),
        Surface::Handle => ClassBit::ITEM.mask() | ClassBit::HANDLE.mask(),
    }
}

fn jitter(c: u8, rng: &mut XorShift64) -> u8 {
    let noise = (rng.next_unit() * 17.0) as i16 - 8;
    (i16::from(c) + noise).clamp(0, 255) as u8
}

fn save_rgb(path: PathBuf, frame: &Image<Rgb8>) -> Result<()> {
    let rgb = RgbImage::from_raw(
        frame.width() as u32,
        frame.height() as u32,
        frame.as_bytes().to_vec(),
    )
    .context("constructing RgbImage from frame")?;
    rgb.save(&path)
        .with_context(|| format!("saving image {}", path.display()))
}

fn save_aux_channels(case_dir: &Path, frame: &SensorFrame) -> Result<(usize, usize)> {
    let mut depth_valid = 0;
    if let Some(depth) = &frame.depth {
        let (w, h) = (depth.values.width(), depth.values.height());
        save_luma_raw(
            case_dir.join("depth.png"),
            w,
            h,
            f32_to_u8_vis(depth.values.data()),
        )?;
        save_luma_raw(case_dir.join("depth_mask.png"), w, h, mask_to_u8(depth.mask.data()))?;
        depth_valid = depth.valid_count();
    }

    let mut label_valid = 0;
    if let Some(labels) = &frame.labels {
        let (w, h) = (labels.values.width(), labels.values.height());
        let colored: Vec<u8> = labels
            .values
            .data()
            .iter()
            .flat_map(|&m| class_color(m))
            .collect();
        let img = RgbImage::from_raw(w as u32, h as u32, colored)
            .context("constructing RgbImage from labels")?;
        let path = case_dir.join("labels.png");
        img.save(&path)
            .with_context(|| format!("saving image {}", path.display()))?;
        save_luma_raw(case_dir.join("label_mask.png"), w, h, mask_to_u8(labels.mask.data()))?;
        label_valid = labels.valid_count();
    }

    Ok((depth_valid, label_valid))
}

/// Highest-priority class wins: handle over item over furniture, then
/// myself, wall, floor.
fn class_color(m: ClassMask) -> Rgb8 {
    if m.is_handle() {
        [255, 220, 0]
    } else if m.is_item() {
        [220, 40, 40]
    } else if m.is_furniture() {
        [140, 70, 200]
    } else if m.is_myself() {
        [0, 200, 200]
    } else if m.is_wall() {
        [60, 120, 220]
    } else if m.is_floor() {
        [60, 180, 60]
    } else {
        [0, 0, 0]
    }
}

fn save_luma_raw(path: PathBuf, width: usize, height: usize, data: Vec<u8>) -> Result<()> {
    let gray = GrayImage::from_raw(width as u32, height as u32, data)
        .context("constructing GrayImage from raw bytes")?;
    gray.save(&path)
        .with_context(|| format!("saving image {}", path.display()))
}

fn mask_to_u8(mask: &[u8]) -> Vec<u8> {
    mask.iter().map(|&m| if m != 0 { 255 } else { 0 }).collect()
}

fn f32_to_u8_vis(data: &[f32]) -> Vec<u8> {
    if data.is_empty() {
        return Vec::new();
    }

    let (min_v, max_v) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });

    if (max_v - min_v).abs() < 1e-12 {
        return vec![0u8; data.len()];
    }

    let scale = 255.0 / (max_v - min_v);
    data.iter()
        .map(|&v| ((v - min_v) * scale).round().clamp(0.0, 255.0) as u8)
        .collect()
}

fn write_json(path: PathBuf, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(&path, bytes).with_context(|| format!("writing json {}", path.display()))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let data = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_slice(&data).with_context(|| format!("parsing json {}", path.display()))
}
