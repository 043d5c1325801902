//! Captures one frame of a synthetic floor-and-wall view and prints the
//! per-stage timings and validity counts.
//!
//! ```text
//! RUST_LOG=sensor_capture=debug cargo run -p sensor-capture --example capture_once -- --parallel
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use sensor_capture::{
    CaptureConfig, CaptureInputs, ClassBit, Image, Resolution, Rgb8, SensorCapture,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Run one sensor capture on a synthetic view")]
struct Args {
    #[arg(long, default_value_t = 160)]
    width: usize,
    #[arg(long, default_value_t = 120)]
    height: usize,
    #[arg(long, default_value_t = 1)]
    seed: u64,
    #[arg(long)]
    parallel: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut cfg = CaptureConfig::household(args.width, args.height)
        .context("building household config")?;
    cfg.parallel = args.parallel;

    let rgb = horizon(cfg.rgb_target(), [90, 80, 70], [200, 200, 190]);
    let aux = cfg.aux_target();
    let depth = Image::from_vec(
        aux.width,
        aux.height,
        (0..aux.pixel_count())
            .map(|i| {
                let v = (i / aux.width) as f32 / aux.height as f32;
                if v < 0.5 { 0.9 + 0.1 * v } else { 0.97 }
            })
            .collect(),
    )
    .context("building depth render")?;
    let labels = horizon(
        aux,
        [0, 0, ClassBit::FLOOR.mask().bits()],
        [0, 0, ClassBit::WALL.mask().bits()],
    );

    let mut camera = SensorCapture::with_seed(cfg, args.seed).context("creating session")?;
    let stats = camera
        .capture(&CaptureInputs {
            rgb: rgb.as_view(),
            depth: Some(depth.as_view()),
            labels: Some(labels.as_view()),
        })
        .context("capturing frame")?;

    let frame = camera.frame();
    println!("rgb     {:?} in {:?}", frame.rgb.resolution(), stats.rgb);
    if let (Some(d), Some(t)) = (&frame.depth, stats.depth) {
        println!("depth   {} valid in {:?}", d.valid_count(), t);
    }
    if let (Some(l), Some(t)) = (&frame.labels, stats.labels) {
        println!("labels  {} valid in {:?}", l.valid_count(), t);
    }
    if let Some(outcome) = stats.balance_outcome {
        println!(
            "balance ratio {:.2}, dropped {} pixels",
            outcome.ratio, outcome.dropped
        );
    }
    Ok(())
}

/// Bottom half `below`, top half `above`, in render-target row order.
fn horizon(res: Resolution, below: Rgb8, above: Rgb8) -> Image<Rgb8> {
    let mut img = Image::new_fill(res.width, res.height, above);
    for y in 0..res.height / 2 {
        img.row_mut(y).fill(below);
    }
    img
}
