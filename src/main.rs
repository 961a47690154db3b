// ============================================================================
// drapescope CLI: headless drape measurement of a segmented silhouette
// ============================================================================
//
// Usage examples:
//   drapescope measure -i drape.png --reference 412,880,530,880
//   drapescope measure -i drape.png --reference 412,880,530,880 --crop 960,540,900 --json
//   drapescope config --write
//
// Coordinates on the command line are image pixels. They are replayed as
// pointer gestures through a measurement session, exactly like a UI would.

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use drapescope::capture::segmentation::MaskSegmenter;
use drapescope::domain::{Point2D, ViewTransform};
use drapescope::session::{CropMsg, DrawAction, MeasurementOutcome, Msg};
use drapescope::{DrapeConfig, DrapeError, MeasurementSession};

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "drapescope", about = "Fabric drape coefficient measurement", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Measure the drape coefficient of a segmented drape photo
    Measure(MeasureArgs),
    /// Print the active configuration
    Config {
        /// Write the configuration file if it does not exist yet
        #[arg(long)]
        write: bool,
    },
}

#[derive(clap::Args, Debug)]
struct MeasureArgs {
    /// Photo or silhouette mask of the draped specimen
    #[arg(short, long, value_name = "FILE")]
    image: PathBuf,

    /// Reference line across the coin, in image pixels
    #[arg(long, value_name = "X1,Y1,X2,Y2", value_parser = parse_floats::<4>)]
    reference: [f64; 4],

    /// Circular crop to apply before measuring, in image pixels
    #[arg(long, value_name = "CX,CY,D", value_parser = parse_floats::<3>)]
    crop: Option<[f64; 3]>,

    /// Reference coin diameter in cm (defaults to the config value)
    #[arg(long, value_name = "CM")]
    coin_cm: Option<f64>,

    /// Support disk diameter in cm
    #[arg(long, value_name = "CM")]
    disk_cm: Option<f64>,

    /// Flat fabric diameter in cm
    #[arg(long, value_name = "CM")]
    fabric_cm: Option<f64>,

    /// Display canvas size used for the view (defaults to the image size)
    #[arg(long, value_name = "WxH", value_parser = parse_canvas)]
    canvas: Option<(f64, f64)>,

    /// Luma threshold separating fabric from background
    #[arg(long, default_value_t = 128)]
    threshold: u8,

    /// Fabric is darker than the background
    #[arg(long)]
    dark_foreground: bool,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,
}

fn parse_floats<const N: usize>(s: &str) -> Result<[f64; N], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("'{v}': {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    <[f64; N]>::try_from(values)
        .map_err(|v| format!("expected {N} comma-separated numbers, got {}", v.len()))
}

fn parse_canvas(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{s}'"))?;
    let w: f64 = w.trim().parse().map_err(|e| format!("width: {e}"))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("height: {e}"))?;
    if !(w > 0.0 && h > 0.0) {
        return Err(format!("canvas must be positive, got {w}x{h}"));
    }
    Ok((w, h))
}

/// Attach the user-facing retry hint to a domain error
fn hinted(err: DrapeError) -> anyhow::Error {
    let hint = err.retry_hint();
    anyhow::Error::new(err).context(hint)
}

fn current_view(session: &MeasurementSession) -> anyhow::Result<&ViewTransform> {
    session.view().ok_or_else(|| hinted(DrapeError::NoImage))
}

// ============================================================================
// Subcommands
// ============================================================================

async fn measure(args: MeasureArgs) -> anyhow::Result<()> {
    let mut config = DrapeConfig::load();
    if let Some(coin) = args.coin_cm {
        config.reference_diameter_cm = coin;
    }
    if let Some(disk) = args.disk_cm {
        config.disk_diameter_cm = disk;
    }
    if let Some(fabric) = args.fabric_cm {
        config.fabric_diameter_cm = fabric;
    }

    let rgba = image::open(&args.image)
        .with_context(|| format!("opening {}", args.image.display()))?
        .to_rgba8();
    let (canvas_w, canvas_h) = args
        .canvas
        .unwrap_or((f64::from(rgba.width()), f64::from(rgba.height())));

    let engine = MaskSegmenter {
        threshold: args.threshold,
        dark_foreground: args.dark_foreground,
    };
    let mut session = MeasurementSession::new(config, Arc::new(engine)).map_err(hinted)?;
    session.update(Msg::CanvasResized(canvas_w, canvas_h)).map_err(hinted)?;
    session.load_image(rgba).map_err(hinted)?;

    // Calibrate on the uncropped image; the scale survives the crop
    let [x1, y1, x2, y2] = args.reference;
    let view = current_view(&session)?;
    let a = view.image_to_screen(Point2D::new(x1, y1));
    let b = view.image_to_screen(Point2D::new(x2, y2));
    for action in [
        DrawAction::Start(a.x, a.y),
        DrawAction::Move(b.x, b.y),
        DrawAction::End(b.x, b.y),
    ] {
        session.update(Msg::Reference(action)).map_err(hinted)?;
    }
    let scale = session
        .scale_factor()
        .ok_or_else(|| hinted(DrapeError::NotCalibrated))?;

    if let Some([cx, cy, d]) = args.crop {
        session.update(Msg::Crop(CropMsg::Begin)).map_err(hinted)?;
        let view = current_view(&session)?;
        let target = view.image_to_screen(Point2D::new(cx, cy));
        let diameter = view.image_length_to_screen(d);
        let Some(circle) = session.crop_tool().circle() else {
            bail!("crop tool did not start");
        };
        for msg in [
            CropMsg::Pointer(DrawAction::Start(circle.center.x, circle.center.y)),
            CropMsg::Pointer(DrawAction::End(target.x, target.y)),
            CropMsg::Resize(diameter),
        ] {
            session.update(Msg::Crop(msg)).map_err(hinted)?;
        }
        let region = session.apply_crop().map_err(hinted)?;
        log::info!(
            "Cropped to ({:.1}, {:.1}) d={:.1}px",
            region.center_image.x,
            region.center_image.y,
            region.diameter_image_px
        );
    }

    let measurement = match session.measure().await.map_err(hinted)? {
        MeasurementOutcome::Recorded(m) => m,
        MeasurementOutcome::Discarded => bail!("measurement was superseded"),
    };

    if args.json {
        let report = serde_json::json!({
            "pixels_per_cm": scale.pixels_per_cm(),
            "settings": session.settings(),
            "measurement": measurement,
            "category": measurement.category(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Scale:            {:.3} px/cm", scale.pixels_per_cm());
        println!("Draped area:      {:.2} cm²", measurement.area_cm2);
        println!("Drape coefficient: {:.2} %", measurement.drape_coefficient_pct);
        println!("Category:         {}", measurement.category());
    }
    Ok(())
}

fn show_config(write: bool) -> anyhow::Result<()> {
    let config = DrapeConfig::load();
    if write {
        let path = DrapeConfig::path().context("no config directory available")?;
        if !path.exists() {
            config.save_to(&path)?;
            eprintln!("Wrote {}", path.display());
        }
    }
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Measure(args) => measure(args).await,
        Command::Config { write } => show_config(write),
    }
}
