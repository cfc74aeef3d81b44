//! chart-judge CLI: judge color charts in photographs.

use chart_judge::bridge::BridgeResponse;
use chart_judge::chart::{render_chart, ChartPlacement, RenderOptions};
use chart_judge::color::ColorConverter;
use chart_judge::{ChartJudge, ChartSpec, EngineConfig, WriteOutcome};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "chart-judge")]
#[command(about = "Locate a color calibration chart in a photo and judge its patches")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Judge the chart in an image.
    Judge(JudgeArgs),

    /// Render a synthetic chart image.
    Render(RenderArgs),

    /// Print the chart specification.
    ChartInfo {
        /// Chart definition (JSON); defaults to the built-in color checker.
        #[arg(long)]
        chart: Option<PathBuf>,
    },

    /// Print or save the default engine configuration.
    DefaultConfig {
        /// Write to this file instead of stdout.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct JudgeArgs {
    /// Path to the input image.
    #[arg(long)]
    image: PathBuf,

    /// Path for the annotated output image; omit to skip writing.
    #[arg(long)]
    out: Option<PathBuf>,

    /// Chart definition (JSON); defaults to the built-in color checker.
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Engine configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Apply white balance from the neutral patches to the output.
    #[arg(long)]
    white_balance: bool,

    /// Allow the output to replace the input image.
    #[arg(long)]
    allow_overwrite: bool,

    /// Print the boundary JSON record instead of a summary.
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Clone, Args)]
struct RenderArgs {
    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    /// Chart definition (JSON); defaults to the built-in color checker.
    #[arg(long)]
    chart: Option<PathBuf>,

    /// Image width in pixels.
    #[arg(long, default_value = "800")]
    width: u32,

    /// Image height in pixels.
    #[arg(long, default_value = "600")]
    height: u32,

    /// Chart width in pixels.
    #[arg(long, default_value = "600.0")]
    chart_width: f64,

    /// Clockwise rotation about the chart's top-left corner, in degrees.
    #[arg(long, default_value = "0.0")]
    rotation: f64,

    /// Background color (hex).
    #[arg(long, default_value = "#808080")]
    background: String,

    /// Replace a patch color, e.g. `14=#3C36AF`. Repeatable.
    #[arg(long = "override", value_name = "INDEX=HEX")]
    overrides: Vec<String>,
}

fn main() -> CliResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Judge(args) => run_judge(&args),
        Commands::Render(args) => run_render(&args),
        Commands::ChartInfo { chart } => run_chart_info(chart.as_deref()),
        Commands::DefaultConfig { out } => run_default_config(out.as_deref()),
    }
}

fn load_chart(path: Option<&Path>) -> CliResult<ChartSpec> {
    match path {
        Some(path) => Ok(ChartSpec::from_json_file(path)?),
        None => Ok(ChartSpec::color_checker_classic()),
    }
}

// ── judge ──────────────────────────────────────────────────────────────

fn run_judge(args: &JudgeArgs) -> CliResult<()> {
    let spec = load_chart(args.chart.as_deref())?;
    let mut config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };
    config.output.white_balance |= args.white_balance;
    config.output.allow_overwrite |= args.allow_overwrite;

    let judge = ChartJudge::new(Arc::new(spec), config)?;
    let destination = args.out.clone().unwrap_or_default();
    let result = judge.analyze(&args.image, &destination);

    if args.json {
        println!("{}", BridgeResponse::from_result(&result).to_json());
        return Ok(());
    }

    let report = result.map_err(|e| -> CliError {
        format!("{} ({})", e.user_message(), e).into()
    })?;
    let judgment = &report.judgment;
    let converter = ColorConverter::new();

    println!(
        "{}  max ΔE {:.2}  confidence {:.2}  ({} of {} patches matched)",
        judgment.classification(),
        judgment.aggregate_deviation(),
        report.detection.confidence,
        report.detection.matched_patches,
        judgment.patches().len()
    );
    for patch in judgment.patches() {
        match (patch.sampled, patch.deviation) {
            (Some(lab), Some(deviation)) => println!(
                "  {:>2} {:<14} {}  ΔE {:>6.2} / {:<5.1} {}",
                patch.index,
                patch.name,
                converter.lab_to_hex(lab),
                deviation,
                patch.tolerance,
                if patch.passed() { "ok" } else { "FAIL" }
            ),
            _ => println!("  {:>2} {:<14} unsampled", patch.index, patch.name),
        }
    }

    match &report.write {
        WriteOutcome::Written(path) => println!("Output written to {}", path.display()),
        WriteOutcome::Skipped => {}
        WriteOutcome::Failed(err) => eprintln!("Output not written: {}", err),
    }
    Ok(())
}

// ── render ─────────────────────────────────────────────────────────────

fn run_render(args: &RenderArgs) -> CliResult<()> {
    let spec = load_chart(args.chart.as_deref())?;
    let converter = ColorConverter::new();

    let mut placement =
        ChartPlacement::centered([args.width, args.height], args.chart_width, spec.aspect_ratio());
    placement.rotation_deg = args.rotation;

    let mut options = RenderOptions::new(args.width, args.height, placement.homography()?)
        .with_background(converter.hex_to_rgb8(&args.background)?);
    for entry in &args.overrides {
        let (index, hex) = entry
            .split_once('=')
            .ok_or_else(|| -> CliError { format!("override must be INDEX=HEX, got {}", entry).into() })?;
        options = options.with_override(index.trim().parse()?, converter.hex_to_rgb8(hex.trim())?);
    }

    let image = render_chart(&spec, &options)?;
    image.save(&args.out)?;
    println!(
        "Rendered '{}' ({}x{}) to {}",
        spec.name(),
        args.width,
        args.height,
        args.out.display()
    );
    Ok(())
}

// ── chart-info ─────────────────────────────────────────────────────────

fn run_chart_info(path: Option<&Path>) -> CliResult<()> {
    let spec = load_chart(path)?;
    let converter = ColorConverter::new();

    println!("{}", spec.name());
    println!("  patches:        {}", spec.len());
    println!("  aspect ratio:   {:.3}", spec.aspect_ratio());
    println!(
        "  frame:          {} (tolerance ΔE {:.1})",
        converter.lab_to_hex(spec.frame()),
        spec.frame_tolerance()
    );
    for (i, patch) in spec.patches().iter().enumerate() {
        println!(
            "  {:>2} {:<14} {}  L {:>6.2} a {:>7.2} b {:>7.2}  tol {:.1}",
            i,
            patch.name,
            converter.lab_to_hex(patch.reference),
            patch.reference.l,
            patch.reference.a,
            patch.reference.b,
            patch.tolerance
        );
    }
    Ok(())
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config(out: Option<&Path>) -> CliResult<()> {
    let config = EngineConfig::default();
    match out {
        Some(path) => {
            config.to_json_file(path)?;
            println!("Wrote default configuration to {}", path.display());
        }
        None => println!("{}", serde_json::to_string_pretty(&config)?),
    }
    Ok(())
}
