//! manga-colorizer CLI - colorize a page or a folder of chapters.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use manga_colorizer::{BatchRunner, Config, Device, InferenceSession, ModelPaths};

/// Colorize manga pages with a pretrained generator.
#[derive(Parser, Debug)]
#[command(name = "manga-colorizer")]
#[command(version, about, long_about = None)]
struct Args {
    /// Input image, or a folder whose sub-folders are chapters.
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Output image path, or output folder for batch mode.
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,

    /// Working size of the longer side. Must be a multiple of 32.
    #[arg(short, long, default_value = "576", value_name = "INT")]
    size: usize,

    /// Denoiser noise level (0-255). 0 disables denoising.
    #[arg(long, default_value = "25", value_name = "INT")]
    denoise_sigma: u32,

    /// Skip the denoiser entirely.
    #[arg(long)]
    no_denoise: bool,

    /// Color boost applied to the output (1.0 = unchanged, 1.4 = 40% more).
    #[arg(long, default_value = "1.0", value_name = "FLOAT")]
    vibrancy: f32,

    /// Output JPEG quality (1-100).
    #[arg(short, long, default_value = "95", value_name = "INT")]
    quality: u8,

    /// Compute device: cpu, cuda, coreml or auto.
    #[arg(short, long, default_value = "auto", value_name = "DEVICE")]
    device: Device,

    /// Directory holding generator.onnx and denoiser.onnx.
    #[arg(long, value_name = "DIR")]
    models_dir: Option<PathBuf>,

    /// Generator model path (overrides --models-dir).
    #[arg(long, value_name = "FILE")]
    generator: Option<PathBuf>,

    /// Denoiser model path (overrides --models-dir).
    #[arg(long, value_name = "FILE")]
    denoiser: Option<PathBuf>,

    /// Color hint image for single-image mode.
    #[arg(long, value_name = "FILE", requires = "mask")]
    hint: Option<PathBuf>,

    /// Hint mask image for single-image mode (white = apply).
    #[arg(long, value_name = "FILE", requires = "hint")]
    mask: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("manga_colorizer={log_level}").into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input does not exist: {}", args.input.display());
    }

    let config = build_config(args);
    config.validate().context("Invalid configuration")?;

    let mut session =
        InferenceSession::from_config(&config).context("Failed to initialize colorizer")?;
    let runner = BatchRunner::from_config(&config);

    if args.input.is_dir() {
        if args.hint.is_some() {
            tracing::warn!("--hint is ignored in batch mode; use <page>.hint.png sidecars");
        }

        let summary = runner
            .run(&mut session, &args.input, &args.output)
            .context("Batch run failed")?;

        println!(
            "Colorized {} pages ({} failed) into {} in {}m {}s",
            summary.processed,
            summary.failed,
            args.output.display(),
            summary.elapsed.as_secs() / 60,
            summary.elapsed.as_secs() % 60
        );
        return Ok(());
    }

    let hint = args.hint.as_deref().zip(args.mask.as_deref());
    let outcome = if hint.is_some() {
        runner.process_page_with_hint(&mut session, &args.input, hint, &args.output)
    } else {
        runner.process_page(&mut session, &args.input, &args.output)
    };
    outcome.context("Failed to colorize image")?;

    println!(
        "Successfully colorized {} -> {}",
        args.input.display(),
        args.output.display()
    );

    Ok(())
}

fn build_config(args: &Args) -> Config {
    let mut models = args
        .models_dir
        .as_ref()
        .map_or_else(ModelPaths::default, ModelPaths::in_dir);
    if let Some(generator) = &args.generator {
        models.generator.clone_from(generator);
    }
    if let Some(denoiser) = &args.denoiser {
        models.denoiser.clone_from(denoiser);
    }

    Config {
        size: args.size,
        apply_denoise: !args.no_denoise && args.denoise_sigma > 0,
        denoise_sigma: args.denoise_sigma,
        vibrancy: args.vibrancy,
        output_quality: args.quality,
        device: args.device,
        models,
    }
}
