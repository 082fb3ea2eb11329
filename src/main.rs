// src/main.rs

use anyhow::{Context, Result};
use clap::Parser;
use route_deviation::embedding::OnnxEmbedder;
use route_deviation::horizon::HoughHorizonDetector;
use route_deviation::motion::FarnebackEstimator;
use route_deviation::video_processor::VideoProcessor;
use route_deviation::{Config, PipelineConfig, PipelineOrchestrator, ReportLocale};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "route_deviation",
    version,
    about = "Compare forward and reverse route videos and write trajectory corrections"
)]
struct Cli {
    /// YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Forward (A→B) video, overrides video.forward_path
    #[arg(long)]
    forward: Option<PathBuf>,

    /// Reverse (B→A) video, overrides video.reverse_path
    #[arg(long)]
    reverse: Option<PathBuf>,

    /// Text report path, overrides output.report_path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Samples per second of video
    #[arg(long)]
    target_fps: Option<f64>,

    /// Report language (en, ru)
    #[arg(long)]
    locale: Option<ReportLocale>,

    /// Also write one JSON record per sample to this file
    #[arg(long)]
    jsonl: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.forward {
            config.video.forward_path = path.display().to_string();
        }
        if let Some(path) = &self.reverse {
            config.video.reverse_path = path.display().to_string();
        }
        if let Some(path) = &self.output {
            config.output.report_path = path.display().to_string();
        }
        if let Some(fps) = self.target_fps {
            config.video.target_fps = fps;
        }
        if let Some(locale) = self.locale {
            config.output.locale = locale;
        }
        if let Some(path) = &self.jsonl {
            config.output.jsonl_path = Some(path.display().to_string());
        }
    }
}

fn init_tracing(level: &str, verbose: u8) {
    let level = match verbose {
        0 => level,
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("route_deviation={},ort=warn", level)));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_or_default(&cli.config)?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.logging.level, cli.verbose);

    info!("✈ Route Deviation Analysis Starting");
    if cli.config.exists() {
        info!("✓ Configuration loaded from {}", cli.config.display());
    } else {
        warn!(
            "Config file {} not found, using built-in defaults",
            cli.config.display()
        );
    }
    info!(
        "Forward: {} | Reverse: {} | Target: {:.2} FPS | Locale: {}",
        config.video.forward_path,
        config.video.reverse_path,
        config.video.target_fps,
        config.output.locale
    );

    let embedder = OnnxEmbedder::new(config.model.clone())?;
    let motion = FarnebackEstimator::new(config.flow.clone());
    let detector = HoughHorizonDetector::new(config.horizon.clone());
    info!("✓ Analyzers ready");

    let mut orchestrator = PipelineOrchestrator::new(
        Box::new(VideoProcessor::new()),
        Box::new(embedder),
        Box::new(motion),
        Box::new(detector),
        PipelineConfig::from_config(&config),
    );

    let started = Instant::now();
    let output = PathBuf::from(&config.output.report_path);
    let reports = orchestrator.run(
        Path::new(&config.video.forward_path),
        Path::new(&config.video.reverse_path),
        &output,
    );

    info!("========================================");
    info!("✓ Analysis finished: {} sample(s) reported", reports.len());
    info!("  Elapsed: {:.1}s", started.elapsed().as_secs_f64());
    info!("💾 Report saved to: {}", output.display());
    if let Some(path) = &config.output.jsonl_path {
        info!("💾 JSON records saved to: {}", path);
    }
    info!("========================================");

    Ok(())
}
