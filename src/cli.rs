use crate::affinity::AffinityTable;
use crate::config::{Config, PipelineConfig, load_config};
use crate::dump::{WorkspaceDump, print_dump, write_dump};
use crate::orchestrator::SmartConnect;
use crate::store::{FixedCanvas, MemoryWorkspace};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "smartc",
    version,
    about = "Lay out, auto-connect and untangle a module composer workspace"
)]
pub struct Args {
    /// Workspace JSON file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Affinity data (JSON or JSON5)
    #[arg(short = 'a', long = "affinity")]
    pub affinity: Option<PathBuf>,

    /// Config JSON file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// Output file for the resulting workspace dump. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Canvas width
    #[arg(short = 'w', long = "width")]
    pub width: Option<f32>,

    /// Canvas height
    #[arg(short = 'H', long = "height")]
    pub height: Option<f32>,

    /// Skip animation frames and phase delays
    #[arg(long = "no-animate")]
    pub no_animate: bool,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    // A subscriber may already be installed when embedded.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

pub fn run() -> Result<()> {
    init_tracing();
    let args = Args::parse();
    let config = resolve_config(&args)?;

    let input = read_input(args.input.as_deref())?;
    let workspace = MemoryWorkspace::from_json(&input).context("failed to parse workspace")?;
    let affinity = match args.affinity.as_deref() {
        Some(path) => Some(
            AffinityTable::load(path)
                .with_context(|| format!("failed to load affinity data from {}", path.display()))?,
        ),
        None => None,
    };
    let canvas = FixedCanvas(config.canvas.fallback());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()?;
    let dump = runtime.block_on(async {
        let engine = SmartConnect::with_collaborators(workspace, canvas, affinity, config);
        let report = engine.optimize().await;
        let history = engine.history().lock().await;
        let store = engine.store().lock().await;
        WorkspaceDump::capture(&*store, &history, engine.detector(), Some(report))
    });

    match args.output.as_deref() {
        Some(path) => write_dump(path, &dump)?,
        None => print_dump(&dump)?,
    }
    Ok(())
}

fn resolve_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(width) = args.width {
        config.canvas.default_width = width;
    }
    if let Some(height) = args.height {
        config.canvas.default_height = height;
    }
    if args.no_animate {
        config.pipeline = PipelineConfig::instant();
    }
    Ok(config)
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()));
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}
