use crate::config::load_config;
use crate::controller::{Controller, Input};
use crate::export::write_export;
use crate::import::load_plan;
use crate::render::{render_svg, write_output_svg};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "spgraph", version, about = "Study plan prerequisite graph renderer")]
pub struct Args {
    /// Plan document (.json) or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout if omitted.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'e', long = "outputFormat", value_enum, default_value = "svg")]
    pub output_format: OutputFormat,

    /// Editor config file (.json or .json5)
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,

    /// JSON list of editor inputs applied before output
    #[arg(long = "replay")]
    pub replay: Option<PathBuf>,

    /// Draw handles and grips (SVG only)
    #[arg(long = "edit")]
    pub edit: bool,

    /// Log routing and editing decisions to stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum OutputFormat {
    Svg,
    Json,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref())
        .with_context(|| "failed to load config")?;
    let input = read_input(args.input.as_deref())?;
    let plan = load_plan(&input)?;
    let graph = plan.to_graph(&config.layout);
    if graph.nodes().is_empty() {
        return Err(anyhow::anyhow!("plan document contains no courses"));
    }

    let mut controller = Controller::new(graph, config);
    if let Some(path) = args.replay.as_deref() {
        let inputs = read_replay(path)?;
        tracing::info!(count = inputs.len(), "replaying inputs");
        controller.replay(inputs);
    }

    match args.output_format {
        OutputFormat::Svg => {
            controller.handle(Input::SetEditMode { enabled: args.edit });
            let config = controller.config();
            let svg = render_svg(
                controller.graph(),
                &controller.routes(),
                &config.theme,
                &config.export,
                controller.edit_mode(),
            );
            write_output_svg(&svg, args.output.as_deref())?;
        }
        OutputFormat::Json => {
            let export = controller.export();
            write_export(args.output.as_deref(), &export)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
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

fn read_replay(path: &Path) -> Result<Vec<Input>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    parse_replay(&content)
}

fn parse_replay(content: &str) -> Result<Vec<Input>> {
    let inputs = serde_json::from_str(content).context("invalid replay file")?;
    Ok(inputs)
}
