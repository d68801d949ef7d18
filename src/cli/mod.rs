//! Command-line interface implementation
//!
//! This module provides the CLI entry point and dispatches to submodules
//! for specific command implementations.

mod generate;
mod project;

use clap::{Args, Parser, Subcommand};
use glob::glob;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::composition::BlendMode;
use crate::config::{load_config, merge_cli_overrides, CliOverrides, LayermintConfig};

/// Exit codes
pub(crate) const EXIT_SUCCESS: u8 = 0;
pub(crate) const EXIT_ERROR: u8 = 1;
pub(crate) const EXIT_INVALID_ARGS: u8 = 2;

/// Find all layer images directly inside a directory.
///
/// Searches for `.png` and `.gif` files, sorted by path.
pub fn find_layer_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let dir_str = dir.display().to_string();

    for ext in ["png", "gif", "PNG", "GIF"] {
        if let Ok(paths) = glob(&format!("{}/*.{}", dir_str, ext)) {
            files.extend(paths.filter_map(Result::ok));
        }
    }

    files.sort();
    files.dedup();
    files
}

/// Layermint - build generative collections from contributor layers
#[derive(Parser)]
#[command(name = "layermint")]
#[command(about = "Layermint - combine contributor layers into unique generative editions")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Project directory
    #[arg(short, long, global = true, default_value = ".")]
    pub project: PathBuf,

    /// Config file (default: nearest layermint.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Fail on unreadable layer files instead of substituting transparent ones
    #[arg(long, global = true)]
    pub strict: bool,

    /// Canvas edge length in pixels (overrides render.canvas_size)
    #[arg(long, global = true)]
    pub canvas_size: Option<u32>,

    /// Log level: error, warn, info, debug or trace (overrides log.level)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

impl GlobalArgs {
    /// Colors only when stderr is a terminal and neither `--no-color` nor
    /// `NO_COLOR` is set.
    fn use_colors(&self) -> bool {
        !self.no_color && std::env::var_os("NO_COLOR").is_none() && std::io::stderr().is_terminal()
    }

    fn overrides(&self) -> CliOverrides {
        CliOverrides {
            strict: self.strict.then_some(true),
            canvas_size: self.canvas_size,
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new project directory
    New {
        /// Directory to create
        path: PathBuf,

        /// Collection name (default: directory name)
        #[arg(short, long)]
        name: Option<String>,

        /// Planned number of editions
        #[arg(long)]
        size: Option<u64>,
    },

    /// Manage contributors
    Contributor {
        #[command(subcommand)]
        action: ContributorAction,
    },

    /// Manage layers
    Layer {
        #[command(subcommand)]
        action: LayerAction,
    },

    /// Generate editions
    Generate {
        /// Number of editions to generate
        #[arg(short = 'n', long, default_value = "1", conflicts_with = "all")]
        count: usize,

        /// Generate until the planned collection size is reached
        #[arg(long)]
        all: bool,

        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,

        /// Report progress as JSON lines on stdout
        #[arg(long)]
        json: bool,
    },

    /// Render a random combination to workspace/previews
    Preview {
        /// Seed for reproducible sampling
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Show generation statistics
    Stats,

    /// List generated editions
    Editions,

    /// Check that every layer file exists and decodes
    Validate,

    /// Resize every static layer file to the canvas size
    ResizeLayers,
}

#[derive(Subcommand)]
pub enum ContributorAction {
    /// Add a contributor at the end of the roster
    Add { name: String },
    /// Remove a contributor and delete their layer files
    Remove { name: String },
    /// List contributors
    List,
    /// Set a contributor's stacking index and apply it to all their layers
    SetIndex {
        name: String,
        #[arg(allow_negative_numbers = true)]
        index: i64,
    },
}

#[derive(Subcommand)]
pub enum LayerAction {
    /// Copy image files into a contributor's directory
    Add {
        contributor: String,
        /// Image files, or directories whose .png/.gif files are all added
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// List layers, optionally for one contributor
    List { contributor: Option<String> },
    /// Change a layer's settings
    Set {
        contributor: String,
        /// Layer file name
        layer: String,

        /// Relative draw weight (> 0)
        #[arg(long)]
        rarity: Option<f64>,

        /// Opacity (0.0-1.0)
        #[arg(long)]
        opacity: Option<f32>,

        /// Stacking index override
        #[arg(long, allow_negative_numbers = true)]
        index: Option<i64>,

        /// Blend mode: normal, multiply, screen, overlay
        #[arg(long, value_parser = parse_blend_mode)]
        blend: Option<BlendMode>,
    },
}

fn parse_blend_mode(s: &str) -> Result<BlendMode, String> {
    match s.to_lowercase().as_str() {
        "normal" | "multiply" | "screen" | "overlay" => Ok(BlendMode::parse(s)),
        _ => Err(format!("unknown blend mode '{}' (expected normal, multiply, screen or overlay)", s)),
    }
}

/// Load config and apply global flag overrides.
fn load_settings(global: &GlobalArgs) -> Result<LayermintConfig, ExitCode> {
    let mut config = match load_config(global.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            return Err(ExitCode::from(EXIT_ERROR));
        }
    };

    merge_cli_overrides(&mut config, &global.overrides());

    let errors = config.validate();
    if !errors.is_empty() {
        for error in &errors {
            eprintln!("Error: {}", error);
        }
        return Err(ExitCode::from(EXIT_INVALID_ARGS));
    }
    Ok(config)
}

/// Install the tracing subscriber.
///
/// `RUST_LOG` wins; otherwise `-v` flags, then the configured level.
fn init_tracing(verbose: u8, config: &LayermintConfig) {
    let level = match verbose {
        0 => config.log.level.as_str(),
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("layermint={}", level)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Parse arguments and run the selected command.
pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_settings(&cli.global) {
        Ok(config) => config,
        Err(code) => return code,
    };
    init_tracing(cli.global.verbose, &config);

    let root = &cli.global.project;
    match cli.command {
        Commands::New { path, name, size } => project::run_new(&path, name.as_deref(), size, &config),
        Commands::Contributor { action } => project::run_contributor(root, action),
        Commands::Layer { action } => project::run_layer(root, action),
        Commands::Generate { count, all, seed, json } => {
            generate::run_generate(root, &config, count, all, seed, json, cli.global.use_colors())
        }
        Commands::Preview { seed } => generate::run_preview(root, &config, seed),
        Commands::Stats => project::run_stats(root),
        Commands::Editions => project::run_editions(root),
        Commands::Validate => project::run_validate(root),
        Commands::ResizeLayers => project::run_resize(root, &config),
    }
}
