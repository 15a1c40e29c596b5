// SPDX-License-Identifier: GPL-3.0-only

use clap::{Parser, Subcommand};
use material_sorter::app::{LinuxPlatform, Orchestrator, OrchestratorSettings, ui_channel};
use material_sorter::board;
use material_sorter::config::{CameraSource, Config};
use material_sorter::constants::app_info;
use std::path::PathBuf;
use tracing::info;

mod cli;

#[derive(Parser)]
#[command(name = "material-sorter")]
#[command(about = "Classify paper, metal and plastic with a camera and light the matching LED")]
#[command(version = app_info::version())]
#[command(subcommand_required = false)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file (default: ~/.config/material-sorter/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// V4L2 capture device, e.g. /dev/video0
    #[arg(long, global = true, conflicts_with = "images")]
    device: Option<String>,

    /// Serve frames from an image file or directory instead of a camera
    #[arg(long, global = true)]
    images: Option<PathBuf>,

    /// Classifier model file
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// sysfs GPIO root
    #[arg(long, global = true)]
    gpio_root: Option<PathBuf>,

    /// LED pulse length in milliseconds
    #[arg(long, global = true)]
    pulse_ms: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the sorter (default)
    Run {
        /// Log results to stdout instead of drawing the terminal UI
        #[arg(long)]
        headless: bool,
    },

    /// List the capture formats of the camera
    Formats,

    /// Classify one image file
    Classify {
        /// Image to classify
        image: PathBuf,
    },

    /// Print the resolved board pin table
    Board,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let default_command = Commands::Run { headless: false };
    let command = cli.command.as_ref().unwrap_or(&default_command);
    let terminal_ui = matches!(command, Commands::Run { headless: false });
    init_logging(terminal_ui);

    let config = load_config(&cli)?;

    match command {
        Commands::Run { headless } => run(config, *headless),
        Commands::Formats => cli::list_formats(&config),
        Commands::Classify { image } => cli::classify_image(&config, image),
        Commands::Board => cli::print_board(&config),
    }
}

/// Set RUST_LOG to control the log level, e.g. RUST_LOG=material_sorter=debug
///
/// The terminal UI owns the screen, so it logs to a file in the cache dir.
fn init_logging(terminal_ui: bool) {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"))
    };

    if terminal_ui {
        let log_file = dirs::cache_dir()
            .map(|dir| dir.join(app_info::APP_DIR))
            .and_then(|dir| {
                std::fs::create_dir_all(&dir).ok()?;
                std::fs::File::create(dir.join("material-sorter.log")).ok()
            });
        match log_file {
            Some(file) => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init(),
            None => tracing_subscriber::fmt()
                .with_env_filter(filter())
                .with_writer(std::io::sink)
                .init(),
        }
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter())
            .with_target(true)
            .with_level(true)
            .init();
    }
}

/// Config file, then command-line overrides
fn load_config(cli: &Cli) -> Result<Config, Box<dyn std::error::Error>> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(device) = &cli.device {
        config.camera = CameraSource::V4l2 {
            device: device.clone(),
        };
    }
    if let Some(images) = &cli.images {
        config.camera = CameraSource::Still {
            path: images.clone(),
        };
    }
    if let Some(model) = &cli.model {
        config.model_path = Some(model.clone());
    }
    if let Some(root) = &cli.gpio_root {
        config.gpio_root = root.clone();
    }
    if let Some(pulse) = cli.pulse_ms {
        config.led_pulse_ms = pulse;
    }

    config.validate()?;
    Ok(config)
}

fn run(config: Config, headless: bool) -> Result<(), Box<dyn std::error::Error>> {
    let board = board::resolve(&config.device_tree_model, &config.gpio_root, &config.board);
    info!(board = %board.name, camera = %config.camera, "Starting sorter");

    let settings = OrchestratorSettings::from(&config);
    let (ui, updates) = ui_channel();
    let platform = LinuxPlatform::new(config, board);

    let mut orchestrator = Orchestrator::initialize(Box::new(platform), ui, settings)?;

    let result = if headless {
        cli::run_headless(&orchestrator, updates)
    } else {
        material_sorter::terminal::run(&orchestrator, updates)
    };

    orchestrator.shutdown();
    result
}
