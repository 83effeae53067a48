//! xcshots CLI
//!
//! Entry point for the `xcshots` command-line tool.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use xcshots::device::find_candidates;
use xcshots::tools::DeviceControl;
use xcshots::{
    logging, LaneConfig, Overrides, Pipeline, Progress, RestoreRegistry, SignalHandler, Toolset,
    XcrunTools,
};

#[derive(Parser)]
#[command(name = "xcshots")]
#[command(about = "Capture UI test screenshots from a simulator run", version)]
struct Cli {
    /// Log format: text or json (default: $XCSHOTS_LOG_FORMAT, then text)
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the UI tests and collect screenshots (default)
    Capture {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Path to config file (default: <root>/.xcshots.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Simulator name to run on
        #[arg(long)]
        simulator: Option<String>,

        /// Directory for the renamed screenshots, relative to the root
        #[arg(long)]
        output_dir: Option<String>,

        /// Seconds to wait after booting the simulator
        #[arg(long)]
        settle_seconds: Option<u64>,
    },

    /// List simulators that match the configured platform hint
    Devices {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Path to config file (default: <root>/.xcshots.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,

        /// Show every available simulator, not just hint matches
        #[arg(long)]
        all: bool,

        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration as TOML
    Config {
        /// Project root (default: current directory)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Path to config file (default: <root>/.xcshots.toml)
        #[arg(long, short = 'c')]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.log_format.as_deref());

    let command = cli.command.unwrap_or(Commands::Capture {
        root: None,
        config: None,
        simulator: None,
        output_dir: None,
        settle_seconds: None,
    });

    match command {
        Commands::Capture {
            root,
            config,
            simulator,
            output_dir,
            settle_seconds,
        } => {
            let overrides = Overrides {
                simulator,
                output_dir,
                boot_settle_seconds: settle_seconds,
            };
            run_capture(root, config, overrides);
        }
        Commands::Devices {
            root,
            config,
            all,
            json,
        } => {
            run_devices(root, config, all, json);
        }
        Commands::Config { root, config } => {
            run_config(root, config);
        }
    }
}

fn resolve_root(root: Option<PathBuf>) -> PathBuf {
    root.unwrap_or_else(|| PathBuf::from("."))
}

fn load_config(root: &Path, config_path: Option<PathBuf>, progress: Progress) -> LaneConfig {
    match LaneConfig::load(root, config_path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            progress.failure(format!("Error loading config: {}", e));
            process::exit(1);
        }
    }
}

fn run_capture(root: Option<PathBuf>, config_path: Option<PathBuf>, overrides: Overrides) {
    let progress = Progress::stdout();
    let root = match fs::canonicalize(resolve_root(root)) {
        Ok(root) => root,
        Err(e) => {
            progress.failure(format!("Cannot open project root: {}", e));
            process::exit(1);
        }
    };

    let mut config = load_config(&root, config_path, progress);
    config.apply(&overrides);

    let registry = RestoreRegistry::new();
    let handler = SignalHandler::new(registry.clone(), progress);
    if let Err(e) = handler.install() {
        // Without the handler an interrupt would leave the scheme patched
        progress.failure(format!("Failed to install signal handler: {}", e));
        process::exit(1);
    }

    let pipeline = Pipeline::new(config, &root, Toolset::xcrun(), registry, progress);
    match pipeline.run_from_env() {
        Ok(report) => {
            tracing::info!(
                device = %report.device.udid,
                screenshots = report.screenshots.len(),
                "capture finished"
            );
        }
        Err(e) => {
            tracing::debug!(error = ?e, "capture failed");
            if let Some(diagnostic) = e.diagnostic() {
                println!("{}", diagnostic);
            }
            progress.failure(&e);
            process::exit(e.exit_code());
        }
    }
}

fn run_devices(root: Option<PathBuf>, config_path: Option<PathBuf>, all: bool, json_output: bool) {
    let progress = Progress::stdout();
    let root = resolve_root(root);
    let config = load_config(&root, config_path, progress);

    let devices = match XcrunTools.list_devices(true) {
        Ok(devices) => devices,
        Err(e) => {
            progress.failure(format!("Error listing simulators: {}", e));
            process::exit(30);
        }
    };

    let devices = if all {
        devices
    } else {
        find_candidates(&devices, &config.device.candidate_hint)
    };

    if json_output {
        match serde_json::to_string_pretty(&devices) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                progress.failure(format!("Error serializing output: {}", e));
                process::exit(1);
            }
        }
        return;
    }

    if devices.is_empty() {
        println!("No matching simulators.");
        return;
    }

    for device in &devices {
        let marker = if device.name == config.device.name {
            "*"
        } else {
            " "
        };
        println!(
            "{} {} ({}) [{}] {}",
            marker, device.name, device.udid, device.state, device.runtime
        );
    }
}

fn run_config(root: Option<PathBuf>, config_path: Option<PathBuf>) {
    let progress = Progress::stdout();
    let root = resolve_root(root);
    let config = load_config(&root, config_path, progress);

    if let Err(e) = config.validate() {
        progress.failure(format!("Configuration error: {}", e));
        process::exit(1);
    }

    match config.to_toml() {
        Ok(toml) => print!("{}", toml),
        Err(e) => {
            progress.failure(format!("Error serializing config: {}", e));
            process::exit(1);
        }
    }
}
