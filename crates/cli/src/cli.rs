//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Scene Streamer - multimodal driving-scene playback over foxglove WebSocket
#[derive(Parser, Debug)]
#[command(
    name = "scene-streamer",
    author,
    version,
    about = "Stream recorded driving scenes to foxglove-compatible viewers",
    long_about = "Plays back recorded driving scenes (cameras, lidars, radars, annotations,\n\
                  ego poses and calibration) as synchronized, transform-consistent\n\
                  message streams over the foxglove WebSocket protocol."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "SCENE_STREAMER_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format (overrides the config file)
    #[arg(long, value_enum, global = true, env = "SCENE_STREAMER_LOG_FORMAT")]
    pub log_format: Option<LogFormat>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Stream scenes to viewers
    Run(RunArgs),

    /// Validate a configuration file without running
    Validate(ValidateArgs),

    /// Describe the dataset: scenes, sensors and advertised topics
    Info(InfoArgs),
}

impl Commands {
    /// Configuration file the command reads, if any
    pub fn config_path(&self) -> Option<&PathBuf> {
        match self {
            Commands::Run(args) => args.config(),
            Commands::Validate(args) => Some(&args.config),
            Commands::Info(args) => args.source.config.as_ref(),
        }
    }
}

/// Where scenes come from
#[derive(Parser, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Path to configuration file (TOML or JSON)
    #[arg(short, long, env = "SCENE_STREAMER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Dataset root directory (overrides dataset.root)
    #[arg(long, env = "TRUCKSCENES_DATAROOT")]
    pub dataroot: Option<PathBuf>,

    /// Use the built-in synthetic recording instead of a dataset
    #[arg(long, conflicts_with = "dataroot")]
    pub synthetic: bool,
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output mode
    #[arg(long, value_enum, default_value = "stream", env = "SCENE_STREAMER_MODE")]
    pub mode: Mode,

    /// Initial scene index in store order
    #[arg(long, env = "SCENE_STREAMER_SCENE")]
    pub scene: Option<usize>,

    /// Initial scene token (takes precedence over --scene)
    #[arg(long, env = "SCENE_STREAMER_SCENE_ID")]
    pub scene_id: Option<String>,

    /// Override viewer endpoint host
    #[arg(long, env = "SCENE_STREAMER_HOST")]
    pub host: Option<String>,

    /// Override viewer endpoint port
    #[arg(long, env = "SCENE_STREAMER_PORT")]
    pub port: Option<u16>,

    /// What to do after the last keyframe
    #[arg(long, value_enum, env = "SCENE_STREAMER_END_OF_SCENE")]
    pub end_of_scene: Option<EndOfScene>,

    /// Playback speed multiplier
    #[arg(long, env = "SCENE_STREAMER_SPEED")]
    pub speed: Option<f64>,

    /// Prometheus metrics port (overrides observability.metrics_port)
    #[arg(long, env = "SCENE_STREAMER_METRICS_PORT")]
    pub metrics_port: Option<u16>,

    /// Stop after this many seconds (0 = run until interrupted)
    #[arg(long, default_value = "0", env = "SCENE_STREAMER_TIMEOUT")]
    pub timeout: u64,

    /// Resolve configuration and the initial scene, then exit
    #[arg(long)]
    pub dry_run: bool,
}

impl RunArgs {
    pub fn config(&self) -> Option<&PathBuf> {
        self.source.config.as_ref()
    }
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "streamer.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the sensor rig
    #[arg(long)]
    pub sensors: bool,

    /// Show the advertised topics
    #[arg(long)]
    pub topics: bool,
}

/// Run mode
#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Serve viewers over WebSocket
    #[default]
    Stream,
    /// Log every message to the console instead
    Render,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for contracts::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => contracts::LogFormat::Json,
            LogFormat::Pretty => contracts::LogFormat::Pretty,
            LogFormat::Compact => contracts::LogFormat::Compact,
        }
    }
}

/// End-of-scene behaviour
#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum EndOfScene {
    /// Restart the same scene
    Loop,
    /// Advance to the following scene
    Next,
    /// Stop streaming
    Stop,
}

impl From<EndOfScene> for contracts::EndOfScene {
    fn from(value: EndOfScene) -> Self {
        match value {
            EndOfScene::Loop => contracts::EndOfScene::Loop,
            EndOfScene::Next => contracts::EndOfScene::Next,
            EndOfScene::Stop => contracts::EndOfScene::Stop,
        }
    }
}
