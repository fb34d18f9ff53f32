//! Splice CLI - Command-line interface for inspecting and exercising projects.
//!
//! Usage:
//!   splice info <PATH>                       Show project information
//!   splice validate <PATH>                   Check track invariants
//!   splice migrate <PATH> [--write]          Normalize legacy overlay transforms
//!   splice simulate <PATH> [OPTIONS]         Play the project headless
//!   splice gesture <PATH> <TRACK> <SCRIPT>   Replay a gesture script on an overlay
//!   splice export <PATH> [OPTIONS]           Write the per-frame export plan

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use splice_transform::{Corner, Edge, GestureKind};

mod commands;

#[derive(Parser)]
#[command(
    name = "splice",
    about = "Timeline-synchronized multi-track compositing engine",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show project information
    Info {
        /// Path to the project file
        path: PathBuf,
    },

    /// Validate a project's tracks
    Validate {
        /// Path to the project file
        path: PathBuf,
    },

    /// Convert legacy pixel transforms to normalized coordinates
    Migrate {
        /// Path to the project file
        path: PathBuf,

        /// Save the migrated project in place
        #[arg(long)]
        write: bool,
    },

    /// Run the playback engine headless against simulated decoders
    Simulate {
        /// Path to the project file
        path: PathBuf,

        /// Wall-clock seconds to simulate
        #[arg(long, default_value = "5.0")]
        seconds: f64,

        /// Display refresh rate driving ticks
        #[arg(long, default_value = "60")]
        refresh_hz: f64,

        /// Simulated decoder load latency
        #[arg(long, default_value = "120")]
        latency_ms: f64,

        /// Pace ticks in real time instead of as fast as possible
        #[arg(long)]
        realtime: bool,

        /// Source keys whose loads fail (repeatable)
        #[arg(long = "fail-source")]
        fail_sources: Vec<String>,
    },

    /// Replay a JSONL gesture script against an overlay track
    Gesture {
        /// Path to the project file
        path: PathBuf,

        /// Overlay track id
        track: String,

        /// JSONL gesture script
        script: PathBuf,

        /// Gesture kind
        #[arg(long, value_enum, default_value = "drag")]
        kind: GestureArg,

        /// Screen pixels per video pixel
        #[arg(long, default_value = "1.0")]
        render_scale: f64,

        /// Save the committed transform into the project
        #[arg(long)]
        write: bool,
    },

    /// Write the per-frame export plan as JSONL
    Export {
        /// Path to the project file
        path: PathBuf,

        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// First frame (inclusive)
        #[arg(long)]
        start: Option<u64>,

        /// Last frame (exclusive)
        #[arg(long)]
        end: Option<u64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum GestureArg {
    Drag,
    ScaleTopLeft,
    ScaleTopRight,
    ScaleBottomLeft,
    ScaleBottomRight,
    ResizeLeft,
    ResizeRight,
    Rotate,
}

impl From<GestureArg> for GestureKind {
    fn from(arg: GestureArg) -> Self {
        match arg {
            GestureArg::Drag => GestureKind::Drag,
            GestureArg::ScaleTopLeft => GestureKind::Scale(Corner::TopLeft),
            GestureArg::ScaleTopRight => GestureKind::Scale(Corner::TopRight),
            GestureArg::ScaleBottomLeft => GestureKind::Scale(Corner::BottomLeft),
            GestureArg::ScaleBottomRight => GestureKind::Scale(Corner::BottomRight),
            GestureArg::ResizeLeft => GestureKind::Resize(Edge::Left),
            GestureArg::ResizeRight => GestureKind::Resize(Edge::Right),
            GestureArg::Rotate => GestureKind::Rotate,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = splice_common::config::EngineConfig::load();
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    splice_common::logging::init_logging(&config.logging);

    match cli.command {
        Commands::Info { path } => commands::info::run(path),
        Commands::Validate { path } => commands::validate::run(path),
        Commands::Migrate { path, write } => commands::migrate::run(path, write, &config),
        Commands::Simulate {
            path,
            seconds,
            refresh_hz,
            latency_ms,
            realtime,
            fail_sources,
        } => {
            let options = commands::simulate::SimulateOptions {
                seconds,
                refresh_hz,
                latency_ms,
                realtime,
                fail_sources,
            };
            commands::simulate::run(path, options, config).await
        }
        Commands::Gesture {
            path,
            track,
            script,
            kind,
            render_scale,
            write,
        } => commands::gesture::run(path, track, script, kind.into(), render_scale, write, config),
        Commands::Export {
            path,
            output,
            start,
            end,
        } => commands::export::run(path, output, start, end),
    }
}
