use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod roads;

use roads::RoadKind;

/// Curved regular grid road surface tool
#[derive(Parser)]
#[command(name = "crg")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    road: RoadArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Road data set shared by all commands.
#[derive(Args, Debug, Clone)]
pub struct RoadArgs {
    /// Built-in road preset
    #[arg(long, value_enum, env = "CRG_ROAD", default_value = "slalom", global = true)]
    pub road: RoadKind,

    /// Road length in metres
    #[arg(long, default_value = "200", global = true)]
    pub length: f64,

    /// Road width in metres
    #[arg(long, default_value = "8", global = true)]
    pub width: f64,

    /// Station increment in metres
    #[arg(long, default_value = "0.1", global = true)]
    pub increment: f64,

    /// JSON file with modifiers to apply to the data set
    #[arg(long, env = "CRG_MODIFIERS", global = true)]
    pub modifiers: Option<PathBuf>,

    /// JSON file with evaluation options
    #[arg(long, env = "CRG_OPTIONS", global = true)]
    pub options: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate the road at a single (u, v) position
    Eval {
        /// Position along the reference line
        #[arg(long, allow_hyphen_values = true)]
        u: f64,

        /// Lateral offset, positive to the left
        #[arg(long, allow_hyphen_values = true)]
        v: f64,

        /// Output result as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Display information about the road data set
    Info,

    /// Check uv/xy/z consistency under the built-in option scenarios
    Options {
        /// Run a single scenario (-1 runs the options and modifiers given on the command line)
        #[arg(long, allow_hyphen_values = true)]
        case: Option<i32>,

        /// Output the summary as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Check that uv -> xy -> uv reproduces the input
    Roundtrip {
        /// Grid steps along u
        #[arg(long, default_value = "20")]
        steps_u: usize,

        /// Grid steps along v
        #[arg(long, default_value = "20")]
        steps_v: usize,

        /// Extra steps beyond each end of the road
        #[arg(long, default_value = "10")]
        border_u: usize,

        /// Extra steps beyond each side of the road
        #[arg(long, default_value = "10")]
        border_v: usize,

        /// Maximum accepted deviation in metres
        #[arg(long, default_value = "1e-5")]
        tolerance: f64,

        /// Number of build, query and release passes
        #[arg(long, default_value = "1")]
        repeat: usize,
    },

    /// Time elevation queries under the four tyres of a car
    Perf {
        /// Distance between car positions in metres
        #[arg(long, default_value = "0.01")]
        step: f64,

        /// Points per contact patch side
        #[arg(long, default_value = "10")]
        patch_points: usize,
    },

    /// Sample elevations on a regular x/y grid
    Scan {
        /// Output CSV file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Samples per axis
        #[arg(long, default_value = "100")]
        resolution: usize,

        /// Scan window as XMIN YMIN XMAX YMAX (road bounding box if not specified)
        #[arg(long, num_args = 4, allow_hyphen_values = true)]
        range: Option<Vec<f64>>,

        /// Also write the local (u, v) position of every sample
        #[arg(long)]
        uv: bool,
    },

    /// Compare elevations against a reference CSV with x, y, z columns
    Verify {
        /// Input CSV file
        input: PathBuf,

        /// Maximum accepted elevation error in metres
        #[arg(long, default_value = "1e-4")]
        tolerance: f64,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crg=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Eval { u, v, json } => commands::eval::run(&cli.road, u, v, json),
        Commands::Info => commands::info::run(&cli.road),
        Commands::Options { case, json } => commands::options::run(&cli.road, case, json),
        Commands::Roundtrip {
            steps_u,
            steps_v,
            border_u,
            border_v,
            tolerance,
            repeat,
        } => commands::roundtrip::run(
            &cli.road,
            (steps_u, steps_v),
            (border_u, border_v),
            tolerance,
            repeat,
        ),
        Commands::Perf { step, patch_points } => {
            commands::perf::run(&cli.road, step, patch_points)
        }
        Commands::Scan {
            output,
            resolution,
            range,
            uv,
        } => commands::scan::run(&cli.road, output, resolution, range, uv),
        Commands::Verify { input, tolerance } => {
            commands::verify::run(&cli.road, input, tolerance)
        }
    }
}
