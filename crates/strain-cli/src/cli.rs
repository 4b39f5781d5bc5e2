use clap::{Args, Parser, Subcommand};
use elastrain::core::lattice::LatticeFamily;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Tony Kan, Ted Yu, William A. Goddard III, Victor Wai Tak Kam",
    version,
    about = "elastrain CLI - Per-atom elastic strain analysis of crystalline simulation snapshots.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Set the number of threads for parallel computation.
    /// Defaults to the number of available logical cores.
    #[arg(short = 'j', long, global = true, value_name = "NUM")]
    pub threads: Option<usize>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute cluster graph, deformation gradients and strain for an identified frame.
    Analyze(AnalyzeArgs),
    /// Write a synthetic, already-identified crystal frame (useful for calibration runs).
    Generate(GenerateArgs),
}

/// Arguments for the `analyze` subcommand.
#[derive(Args, Debug, Clone)]
pub struct AnalyzeArgs {
    // --- Core Arguments ---
    /// Path to the identified frame in JSON format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Base name for output files; `_elastic_strain.json` / `.csv` are appended.
    #[arg(short, long, required = true, value_name = "BASE")]
    pub output: PathBuf,

    /// Path to a configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    // --- Lattice Overrides ---
    /// Reference lattice family (e.g., 'bcc', 'fcc', 'hcp', 'cubic-diamond').
    #[arg(short = 's', long, value_name = "FAMILY")]
    pub structure: Option<LatticeFamily>,

    /// Lattice constant of the reference crystal.
    #[arg(short = 'a', long, value_name = "FLOAT")]
    pub lattice_constant: Option<f64>,

    /// Axial ratio c/a for hexagonal families. Defaults to the ideal ratio.
    #[arg(long, value_name = "FLOAT")]
    pub ca_ratio: Option<f64>,

    // --- Fit Overrides ---
    /// Minimum number of usable neighbor correspondences per atom.
    /// Defaults to the full neighbor shell of the lattice.
    #[arg(long, value_name = "INT")]
    pub min_correspondences: Option<usize>,

    /// Maximum misorientation in degrees for two neighbors to share a cluster.
    #[arg(long, value_name = "DEGREES")]
    pub orientation_tolerance: Option<f64>,

    // --- Output Overrides ---
    /// Report strain tensors in the deformed frame (Euler-Almansi).
    #[arg(long)]
    pub push_forward: bool,

    /// Do not include deformation gradients in the output.
    #[arg(long)]
    pub no_deformation_gradients: bool,

    /// Do not include strain tensors in the output.
    #[arg(long)]
    pub no_strain_tensors: bool,

    /// Skip writing the per-atom CSV table.
    #[arg(long)]
    pub no_csv: bool,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S tolerances.orientation-degrees=3
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `generate` subcommand.
#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Path for the generated frame in JSON format.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub output: PathBuf,

    /// Lattice family of the generated crystal.
    #[arg(short = 's', long, default_value = "bcc", value_name = "FAMILY")]
    pub structure: LatticeFamily,

    /// Lattice constant of the generated crystal.
    #[arg(short = 'a', long, required = true, value_name = "FLOAT")]
    pub lattice_constant: f64,

    /// Axial ratio c/a for hexagonal families. Defaults to the ideal ratio.
    #[arg(long, value_name = "FLOAT")]
    pub ca_ratio: Option<f64>,

    /// Number of conventional cells along each cell vector.
    #[arg(short = 'n', long, num_args = 3, default_values_t = [4, 4, 4], value_name = "N")]
    pub repeats: Vec<usize>,

    /// Make the block non-periodic in all directions.
    #[arg(long)]
    pub free_surfaces: bool,

    /// Uniform stretch factor applied to the crystal (1.0 = undeformed).
    #[arg(long, default_value_t = 1.0, value_name = "FLOAT")]
    pub stretch: f64,

    /// Rotation of the crystal about the z axis, in degrees.
    #[arg(long, default_value_t = 0.0, value_name = "DEGREES")]
    pub rotate_z: f64,
}
