use clap::Parser;
use log::LevelFilter;
use std::path::PathBuf;

/// Simulated-annealing analog placer with symmetry constraints.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Input instance file (modules and symmetry groups)
    pub input_file: PathBuf,
    /// Output placement file
    pub output_file: PathBuf,
    /// Cost blend between area and wirelength, in [0, 1]:
    /// `wirelength_weight = 1 - area_ratio`
    #[arg(default_value_t = 1.0)]
    pub area_ratio: f64,
    /// Optional JSON file overriding the annealing configuration
    #[arg(short, long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,
    /// Also render the placement as SVG to this path
    #[arg(long, value_name = "FILE")]
    pub svg: Option<PathBuf>,
    #[arg(
        short,
        long,
        value_name = "[off, error, warn, info, debug, trace]",
        default_value = "info"
    )]
    pub log_level: LevelFilter,
}
