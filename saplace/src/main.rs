use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

use anyhow::{ensure, Context, Result};
use clap::Parser;
use log::{info, warn};
use rand::prelude::SmallRng;
use rand::SeedableRng;

use saplace::config::SAConfig;
use saplace::io;
use saplace::io::cli::Cli;
use saplace::optimizer::SAOptimizer;
use saplace::timeout::{TimeoutManager, DEFAULT_TIMEOUT};

fn main() -> Result<()> {
    let args = Cli::parse();
    io::init_logger(args.log_level)?;
    ensure!(
        (0.0..=1.0).contains(&args.area_ratio),
        "area_ratio must lie in [0, 1], got {}",
        args.area_ratio
    );

    let config = match &args.config_file {
        Some(path) => {
            let file = File::open(path).context("could not open config file")?;
            serde_json::from_reader(BufReader::new(file)).unwrap_or_else(|err| {
                warn!("config file could not be parsed: {err}");
                warn!("falling back on the default config");
                SAConfig::default()
            })
        }
        None => SAConfig::default(),
    };
    let config = config.with_area_ratio(args.area_ratio);
    info!("config: {}", serde_json::to_string(&config)?);

    let start = Instant::now();
    let instance = io::read_instance(&args.input_file)?;

    let mut timeout = TimeoutManager::new(DEFAULT_TIMEOUT);
    timeout.start_watchdog();

    let rng = match config.prng_seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    let mut optimizer = SAOptimizer::new(&instance, config, rng)?.with_timeout(timeout.flag());
    optimizer.solve()?;

    if timeout.has_timed_out() {
        warn!("writing the best solution found before the timeout");
    }
    io::write_placement(&args.output_file, optimizer.tree())?;
    if let Some(svg_path) = &args.svg {
        io::write_svg(&io::placement_to_svg(optimizer.tree()), svg_path)?;
    }

    info!(
        "finished in {}s, final area: {}",
        start.elapsed().as_secs(),
        optimizer.tree().area()
    );
    Ok(())
}
