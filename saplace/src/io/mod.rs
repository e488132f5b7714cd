use crate::EPOCH;
use anyhow::{Context, Result};
use log::{info, log, Level, LevelFilter};
use std::fs;
use std::path::Path;
use svg::Document;
use symplace::entities::Instance;
use symplace::tree::HbTree;

pub mod cli;
mod svg_export;

pub use svg_export::placement_to_svg;

pub fn read_instance(path: &Path) -> Result<Instance> {
    let instance = symplace::io::read_instance(path)?;
    info!(
        "parsed {} modules and {} symmetry groups from {path:?}",
        instance.n_modules(),
        instance.symmetry_groups.len()
    );
    Ok(instance)
}

pub fn write_placement(path: &Path, tree: &HbTree) -> Result<()> {
    symplace::io::write_placement(path, tree)?;
    info!(
        "placement written to file://{}",
        fs::canonicalize(path)?.to_str().unwrap()
    );
    Ok(())
}

pub fn write_svg(document: &Document, path: &Path) -> Result<()> {
    svg::save(path, document).context("could not save SVG")?;
    info!(
        "placement SVG written to file://{}",
        fs::canonicalize(path)?.to_str().unwrap()
    );
    Ok(())
}

pub fn init_logger(level_filter: LevelFilter) -> Result<()> {
    fern::Dispatch::new()
        .format(|out, message, record| {
            let duration = EPOCH.elapsed();
            let sec = duration.as_secs() % 60;
            let min = (duration.as_secs() / 60) % 60;
            let hours = (duration.as_secs() / 60) / 60;

            let prefix = format!(
                "[{}] [{:0>2}:{:0>2}:{:0>2}]",
                record.level(),
                hours,
                min,
                sec,
            );

            out.finish(format_args!("{prefix:<18}{message}"))
        })
        .level(level_filter)
        .chain(std::io::stdout())
        .apply()?;
    log!(Level::Info, "Epoch: {}", jiff::Timestamp::now());
    Ok(())
}
