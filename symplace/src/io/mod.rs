mod export;
mod import;

pub use export::{format_placement, write_placement};
pub use import::{parse_instance, read_instance};
