use once_cell::sync::Lazy;
use std::time::Instant;

pub mod config;
pub mod io;
pub mod optimizer;
pub mod timeout;

pub static EPOCH: Lazy<Instant> = Lazy::new(Instant::now);
