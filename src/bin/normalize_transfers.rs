//! Usage: normalize_transfers [input.csv] > output.csv
//!
//! Reads stdin when no path is given.

use anyhow::Result;
use std::{
    env,
    io::{self, BufWriter},
    path::PathBuf,
};
use tokenflow::{logging::init_logging, process::read_input, Normalizer};

fn main() -> Result<()> {
    init_logging("warn");

    let input_path = env::args_os().nth(1).map(PathBuf::from);
    let input = read_input(input_path.as_deref())?;

    let stdout = io::stdout();
    let mut normalizer = Normalizer::new(rand::thread_rng());
    normalizer.normalize_to_writer(&input, BufWriter::new(stdout.lock()))?;

    Ok(())
}
