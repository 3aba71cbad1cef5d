//! Command line batch driver for the hypocenter location engine.
//! Refer to README for command line arguments.

mod cli;
mod grids;
mod run;

use std::fs;
use std::path::PathBuf;

use cli::Cli;
use log::{error, info};
use thiserror::Error;

use nlloc_io::control::parse_control_text;

/// Errors surfaced at the command line boundary; every variant is a
/// condition the batch run can recover from by skipping the offending
/// event rather than aborting the whole run, except for control-file
/// and I/O failures at startup.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("control file error: {0}")]
    Control(String),
    #[error("grid error: {0}")]
    Grid(String),
    #[error("I/O error: {0}")]
    Io(String),
}

fn main() {
    pretty_env_logger::init_timed();

    if let Err(err) = run() {
        error!("{err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), CliError> {
    let cli = Cli::new();

    let control_text = fs::read_to_string(cli.control_path()).map_err(|e| CliError::Io(e.to_string()))?;
    let mut control = parse_control_text(&control_text);

    let obs_path = cli
    .obs_path_override()
    .unwrap_or_else(|| PathBuf::from(&control.loc_files.obs_file_pattern));
    let output_dir = cli
    .output_dir_override()
    .unwrap_or_else(|| PathBuf::from(&control.loc_files.output_root));
    if let Some(obs_override) = cli.obs_path_override() {
        control.loc_files.obs_file_pattern = obs_override.display().to_string();
    }

    let obs_text = fs::read_to_string(&obs_path).map_err(|e| CliError::Io(e.to_string()))?;

    let located = run::run_batch(&control, &obs_text, &output_dir)?;
    if !cli.quiet() {
        info!("{located} event(s) located, output written to {}", output_dir.display());
    }
    Ok(())
}
