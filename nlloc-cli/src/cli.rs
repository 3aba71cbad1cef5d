//! Command line argument handling.

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgMatches, ColorChoice, Command};

pub struct Cli {
    pub matches: ArgMatches,
}

impl Cli {
    pub fn new() -> Self {
        let matches = Command::new("nlloc")
        .about("Non-linear hypocenter location engine")
        .color(ColorChoice::Auto)
        .arg(
            Arg::new("control")
            .long("control")
            .short('c')
            .value_parser(value_parser!(PathBuf))
            .required(true)
            .help("Path to the control file"),
        )
        .arg(
            Arg::new("obs")
            .long("obs")
            .short('o')
            .value_parser(value_parser!(PathBuf))
            .help("Path to the NLLOC_OBS phase-pick file (overrides LOCFILES)"),
        )
        .arg(
            Arg::new("output-dir")
            .long("output-dir")
            .value_parser(value_parser!(PathBuf))
            .help("Directory to write phase/scatter output into (overrides LOCFILES)"),
        )
        .arg(
            Arg::new("quiet")
            .long("quiet")
            .short('q')
            .action(clap::ArgAction::SetTrue)
            .help("Suppress per-event summary lines on stdout"),
        )
        .get_matches();

        Self { matches }
    }

    pub fn control_path(&self) -> PathBuf {
        self.matches.get_one::<PathBuf>("control").expect("required").clone()
    }

    pub fn obs_path_override(&self) -> Option<PathBuf> {
        self.matches.get_one::<PathBuf>("obs").cloned()
    }

    pub fn output_dir_override(&self) -> Option<PathBuf> {
        self.matches.get_one::<PathBuf>("output-dir").cloned()
    }

    pub fn quiet(&self) -> bool {
        self.matches.get_flag("quiet")
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self::new()
    }
}
