//! Renders the `snapctl(1)` manual page into `OUT_DIR` from the clap parser.

use std::env;
use std::error::Error;
use std::fs;
use std::io::{self, Write};
use std::path::PathBuf;

use clap::CommandFactory;
use clap_mangen::Man;

#[path = "src/cli/mod.rs"]
mod cli;

const MANUAL_NAME: &str = "snapctl.1";

fn manual_path() -> io::Result<PathBuf> {
    env::var_os("OUT_DIR")
        .map(|dir| PathBuf::from(dir).join(MANUAL_NAME))
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "OUT_DIR is not set"))
}

fn main() -> Result<(), Box<dyn Error>> {
    let mut cargo = io::stdout().lock();
    for watched in ["build.rs", "src/cli/mod.rs"] {
        writeln!(cargo, "cargo:rerun-if-changed={watched}")?;
    }

    let command = cli::Cli::command().version(env!("CARGO_PKG_VERSION"));
    let mut page = Vec::new();
    Man::new(command).render(&mut page)?;
    fs::write(manual_path()?, page)?;

    Ok(())
}
