//! Command-line interface definitions for the `snapctl` binary.
//!
//! This module centralises the clap parser structures so both the main binary
//! and the build script can reuse them when generating the manual page.

use clap::{Args, Parser, Subcommand};

/// Top-level CLI for the `snapctl` binary.
#[derive(Debug, Parser)]
#[command(
    name = "snapctl",
    about = "Stop, snapshot and restart the instances of a tagged project",
    arg_required_else_help = true,
    after_help = "Ctrl-C finishes the current instance and skips the rest; press it again to exit immediately."
)]
pub(crate) struct Cli {
    /// Emit debug logs on stderr. `RUST_LOG` overrides this flag.
    #[arg(short, long, global = true)]
    pub(crate) verbose: bool,
    /// Operation to run.
    #[command(subcommand)]
    pub(crate) command: Command,
}

/// Subcommands of `snapctl`.
#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// List instances with their type, zone, state and public address.
    ListInstances(Target),
    /// List the volumes attached to the selected instances.
    ListVolumes(Target),
    /// List the snapshots taken from the selected instances' volumes.
    ListSnapshots(Target),
    /// Power off the selected instances.
    Stop(PowerArgs),
    /// Power on the selected instances.
    Start(PowerArgs),
    /// Stop each instance, snapshot every volume, then start it again.
    Snapshot(Target),
}

/// Instance selection shared by every subcommand.
#[derive(Debug, Args)]
pub(crate) struct Target {
    /// Only act on instances whose `Project` tag equals NAME.
    ///
    /// Without this flag every instance in the configured zone is selected.
    #[arg(long, value_name = "NAME")]
    pub(crate) project: Option<String>,
}

/// Arguments for `stop` and `start`.
#[derive(Debug, Args)]
pub(crate) struct PowerArgs {
    /// Instance selection.
    #[command(flatten)]
    pub(crate) target: Target,
    /// Return once the provider accepts the request instead of waiting for
    /// the instance to settle.
    #[arg(long)]
    pub(crate) no_wait: bool,
}
