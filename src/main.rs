//! Binary entry point for the snapctl CLI.

mod cli;

use std::env;
use std::io::{self, Write};
use std::process;

use camino::Utf8PathBuf;
use clap::Parser;
use thiserror::Error;

use cli::{Cli, Command};
use snapctl::config::ConfigError;
use snapctl::inventory::{self, InstanceLine, VolumeLine};
use snapctl::test_support::{FAKE_FLEET_ENV, FakeFleet, FixtureError};
use snapctl::{
    Cancellation, FleetConfig, FleetProvider, Instance, PowerAction,
    ScalewayConfig, ScalewayFleet, Selector, SelectorError, SnapshotOrchestrator,
    SnapshotRequest, Stage, StageListener, logging,
};

#[derive(Debug, Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid project: {0}")]
    Selector(#[from] SelectorError),
    #[error(transparent)]
    Fixture(#[from] FixtureError),
    #[error("listing failed: {0}")]
    Listing(String),
    #[error("run aborted: {0}")]
    Aborted(String),
}

impl From<ConfigError> for CliError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value.to_string())
    }
}

/// Prints one progress line per stage transition and snapshot request.
struct ConsoleListener<W> {
    out: W,
}

impl<W: Write> StageListener for ConsoleListener<W> {
    fn entered(&mut self, instance: &Instance, stage: Stage) {
        writeln!(self.out, "{}: {stage}", instance.id).ok();
    }

    fn snapshot_requested(&mut self, instance: &Instance, request: &SnapshotRequest) {
        writeln!(self.out, "{}: {request}", instance.id).ok();
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logging::init(cli.verbose).ok();

    let exit_code = match dispatch(&cli.command).await {
        Ok(code) => code,
        Err(err) => {
            report_error(&err);
            1
        }
    };

    process::exit(exit_code);
}

async fn dispatch(command: &Command) -> Result<i32, CliError> {
    let settings = FleetConfig::load_without_cli_args()?;
    settings.validate()?;
    let cancel = Cancellation::on_interrupt();
    let mut stdout = io::stdout();

    if let Ok(path) = env::var(FAKE_FLEET_ENV) {
        let fleet = FakeFleet::load(&Utf8PathBuf::from(path))?;
        return execute(fleet, command, &settings, &cancel, &mut stdout).await;
    }

    let scaleway = ScalewayConfig::load_without_cli_args()?;
    let fleet = ScalewayFleet::new(scaleway, &settings)
        .map_err(|err| CliError::Config(err.to_string()))?;
    execute(fleet, command, &settings, &cancel, &mut stdout).await
}

const fn project_of(command: &Command) -> Option<&String> {
    match command {
        Command::ListInstances(target)
        | Command::ListVolumes(target)
        | Command::ListSnapshots(target)
        | Command::Snapshot(target) => target.project.as_ref(),
        Command::Stop(args) | Command::Start(args) => args.target.project.as_ref(),
    }
}

async fn execute<P, W>(
    provider: P,
    command: &Command,
    settings: &FleetConfig,
    cancel: &Cancellation,
    out: &mut W,
) -> Result<i32, CliError>
where
    P: FleetProvider,
    W: Write,
{
    let selector = Selector::from_project(project_of(command).map(String::as_str))?;
    let orchestrator = SnapshotOrchestrator::new(provider)
        .with_description(settings.snapshot_description.clone());
    let instances = orchestrator
        .resolve(&selector)
        .await
        .map_err(|err| CliError::Aborted(err.to_string()))?;

    let run = match command {
        Command::ListInstances(_) => {
            for instance in &instances {
                writeln!(out, "{}", InstanceLine(instance)).ok();
            }
            return Ok(0);
        }
        Command::ListVolumes(_) => {
            let volumes = inventory::volumes(orchestrator.provider(), &instances)
                .await
                .map_err(|err| CliError::Listing(err.to_string()))?;
            for volume in &volumes {
                writeln!(out, "{}", VolumeLine(volume)).ok();
            }
            return Ok(0);
        }
        Command::ListSnapshots(_) => {
            let records = inventory::snapshots(orchestrator.provider(), &instances)
                .await
                .map_err(|err| CliError::Listing(err.to_string()))?;
            for record in &records {
                writeln!(out, "{record}").ok();
            }
            return Ok(0);
        }
        Command::Stop(args) => {
            orchestrator
                .power(
                    PowerAction::Stop,
                    !args.no_wait,
                    instances,
                    cancel,
                    &mut ConsoleListener { out: &mut *out },
                )
                .await
        }
        Command::Start(args) => {
            orchestrator
                .power(
                    PowerAction::Start,
                    !args.no_wait,
                    instances,
                    cancel,
                    &mut ConsoleListener { out: &mut *out },
                )
                .await
        }
        Command::Snapshot(_) => {
            orchestrator
                .snapshot(instances, cancel, &mut ConsoleListener { out: &mut *out })
                .await
        }
    };
    let summary = match run {
        Ok(summary) => summary,
        Err(err) => {
            if let Some(partial) = err.partial() {
                for outcome in &partial.outcomes {
                    writeln!(out, "{outcome}").ok();
                }
            }
            return Err(CliError::Aborted(err.to_string()));
        }
    };

    for outcome in &summary.outcomes {
        writeln!(out, "{outcome}").ok();
    }
    writeln!(out, "{summary}").ok();
    Ok(summary.exit_code())
}

fn report_error(err: &CliError) {
    write_error(io::stderr(), err);
}

fn write_error(mut target: impl Write, err: &CliError) {
    writeln!(target, "{err}").ok();
}
