//! Drives instances through the stop → snapshot → start cycle.
//!
//! Instances are processed one at a time in enumeration order. Each instance
//! walks an explicit [`Stage`] machine; a provider error classified as
//! [`FaultClass::Api`] ends that instance's run with a failed [`Outcome`] and
//! processing moves on. A [`FaultClass::Contract`] error aborts the whole run.
//! Once an instance has stopped it always receives exactly one start request,
//! whatever happened to its snapshot requests.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::cancel::Cancellation;
use crate::provider::{FaultClass, FleetProvider, Instance, ProviderFault};
use crate::report::{Outcome, ResultReporter, RunSummary, SnapshotRequest};
use crate::selector::{InstanceFilter, Selector};

/// Provenance description attached to every snapshot by default.
pub const DEFAULT_SNAPSHOT_DESCRIPTION: &str = "Created by snapshot orchestrator";

/// Stages an instance moves through during a run.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Chosen by the selector, nothing requested yet.
    Selected,
    /// Stop requested.
    Stopping,
    /// Provider reports the instance stopped.
    Stopped,
    /// Issuing one snapshot request per attached volume.
    Snapshotting,
    /// Start requested.
    Starting,
    /// Provider reports the instance running.
    Running,
}

impl Stage {
    /// Returns the lowercase stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Selected => "selected",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Snapshotting => "snapshotting",
            Self::Starting => "starting",
            Self::Running => "running",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives progress notifications while a run is underway.
pub trait StageListener {
    /// Called after an instance entered a new stage.
    fn entered(&mut self, instance: &Instance, stage: Stage);

    /// Called after each snapshot request, accepted or not.
    fn snapshot_requested(&mut self, _instance: &Instance, _request: &SnapshotRequest) {}
}

impl StageListener for () {
    fn entered(&mut self, _instance: &Instance, _stage: Stage) {}
}

/// Single power transition driven by the `stop` and `start` commands.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PowerAction {
    /// Power the instance off.
    Stop,
    /// Power the instance on.
    Start,
}

impl PowerAction {
    const fn requested(self) -> Stage {
        match self {
            Self::Stop => Stage::Stopping,
            Self::Start => Stage::Starting,
        }
    }

    const fn settled(self) -> Stage {
        match self {
            Self::Stop => Stage::Stopped,
            Self::Start => Stage::Running,
        }
    }
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum OrchestratorError<E>
where
    E: std::error::Error + 'static,
{
    /// Raised when the instance set cannot be enumerated.
    #[error("failed to enumerate instances: {0}")]
    Enumerate(#[source] E),
    /// Raised when the provider fails outside its documented error class.
    #[error("provider contract violated at stage {stage} of instance {instance_id}: {source}")]
    Contract {
        /// Instance being processed.
        instance_id: String,
        /// Stage in flight when the fault surfaced.
        stage: Stage,
        /// Provider error.
        #[source]
        source: E,
        /// Outcomes recorded before the abort, ending with the aborted
        /// instance.
        partial: Box<RunSummary>,
    },
}

impl<E> OrchestratorError<E>
where
    E: std::error::Error + 'static,
{
    /// Returns the outcomes recorded before a contract abort.
    #[must_use]
    pub fn partial(&self) -> Option<&RunSummary> {
        match self {
            Self::Enumerate(_) => None,
            Self::Contract { partial, .. } => Some(partial.as_ref()),
        }
    }
}

/// Contract fault raised while driving one instance.
#[derive(Debug)]
struct ContractFault<E> {
    stage: Stage,
    source: E,
}

#[derive(Clone, Copy, Debug)]
enum Plan {
    Snapshot,
    Power { action: PowerAction, wait: bool },
}

#[derive(Debug, Default)]
struct SnapshotPhase {
    requests: Vec<SnapshotRequest>,
    enumeration_error: Option<String>,
}

impl SnapshotPhase {
    fn failure_detail(&self) -> Option<String> {
        if let Some(error) = &self.enumeration_error {
            return Some(format!("failed to enumerate volumes: {error}"));
        }
        let rejected = self
            .requests
            .iter()
            .filter(|request| request.is_rejected())
            .count();
        (rejected > 0).then(|| {
            format!(
                "{rejected} of {} snapshot requests failed",
                self.requests.len()
            )
        })
    }
}

/// Executes snapshot, stop and start runs against a fleet provider.
#[derive(Debug)]
pub struct SnapshotOrchestrator<P> {
    provider: P,
    description: String,
}

impl<P> SnapshotOrchestrator<P>
where
    P: FleetProvider,
{
    /// Creates an orchestrator using the default provenance description.
    #[must_use]
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            description: String::from(DEFAULT_SNAPSHOT_DESCRIPTION),
        }
    }

    /// Overrides the description attached to created snapshots.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Returns the underlying provider.
    #[must_use]
    pub const fn provider(&self) -> &P {
        &self.provider
    }

    /// Resolves the selector into the instances a run will process.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Enumerate`] when the provider cannot list
    /// instances.
    pub async fn resolve(
        &self,
        selector: &Selector,
    ) -> Result<Vec<Instance>, OrchestratorError<P::Error>> {
        InstanceFilter::new(&self.provider)
            .resolve(selector)
            .await
            .map_err(OrchestratorError::Enumerate)
    }

    /// Stops, snapshots and restarts every instance.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Contract`] when the provider reports an
    /// error outside the recoverable class. Recoverable failures are recorded
    /// in the returned summary instead.
    pub async fn snapshot<L: StageListener>(
        &self,
        instances: Vec<Instance>,
        cancel: &Cancellation,
        listener: &mut L,
    ) -> Result<RunSummary, OrchestratorError<P::Error>> {
        self.execute(Plan::Snapshot, instances, cancel, listener)
            .await
    }

    /// Applies a single power transition to every instance, optionally
    /// waiting for the provider to settle.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::Contract`] when the provider reports an
    /// error outside the recoverable class.
    pub async fn power<L: StageListener>(
        &self,
        action: PowerAction,
        wait: bool,
        instances: Vec<Instance>,
        cancel: &Cancellation,
        listener: &mut L,
    ) -> Result<RunSummary, OrchestratorError<P::Error>> {
        self.execute(Plan::Power { action, wait }, instances, cancel, listener)
            .await
    }

    async fn execute<L: StageListener>(
        &self,
        plan: Plan,
        instances: Vec<Instance>,
        cancel: &Cancellation,
        listener: &mut L,
    ) -> Result<RunSummary, OrchestratorError<P::Error>> {
        let mut reporter = ResultReporter::new();
        let mut queue = instances.into_iter();

        while let Some(instance) = queue.next() {
            if cancel.is_cancelled() {
                warn!(instance_id = %instance.id, "run cancelled; skipping remaining instances");
                reporter.mark_cancelled();
                reporter.record(Outcome::skipped(instance.id));
                for remaining in queue.by_ref() {
                    reporter.record(Outcome::skipped(remaining.id));
                }
                break;
            }

            let driven = match plan {
                Plan::Snapshot => self.cycle(&instance, listener).await,
                Plan::Power { action, wait } => {
                    self.transition(action, wait, &instance, listener).await
                }
            };
            match driven {
                Ok(outcome) => reporter.record(outcome),
                Err(ContractFault { stage, source }) => {
                    reporter.record(Outcome::failed(
                        instance.id.clone(),
                        stage,
                        source.to_string(),
                    ));
                    return Err(OrchestratorError::Contract {
                        instance_id: instance.id,
                        stage,
                        source,
                        partial: Box::new(reporter.summary()),
                    });
                }
            }
        }

        Ok(reporter.summary())
    }

    async fn cycle<L: StageListener>(
        &self,
        instance: &Instance,
        listener: &mut L,
    ) -> Result<Outcome, ContractFault<P::Error>> {
        let mut stage = Stage::Selected;
        let mut phase = SnapshotPhase::default();

        loop {
            let step = match stage {
                Stage::Selected => self
                    .provider
                    .stop(instance)
                    .await
                    .map(|()| Stage::Stopping)
                    .map_err(|err| (Stage::Stopping, err)),
                Stage::Stopping => self
                    .provider
                    .wait_until_stopped(instance)
                    .await
                    .map(|()| Stage::Stopped)
                    .map_err(|err| (Stage::Stopping, err)),
                Stage::Stopped => Ok(Stage::Snapshotting),
                Stage::Snapshotting => match self.snapshot_volumes(instance, listener).await {
                    Ok(done) => {
                        phase = done;
                        self.provider
                            .start(instance)
                            .await
                            .map(|()| Stage::Starting)
                            .map_err(|err| (Stage::Starting, err))
                    }
                    Err(err) => Err((Stage::Snapshotting, err)),
                },
                Stage::Starting => self
                    .provider
                    .wait_until_running(instance)
                    .await
                    .map(|()| Stage::Running)
                    .map_err(|err| (Stage::Starting, err)),
                Stage::Running => break,
            };

            match step {
                Ok(next) => {
                    info!(instance_id = %instance.id, stage = %next, "stage transition");
                    listener.entered(instance, next);
                    stage = next;
                }
                Err((failed_at, err)) => {
                    if err.class() == FaultClass::Contract && failed_at == Stage::Snapshotting {
                        self.restart_after_fault(instance).await;
                    }
                    return Self::absorb(instance, failed_at, err)
                        .map(|outcome| outcome.with_snapshots(phase.requests));
                }
            }
        }

        let outcome = match phase.failure_detail() {
            Some(detail) => {
                warn!(instance_id = %instance.id, %detail, "instance restarted with incomplete snapshots");
                Outcome::failed(instance.id.clone(), Stage::Running, detail)
            }
            None => Outcome::success(instance.id.clone(), Stage::Running),
        };
        Ok(outcome.with_snapshots(phase.requests))
    }

    /// Issues one snapshot request per attached volume. Recoverable failures
    /// are recorded in the phase; only contract faults are returned.
    async fn snapshot_volumes<L: StageListener>(
        &self,
        instance: &Instance,
        listener: &mut L,
    ) -> Result<SnapshotPhase, P::Error> {
        let volumes = match self.provider.list_volumes(instance).await {
            Ok(volumes) => volumes,
            Err(err) if err.class() == FaultClass::Api => {
                warn!(instance_id = %instance.id, error = %err, "volume enumeration failed");
                return Ok(SnapshotPhase {
                    requests: Vec::new(),
                    enumeration_error: Some(err.to_string()),
                });
            }
            Err(err) => return Err(err),
        };

        let mut requests = Vec::with_capacity(volumes.len());
        for volume in &volumes {
            let request = match self
                .provider
                .create_snapshot(volume, &self.description)
                .await
            {
                Ok(snapshot) => SnapshotRequest::Issued {
                    volume_id: volume.id.clone(),
                    snapshot_id: snapshot.id,
                },
                Err(err) if err.class() == FaultClass::Api => {
                    warn!(instance_id = %instance.id, volume_id = %volume.id, error = %err, "snapshot request failed");
                    SnapshotRequest::Rejected {
                        volume_id: volume.id.clone(),
                        detail: err.to_string(),
                    }
                }
                Err(err) => return Err(err),
            };
            listener.snapshot_requested(instance, &request);
            requests.push(request);
        }

        Ok(SnapshotPhase {
            requests,
            enumeration_error: None,
        })
    }

    async fn restart_after_fault(&self, instance: &Instance) {
        if let Err(err) = self.provider.start(instance).await {
            warn!(instance_id = %instance.id, error = %err, "restart after provider fault failed");
        }
    }

    async fn transition<L: StageListener>(
        &self,
        action: PowerAction,
        wait: bool,
        instance: &Instance,
        listener: &mut L,
    ) -> Result<Outcome, ContractFault<P::Error>> {
        let requested = action.requested();
        let request = match action {
            PowerAction::Stop => self.provider.stop(instance).await,
            PowerAction::Start => self.provider.start(instance).await,
        };
        if let Err(err) = request {
            return Self::absorb(instance, requested, err);
        }
        info!(instance_id = %instance.id, stage = %requested, "stage transition");
        listener.entered(instance, requested);

        if !wait {
            return Ok(Outcome::success(instance.id.clone(), requested));
        }

        let settled = action.settled();
        let converged = match action {
            PowerAction::Stop => self.provider.wait_until_stopped(instance).await,
            PowerAction::Start => self.provider.wait_until_running(instance).await,
        };
        if let Err(err) = converged {
            return Self::absorb(instance, requested, err);
        }
        info!(instance_id = %instance.id, stage = %settled, "stage transition");
        listener.entered(instance, settled);
        Ok(Outcome::success(instance.id.clone(), settled))
    }

    fn absorb(
        instance: &Instance,
        stage: Stage,
        err: P::Error,
    ) -> Result<Outcome, ContractFault<P::Error>> {
        match err.class() {
            FaultClass::Api => {
                warn!(instance_id = %instance.id, %stage, error = %err, "instance failed");
                Ok(Outcome::failed(instance.id.clone(), stage, err.to_string()))
            }
            FaultClass::Contract => Err(ContractFault { stage, source: err }),
        }
    }
}
