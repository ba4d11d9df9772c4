//! BDD step definitions for the snapshot lifecycle.

use rstest_bdd_macros::{given, then, when};
use snapctl::test_support::{Fault, Faults, ProviderCall, instance, volume};
use snapctl::{
    Cancellation, OutcomeStatus, PowerState, Selector, SnapshotOrchestrator, Stage,
};
use tokio::runtime::Runtime;

use super::test_helpers::{CancelOnRunning, RunResult, SnapshotContext};

#[derive(Debug, thiserror::Error)]
pub enum StepError {
    #[error("assertion failed: {0}")]
    Assertion(String),
}

#[given("a fleet with two demo instances and one untagged instance")]
fn demo_fleet(snapshot_context: SnapshotContext) -> SnapshotContext {
    let fleet = &snapshot_context.fleet;
    fleet.add_instance(instance("i-a", Some("demo")), vec![volume("vol-1", "i-a")]);
    fleet.add_instance(
        instance("i-b", Some("demo")),
        vec![volume("vol-2", "i-b"), volume("vol-3", "i-b")],
    );
    fleet.add_instance(instance("i-c", None), vec![volume("vol-4", "i-c")]);
    snapshot_context
}

#[given("stopping \"{id}\" is rejected")]
fn stop_rejected(snapshot_context: SnapshotContext, id: String) -> SnapshotContext {
    snapshot_context.fleet.set_faults(
        &id,
        Faults {
            stop: Some(Fault::Reject),
            ..Faults::default()
        },
    );
    snapshot_context
}

#[given("stopping \"{id}\" violates the provider contract")]
fn stop_violates_contract(snapshot_context: SnapshotContext, id: String) -> SnapshotContext {
    snapshot_context.fleet.set_faults(
        &id,
        Faults {
            stop: Some(Fault::Contract),
            ..Faults::default()
        },
    );
    snapshot_context
}

#[given("snapshots of volume \"{volume_id}\" on \"{id}\" are rejected")]
fn snapshot_rejected(
    snapshot_context: SnapshotContext,
    volume_id: String,
    id: String,
) -> SnapshotContext {
    snapshot_context.fleet.set_faults(
        &id,
        Faults {
            snapshot: [(volume_id, Fault::Reject)].into_iter().collect(),
            ..Faults::default()
        },
    );
    snapshot_context
}

#[given("the run is cancelled once the first instance is running")]
fn cancel_when_running(mut snapshot_context: SnapshotContext) -> SnapshotContext {
    snapshot_context.cancel_when_running = true;
    snapshot_context
}

#[when("I snapshot project \"{project}\"")]
fn snapshot_project(
    snapshot_context: SnapshotContext,
    project: String,
) -> Result<SnapshotContext, StepError> {
    let runtime = Runtime::new().map_err(|err| StepError::Assertion(err.to_string()))?;
    let SnapshotContext {
        fleet,
        cancel_when_running,
        ..
    } = snapshot_context;

    let selector = Selector::from_project(Some(project.as_str()))
        .map_err(|err| StepError::Assertion(err.to_string()))?;
    let orchestrator = SnapshotOrchestrator::new(fleet.clone());
    let result = runtime.block_on(async move {
        let instances = orchestrator.resolve(&selector).await?;
        if cancel_when_running {
            let (handle, cancel) = Cancellation::pair();
            let mut listener = CancelOnRunning {
                handle: Some(handle),
            };
            orchestrator.snapshot(instances, &cancel, &mut listener).await
        } else {
            orchestrator
                .snapshot(instances, &Cancellation::never(), &mut ())
                .await
        }
    });
    let outcome = match result {
        Ok(summary) => RunResult::Completed(summary),
        Err(err) => RunResult::Aborted(err.to_string()),
    };

    Ok(SnapshotContext {
        fleet,
        cancel_when_running,
        outcome: Some(outcome),
    })
}

fn outcome_status(
    snapshot_context: &SnapshotContext,
    id: &str,
) -> Result<(OutcomeStatus, Stage), StepError> {
    let summary = snapshot_context
        .outcome
        .as_ref()
        .and_then(RunResult::summary)
        .ok_or_else(|| StepError::Assertion(String::from("expected a completed run")))?;
    summary
        .outcome(id)
        .map(|outcome| (outcome.status, outcome.stage))
        .ok_or_else(|| StepError::Assertion(format!("no outcome recorded for {id}")))
}

#[then("instance \"{id}\" succeeds")]
fn instance_succeeds(snapshot_context: &SnapshotContext, id: String) -> Result<(), StepError> {
    match outcome_status(snapshot_context, &id)? {
        (OutcomeStatus::Success, Stage::Running) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {id} to succeed at running, got {other:?}"
        ))),
    }
}

#[then("instance \"{id}\" fails at stage \"{stage}\"")]
fn instance_fails_at(
    snapshot_context: &SnapshotContext,
    id: String,
    stage: String,
) -> Result<(), StepError> {
    let (status, reached) = outcome_status(snapshot_context, &id)?;
    if status == OutcomeStatus::Failed && reached.as_str() == stage {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {id} to fail at {stage}, got {status} at {reached}"
        )))
    }
}

#[then("instance \"{id}\" is skipped")]
fn instance_skipped(snapshot_context: &SnapshotContext, id: String) -> Result<(), StepError> {
    let (status, _) = outcome_status(snapshot_context, &id)?;
    if status == OutcomeStatus::Skipped {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {id} to be skipped, got {status}"
        )))
    }
}

#[then("instance \"{id}\" is untouched")]
fn instance_untouched(snapshot_context: &SnapshotContext, id: String) -> Result<(), StepError> {
    let calls = snapshot_context.fleet.calls_for(&id);
    if calls.is_empty() {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected no calls for {id}, got {calls:?}"
        )))
    }
}

#[then("instance \"{id}\" is never started")]
fn instance_never_started(
    snapshot_context: &SnapshotContext,
    id: String,
) -> Result<(), StepError> {
    let calls = snapshot_context.fleet.calls_for(&id);
    if calls.contains(&ProviderCall::Start(id.clone())) {
        Err(StepError::Assertion(format!(
            "{id} should not be started: {calls:?}"
        )))
    } else {
        Ok(())
    }
}

#[then("instance \"{id}\" is running")]
fn instance_running(snapshot_context: &SnapshotContext, id: String) -> Result<(), StepError> {
    match snapshot_context.fleet.power_state(&id) {
        Some(PowerState::Running) => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected {id} to be running, got {other:?}"
        ))),
    }
}

#[then("{count} snapshot requests are issued")]
fn snapshot_requests_issued(
    snapshot_context: &SnapshotContext,
    count: usize,
) -> Result<(), StepError> {
    let requests = snapshot_context.fleet.snapshot_requests();
    if requests.len() == count {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected {count} snapshot requests, got {requests:?}"
        )))
    }
}

#[then("no instance is processed")]
fn no_instance_processed(snapshot_context: &SnapshotContext) -> Result<(), StepError> {
    let summary = snapshot_context
        .outcome
        .as_ref()
        .and_then(RunResult::summary)
        .ok_or_else(|| StepError::Assertion(String::from("expected a completed run")))?;
    let calls = snapshot_context.fleet.calls();
    let only_listing = calls
        .iter()
        .all(|call| matches!(call, ProviderCall::ListInstances(_)));
    if summary.outcomes.is_empty() && only_listing {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected an empty run, got {summary:?} with calls {calls:?}"
        )))
    }
}

#[then("the exit code is {code}")]
fn exit_code_is(snapshot_context: &SnapshotContext, code: i32) -> Result<(), StepError> {
    let summary = snapshot_context
        .outcome
        .as_ref()
        .and_then(RunResult::summary)
        .ok_or_else(|| StepError::Assertion(String::from("expected a completed run")))?;
    if summary.exit_code() == code {
        Ok(())
    } else {
        Err(StepError::Assertion(format!(
            "expected exit code {code}, got {}",
            summary.exit_code()
        )))
    }
}

#[then("the run aborts with a contract violation")]
fn run_aborts(snapshot_context: &SnapshotContext) -> Result<(), StepError> {
    match &snapshot_context.outcome {
        Some(RunResult::Aborted(message)) if message.contains("contract violated") => Ok(()),
        other => Err(StepError::Assertion(format!(
            "expected a contract abort, got {other:?}"
        ))),
    }
}
