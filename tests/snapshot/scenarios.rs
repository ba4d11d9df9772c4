//! BDD scenarios for the snapshot lifecycle.

use rstest_bdd_macros::scenario;

use super::test_helpers::{SnapshotContext, snapshot_context};

#[scenario(
    path = "tests/features/snapshot.feature",
    name = "Snapshot every instance of a project"
)]
fn scenario_project_snapshot(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot.feature",
    name = "A stop failure does not affect other instances"
)]
fn scenario_stop_failure(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot.feature",
    name = "A rejected snapshot still restarts the instance"
)]
fn scenario_rejected_snapshot(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot.feature",
    name = "Selecting nothing is a clean no-op"
)]
fn scenario_empty_selection(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot.feature",
    name = "Cancelling finishes the current instance and skips the rest"
)]
fn scenario_cancellation(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}

#[scenario(
    path = "tests/features/snapshot.feature",
    name = "A provider contract violation aborts the run"
)]
fn scenario_contract_violation(snapshot_context: SnapshotContext) {
    drop(snapshot_context);
}
