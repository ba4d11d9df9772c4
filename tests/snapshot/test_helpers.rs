//! Shared fixtures for snapshot BDD scenarios.

use rstest::fixture;
use snapctl::test_support::FakeFleet;
use snapctl::{CancelHandle, Instance, RunSummary, Stage, StageListener};

#[derive(Clone, Debug, Default)]
pub struct SnapshotContext {
    pub fleet: FakeFleet,
    pub cancel_when_running: bool,
    pub outcome: Option<RunResult>,
}

#[derive(Clone, Debug)]
pub enum RunResult {
    Completed(RunSummary),
    Aborted(String),
}

impl RunResult {
    pub const fn summary(&self) -> Option<&RunSummary> {
        match self {
            Self::Completed(summary) => Some(summary),
            Self::Aborted(_) => None,
        }
    }
}

/// Cancels the run the first time any instance reaches `running`.
pub struct CancelOnRunning {
    pub handle: Option<CancelHandle>,
}

impl StageListener for CancelOnRunning {
    fn entered(&mut self, _instance: &Instance, stage: Stage) {
        if stage == Stage::Running {
            if let Some(handle) = self.handle.take() {
                handle.cancel();
            }
        }
    }
}

#[fixture]
pub fn snapshot_context() -> SnapshotContext {
    SnapshotContext::default()
}
