//! Per-instance outcomes and the end-of-run summary.

use std::fmt;

use serde::Serialize;

use crate::orchestrator::Stage;

/// Exit code used when a run was interrupted before every instance ran.
pub const CANCELLED_EXIT_CODE: i32 = 130;

/// Final status of one instance.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    /// Every step succeeded.
    Success,
    /// The instance was never attempted because the run was cancelled.
    Skipped,
    /// At least one step failed.
    Failed,
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        })
    }
}

/// Result of one create-snapshot request.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub enum SnapshotRequest {
    /// The provider accepted the request.
    Issued {
        /// Source volume.
        volume_id: String,
        /// Snapshot created by the provider.
        snapshot_id: String,
    },
    /// The provider rejected the request.
    Rejected {
        /// Source volume.
        volume_id: String,
        /// Provider error text.
        detail: String,
    },
}

impl SnapshotRequest {
    /// Returns the source volume of the request.
    #[must_use]
    pub fn volume_id(&self) -> &str {
        match self {
            Self::Issued { volume_id, .. } | Self::Rejected { volume_id, .. } => volume_id,
        }
    }

    /// Reports whether the provider rejected the request.
    #[must_use]
    pub const fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }
}

impl fmt::Display for SnapshotRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Issued {
                volume_id,
                snapshot_id,
            } => write!(f, "snapshot {snapshot_id} requested for volume {volume_id}"),
            Self::Rejected { volume_id, detail } => {
                write!(f, "snapshot request for volume {volume_id} failed: {detail}")
            }
        }
    }
}

/// What happened to one instance.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct Outcome {
    /// Instance identifier.
    pub instance_id: String,
    /// Furthest stage entered.
    pub stage: Stage,
    /// Final status.
    pub status: OutcomeStatus,
    /// Reason for a failure, when there is one.
    pub error: Option<String>,
    /// Snapshot requests issued for the instance's volumes.
    pub snapshots: Vec<SnapshotRequest>,
}

impl Outcome {
    /// Builds a successful outcome.
    #[must_use]
    pub fn success(instance_id: impl Into<String>, stage: Stage) -> Self {
        Self {
            instance_id: instance_id.into(),
            stage,
            status: OutcomeStatus::Success,
            error: None,
            snapshots: Vec::new(),
        }
    }

    /// Builds a failed outcome.
    #[must_use]
    pub fn failed(instance_id: impl Into<String>, stage: Stage, error: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            stage,
            status: OutcomeStatus::Failed,
            error: Some(error.into()),
            snapshots: Vec::new(),
        }
    }

    /// Builds an outcome for an instance the run never reached.
    #[must_use]
    pub fn skipped(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            stage: Stage::Selected,
            status: OutcomeStatus::Skipped,
            error: Some(String::from("run cancelled before this instance")),
            snapshots: Vec::new(),
        }
    }

    /// Attaches the snapshot requests issued for the instance.
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: Vec<SnapshotRequest>) -> Self {
        self.snapshots = snapshots;
        self
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.status, &self.error) {
            (OutcomeStatus::Failed, Some(error)) => write!(
                f,
                "{}: failed at {}: {error}",
                self.instance_id, self.stage
            ),
            (status, _) => write!(f, "{}: {status} ({})", self.instance_id, self.stage),
        }
    }
}

/// Accumulates outcomes in submission order.
#[derive(Clone, Debug, Default)]
pub struct ResultReporter {
    outcomes: Vec<Outcome>,
    cancelled: bool,
}

impl ResultReporter {
    /// Creates an empty reporter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one instance.
    pub fn record(&mut self, outcome: Outcome) {
        self.outcomes.push(outcome);
    }

    /// Marks the run as interrupted.
    pub const fn mark_cancelled(&mut self) {
        self.cancelled = true;
    }

    /// Produces the end-of-run summary.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            outcomes: self.outcomes.clone(),
            cancelled: self.cancelled,
        }
    }
}

/// End-of-run view over every recorded outcome.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct RunSummary {
    /// Outcomes in processing order.
    pub outcomes: Vec<Outcome>,
    /// Whether the run stopped early on operator request.
    pub cancelled: bool,
}

impl RunSummary {
    /// Counts outcomes with the given status.
    #[must_use]
    pub fn count(&self, status: OutcomeStatus) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.status == status)
            .count()
    }

    /// Reports whether any instance failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.count(OutcomeStatus::Failed) > 0
    }

    /// Process exit code for the run: `1` on any failure, `130` when the run
    /// was cancelled cleanly, otherwise `0`.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            1
        } else if self.cancelled {
            CANCELLED_EXIT_CODE
        } else {
            0
        }
    }

    /// Looks up the outcome of an instance.
    #[must_use]
    pub fn outcome(&self, instance_id: &str) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.instance_id == instance_id)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} instance(s): {} succeeded, {} failed, {} skipped",
            self.outcomes.len(),
            self.count(OutcomeStatus::Success),
            self.count(OutcomeStatus::Failed),
            self.count(OutcomeStatus::Skipped)
        )?;
        if self.cancelled {
            f.write_str(" (cancelled)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn empty_summary_exits_cleanly() {
        let summary = ResultReporter::new().summary();
        assert!(summary.outcomes.is_empty());
        assert_eq!(summary.exit_code(), 0);
    }

    #[test]
    fn summary_keeps_submission_order() {
        let mut reporter = ResultReporter::new();
        reporter.record(Outcome::success("i-b", Stage::Running));
        reporter.record(Outcome::failed("i-a", Stage::Stopping, "denied"));
        let summary = reporter.summary();

        let ids: Vec<_> = summary
            .outcomes
            .iter()
            .map(|outcome| outcome.instance_id.as_str())
            .collect();
        assert_eq!(ids, ["i-b", "i-a"]);
    }

    #[rstest]
    #[case(vec![Outcome::success("i-a", Stage::Running)], false, 0)]
    #[case(vec![Outcome::failed("i-a", Stage::Stopping, "x")], false, 1)]
    #[case(vec![Outcome::success("i-a", Stage::Running), Outcome::skipped("i-b")], true, 130)]
    #[case(vec![Outcome::failed("i-a", Stage::Starting, "x"), Outcome::skipped("i-b")], true, 1)]
    fn exit_code_reflects_outcomes(
        #[case] outcomes: Vec<Outcome>,
        #[case] cancelled: bool,
        #[case] expected: i32,
    ) {
        let mut reporter = ResultReporter::new();
        for outcome in outcomes {
            reporter.record(outcome);
        }
        if cancelled {
            reporter.mark_cancelled();
        }
        assert_eq!(reporter.summary().exit_code(), expected);
    }

    #[test]
    fn outcome_lines_name_stage_and_reason() {
        let failed = Outcome::failed("i-b", Stage::Stopping, "instance is locked");
        assert_eq!(
            failed.to_string(),
            "i-b: failed at stopping: instance is locked"
        );
        let ok = Outcome::success("i-a", Stage::Running);
        assert_eq!(ok.to_string(), "i-a: success (running)");
    }

    #[test]
    fn summary_line_counts_statuses() {
        let mut reporter = ResultReporter::new();
        reporter.record(Outcome::success("i-a", Stage::Running));
        reporter.record(Outcome::failed("i-b", Stage::Stopping, "x"));
        reporter.record(Outcome::skipped("i-c"));
        reporter.mark_cancelled();

        assert_eq!(
            reporter.summary().to_string(),
            "3 instance(s): 1 succeeded, 1 failed, 1 skipped (cancelled)"
        );
    }
}
