//! Core library for the snapctl snapshot tool.
//!
//! The crate selects cloud instances by their `Project` tag and drives each
//! one through stop → snapshot every volume → start, recording a per-instance
//! outcome. The orchestrator is written against the [`FleetProvider`] trait;
//! [`ScalewayFleet`] implements it on the Scaleway Instances API.

pub mod cancel;
pub mod config;
pub mod inventory;
pub mod logging;
pub mod orchestrator;
pub mod provider;
pub mod report;
pub mod scaleway;
pub mod selector;
pub mod test_support;

pub use cancel::{CancelHandle, Cancellation, InterruptRelay, relay_interrupts};
pub use config::{ConfigError, FleetConfig, ScalewayConfig};
pub use orchestrator::{
    DEFAULT_SNAPSHOT_DESCRIPTION, OrchestratorError, PowerAction, SnapshotOrchestrator, Stage,
    StageListener,
};
pub use provider::{
    FaultClass, FleetProvider, Instance, PROJECT_TAG, PowerState, ProviderFault, ProviderFuture,
    Snapshot, SnapshotState, TagFilter, Volume,
};
pub use report::{Outcome, OutcomeStatus, ResultReporter, RunSummary, SnapshotRequest};
pub use scaleway::{ScalewayFleet, ScalewayFleetError};
pub use selector::{InstanceFilter, Selector, SelectorError};
