//! Fleet provider abstraction and the resource records it exposes.
//!
//! Instances, volumes and snapshots are plain data owned by the provider. The
//! core only reads them and asks the provider for transitions; volumes and
//! snapshots refer back to their owner by identifier rather than by value.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Tag key used to group instances into projects.
pub const PROJECT_TAG: &str = "Project";

/// Platform reported when the provider does not expose one.
pub const DEFAULT_PLATFORM: &str = "linux";

/// Power state of an instance as reported by the provider.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerState {
    /// The instance is booting or a provider operation is in progress.
    Pending,
    /// The instance is running.
    Running,
    /// A stop request is being processed.
    Stopping,
    /// The instance is powered off.
    Stopped,
    /// The instance is being deleted.
    ShuttingDown,
    /// The instance no longer exists.
    Terminated,
}

impl PowerState {
    /// Returns the canonical lowercase name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::ShuttingDown => "shutting-down",
            Self::Terminated => "terminated",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a provider reports a power state the core does not know.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("unknown power state '{0}'")]
pub struct UnknownPowerState(pub String);

impl FromStr for PowerState {
    type Err = UnknownPowerState;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "stopping" => Ok(Self::Stopping),
            "stopped" => Ok(Self::Stopped),
            "shutting-down" => Ok(Self::ShuttingDown),
            "terminated" => Ok(Self::Terminated),
            other => Err(UnknownPowerState(other.to_owned())),
        }
    }
}

fn default_platform() -> String {
    String::from(DEFAULT_PLATFORM)
}

/// A compute instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Instance {
    /// Provider identifier.
    pub id: String,
    /// Commercial type or flavour (for example `DEV1-S`).
    pub instance_type: String,
    /// Availability zone hosting the instance.
    pub availability_zone: String,
    /// Power state at enumeration time.
    pub power_state: PowerState,
    /// Operating system family; `linux` when the provider is silent.
    #[serde(default = "default_platform")]
    pub platform: String,
    /// Public address, if one is attached.
    #[serde(default)]
    pub public_address: Option<String>,
    /// Key/value tags.
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Instance {
    /// Returns the value of the `Project` tag, if present.
    #[must_use]
    pub fn project(&self) -> Option<&str> {
        self.tags.get(PROJECT_TAG).map(String::as_str)
    }

    /// Reports whether the instance carries `key=value` exactly.
    #[must_use]
    pub fn has_tag(&self, filter: &TagFilter) -> bool {
        self.tags
            .get(&filter.key)
            .is_some_and(|value| *value == filter.value)
    }
}

/// A block volume attached to an instance.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Volume {
    /// Provider identifier.
    pub id: String,
    /// Identifier of the instance the volume is attached to.
    pub instance_id: String,
    /// Availability zone of the volume.
    pub availability_zone: String,
    /// Human-readable name, when the provider assigns one.
    #[serde(default)]
    pub name: Option<String>,
    /// Size in decimal gigabytes (10^9 bytes).
    pub size_gb: u64,
    /// Provider volume type (for example `b_ssd`).
    pub volume_type: String,
    /// Whether the volume is encrypted at rest.
    #[serde(default)]
    pub encrypted: bool,
}

/// Lifecycle state of a snapshot.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotState {
    /// The provider is still copying data.
    Pending,
    /// The snapshot is usable.
    Completed,
    /// The provider failed to create the snapshot.
    Error,
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Error => "error",
        })
    }
}

/// A point-in-time copy of a volume.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct Snapshot {
    /// Provider identifier.
    pub id: String,
    /// Identifier of the source volume.
    pub volume_id: String,
    /// Provider-side state.
    pub state: SnapshotState,
    /// Completion percentage, for example `100%`.
    pub progress: String,
    /// Creation timestamp as reported by the provider.
    pub started_at: String,
    /// Provenance description.
    pub description: String,
}

/// Exact-match tag filter passed to the provider.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct TagFilter {
    /// Tag key.
    pub key: String,
    /// Required tag value.
    pub value: String,
}

impl TagFilter {
    /// Builds a filter on the `Project` tag.
    #[must_use]
    pub fn project(name: impl Into<String>) -> Self {
        Self {
            key: String::from(PROJECT_TAG),
            value: name.into(),
        }
    }
}

impl fmt::Display for TagFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag:{}={}", self.key, self.value)
    }
}

/// How the orchestrator must treat a provider error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FaultClass {
    /// The provider rejected or failed an operation; skip the unit and
    /// continue.
    Api,
    /// The adapter broke its contract; abort the run.
    Contract,
}

/// Implemented by provider error types so the orchestrator can classify them.
pub trait ProviderFault {
    /// Returns the class of this error.
    fn class(&self) -> FaultClass;
}

/// Future returned by provider operations.
pub type ProviderFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Capabilities the orchestrator needs from a cloud provider.
///
/// The two wait operations must be bounded: the adapter gives up after its
/// configured timeout and reports an [`FaultClass::Api`] error.
pub trait FleetProvider {
    /// Provider specific error type.
    type Error: ProviderFault + std::error::Error + Send + Sync + 'static;

    /// Enumerates instances, optionally restricted to an exact tag match.
    fn list_instances<'a>(
        &'a self,
        filter: Option<&'a TagFilter>,
    ) -> ProviderFuture<'a, Vec<Instance>, Self::Error>;

    /// Requests that the instance powers off.
    fn stop<'a>(&'a self, instance: &'a Instance) -> ProviderFuture<'a, (), Self::Error>;

    /// Requests that the instance powers on.
    fn start<'a>(&'a self, instance: &'a Instance) -> ProviderFuture<'a, (), Self::Error>;

    /// Blocks until the provider reports the instance as stopped.
    fn wait_until_stopped<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, (), Self::Error>;

    /// Blocks until the provider reports the instance as running.
    fn wait_until_running<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, (), Self::Error>;

    /// Lists the volumes currently attached to the instance.
    fn list_volumes<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, Vec<Volume>, Self::Error>;

    /// Issues a snapshot request for the volume. Completion is not awaited.
    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Volume,
        description: &'a str,
    ) -> ProviderFuture<'a, Snapshot, Self::Error>;

    /// Lists the snapshots taken from the volume.
    fn list_snapshots<'a>(
        &'a self,
        volume: &'a Volume,
    ) -> ProviderFuture<'a, Vec<Snapshot>, Self::Error>;
}
