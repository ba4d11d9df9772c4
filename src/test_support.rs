//! Test support utilities shared across unit and integration tests.
//!
//! [`FakeFleet`] is an in-memory [`FleetProvider`] that records every call
//! and fails on demand. It can also be loaded from a JSON fixture, which the
//! binary honours through [`FAKE_FLEET_ENV`] so CLI tests run without a
//! cloud account.

use std::collections::{BTreeMap, BTreeSet};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, PoisonError};

use camino::Utf8Path;
use cap_std::{ambient_authority, fs_utf8::Dir};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::provider::{
    FaultClass, FleetProvider, Instance, PowerState, ProviderFault, ProviderFuture, Snapshot,
    SnapshotState, TagFilter, Volume, PROJECT_TAG,
};

/// Environment variable naming a fleet fixture the binary should use instead
/// of the Scaleway API.
pub const FAKE_FLEET_ENV: &str = "SNAPCTL_FAKE_FLEET";

const FAKE_TIMESTAMP: &str = "2026-01-01T00:00:00Z";

/// How an injected fault manifests.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Fault {
    /// The provider rejects the request.
    Reject,
    /// The provider gives up waiting.
    Timeout,
    /// The provider returns an error outside its contract.
    Contract,
}

/// Faults injected into one machine's operations.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(default)]
pub struct Faults {
    /// Fault raised by the stop request.
    pub stop: Option<Fault>,
    /// Fault raised while waiting for the stopped state.
    pub wait_stopped: Option<Fault>,
    /// Fault raised while listing volumes.
    pub list_volumes: Option<Fault>,
    /// Faults raised by snapshot requests, keyed by volume id.
    pub snapshot: BTreeMap<String, Fault>,
    /// Fault raised by the start request.
    pub start: Option<Fault>,
    /// Fault raised while waiting for the running state.
    pub wait_running: Option<Fault>,
}

/// One instance together with its volumes, snapshots and faults.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FakeMachine {
    /// Instance record.
    pub instance: Instance,
    /// Attached volumes.
    #[serde(default)]
    pub volumes: Vec<Volume>,
    /// Existing snapshots of the attached volumes.
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    /// Injected faults.
    #[serde(default)]
    pub faults: Faults,
}

/// Serialised form of a fake fleet.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct FleetFixture {
    /// Machines in enumeration order.
    #[serde(default)]
    pub machines: Vec<FakeMachine>,
}

/// Provider call recorded by [`FakeFleet`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProviderCall {
    /// `list_instances` with its filter.
    ListInstances(Option<TagFilter>),
    /// `stop` for an instance id.
    Stop(String),
    /// `wait_until_stopped` for an instance id.
    WaitUntilStopped(String),
    /// `list_volumes` for an instance id.
    ListVolumes(String),
    /// `create_snapshot` for a volume.
    CreateSnapshot {
        /// Source volume id.
        volume_id: String,
        /// Description passed by the caller.
        description: String,
    },
    /// `start` for an instance id.
    Start(String),
    /// `wait_until_running` for an instance id.
    WaitUntilRunning(String),
    /// `list_snapshots` for a volume id.
    ListSnapshots(String),
}

/// Errors raised by [`FakeFleet`].
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum FakeFleetError {
    /// An injected rejection.
    #[error("{operation} rejected for {resource}")]
    Rejected {
        /// Operation that failed.
        operation: &'static str,
        /// Instance or volume identifier.
        resource: String,
    },
    /// An injected wait timeout.
    #[error("timed out waiting for {operation} on {resource}")]
    Timeout {
        /// Operation that failed.
        operation: &'static str,
        /// Instance identifier.
        resource: String,
    },
    /// An injected contract violation.
    #[error("malformed provider response to {operation} for {resource}")]
    Contract {
        /// Operation that failed.
        operation: &'static str,
        /// Instance or volume identifier.
        resource: String,
    },
    /// The instance or volume is not part of the fleet.
    #[error("unknown resource {0}")]
    UnknownResource(String),
    /// Instance enumeration was configured to fail.
    #[error("instance listing unavailable")]
    ListingUnavailable,
}

impl ProviderFault for FakeFleetError {
    fn class(&self) -> FaultClass {
        match self {
            Self::Contract { .. } => FaultClass::Contract,
            Self::Rejected { .. }
            | Self::Timeout { .. }
            | Self::UnknownResource(_)
            | Self::ListingUnavailable => FaultClass::Api,
        }
    }
}

/// Errors raised while loading a fleet fixture from disk.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// Raised when the file cannot be read.
    #[error("failed to read fleet fixture {path}: {message}")]
    Io {
        /// Fixture path.
        path: String,
        /// Human-readable error message.
        message: String,
    },
    /// Raised when the file is not a valid fixture.
    #[error("failed to parse fleet fixture {path}: {message}")]
    Parse {
        /// Fixture path.
        path: String,
        /// Parser error message.
        message: String,
    },
}

#[derive(Debug, Default)]
struct FleetState {
    machines: Vec<FakeMachine>,
    calls: Vec<ProviderCall>,
    listing_unavailable: bool,
    next_snapshot: u32,
}

impl FleetState {
    fn machine_mut(&mut self, instance_id: &str) -> Result<&mut FakeMachine, FakeFleetError> {
        self.machines
            .iter_mut()
            .find(|machine| machine.instance.id == instance_id)
            .ok_or_else(|| FakeFleetError::UnknownResource(instance_id.to_owned()))
    }

    fn owner_of_volume(&mut self, volume_id: &str) -> Result<&mut FakeMachine, FakeFleetError> {
        self.machines
            .iter_mut()
            .find(|machine| machine.volumes.iter().any(|vol| vol.id == volume_id))
            .ok_or_else(|| FakeFleetError::UnknownResource(volume_id.to_owned()))
    }
}

fn injected(fault: Option<Fault>, operation: &'static str, resource: &str) -> Result<(), FakeFleetError> {
    let resource = resource.to_owned();
    match fault {
        None => Ok(()),
        Some(Fault::Reject) => Err(FakeFleetError::Rejected {
            operation,
            resource,
        }),
        Some(Fault::Timeout) => Err(FakeFleetError::Timeout {
            operation,
            resource,
        }),
        Some(Fault::Contract) => Err(FakeFleetError::Contract {
            operation,
            resource,
        }),
    }
}

/// In-memory fleet provider with call recording and fault injection.
#[derive(Clone, Debug, Default)]
pub struct FakeFleet {
    state: Arc<Mutex<FleetState>>,
}

impl FakeFleet {
    /// Creates an empty fleet.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fleet from a fixture.
    #[must_use]
    pub fn from_fixture(fixture: FleetFixture) -> Self {
        let fleet = Self::new();
        fleet.with_state(|state| state.machines = fixture.machines);
        fleet
    }

    /// Loads a JSON fixture from disk.
    ///
    /// # Errors
    ///
    /// Returns [`FixtureError`] when the file cannot be read or parsed.
    pub fn load(path: &Utf8Path) -> Result<Self, FixtureError> {
        let parent = path
            .parent()
            .filter(|dir| !dir.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        let file_name = path.file_name().ok_or_else(|| FixtureError::Io {
            path: path.to_string(),
            message: String::from("fixture path is missing a filename"),
        })?;

        let dir = Dir::open_ambient_dir(parent, ambient_authority()).map_err(|err| {
            FixtureError::Io {
                path: parent.to_string(),
                message: err.to_string(),
            }
        })?;
        let contents = dir
            .read_to_string(file_name)
            .map_err(|err| FixtureError::Io {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        let fixture: FleetFixture =
            serde_json::from_str(&contents).map_err(|err| FixtureError::Parse {
                path: path.to_string(),
                message: err.to_string(),
            })?;
        Ok(Self::from_fixture(fixture))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut FleetState) -> T) -> T {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state)
    }

    /// Adds an instance with its attached volumes.
    pub fn add_instance(&self, instance: Instance, volumes: Vec<Volume>) {
        self.with_state(|state| {
            state.machines.push(FakeMachine {
                instance,
                volumes,
                snapshots: Vec::new(),
                faults: Faults::default(),
            });
        });
    }

    /// Replaces the faults injected for an instance.
    pub fn set_faults(&self, instance_id: &str, faults: Faults) {
        self.with_state(|state| {
            if let Ok(machine) = state.machine_mut(instance_id) {
                machine.faults = faults;
            }
        });
    }

    /// Makes every subsequent `list_instances` call fail.
    pub fn fail_listing(&self) {
        self.with_state(|state| state.listing_unavailable = true);
    }

    /// Returns every call recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.with_state(|state| state.calls.clone())
    }

    /// Counts the start requests issued for an instance.
    #[must_use]
    pub fn start_requests(&self, instance_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| matches!(call, ProviderCall::Start(id) if id == instance_id))
            .count()
    }

    /// Returns the volume ids snapshot requests were issued for, in order.
    #[must_use]
    pub fn snapshot_requests(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                ProviderCall::CreateSnapshot { volume_id, .. } => Some(volume_id),
                _ => None,
            })
            .collect()
    }

    /// Returns every call that names the instance or one of its volumes.
    #[must_use]
    pub fn calls_for(&self, instance_id: &str) -> Vec<ProviderCall> {
        let volume_ids: BTreeSet<String> = self.with_state(|state| {
            state
                .machines
                .iter()
                .filter(|machine| machine.instance.id == instance_id)
                .flat_map(|machine| machine.volumes.iter().map(|vol| vol.id.clone()))
                .collect()
        });
        self.calls()
            .into_iter()
            .filter(|call| match call {
                ProviderCall::ListInstances(_) => false,
                ProviderCall::Stop(id)
                | ProviderCall::WaitUntilStopped(id)
                | ProviderCall::ListVolumes(id)
                | ProviderCall::Start(id)
                | ProviderCall::WaitUntilRunning(id) => id == instance_id,
                ProviderCall::CreateSnapshot { volume_id, .. }
                | ProviderCall::ListSnapshots(volume_id) => volume_ids.contains(volume_id),
            })
            .collect()
    }

    /// Returns the current power state of an instance.
    #[must_use]
    pub fn power_state(&self, instance_id: &str) -> Option<PowerState> {
        self.with_state(|state| {
            state
                .machine_mut(instance_id)
                .ok()
                .map(|machine| machine.instance.power_state)
        })
    }

    /// Returns the snapshots recorded for a volume.
    #[must_use]
    pub fn snapshots_of(&self, volume_id: &str) -> Vec<Snapshot> {
        self.with_state(|state| {
            state
                .machines
                .iter()
                .flat_map(|machine| machine.snapshots.iter())
                .filter(|snapshot| snapshot.volume_id == volume_id)
                .cloned()
                .collect()
        })
    }

    fn set_power(
        &self,
        call: ProviderCall,
        instance_id: &str,
        operation: &'static str,
        fault: impl FnOnce(&Faults) -> Option<Fault>,
        next: impl FnOnce(PowerState) -> PowerState,
    ) -> Result<(), FakeFleetError> {
        self.with_state(|state| {
            state.calls.push(call);
            let machine = state.machine_mut(instance_id)?;
            injected(fault(&machine.faults), operation, instance_id)?;
            machine.instance.power_state = next(machine.instance.power_state);
            Ok(())
        })
    }
}

impl FleetProvider for FakeFleet {
    type Error = FakeFleetError;

    fn list_instances<'a>(
        &'a self,
        filter: Option<&'a TagFilter>,
    ) -> ProviderFuture<'a, Vec<Instance>, Self::Error> {
        Box::pin(async move {
            self.with_state(|state| {
                state.calls.push(ProviderCall::ListInstances(filter.cloned()));
                if state.listing_unavailable {
                    return Err(FakeFleetError::ListingUnavailable);
                }
                Ok(state
                    .machines
                    .iter()
                    .map(|machine| &machine.instance)
                    .filter(|instance| filter.is_none_or(|tag| instance.has_tag(tag)))
                    .cloned()
                    .collect())
            })
        })
    }

    fn stop<'a>(&'a self, instance: &'a Instance) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.set_power(
                ProviderCall::Stop(instance.id.clone()),
                &instance.id,
                "stop",
                |faults| faults.stop,
                |current| match current {
                    PowerState::Stopped => PowerState::Stopped,
                    _ => PowerState::Stopping,
                },
            )
        })
    }

    fn start<'a>(&'a self, instance: &'a Instance) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.set_power(
                ProviderCall::Start(instance.id.clone()),
                &instance.id,
                "start",
                |faults| faults.start,
                |current| match current {
                    PowerState::Running => PowerState::Running,
                    _ => PowerState::Pending,
                },
            )
        })
    }

    fn wait_until_stopped<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.set_power(
                ProviderCall::WaitUntilStopped(instance.id.clone()),
                &instance.id,
                "wait_until_stopped",
                |faults| faults.wait_stopped,
                |_| PowerState::Stopped,
            )
        })
    }

    fn wait_until_running<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, (), Self::Error> {
        Box::pin(async move {
            self.set_power(
                ProviderCall::WaitUntilRunning(instance.id.clone()),
                &instance.id,
                "wait_until_running",
                |faults| faults.wait_running,
                |_| PowerState::Running,
            )
        })
    }

    fn list_volumes<'a>(
        &'a self,
        instance: &'a Instance,
    ) -> ProviderFuture<'a, Vec<Volume>, Self::Error> {
        Box::pin(async move {
            self.with_state(|state| {
                state
                    .calls
                    .push(ProviderCall::ListVolumes(instance.id.clone()));
                let machine = state.machine_mut(&instance.id)?;
                injected(machine.faults.list_volumes, "list_volumes", &instance.id)?;
                Ok(machine.volumes.clone())
            })
        })
    }

    fn create_snapshot<'a>(
        &'a self,
        volume: &'a Volume,
        description: &'a str,
    ) -> ProviderFuture<'a, Snapshot, Self::Error> {
        Box::pin(async move {
            self.with_state(|state| {
                state.calls.push(ProviderCall::CreateSnapshot {
                    volume_id: volume.id.clone(),
                    description: description.to_owned(),
                });
                state.next_snapshot += 1;
                let id = format!("snap-{:04}", state.next_snapshot);
                let machine = state.owner_of_volume(&volume.id)?;
                injected(
                    machine.faults.snapshot.get(&volume.id).copied(),
                    "create_snapshot",
                    &volume.id,
                )?;
                let snapshot = Snapshot {
                    id,
                    volume_id: volume.id.clone(),
                    state: SnapshotState::Pending,
                    progress: String::from("0%"),
                    started_at: String::from(FAKE_TIMESTAMP),
                    description: description.to_owned(),
                };
                machine.snapshots.push(snapshot.clone());
                Ok(snapshot)
            })
        })
    }

    fn list_snapshots<'a>(
        &'a self,
        volume: &'a Volume,
    ) -> ProviderFuture<'a, Vec<Snapshot>, Self::Error> {
        Box::pin(async move {
            self.with_state(|state| {
                state
                    .calls
                    .push(ProviderCall::ListSnapshots(volume.id.clone()));
                let machine = state.owner_of_volume(&volume.id)?;
                Ok(machine
                    .snapshots
                    .iter()
                    .filter(|snapshot| snapshot.volume_id == volume.id)
                    .cloned()
                    .collect())
            })
        })
    }
}

/// Builds a running `DEV1-S` instance, optionally tagged with a project.
#[must_use]
pub fn instance(id: &str, project: Option<&str>) -> Instance {
    let mut tags = BTreeMap::new();
    if let Some(name) = project {
        tags.insert(String::from(PROJECT_TAG), name.to_owned());
    }
    Instance {
        id: id.to_owned(),
        instance_type: String::from("DEV1-S"),
        availability_zone: String::from("fr-par-1"),
        power_state: PowerState::Running,
        platform: String::from(crate::provider::DEFAULT_PLATFORM),
        public_address: None,
        tags,
    }
}

/// Builds a 20 GB block volume attached to the instance.
#[must_use]
pub fn volume(id: &str, instance_id: &str) -> Volume {
    Volume {
        id: id.to_owned(),
        instance_id: instance_id.to_owned(),
        availability_zone: String::from("fr-par-1"),
        name: None,
        size_gb: 20,
        volume_type: String::from("b_ssd"),
        encrypted: false,
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
