//! Read-only projections behind the `list-*` commands.
//!
//! Each record renders as one comma-separated line.

use std::fmt;

use crate::provider::{FleetProvider, Instance, Snapshot, Volume};

const MISSING: &str = "-";

/// One line of `list-instances` output.
#[derive(Clone, Copy, Debug)]
pub struct InstanceLine<'a>(pub &'a Instance);

impl fmt::Display for InstanceLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let instance = self.0;
        write!(
            f,
            "{}, {}, {}, {}, {}",
            instance.id,
            instance.instance_type,
            instance.availability_zone,
            instance.power_state,
            instance.public_address.as_deref().unwrap_or(MISSING)
        )
    }
}

/// One line of `list-volumes` output.
#[derive(Clone, Copy, Debug)]
pub struct VolumeLine<'a>(pub &'a Volume);

impl fmt::Display for VolumeLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let volume = self.0;
        write!(
            f,
            "{}, {}, {} GB, {}, {}",
            volume.id,
            volume.instance_id,
            volume.size_gb,
            volume.volume_type,
            if volume.encrypted {
                "Encrypted"
            } else {
                "Not Encrypted"
            }
        )
    }
}

/// A snapshot together with the instance its volume belongs to.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SnapshotRecord {
    /// Owner of the source volume.
    pub instance_id: String,
    /// Snapshot as reported by the provider.
    pub snapshot: Snapshot,
}

impl fmt::Display for SnapshotRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = &self.snapshot;
        let started = if snapshot.started_at.is_empty() {
            MISSING
        } else {
            snapshot.started_at.as_str()
        };
        write!(
            f,
            "{}, {}, {}, {}, {}, {}",
            snapshot.id,
            snapshot.volume_id,
            self.instance_id,
            snapshot.state,
            snapshot.progress,
            started
        )
    }
}

/// Lists the volumes attached to each instance, in instance order.
///
/// # Errors
///
/// Stops at and returns the first provider error.
pub async fn volumes<P: FleetProvider>(
    provider: &P,
    instances: &[Instance],
) -> Result<Vec<Volume>, P::Error> {
    let mut volumes = Vec::new();
    for instance in instances {
        volumes.extend(provider.list_volumes(instance).await?);
    }
    Ok(volumes)
}

/// Lists the snapshots of every volume attached to each instance.
///
/// # Errors
///
/// Stops at and returns the first provider error.
pub async fn snapshots<P: FleetProvider>(
    provider: &P,
    instances: &[Instance],
) -> Result<Vec<SnapshotRecord>, P::Error> {
    let mut records = Vec::new();
    for volume in volumes(provider, instances).await? {
        let taken = provider.list_snapshots(&volume).await?;
        records.extend(taken.into_iter().map(|snapshot| SnapshotRecord {
            instance_id: volume.instance_id.clone(),
            snapshot,
        }));
    }
    Ok(records)
}
