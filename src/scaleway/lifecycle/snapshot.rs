//! Snapshot creation for the Scaleway fleet adapter.

use crate::provider::{Snapshot, Volume};

use super::super::wire::{CreateSnapshotRequest, SnapshotEnvelope};
use super::super::{ScalewayFleet, ScalewayFleetError};

/// Tag attached to every snapshot this tool creates.
pub(in crate::scaleway) const SNAPSHOT_TAG: &str = "snapctl";

impl ScalewayFleet {
    /// Requests a snapshot of `volume` and returns as soon as the API accepts
    /// it. The snapshot is usually still in the `snapshotting` state.
    pub(in crate::scaleway) async fn request_snapshot(
        &self,
        volume: &Volume,
        description: &str,
    ) -> Result<Snapshot, ScalewayFleetError> {
        let path = format!("/zones/{}/snapshots", volume.availability_zone);
        let body = CreateSnapshotRequest {
            name: description,
            volume_id: &volume.id,
            project: &self.config.default_project_id,
            tags: vec![String::from(SNAPSHOT_TAG)],
        };

        let created: SnapshotEnvelope = self.post_json("create snapshot", &path, &body).await?;
        let snapshot = created.snapshot.to_snapshot(&volume.id);
        tracing::info!(
            volume_id = %volume.id,
            snapshot_id = %snapshot.id,
            "snapshot requested"
        );
        Ok(snapshot)
    }
}
