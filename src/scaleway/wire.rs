//! JSON bodies exchanged with the Scaleway Instances API and their mapping
//! onto provider records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::provider::{DEFAULT_PLATFORM, Instance, Snapshot, SnapshotState, Volume};

use super::ScalewayFleetError;
use super::types::{ServerState, SnapshotStatus};

const BYTES_PER_GB: u64 = 1_000_000_000;

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct PublicIp {
    pub(crate) address: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct VolumeRecord {
    pub(crate) id: String,
    #[serde(default)]
    pub(crate) name: Option<String>,
    /// Size in bytes. Block storage volumes may omit it.
    #[serde(default)]
    pub(crate) size: Option<u64>,
    pub(crate) volume_type: String,
    #[serde(default)]
    pub(crate) zone: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct ServerRecord {
    pub(crate) id: String,
    pub(crate) commercial_type: String,
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) zone: Option<String>,
    #[serde(default)]
    pub(crate) tags: Vec<String>,
    #[serde(default)]
    pub(crate) public_ip: Option<PublicIp>,
    /// Attached volumes keyed by attachment index (`"0"` is the root volume).
    #[serde(default)]
    pub(crate) volumes: BTreeMap<String, VolumeRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServersPage {
    pub(crate) servers: Vec<ServerRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerEnvelope {
    pub(crate) server: ServerRecord,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct BaseVolume {
    pub(crate) id: String,
}

#[derive(Clone, Debug, Deserialize)]
pub(crate) struct SnapshotRecord {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) state: String,
    #[serde(default)]
    pub(crate) base_volume: Option<BaseVolume>,
    #[serde(default)]
    pub(crate) creation_date: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotsPage {
    pub(crate) snapshots: Vec<SnapshotRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotEnvelope {
    pub(crate) snapshot: SnapshotRecord,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateSnapshotRequest<'a> {
    pub(crate) name: &'a str,
    pub(crate) volume_id: &'a str,
    pub(crate) project: &'a str,
    pub(crate) tags: Vec<String>,
}

/// Splits Scaleway's flat `Key=Value` tag strings into a map. Tags without
/// `=` map to an empty value.
pub(crate) fn parse_tags(tags: &[String]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|tag| match tag.split_once('=') {
            Some((key, value)) => (key.to_owned(), value.to_owned()),
            None => (tag.clone(), String::new()),
        })
        .collect()
}

impl ServerRecord {
    /// Converts the record into an [`Instance`].
    ///
    /// # Errors
    ///
    /// Returns [`ScalewayFleetError::UnknownState`] for unrecognised states.
    pub(crate) fn to_instance(&self, default_zone: &str) -> Result<Instance, ScalewayFleetError> {
        let power_state = ServerState::from(self.state.as_str())
            .power_state()
            .ok_or_else(|| ScalewayFleetError::UnknownState {
                instance_id: self.id.clone(),
                state: self.state.clone(),
            })?;

        Ok(Instance {
            id: self.id.clone(),
            instance_type: self.commercial_type.clone(),
            availability_zone: self.zone_or(default_zone),
            power_state,
            platform: String::from(DEFAULT_PLATFORM),
            public_address: self.public_ip.as_ref().map(|ip| ip.address.clone()),
            tags: parse_tags(&self.tags),
        })
    }

    /// Returns attached volumes in attachment order.
    pub(crate) fn attached_volumes(&self, default_zone: &str) -> Vec<Volume> {
        let server_zone = self.zone_or(default_zone);
        let mut indexed: Vec<(u32, &VolumeRecord)> = self
            .volumes
            .iter()
            .map(|(index, record)| (index.parse().unwrap_or(u32::MAX), record))
            .collect();
        indexed.sort_by_key(|(index, _)| *index);

        indexed
            .into_iter()
            .map(|(_, record)| Volume {
                id: record.id.clone(),
                instance_id: self.id.clone(),
                availability_zone: record.zone.clone().unwrap_or_else(|| server_zone.clone()),
                name: record.name.clone().filter(|name| !name.is_empty()),
                size_gb: record
                    .size
                    .and_then(|bytes| bytes.checked_div(BYTES_PER_GB))
                    .unwrap_or(0),
                volume_type: record.volume_type.clone(),
                encrypted: false,
            })
            .collect()
    }

    fn zone_or(&self, default_zone: &str) -> String {
        self.zone
            .clone()
            .unwrap_or_else(|| default_zone.to_owned())
    }
}

impl SnapshotRecord {
    /// Converts the record into a [`Snapshot`] of `volume_id`.
    pub(crate) fn to_snapshot(&self, volume_id: &str) -> Snapshot {
        let state = SnapshotStatus::from(self.state.as_str()).snapshot_state();
        let progress = match state {
            SnapshotState::Completed => "100%",
            SnapshotState::Pending | SnapshotState::Error => "0%",
        };
        Snapshot {
            id: self.id.clone(),
            volume_id: self
                .base_volume
                .as_ref()
                .map_or_else(|| volume_id.to_owned(), |base| base.id.clone()),
            state,
            progress: String::from(progress),
            started_at: self.creation_date.clone().unwrap_or_default(),
            description: self.name.clone(),
        }
    }
}
