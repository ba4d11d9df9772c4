//! Paginated enumeration of servers, attached volumes and snapshots.

use crate::provider::{Instance, Snapshot, TagFilter, Volume};

use super::super::wire::{ServerEnvelope, ServersPage, SnapshotsPage};
use super::super::{ScalewayFleet, ScalewayFleetError};

impl ScalewayFleet {
    /// Lists servers in the configured project and zone.
    ///
    /// The tag filter is sent to the API, which matches tags by substring, so
    /// results are narrowed again to exact `key=value` matches.
    pub(in crate::scaleway) async fn list_servers(
        &self,
        filter: Option<&TagFilter>,
    ) -> Result<Vec<Instance>, ScalewayFleetError> {
        let zone = &self.config.default_zone;
        let path = format!("/zones/{zone}/servers");
        let mut instances = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut query = vec![
                ("project", self.config.default_project_id.clone()),
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
            ];
            if let Some(tag) = filter {
                query.push(("tags", format!("{}={}", tag.key, tag.value)));
            }

            let body: ServersPage = self.get_json("list servers", &path, &query).await?;
            let fetched = body.servers.len();
            for server in &body.servers {
                let instance = server.to_instance(zone)?;
                if filter.is_none_or(|tag| instance.has_tag(tag)) {
                    instances.push(instance);
                }
            }

            if self.is_last_page(fetched) {
                break;
            }
            page += 1;
        }

        tracing::debug!(zone = %zone, count = instances.len(), "listed servers");
        Ok(instances)
    }

    pub(in crate::scaleway) async fn server_volumes(
        &self,
        instance: &Instance,
    ) -> Result<Vec<Volume>, ScalewayFleetError> {
        let path = format!(
            "/zones/{}/servers/{}",
            instance.availability_zone, instance.id
        );
        let body: ServerEnvelope = match self.get_json("get server", &path, &[]).await {
            Ok(body) => body,
            Err(ScalewayFleetError::Http { status: 404, .. }) => {
                return Err(ScalewayFleetError::InstanceNotFound {
                    instance_id: instance.id.clone(),
                    zone: instance.availability_zone.clone(),
                });
            }
            Err(err) => return Err(err),
        };
        Ok(body.server.attached_volumes(&instance.availability_zone))
    }

    pub(in crate::scaleway) async fn volume_snapshots(
        &self,
        volume: &Volume,
    ) -> Result<Vec<Snapshot>, ScalewayFleetError> {
        let path = format!("/zones/{}/snapshots", volume.availability_zone);
        let mut snapshots = Vec::new();
        let mut page: u32 = 1;

        loop {
            let query = [
                ("base_volume_id", volume.id.clone()),
                ("page", page.to_string()),
                ("per_page", self.page_size.to_string()),
            ];
            let body: SnapshotsPage = self.get_json("list snapshots", &path, &query).await?;
            let fetched = body.snapshots.len();
            snapshots.extend(
                body.snapshots
                    .iter()
                    .map(|record| record.to_snapshot(&volume.id)),
            );

            if self.is_last_page(fetched) {
                break;
            }
            page += 1;
        }

        Ok(snapshots)
    }
}
