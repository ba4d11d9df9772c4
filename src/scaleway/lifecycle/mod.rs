//! Instance lifecycle helpers for the Scaleway fleet adapter.
//!
//! Power actions go through `scaleway-rs`. Listing, volume inspection and
//! snapshot calls use the raw Instances API because the SDK does not expose
//! tag filters or the snapshot endpoints.

use std::sync::LazyLock;
use std::time::Duration;

use reqwest::Response;
use serde::Serialize;
use serde::de::DeserializeOwned;

mod inventory;
mod power;
mod snapshot;
mod wait;

use crate::scaleway::types::{Action, ServerState};

pub(in crate::scaleway) use power::PowerRequest;

use super::{ScalewayFleet, ScalewayFleetError};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
pub(crate) const SCALEWAY_INSTANCE_API_BASE: &str = "https://api.scaleway.com/instance/v1";
const AUTH_HEADER: &str = "X-Auth-Token";

static HTTP_CLIENT: LazyLock<reqwest::Client> = LazyLock::new(|| {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
});

/// Power-relevant view of a server at one point in time.
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct ServerStatus {
    pub(crate) id: String,
    pub(crate) state: ServerState,
    pub(crate) allowed_actions: Vec<Action>,
}

impl ScalewayFleet {
    fn is_last_page(&self, fetched: usize) -> bool {
        u32::try_from(fetched).is_ok_and(|count| count < self.page_size)
    }

    pub(in crate::scaleway) async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ScalewayFleetError> {
        let url = format!("{}{path}", self.api_base);
        let response = HTTP_CLIENT
            .get(&url)
            .header(AUTH_HEADER, &self.config.secret_key)
            .query(query)
            .send()
            .await?;
        decode(operation, response).await
    }

    pub(in crate::scaleway) async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        body: &B,
    ) -> Result<T, ScalewayFleetError> {
        let url = format!("{}{path}", self.api_base);
        let response = HTTP_CLIENT
            .post(&url)
            .header(AUTH_HEADER, &self.config.secret_key)
            .json(body)
            .send()
            .await?;
        decode(operation, response).await
    }
}

async fn decode<T: DeserializeOwned>(
    operation: &str,
    response: Response,
) -> Result<T, ScalewayFleetError> {
    let status = response.status();
    let body = response.bytes().await?;

    if !status.is_success() {
        return Err(ScalewayFleetError::Http {
            operation: operation.to_owned(),
            status: status.as_u16(),
            message: String::from_utf8_lossy(&body).into_owned(),
        });
    }

    serde_json::from_slice(&body).map_err(|err| ScalewayFleetError::UnexpectedResponse {
        operation: operation.to_owned(),
        message: err.to_string(),
    })
}
