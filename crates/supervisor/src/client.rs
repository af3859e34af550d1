use std::time::Duration;

use reqwest::Method;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::model::{ApiResponse, BackupDetail, BackupList, BackupSummary};

const BASE_URL: &str = "http://supervisor";
const MAX_RETRIES: u32 = 10;
const BACKOFF_FACTOR_SECS: u64 = 10;
const BACKOFF_CAP_SECS: u64 = 120;
const RETRY_STATUSES: [u16; 5] = [400, 500, 502, 503, 504];

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("error connecting to the Supervisor API: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Supervisor API returned {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("retries exhausted for {url}")]
    RetriesExhausted { url: String },
    #[error("error decoding Supervisor API response: {0}")]
    Decode(#[source] reqwest::Error),
}

pub type Result<T, E = SupervisorError> = std::result::Result<T, E>;

/// Client for the Home Assistant Supervisor REST API.
///
/// Bearer-token authenticated; responses on a fixed retryable status set
/// are retried a bounded number of times with growing backoff before
/// being turned into a [`SupervisorError`].
#[derive(Clone)]
pub struct SupervisorClient {
    token: String,
    base_url: String,
    http: reqwest::Client,
}

impl SupervisorClient {
    pub fn new(token: impl Into<String>) -> Self {
        Self::with_base_url(token, BASE_URL)
    }

    /// Point the client at a non-default Supervisor address.
    pub fn with_base_url(token: impl Into<String>, base_url: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            token: token.into(),
            base_url: base_url.into(),
            http,
        }
    }

    /// List all backups known to the Supervisor.
    pub async fn list_backups(&self) -> Result<Vec<BackupSummary>> {
        let resp: ApiResponse<BackupList> = self.request(Method::GET, "/snapshots").await?;
        Ok(resp.data.map(|list| list.snapshots).unwrap_or_default())
    }

    /// Fetch the details of a single backup.
    pub async fn backup_info(&self, slug: &str) -> Result<Option<BackupDetail>> {
        let resp: ApiResponse<BackupDetail> = self
            .request(Method::GET, &format!("/snapshots/{slug}/info"))
            .await?;
        Ok(resp.data)
    }

    /// Delete a backup. Returns whether the Supervisor reported success.
    pub async fn remove_backup(&self, slug: &str) -> Result<bool> {
        let resp: ApiResponse<serde_json::Value> = self
            .request(Method::POST, &format!("/snapshots/{slug}/remove"))
            .await?;
        Ok(resp.is_ok())
    }

    async fn request<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);

        let mut retries = 0;
        loop {
            let resp = match self
                .http
                .request(method.clone(), &url)
                .bearer_auth(&self.token)
                .send()
                .await
            {
                Ok(resp) => resp,
                // Transient transport failures get the same bounded
                // retry treatment as the retryable status codes.
                Err(err) if err.is_connect() || err.is_timeout() => {
                    retries += 1;
                    if retries > MAX_RETRIES {
                        return Err(SupervisorError::Transport(err));
                    }
                    let backoff = backoff_secs(retries);
                    warn!(url = %url, error = %err, backoff, retries, "supervisor request failed, backing off");
                    tokio::time::sleep(Duration::from_secs(backoff)).await;
                    continue;
                }
                Err(err) => return Err(SupervisorError::Transport(err)),
            };
            let status = resp.status();

            if RETRY_STATUSES.contains(&status.as_u16()) {
                retries += 1;
                if retries > MAX_RETRIES {
                    return Err(SupervisorError::RetriesExhausted { url });
                }
                let backoff = backoff_secs(retries);
                warn!(url = %url, %status, backoff, retries, "supervisor request failed, backing off");
                tokio::time::sleep(Duration::from_secs(backoff)).await;
                continue;
            }

            if !status.is_success() {
                return Err(SupervisorError::Status { url, status });
            }

            debug!(url = %url, "OK");
            return resp.json().await.map_err(SupervisorError::Decode);
        }
    }
}

fn backoff_secs(retries: u32) -> u64 {
    (BACKOFF_FACTOR_SECS << (retries - 1)).min(BACKOFF_CAP_SECS)
}
