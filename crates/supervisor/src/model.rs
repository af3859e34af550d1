use serde::Deserialize;

/// Response envelope shared by all Supervisor endpoints.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub result: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn is_ok(&self) -> bool {
        self.result == "ok"
    }
}

#[derive(Debug, Deserialize)]
pub struct BackupList {
    #[serde(default)]
    pub snapshots: Vec<BackupSummary>,
}

/// One entry of `GET /snapshots`.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupSummary {
    pub slug: String,
    pub name: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub protected: Option<bool>,
}

/// Payload of `GET /snapshots/{slug}/info`.
#[derive(Debug, Clone, Deserialize)]
pub struct BackupDetail {
    pub slug: String,
    pub name: String,
    pub date: String,
    /// Size in MiB as reported by the Supervisor.
    pub size: Option<f64>,
    pub homeassistant: Option<String>,
    #[serde(default)]
    pub addons: Vec<AddonRef>,
    #[serde(default)]
    pub repositories: Vec<String>,
    #[serde(default)]
    pub folders: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddonRef {
    pub slug: String,
    pub name: String,
    pub version: Option<String>,
    pub size: Option<f64>,
}
