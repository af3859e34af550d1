pub mod memory;
pub mod s3;

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One entry of a bucket listing, as seen at a single point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub key: String,
    pub size: u64,
    pub last_modified: Option<DateTime<Utc>>,
}

/// Result of a single listing call. `truncated` means the store returned
/// only part of the bucket and callers are working from an incomplete set.
#[derive(Debug, Clone, Default)]
pub struct BucketListing {
    pub objects: Vec<RemoteObject>,
    pub truncated: bool,
}

impl BucketListing {
    pub fn find(&self, key: &str) -> Option<&RemoteObject> {
        self.objects.iter().find(|obj| obj.key == key)
    }
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch the bucket listing with a single call. No pagination: a
    /// truncated response is reported via [`BucketListing::truncated`].
    async fn list(&self) -> Result<BucketListing>;

    /// Upload the file at `path` under `key`. One attempt, no retry.
    async fn upload(&self, path: &Path, key: &str) -> Result<()>;
}
