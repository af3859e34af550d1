use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;

use super::{BucketListing, ObjectStore, RemoteObject};

/// In-memory store used by pipeline tests. Records every upload attempt
/// and can be primed with remote objects, a truncated listing, listing
/// failure, or per-key upload failures.
#[derive(Default)]
pub struct MemoryStore {
    remote: Mutex<Vec<RemoteObject>>,
    uploads: Mutex<Vec<(PathBuf, String)>>,
    truncated: bool,
    fail_list: bool,
    fail_keys: HashSet<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(self, key: &str, size: u64) -> Self {
        self.remote.lock().unwrap().push(RemoteObject {
            key: key.to_string(),
            size,
            last_modified: None,
        });
        self
    }

    pub fn with_truncated_listing(mut self) -> Self {
        self.truncated = true;
        self
    }

    pub fn with_failing_listing(mut self) -> Self {
        self.fail_list = true;
        self
    }

    pub fn with_failing_upload(mut self, key: &str) -> Self {
        self.fail_keys.insert(key.to_string());
        self
    }

    /// Keys uploaded so far, in order.
    pub fn uploaded_keys(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(_, key)| key.clone())
            .collect()
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    pub fn remote_keys(&self) -> Vec<String> {
        self.remote
            .lock()
            .unwrap()
            .iter()
            .map(|obj| obj.key.clone())
            .collect()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list(&self) -> Result<BucketListing> {
        if self.fail_list {
            anyhow::bail!("bucket not found");
        }
        Ok(BucketListing {
            objects: self.remote.lock().unwrap().clone(),
            truncated: self.truncated,
        })
    }

    async fn upload(&self, path: &Path, key: &str) -> Result<()> {
        if self.fail_keys.contains(key) {
            anyhow::bail!("upload rejected: {key}");
        }
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), key.to_string()));
        Ok(())
    }
}
