use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, error, info, warn};

use crate::store::ObjectStore;

/// Outcome of one startup reconciliation pass.
#[derive(Debug, Default)]
pub struct ReconcileReport {
    /// Local files whose remote counterpart already matched by size.
    pub matched: u64,
    /// Keys uploaded during the pass (size mismatch or missing).
    pub uploaded: Vec<String>,
    /// Files absent from the bucket and left alone (flag disabled).
    pub skipped: Vec<String>,
    /// Keys whose upload attempt failed.
    pub failed: Vec<String>,
}

/// Diff the immediate files of `dir` against the bucket listing and upload
/// what the bucket is missing or holds at a different size.
///
/// Runs once per process start, before the watch loop. Sync is strictly
/// local-to-remote: objects without a local counterpart are never touched.
/// A listing failure is fatal and propagates; a single upload failure is
/// logged and the pass continues.
pub async fn reconcile(
    store: &dyn ObjectStore,
    dir: &Path,
    upload_missing: bool,
) -> Result<ReconcileReport> {
    let listing = store.list().await.context("failed to list bucket")?;
    if listing.truncated {
        warn!("bucket listing is truncated; reconciling against a partial remote view");
    }

    let mut report = ReconcileReport::default();

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("failed to read directory {}", dir.display()))?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let path = entry.path();
        let size = entry.metadata().await?.len();

        match listing.find(&name) {
            Some(remote) if remote.size == size => {
                debug!(path = %path.display(), size, "file already in bucket with matching size");
                report.matched += 1;
            }
            Some(remote) => {
                warn!(
                    path = %path.display(),
                    local_size = size,
                    remote_size = remote.size,
                    "file does not match the object in the bucket, re-uploading"
                );
                upload(store, &path, &name, &mut report).await;
            }
            None => {
                warn!(path = %path.display(), "file not found in bucket");
                if upload_missing {
                    upload(store, &path, &name, &mut report).await;
                } else {
                    report.skipped.push(name);
                }
            }
        }
    }

    info!(
        matched = report.matched,
        uploaded = report.uploaded.len(),
        skipped = report.skipped.len(),
        failed = report.failed.len(),
        "reconciliation finished"
    );
    Ok(report)
}

async fn upload(store: &dyn ObjectStore, path: &Path, key: &str, report: &mut ReconcileReport) {
    match store.upload(path, key).await {
        Ok(()) => report.uploaded.push(key.to_string()),
        Err(err) => {
            error!(path = %path.display(), error = %err, "upload failed");
            report.failed.push(key.to_string());
        }
    }
}
