use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::stability::StabilityProbe;
use crate::store::ObjectStore;

/// Decides which created file names enter the upload pipeline.
pub type NamePredicate = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// True for `*.tar` names with a non-empty stem; the watch loop's default.
pub fn is_backup_archive(name: &str) -> bool {
    name.strip_suffix(".tar").is_some_and(|stem| !stem.is_empty())
}

/// Watches a backup directory and uploads each newly created archive once
/// its size has settled.
///
/// The subscription is recursive over the whole tree while the startup
/// reconciliation only looks at top-level files; that asymmetry is
/// deliberate. Events are handled one at a time, so a slow upload delays
/// the events behind it.
pub struct BackupWatcher {
    dir: PathBuf,
    store: Arc<dyn ObjectStore>,
    probe: StabilityProbe,
    predicate: NamePredicate,
}

impl BackupWatcher {
    pub fn new(
        dir: impl Into<PathBuf>,
        store: Arc<dyn ObjectStore>,
        probe: StabilityProbe,
        predicate: NamePredicate,
    ) -> Self {
        Self {
            dir: dir.into(),
            store,
            probe,
            predicate,
        }
    }

    /// Register the OS watcher and process create events until the event
    /// channel closes. The caller races this future against its shutdown
    /// signal; dropping it tears the observer down.
    pub async fn run(&self) -> Result<()> {
        let (tx, mut rx) = mpsc::channel::<notify::Result<Event>>(64);

        // The notify backend delivers on its own thread, hence the
        // blocking send onto the tokio channel.
        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = tx.blocking_send(res);
        })
        .context("failed to create filesystem watcher")?;
        watcher
            .watch(&self.dir, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", self.dir.display()))?;

        info!(path = %self.dir.display(), "watching for new backup archives");

        while let Some(res) = rx.recv().await {
            let event = match res {
                Ok(event) => event,
                Err(err) => {
                    warn!(error = %err, "filesystem watch error");
                    continue;
                }
            };
            if !matches!(event.kind, EventKind::Create(_)) {
                continue;
            }
            for path in &event.paths {
                self.process(path).await;
            }
        }

        Ok(())
    }

    async fn process(&self, path: &Path) {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        if !(self.predicate)(name) {
            debug!(path = %path.display(), "ignoring non-archive file");
            return;
        }

        info!(path = %path.display(), "processing new file");

        match self.probe.wait_until_stable(path).await {
            Ok(_size) => {
                if let Err(err) = self.store.upload(path, name).await {
                    error!(path = %path.display(), error = %err, "upload failed");
                }
            }
            Err(err) => {
                error!(path = %path.display(), error = %err, "stability probe failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::store::memory::MemoryStore;

    #[test]
    fn archive_predicate_requires_tar_suffix_and_stem() {
        assert!(is_backup_archive("backup.tar"));
        assert!(is_backup_archive("core_2024.02.18.tar"));
        assert!(!is_backup_archive("backup.tar.gz"));
        assert!(!is_backup_archive("foo.txt"));
        assert!(!is_backup_archive(".tar"));
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(400)).await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn uploads_matching_file_exactly_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());

        let watcher = BackupWatcher::new(
            dir.path(),
            store.clone(),
            StabilityProbe::new(Duration::from_millis(20)),
            Arc::new(is_backup_archive),
        );
        let handle = tokio::spawn(async move { watcher.run().await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(dir.path().join("backup.tar"), b"archive bytes").unwrap();
        settle().await;

        assert_eq!(store.uploaded_keys(), vec!["backup.tar"]);
        handle.abort();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn ignores_non_matching_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryStore::new());

        let watcher = BackupWatcher::new(
            dir.path(),
            store.clone(),
            StabilityProbe::new(Duration::from_millis(20)),
            Arc::new(is_backup_archive),
        );
        let handle = tokio::spawn(async move { watcher.run().await });
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(dir.path().join("foo.txt"), b"not an archive").unwrap();
        settle().await;

        assert_eq!(store.upload_count(), 0);
        handle.abort();
    }
}
