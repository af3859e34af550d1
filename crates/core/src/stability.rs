use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Decides when a freshly created file is safe to upload.
///
/// Backup archives are written once and closed, so two size samples taken
/// one interval apart being equal is taken as "write complete". There is
/// no upper bound on the wait: a file that never stops growing is never
/// released.
#[derive(Debug, Clone, Copy)]
pub struct StabilityProbe {
    interval: Duration,
}

impl Default for StabilityProbe {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_INTERVAL)
    }
}

impl StabilityProbe {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Poll the file's size until two consecutive samples match, then
    /// return the settled size. Errors if the file disappears mid-poll.
    pub async fn wait_until_stable(&self, path: &Path) -> Result<u64> {
        let mut last_size: Option<u64> = None;
        loop {
            let size = tokio::fs::metadata(path)
                .await
                .with_context(|| format!("failed to stat {}", path.display()))?
                .len();

            if last_size == Some(size) {
                debug!(path = %path.display(), size, "file size is stable");
                return Ok(size);
            }

            last_size = Some(size);
            tokio::time::sleep(self.interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn settles_once_growth_stops() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.tar");
        std::fs::write(&path, b"start").unwrap();

        // Appends land more often than the probe samples, so the probe
        // cannot see two equal sizes until the writer is done.
        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            for _ in 0..3 {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .unwrap();
                file.write_all(&[0u8; 64]).unwrap();
            }
        });

        let probe = StabilityProbe::new(Duration::from_millis(25));
        let size = probe.wait_until_stable(&path).await.unwrap();
        writer.await.unwrap();

        assert_eq!(size, std::fs::metadata(&path).unwrap().len());
        assert_eq!(size, 5 + 3 * 64);
    }

    #[tokio::test]
    async fn never_settles_while_file_keeps_growing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("endless.tar");
        std::fs::write(&path, b"").unwrap();

        let writer_path = path.clone();
        let writer = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(5)).await;
                let mut file = std::fs::OpenOptions::new()
                    .append(true)
                    .open(&writer_path)
                    .unwrap();
                file.write_all(&[0u8; 32]).unwrap();
            }
        });

        let probe = StabilityProbe::new(Duration::from_millis(20));
        let outcome =
            tokio::time::timeout(Duration::from_millis(300), probe.wait_until_stable(&path)).await;
        writer.abort();

        assert!(outcome.is_err(), "probe settled on a still-growing file");
    }

    #[tokio::test]
    async fn errors_when_file_vanishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone.tar");

        let probe = StabilityProbe::new(Duration::from_millis(10));
        assert!(probe.wait_until_stable(&path).await.is_err());
    }
}
