use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::HeaderMap;
use s3::bucket::Bucket;
use s3::creds::Credentials;
use s3::region::Region;
use tracing::{info, warn};

use super::{BucketListing, ObjectStore, RemoteObject};

/// Fixed for the process lifetime; owned by the store.
#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub storage_class: String,
}

pub struct S3Store {
    bucket: Box<Bucket>,
    storage_class: String,
}

impl S3Store {
    /// Resolve credentials from the default AWS chain and bind to the
    /// configured bucket. Does not touch the network; a bad bucket shows
    /// up on the first `list` call instead.
    pub fn new(config: &S3Config) -> Result<Self> {
        let region: Region = config
            .region
            .parse()
            .map_err(|err| anyhow::anyhow!("unrecognized bucket region {:?}: {err}", config.region))?;
        let credentials =
            Credentials::default().context("failed to resolve AWS credentials")?;

        let mut headers = HeaderMap::new();
        headers.insert(
            "x-amz-storage-class",
            config
                .storage_class
                .parse()
                .with_context(|| format!("invalid storage class {:?}", config.storage_class))?,
        );

        let bucket = Box::new(
            Bucket::new(&config.bucket, region, credentials)?
                .with_extra_headers(headers)
                .context("failed to attach storage class header")?,
        );

        Ok(Self {
            bucket,
            storage_class: config.storage_class.clone(),
        })
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn list(&self) -> Result<BucketListing> {
        let (page, _status) = self
            .bucket
            .list_page(String::new(), None, None, None, None)
            .await
            .with_context(|| format!("failed to list S3 bucket {}", self.bucket.name()))?;

        if page.is_truncated {
            warn!(
                bucket = %self.bucket.name(),
                "received a truncated listing and pagination is not implemented; \
                 continuing with a partial view of the bucket"
            );
        }

        let objects = page
            .contents
            .into_iter()
            .map(|obj| RemoteObject {
                key: obj.key,
                size: obj.size,
                last_modified: parse_timestamp(&obj.last_modified),
            })
            .collect();

        Ok(BucketListing {
            objects,
            truncated: page.is_truncated,
        })
    }

    async fn upload(&self, path: &Path, key: &str) -> Result<()> {
        info!(path = %path.display(), bucket = %self.bucket.name(), "uploading file to S3");

        let body = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.bucket
            .put_object(key, &body)
            .await
            .with_context(|| format!("S3 PUT failed: {key}"))?;

        info!(
            key = %key,
            bucket = %self.bucket.name(),
            storage_class = %self.storage_class,
            "uploaded file to S3"
        );
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
