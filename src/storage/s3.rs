//! AWS S3 storage implementation.
//!
//! Records live at `{prefix}/links/{sha256(item_url)}.json`. Claims use a
//! conditional `PutObject` (`If-None-Match: *`); S3 answers 412 when the
//! object already exists, which is the losing side of the race. Two writes
//! racing on the same key may instead get 409 `ConditionalRequestConflict`;
//! that is a lost race too.

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::models::{Link, LinkRecord, StorageConfig};
use crate::storage::{DedupStore, key_digest};

const PRECONDITION_FAILED: u16 = 412;
const CONFLICT: u16 = 409;

/// Whether a failed conditional put means another writer got there first.
fn lost_race(status: Option<u16>) -> bool {
    matches!(status, Some(PRECONDITION_FAILED | CONFLICT))
}

/// S3-based dedup store.
#[derive(Clone)]
pub struct S3Store {
    client: Client,
    bucket: String,
    prefix: String,
}

impl S3Store {
    /// Create a new S3 store instance.
    pub fn new(client: Client, bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            prefix: prefix.into(),
        }
    }

    /// Create an S3 store from the ambient AWS configuration.
    pub async fn from_config(config: &StorageConfig) -> Self {
        let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        info!("Using S3 store s3://{}/{}", config.bucket, config.prefix);
        Self::new(Client::new(&aws), &config.bucket, &config.prefix)
    }

    fn object_key(&self, key: &str) -> String {
        format!(
            "{}/links/{}.json",
            self.prefix.trim_end_matches('/'),
            key_digest(key)
        )
    }
}

#[async_trait]
impl DedupStore for S3Store {
    async fn exists(&self, key: &str) -> Result<bool> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(self.object_key(key))
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else {
                    Err(AppError::S3(service_err.to_string()))
                }
            }
        }
    }

    async fn load(&self, key: &str) -> Result<Option<Link>> {
        let object_key = self.object_key(key);
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .send()
            .await;

        match result {
            Ok(output) => {
                let bytes = output
                    .body
                    .collect()
                    .await
                    .map_err(|e| AppError::S3(e.to_string()))?;
                let record: LinkRecord = serde_json::from_slice(&bytes.into_bytes())?;
                Ok(Some(record.link))
            }
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    debug!("No record at s3://{}/{}", self.bucket, object_key);
                    Ok(None)
                } else {
                    Err(AppError::S3(service_err.to_string()))
                }
            }
        }
    }

    async fn claim(&self, link: &Link) -> Result<bool> {
        let object_key = self.object_key(link.key());
        let json = serde_json::to_vec_pretty(&LinkRecord::new(link.clone()))?;

        let result = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .if_none_match("*")
            .body(ByteStream::from(json))
            .content_type("application/json")
            .send()
            .await;

        match result {
            Ok(_) => {
                debug!("Claimed s3://{}/{}", self.bucket, object_key);
                Ok(true)
            }
            Err(err) => {
                let status = err.raw_response().map(|r| r.status().as_u16());
                if lost_race(status) {
                    debug!("Lost claim race for {} ({:?})", link.key(), status);
                    Ok(false)
                } else {
                    Err(AppError::S3(err.into_service_error().to_string()))
                }
            }
        }
    }
}
