//! S3 object backend.
//!
//! One bucket per resource name. Uses the standard AWS SDK client built from
//! the shared `SdkConfig`, so credentials and region come from the context
//! constructed at process start.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, ObjectIdentifier,
};
use tracing::debug;

use crate::backend::{ObjectBackend, ObjectEntry};
use crate::error::{StoreError, StoreResult};

/// Region where S3 rejects an explicit location constraint.
const DEFAULT_S3_REGION: &str = "us-east-1";

#[derive(Debug, Clone)]
pub struct S3Backend {
    client: Client,
    region: String,
}

impl S3Backend {
    pub fn new(client: Client, region: impl Into<String>) -> Self {
        Self {
            client,
            region: region.into(),
        }
    }

    pub fn from_conf(config: &aws_config::SdkConfig) -> Self {
        let region = config
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_S3_REGION.to_string());
        Self::new(Client::new(config), region)
    }
}

/// Maps an AWS SDK error to a [`StoreError::Backend`].
fn sdk_error<E>(operation: &'static str, err: E) -> StoreError
where
    E: std::error::Error + Send + Sync + 'static,
{
    StoreError::Backend {
        operation,
        message: DisplayErrorContext(&err).to_string(),
        source: Some(Box::new(err)),
    }
}

#[async_trait]
impl ObjectBackend for S3Backend {
    async fn bucket_exists(&self, bucket: &str) -> StoreResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(err) if err.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
            Err(err) => Err(sdk_error("head_bucket", err)),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> StoreResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);
        if self.region != DEFAULT_S3_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        request
            .send()
            .await
            .map_err(|e| sdk_error("create_bucket", e))?;
        debug!(%bucket, region = %self.region, "bucket created");
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> StoreResult<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(|e| sdk_error("delete_bucket", e))?;
        debug!(%bucket, "bucket deleted");
        Ok(())
    }

    async fn list_objects(&self, bucket: &str) -> StoreResult<Vec<ObjectEntry>> {
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        let mut entries = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| sdk_error("list_objects_v2", e))?;
            for object in page.contents() {
                if let Some(key) = object.key() {
                    entries.push(ObjectEntry {
                        key: key.to_string(),
                        size_bytes: object.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }
        }
        Ok(entries)
    }

    async fn delete_objects(&self, bucket: &str, keys: &[String]) -> StoreResult<()> {
        if keys.is_empty() {
            return Ok(());
        }

        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| sdk_error("delete_objects", e))?;
        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| sdk_error("delete_objects", e))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| sdk_error("delete_objects", e))?;

        if let Some(failed) = output.errors().first() {
            return Err(StoreError::backend(
                "delete_objects",
                format!(
                    "{} of {} objects not deleted, first: {} ({})",
                    output.errors().len(),
                    keys.len(),
                    failed.key().unwrap_or("?"),
                    failed.message().unwrap_or("unknown error"),
                ),
            ));
        }
        debug!(%bucket, count = keys.len(), "objects deleted");
        Ok(())
    }

    async fn put_object(&self, bucket: &str, key: &str, file: &Path) -> StoreResult<()> {
        let body = ByteStream::from_path(file).await.map_err(|e| StoreError::Backend {
            operation: "put_object",
            message: format!("cannot stream {}: {e}", file.display()),
            source: Some(Box::new(e)),
        })?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| sdk_error("put_object", e))?;
        Ok(())
    }
}
