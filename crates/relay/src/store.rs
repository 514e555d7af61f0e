// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Object store client seam
//!
//! [`RemoteStore`] is the narrow set of calls the relay makes: reads of chunk
//! objects, existence probes, and the multipart upload lifecycle. The
//! production implementation, [`BucketStores`], keeps one `object_store`
//! instance per bucket, built on first use from the [`StoreConfig`].

use crate::config::StoreConfig;
use crate::session::PartEntry;
use crate::{RelayError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use diagnostics::*;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::multipart::{MultipartStore, PartId};
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Raw (still compressed) bytes of one object
pub type ByteStream = BoxStream<'static, std::io::Result<Bytes>>;

#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Size in bytes of an existing object
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64>;

    async fn open(&self, bucket: &str, key: &str) -> Result<ByteStream>;

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Delete an object if present; returns whether it was
    async fn delete_if_exists(&self, bucket: &str, key: &str) -> Result<bool>;

    /// Start a multipart upload and return its session id
    async fn initiate_multipart(&self, bucket: &str, key: &str) -> Result<String>;

    /// Upload one part (`part_number` starts at 1) and return its identifier
    async fn upload_part(
        &self,
        multipart_id: &str,
        part_number: u32,
        bucket: &str,
        key: &str,
        data: Bytes,
    ) -> Result<String>;

    async fn complete_multipart(
        &self,
        multipart_id: &str,
        bucket: &str,
        key: &str,
        parts: &[PartEntry],
    ) -> Result<()>;

    async fn abort_multipart(&self, multipart_id: &str, bucket: &str, key: &str) -> Result<()>;

    /// Write a zero-length object
    async fn put_empty(&self, bucket: &str, key: &str) -> Result<()>;
}

/// An `object_store` backend that also speaks the multipart protocol
pub trait MultipartObjectStore: ObjectStore + MultipartStore {}

impl<T: ObjectStore + MultipartStore> MultipartObjectStore for T {}

/// One object store per bucket
pub struct BucketStores {
    config: StoreConfig,
    stores: Mutex<HashMap<String, Arc<dyn MultipartObjectStore>>>,
}

impl BucketStores {
    #[must_use]
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            stores: Mutex::new(HashMap::new()),
        }
    }

    /// In-memory buckets, for dry runs and tests
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(StoreConfig::Memory)
    }

    /// Register a prebuilt store for a bucket
    #[must_use]
    pub fn with_bucket(self, bucket: &str, store: Arc<dyn MultipartObjectStore>) -> Self {
        self.lock().insert(bucket.to_string(), store);
        self
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<dyn MultipartObjectStore>>> {
        // A poisoned map still holds valid stores
        self.stores.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store serving `bucket`, built from the config on first use
    pub fn bucket(&self, bucket: &str) -> Result<Arc<dyn MultipartObjectStore>> {
        let mut stores = self.lock();
        if let Some(store) = stores.get(bucket) {
            return Ok(store.clone());
        }

        let store = self.build(bucket)?;
        stores.insert(bucket.to_string(), store.clone());
        Ok(store)
    }

    fn build(&self, bucket: &str) -> Result<Arc<dyn MultipartObjectStore>> {
        match &self.config {
            StoreConfig::Memory => Ok(Arc::new(InMemory::new())),
            StoreConfig::S3 {
                region,
                endpoint,
                allow_http,
                access_key,
                secret_key,
            } => {
                let mut builder = AmazonS3Builder::from_env().with_bucket_name(bucket);
                if let Some(region) = region {
                    builder = builder.with_region(region);
                }
                if let Some(endpoint) = endpoint {
                    builder = builder.with_endpoint(endpoint);
                }
                if *allow_http {
                    builder = builder.with_allow_http(true);
                }
                if let (Some(access_key), Some(secret_key)) = (access_key, secret_key) {
                    builder = builder
                        .with_access_key_id(access_key)
                        .with_secret_access_key(secret_key);
                }
                debug!("Built S3 store for bucket {bucket}");
                Ok(Arc::new(builder.build()?))
            }
        }
    }
}

fn object_path(key: &str) -> Result<Path> {
    Path::parse(key).map_err(|e| RelayError::Precondition(format!("invalid object key {key}: {e}")))
}

#[async_trait]
impl RemoteStore for BucketStores {
    async fn object_size(&self, bucket: &str, key: &str) -> Result<u64> {
        let meta = self.bucket(bucket)?.head(&object_path(key)?).await?;
        Ok(meta.size)
    }

    async fn open(&self, bucket: &str, key: &str) -> Result<ByteStream> {
        let result = self.bucket(bucket)?.get(&object_path(key)?).await?;
        Ok(result.into_stream().map_err(std::io::Error::other).boxed())
    }

    async fn exists(&self, bucket: &str, key: &str) -> Result<bool> {
        debug!("Checking existence of {bucket}/{key}");

        match self.bucket(bucket)?.head(&object_path(key)?).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete_if_exists(&self, bucket: &str, key: &str) -> Result<bool> {
        if !self.exists(bucket, key).await? {
            return Ok(false);
        }
        self.bucket(bucket)?.delete(&object_path(key)?).await?;
        Ok(true)
    }

    async fn initiate_multipart(&self, bucket: &str, key: &str) -> Result<String> {
        Ok(self
            .bucket(bucket)?
            .create_multipart(&object_path(key)?)
            .await?)
    }

    async fn upload_part(
        &self,
        multipart_id: &str,
        part_number: u32,
        bucket: &str,
        key: &str,
        data: Bytes,
    ) -> Result<String> {
        // object_store numbers parts from zero
        let part_idx = part_number
            .checked_sub(1)
            .ok_or_else(|| RelayError::InvalidState("part numbers start at 1".to_string()))?
            as usize;
        let part = self
            .bucket(bucket)?
            .put_part(
                &object_path(key)?,
                &multipart_id.to_string(),
                part_idx,
                PutPayload::from(data),
            )
            .await?;
        Ok(part.content_id)
    }

    async fn complete_multipart(
        &self,
        multipart_id: &str,
        bucket: &str,
        key: &str,
        parts: &[PartEntry],
    ) -> Result<()> {
        let parts = parts
            .iter()
            .map(|p| PartId {
                content_id: p.e_tag.clone(),
            })
            .collect();
        let _ = self
            .bucket(bucket)?
            .complete_multipart(&object_path(key)?, &multipart_id.to_string(), parts)
            .await?;
        Ok(())
    }

    async fn abort_multipart(&self, multipart_id: &str, bucket: &str, key: &str) -> Result<()> {
        self.bucket(bucket)?
            .abort_multipart(&object_path(key)?, &multipart_id.to_string())
            .await?;
        Ok(())
    }

    async fn put_empty(&self, bucket: &str, key: &str) -> Result<()> {
        let _ = self
            .bucket(bucket)?
            .put(&object_path(key)?, PutPayload::new())
            .await?;
        Ok(())
    }
}
