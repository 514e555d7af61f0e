// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Shared fixtures: a store that records part uploads, an invoker that keeps
//! payloads instead of sending them, and a budget tied to upload progress.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::{ObjectStore, PutPayload};
use object_store::path::Path;
use relay::{
    Budget, BucketStores, ByteStream, ContinuationState, Outcome, PartEntry, Relay, RelayError,
    RelaySettings, RemoteStore,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SOURCE: &str = "chunks";
pub const TARGET: &str = "restored";

/// One `upload_part` call as the store saw it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upload {
    pub part_number: u32,
    pub size: usize,
}

/// In-memory buckets that log every part upload
pub struct RecordingStore {
    inner: BucketStores,
    uploads: Mutex<Vec<Upload>>,
    count: Arc<AtomicUsize>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self {
            inner: BucketStores::in_memory(),
            uploads: Mutex::new(Vec::new()),
            count: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }

    pub fn upload_sizes(&self) -> Vec<usize> {
        self.uploads().iter().map(|u| u.size).collect()
    }

    pub fn upload_counter(&self) -> Arc<AtomicUsize> {
        self.count.clone()
    }

    pub async fn put(&self, bucket: &str, key: &str, data: Vec<u8>) {
        let _ = self
            .inner
            .bucket(bucket)
            .unwrap()
            .put(&Path::from(key), PutPayload::from(data))
            .await
            .unwrap();
    }

    pub async fn read(&self, bucket: &str, key: &str) -> Vec<u8> {
        let chunks: Vec<Bytes> = self
            .inner
            .open(bucket, key)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        chunks.concat()
    }
}

#[async_trait]
impl RemoteStore for RecordingStore {
    async fn object_size(&self, bucket: &str, key: &str) -> relay::Result<u64> {
        self.inner.object_size(bucket, key).await
    }

    async fn open(&self, bucket: &str, key: &str) -> relay::Result<ByteStream> {
        self.inner.open(bucket, key).await
    }

    async fn exists(&self, bucket: &str, key: &str) -> relay::Result<bool> {
        self.inner.exists(bucket, key).await
    }

    async fn delete_if_exists(&self, bucket: &str, key: &str) -> relay::Result<bool> {
        self.inner.delete_if_exists(bucket, key).await
    }

    async fn initiate_multipart(&self, bucket: &str, key: &str) -> relay::Result<String> {
        self.inner.initiate_multipart(bucket, key).await
    }

    async fn upload_part(
        &self,
        multipart_id: &str,
        part_number: u32,
        bucket: &str,
        key: &str,
        data: Bytes,
    ) -> relay::Result<String> {
        let size = data.len();
        let e_tag = self
            .inner
            .upload_part(multipart_id, part_number, bucket, key, data)
            .await?;
        self.uploads
            .lock()
            .unwrap()
            .push(Upload { part_number, size });
        let _ = self.count.fetch_add(1, Ordering::SeqCst);
        Ok(e_tag)
    }

    async fn complete_multipart(
        &self,
        multipart_id: &str,
        bucket: &str,
        key: &str,
        parts: &[PartEntry],
    ) -> relay::Result<()> {
        self.inner
            .complete_multipart(multipart_id, bucket, key, parts)
            .await
    }

    async fn abort_multipart(&self, multipart_id: &str, bucket: &str, key: &str) -> relay::Result<()> {
        self.inner.abort_multipart(multipart_id, bucket, key).await
    }

    async fn put_empty(&self, bucket: &str, key: &str) -> relay::Result<()> {
        self.inner.put_empty(bucket, key).await
    }
}

/// Keeps each handoff payload; optionally refuses them
#[derive(Default)]
pub struct RecordingInvoker {
    payloads: Mutex<Vec<(String, String)>>,
    fail: bool,
}

impl RecordingInvoker {
    pub fn failing() -> Self {
        Self {
            payloads: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn payloads(&self) -> Vec<(String, String)> {
        self.payloads.lock().unwrap().clone()
    }

    pub fn last_state(&self) -> ContinuationState {
        let payloads = self.payloads();
        let (_, payload) = payloads.last().expect("no handoff recorded");
        ContinuationState::from_payload(payload).unwrap()
    }
}

#[async_trait]
impl relay::Invoker for RecordingInvoker {
    async fn invoke_async(&self, function_name: &str, payload: &str) -> relay::Result<()> {
        self.payloads
            .lock()
            .unwrap()
            .push((function_name.to_string(), payload.to_string()));
        if self.fail {
            return Err(RelayError::Handoff {
                function: function_name.to_string(),
                message: "throttled".to_string(),
            });
        }
        Ok(())
    }
}

/// Plenty of time until `allowed` parts were uploaded in this execution
pub struct PartBudget {
    uploads: Arc<AtomicUsize>,
    start: usize,
    allowed: usize,
}

impl PartBudget {
    pub fn new(store: &RecordingStore, allowed: usize) -> Self {
        let uploads = store.upload_counter();
        let start = uploads.load(Ordering::SeqCst);
        Self {
            uploads,
            start,
            allowed,
        }
    }
}

impl Budget for PartBudget {
    fn remaining(&self) -> Duration {
        if self.uploads.load(Ordering::SeqCst) - self.start >= self.allowed {
            Duration::from_secs(5)
        } else {
            Duration::from_secs(900)
        }
    }
}

pub fn settings(part_threshold: usize, read_unit: usize) -> RelaySettings {
    RelaySettings {
        function_name: "decompress".to_string(),
        part_threshold,
        read_unit,
        safety_margin: relay::HANDOFF_SAFETY_MARGIN,
    }
}

pub struct Fixture {
    pub store: Arc<RecordingStore>,
    pub invoker: Arc<RecordingInvoker>,
    pub relay: Relay,
}

impl Fixture {
    pub fn new(part_threshold: usize, read_unit: usize) -> Self {
        Self::with_invoker(part_threshold, read_unit, RecordingInvoker::default())
    }

    pub fn with_invoker(part_threshold: usize, read_unit: usize, invoker: RecordingInvoker) -> Self {
        let store = Arc::new(RecordingStore::new());
        let invoker = Arc::new(invoker);
        let relay = Relay::new(
            store.clone(),
            invoker.clone(),
            settings(part_threshold, read_unit),
        );
        Self {
            store,
            invoker,
            relay,
        }
    }

    /// Upload already-compressed chunk objects as `<base>.001`, `<base>.002`, ...
    pub async fn put_chunks(&self, base: &str, chunks: Vec<Vec<u8>>) {
        for (i, chunk) in chunks.into_iter().enumerate() {
            let key = relay::chunk_name(base, i as u64 + 1);
            self.store.put(SOURCE, &key, chunk).await;
        }
    }

    /// Replay handoff payloads until the transfer completes
    ///
    /// Each execution may upload `parts_per_execution` parts before its
    /// budget runs low. Returns every outcome in order.
    pub async fn run_to_completion(
        &self,
        first: ContinuationState,
        parts_per_execution: usize,
    ) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        let mut state = first;
        for _ in 0..10_000 {
            let budget = PartBudget::new(&self.store, parts_per_execution);
            let outcome = self.relay.run(state.clone(), &budget).await.unwrap();
            outcomes.push(outcome.clone());
            match outcome {
                Outcome::Completed { .. } => return outcomes,
                Outcome::HandedOff { .. } => state = self.invoker.last_state(),
            }
        }
        panic!("transfer did not complete");
    }
}

pub async fn gzip(data: &[u8]) -> Vec<u8> {
    use async_compression::tokio::write::GzipEncoder;
    use tokio::io::AsyncWriteExt;

    let mut encoder = GzipEncoder::new(Vec::new());
    encoder.write_all(data).await.unwrap();
    encoder.shutdown().await.unwrap();
    encoder.into_inner()
}

/// Deterministic, poorly compressible bytes
pub fn noise(len: usize, seed: u32) -> Vec<u8> {
    let mut x = seed | 1;
    (0..len)
        .map(|_| {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            (x >> 8) as u8
        })
        .collect()
}

pub fn fresh(base: &str, target: &str) -> ContinuationState {
    ContinuationState::fresh(SOURCE, relay::chunk_name(base, 1), TARGET, target)
}
