// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Per-execution reassembly state machine
//!
//! One call to [`Relay::run`] is one execution. It walks
//!
//! ```text
//! Initiating -> StreamingChunk -> AdvancingChunk -> StreamingChunk ...
//!                              \-> HandingOff
//!                              \-> Completing
//! ```
//!
//! The budget is consulted only after a part was acknowledged or a chunk was
//! finished, so every execution makes progress before it may hand off. A
//! mid-chunk handoff records how many decoded bytes of the current chunk were
//! acknowledged; bytes still buffered are dropped and decoded again by the
//! next execution.

use crate::budget::Budget;
use crate::chunk::next_chunk_name;
use crate::config::RelayConfig;
use crate::decoder::ChunkDecoder;
use crate::invoke::{Invoker, invoker_from_config};
use crate::part_buffer::PartBuffer;
use crate::session::ContinuationState;
use crate::store::{BucketStores, RemoteStore};
use crate::{RelayError, Result};
use diagnostics::*;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySettings {
    /// Function that receives the continuation payload at handoff
    pub function_name: String,
    pub part_threshold: usize,
    pub read_unit: usize,
    pub safety_margin: Duration,
}

impl RelaySettings {
    #[must_use]
    pub fn from_config(config: &RelayConfig) -> Self {
        Self {
            function_name: config.function_name.clone(),
            part_threshold: config.part_threshold(),
            read_unit: config.read_unit(),
            safety_margin: config.safety_margin(),
        }
    }
}

/// How an execution ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Outcome {
    /// The destination object now exists
    Completed { parts: usize, bytes: u64 },
    /// A fresh execution was triggered with `next`
    ///
    /// `delivered` is false when the trigger failed; `next` is then the
    /// payload an operator can replay by hand.
    HandedOff {
        next: ContinuationState,
        bytes: u64,
        delivered: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Phase {
    Initiating,
    StreamingChunk,
    AdvancingChunk(String),
    HandingOff,
    Completing,
}

/// Where streaming one chunk stopped
enum ChunkEnd {
    Exhausted,
    Paused,
}

pub struct Relay {
    store: Arc<dyn RemoteStore>,
    invoker: Arc<dyn Invoker>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(
        store: Arc<dyn RemoteStore>,
        invoker: Arc<dyn Invoker>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            store,
            invoker,
            settings,
        }
    }

    /// Wire the store and invoker a deployment config describes
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(
            Arc::new(BucketStores::new(config.store.clone())),
            invoker_from_config(&config.invoker)?,
            RelaySettings::from_config(config),
        ))
    }

    #[must_use]
    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    fn below_margin(&self, budget: &dyn Budget) -> bool {
        budget.remaining() < self.settings.safety_margin
    }

    /// Run one execution from `state` until completion or handoff
    pub async fn run(&self, mut state: ContinuationState, budget: &dyn Budget) -> Result<Outcome> {
        state.validate()?;

        let mut bytes = 0u64;
        let mut phase = if state.has_session() {
            Phase::StreamingChunk
        } else {
            Phase::Initiating
        };

        loop {
            phase = match phase {
                Phase::Initiating => {
                    self.initiate(&mut state, budget).await?;
                    Phase::StreamingChunk
                }
                Phase::StreamingChunk => {
                    match self.stream_chunk(&mut state, budget, &mut bytes).await? {
                        ChunkEnd::Paused => Phase::HandingOff,
                        ChunkEnd::Exhausted => self.after_chunk(&mut state, budget).await?,
                    }
                }
                Phase::AdvancingChunk(next) => {
                    let remaining_secs = budget.remaining().as_secs();
                    info!("Advancing to chunk {next} ({remaining_secs}s remaining)");
                    state.advance_to(next);
                    Phase::StreamingChunk
                }
                Phase::HandingOff => return Ok(self.hand_off(state, budget, bytes).await),
                Phase::Completing => return self.complete(state, budget, bytes).await,
            };
        }
    }

    /// Replace any stale destination object and open a new upload session
    async fn initiate(&self, state: &mut ContinuationState, budget: &dyn Budget) -> Result<()> {
        let bucket = state.target_bucket.as_str();
        let key = state.target_file.as_str();

        if self.store.delete_if_exists(bucket, key).await? {
            info!("Deleted existing destination {bucket}/{key}");
        }

        let multipart_id = self.store.initiate_multipart(bucket, key).await?;
        let remaining_secs = budget.remaining().as_secs();
        info!("Initiated upload {multipart_id} for {bucket}/{key} ({remaining_secs}s remaining)");
        state.begin_session(multipart_id);
        Ok(())
    }

    /// Decode the current chunk into parts, pausing if the budget runs low
    async fn stream_chunk(
        &self,
        state: &mut ContinuationState,
        budget: &dyn Budget,
        bytes: &mut u64,
    ) -> Result<ChunkEnd> {
        let mut decoder = ChunkDecoder::open(
            self.store.as_ref(),
            &state.source_bucket,
            &state.source_file,
            self.settings.read_unit,
        )
        .await?;

        if state.initial_position > 0 {
            let chunk = state.source_file.as_str();
            let position = state.initial_position;
            info!("Resuming {chunk} at decoded byte {position}");
            decoder.skip(state.initial_position).await?;
        }

        let mut buffer = PartBuffer::new(self.settings.part_threshold);
        loop {
            let end_of_chunk = match decoder.next_read().await? {
                Some(decoded) => {
                    buffer.append(decoded);
                    false
                }
                None => true,
            };

            while buffer.should_flush(end_of_chunk) {
                let flushed = buffer.flush(self.store.as_ref(), state).await?;
                state.initial_position += flushed as u64;
                *bytes += flushed as u64;

                // A drained, finished chunk is left to the chunk-boundary decision
                if end_of_chunk && buffer.is_empty() {
                    break;
                }
                if self.below_margin(budget) {
                    let dropped = buffer.discard();
                    let chunk = state.source_file.as_str();
                    let position = state.initial_position;
                    let remaining_secs = budget.remaining().as_secs();
                    info!(
                        "Pausing {chunk} at decoded byte {position}, dropping {dropped} buffered bytes ({remaining_secs}s remaining)"
                    );
                    return Ok(ChunkEnd::Paused);
                }
            }

            if end_of_chunk {
                return Ok(ChunkEnd::Exhausted);
            }
        }
    }

    /// Pick the phase that follows a fully uploaded chunk
    async fn after_chunk(&self, state: &mut ContinuationState, budget: &dyn Budget) -> Result<Phase> {
        let Some(next) = next_chunk_name(&state.source_file) else {
            let chunk = state.source_file.as_str();
            warn!("Chunk name {chunk} has no numeric suffix, treating it as the last chunk");
            return Ok(Phase::Completing);
        };

        if !self.store.exists(&state.source_bucket, &next).await? {
            let chunk = state.source_file.as_str();
            debug!("No chunk after {chunk}");
            return Ok(Phase::Completing);
        }

        if self.below_margin(budget) {
            state.advance_to(next);
            return Ok(Phase::HandingOff);
        }
        Ok(Phase::AdvancingChunk(next))
    }

    /// Trigger the next execution; a failed trigger is logged, not raised
    async fn hand_off(&self, state: ContinuationState, budget: &dyn Budget, bytes: u64) -> Outcome {
        let function = self.settings.function_name.as_str();
        let chunk = state.source_file.as_str();
        let position = state.initial_position;
        let part_number = state.part_number;
        let remaining_secs = budget.remaining().as_secs();
        info!(
            "Handing off to {function} at {chunk} byte {position}, next part {part_number} ({remaining_secs}s remaining)"
        );

        let delivered = match state.to_payload() {
            Ok(payload) => match self.invoker.invoke_async(function, &payload).await {
                Ok(()) => true,
                Err(e) => {
                    let reason = e.to_string();
                    warn!("Handoff trigger failed: {reason}");
                    false
                }
            },
            Err(e) => {
                let reason = e.to_string();
                warn!("Could not serialize continuation payload: {reason}");
                false
            }
        };

        Outcome::HandedOff {
            next: state,
            bytes,
            delivered,
        }
    }

    async fn complete(
        &self,
        state: ContinuationState,
        budget: &dyn Budget,
        bytes: u64,
    ) -> Result<Outcome> {
        let multipart_id = state
            .multipart_id
            .as_deref()
            .ok_or_else(|| RelayError::InvalidState("no upload session to complete".to_string()))?;
        let bucket = state.target_bucket.as_str();
        let key = state.target_file.as_str();
        let parts = state.part_list.len();
        let remaining_secs = budget.remaining().as_secs();

        if state.part_list.is_empty() {
            // A multipart upload cannot complete without parts
            self.store.abort_multipart(multipart_id, bucket, key).await?;
            self.store.put_empty(bucket, key).await?;
            info!("Wrote empty object {bucket}/{key} ({remaining_secs}s remaining)");
        } else {
            self.store
                .complete_multipart(multipart_id, bucket, key, &state.part_list)
                .await?;
            info!("Completed {bucket}/{key} with {parts} parts ({remaining_secs}s remaining)");
        }

        Ok(Outcome::Completed { parts, bytes })
    }
}
