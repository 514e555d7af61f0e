// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Decoded-byte accumulator that turns a stream into multipart parts
//!
//! Mid-stream, every part is exactly `threshold` bytes and whatever exceeds it
//! stays buffered for the next one. At end of input the remainder becomes a
//! final, shorter part. Empty parts are never uploaded.

use crate::session::{ContinuationState, MAX_PART_NUMBER};
use crate::store::RemoteStore;
use crate::{RelayError, Result};
use bytes::BytesMut;
use diagnostics::*;

pub struct PartBuffer {
    buf: BytesMut,
    threshold: usize,
}

impl PartBuffer {
    #[must_use]
    pub fn new(threshold: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(threshold),
            threshold: threshold.max(1),
        }
    }

    pub fn append(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True when a full part is buffered, or at end of input with anything buffered
    #[must_use]
    pub fn should_flush(&self, end_of_input: bool) -> bool {
        self.buf.len() >= self.threshold || (end_of_input && !self.buf.is_empty())
    }

    /// Upload the next part of the active session
    ///
    /// Returns the number of bytes acknowledged, 0 when nothing was buffered.
    pub async fn flush(
        &mut self,
        store: &dyn RemoteStore,
        state: &mut ContinuationState,
    ) -> Result<usize> {
        if self.buf.is_empty() {
            return Ok(0);
        }

        let multipart_id = state
            .multipart_id
            .clone()
            .ok_or_else(|| RelayError::InvalidState("no upload session to flush into".to_string()))?;
        if state.part_number > MAX_PART_NUMBER {
            return Err(RelayError::InvalidState(format!(
                "part {} exceeds the multipart limit of {MAX_PART_NUMBER}",
                state.part_number
            )));
        }

        let take = self.buf.len().min(self.threshold);
        let part = self.buf.split_to(take).freeze();
        let part_number = state.part_number;
        let size = part.len();
        debug!("Uploading part {part_number} with {size} bytes");

        let e_tag = store
            .upload_part(
                &multipart_id,
                part_number,
                &state.target_bucket,
                &state.target_file,
                part,
            )
            .await?;
        let _ = state.record_part(e_tag);

        info!("Uploaded part {part_number} ({size} bytes)");
        Ok(size)
    }

    /// Drop bytes that were never acknowledged
    pub fn discard(&mut self) -> usize {
        let dropped = self.buf.len();
        self.buf.clear();
        dropped
    }
}
