// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Streaming decoder over one chunk object
//!
//! Exposes the decoded content as a sequence of reads bounded by the
//! transfer unit, so memory stays flat no matter how large the chunk is. The
//! sequence can be consumed once; a resumed execution opens the chunk again
//! and skips what was already acknowledged.

use crate::codec::Codec;
use crate::store::{ByteStream, RemoteStore};
use crate::{RelayError, Result};
use diagnostics::*;
use std::pin::Pin;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::io::StreamReader;

pub struct ChunkDecoder {
    chunk: String,
    reader: Pin<Box<dyn AsyncRead + Send>>,
    scratch: Vec<u8>,
    position: u64,
    exhausted: bool,
}

impl ChunkDecoder {
    /// Open a chunk object and wrap it in the decoder its magic bytes call for
    pub async fn open(
        store: &dyn RemoteStore,
        bucket: &str,
        key: &str,
        read_unit: usize,
    ) -> Result<Self> {
        let compressed_size = store.object_size(bucket, key).await?;
        info!("Opening chunk {bucket}/{key} ({compressed_size} compressed bytes)");

        let stream = store.open(bucket, key).await?;
        Self::from_stream(key, stream, read_unit).await
    }

    pub async fn from_stream(chunk: &str, stream: ByteStream, read_unit: usize) -> Result<Self> {
        let reader = Codec::sniff_decoder(chunk, StreamReader::new(stream)).await?;
        Ok(Self {
            chunk: chunk.to_string(),
            reader,
            scratch: vec![0u8; read_unit.max(1)],
            position: 0,
            exhausted: false,
        })
    }

    /// Decoded bytes consumed so far, skipped ones included
    #[must_use]
    pub fn position(&self) -> u64 {
        self.position
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Next decoded range, or `None` once the chunk is exhausted
    pub async fn next_read(&mut self) -> Result<Option<&[u8]>> {
        if self.exhausted {
            return Ok(None);
        }

        let n = self
            .reader
            .read(&mut self.scratch)
            .await
            .map_err(|e| RelayError::read_failure(&self.chunk, e))?;
        if n == 0 {
            self.exhausted = true;
            let chunk = self.chunk.as_str();
            let position = self.position;
            debug!("Chunk {chunk} exhausted after {position} decoded bytes");
            return Ok(None);
        }

        self.position += n as u64;
        Ok(Some(&self.scratch[..n]))
    }

    /// Discard `count` decoded bytes, used when resuming mid-chunk
    pub async fn skip(&mut self, count: u64) -> Result<()> {
        let target = self.position + count;
        while self.position < target {
            let want = (target - self.position).min(self.scratch.len() as u64) as usize;
            let n = self
                .reader
                .read(&mut self.scratch[..want])
                .await
                .map_err(|e| RelayError::read_failure(&self.chunk, e))?;
            if n == 0 {
                self.exhausted = true;
                return Err(RelayError::decode(
                    &self.chunk,
                    std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        format!(
                            "chunk ends at {} decoded bytes, before resume position {target}",
                            self.position
                        ),
                    ),
                ));
            }
            self.position += n as u64;
        }
        Ok(())
    }
}
