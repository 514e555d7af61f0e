// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Local splitter producing independently decodable chunk files
//!
//! The input is read sequentially in transfer units and streamed through a
//! compressor into `<prefix>.001`. Once the compressed size of the open chunk
//! reaches the limit, that chunk is finished and the next one is opened, but
//! only when more input remains. Every chunk is a complete compressed stream.

use crate::chunk::chunk_name;
use crate::codec::{ChunkEncoder, Codec};
use crate::{RelayError, Result};
use diagnostics::*;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

/// Input read size, aligned to 4 KiB sectors
pub const TRANSFER_UNIT: usize = 4096;

#[derive(Debug, Clone)]
pub struct ProducerSettings {
    pub input: PathBuf,
    /// Chunk files are written as `<output_prefix>.<NNN>`
    pub output_prefix: String,
    /// Compressed size at which a chunk is closed
    ///
    /// Only output the encoder has already emitted is counted, so a chunk can
    /// exceed this by the encoder's internal buffer (tens of KiB for gzip,
    /// around one 128 KiB block for zstd) before it rotates.
    pub max_chunk_bytes: u64,
    pub codec: Codec,
}

impl ProducerSettings {
    fn chunk_path(&self, ordinal: u64) -> PathBuf {
        PathBuf::from(chunk_name(&self.output_prefix, ordinal))
    }

    fn check(&self) -> Result<()> {
        if self.max_chunk_bytes == 0 {
            return Err(RelayError::Configuration(
                "maximum chunk size must be greater than 0".to_string(),
            ));
        }
        if !self.input.is_file() {
            return Err(RelayError::Precondition(format!(
                "Input file does not exist: {}",
                self.input.display()
            )));
        }
        let first = self.chunk_path(1);
        if first.exists() {
            return Err(RelayError::Precondition(format!(
                "Output file already exists: {}",
                first.display()
            )));
        }
        Ok(())
    }
}

/// One chunk file being written
struct ChunkWriter {
    path: PathBuf,
    file: File,
    encoder: ChunkEncoder,
    compressed: u64,
}

impl ChunkWriter {
    async fn create(path: PathBuf, codec: Codec) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => RelayError::Precondition(format!(
                    "Output file already exists: {}",
                    path.display()
                )),
                _ => RelayError::Io(e),
            })?;
        Ok(Self {
            path,
            file,
            encoder: codec.encoder(),
            compressed: 0,
        })
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.encoder.write_all(data).await?;
        let ready = self.encoder.drain();
        self.file.write_all(&ready).await?;
        self.compressed += ready.len() as u64;
        Ok(())
    }

    async fn finish(mut self) -> Result<()> {
        let tail = self.encoder.finish().await?;
        self.file.write_all(&tail).await?;
        self.file.flush().await?;
        self.compressed += tail.len() as u64;

        let path = self.path.display().to_string();
        let compressed = self.compressed;
        info!("File generated: {path} ({compressed} bytes)");
        Ok(())
    }
}

/// Split `settings.input` into chunk files and return their paths in order
///
/// An empty input still yields one chunk holding an empty stream. On failure
/// every chunk this call created is removed, so a retry starts clean.
pub async fn produce_chunks(settings: &ProducerSettings) -> Result<Vec<PathBuf>> {
    settings.check()?;

    let mut created = Vec::new();
    match write_chunks(settings, &mut created).await {
        Ok(()) => {
            let count = created.len();
            let input_path = settings.input.display().to_string();
            debug!("Produced {count} chunks from {input_path}");
            Ok(created)
        }
        Err(e) => {
            remove_partial_output(&created).await;
            Err(e)
        }
    }
}

/// Write all chunks, recording each path as soon as its file exists
async fn write_chunks(settings: &ProducerSettings, created: &mut Vec<PathBuf>) -> Result<()> {
    let mut input = File::open(&settings.input).await?;
    let input_path = settings.input.display().to_string();
    let codec = settings.codec;
    let codec_name = codec.to_string();
    let max_chunk_bytes = settings.max_chunk_bytes;
    info!("Compressing {input_path} with {codec_name} into chunks of at most {max_chunk_bytes} bytes");

    let mut ordinal = 1;
    let mut chunk = ChunkWriter::create(settings.chunk_path(ordinal), codec).await?;
    created.push(chunk.path.clone());
    let mut buffer = vec![0u8; TRANSFER_UNIT];

    loop {
        let n = input.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        if chunk.compressed >= settings.max_chunk_bytes {
            chunk.finish().await?;
            ordinal += 1;
            chunk = ChunkWriter::create(settings.chunk_path(ordinal), codec).await?;
            created.push(chunk.path.clone());
        }
        chunk.write(&buffer[..n]).await?;
    }
    chunk.finish().await
}

async fn remove_partial_output(created: &[PathBuf]) {
    for path in created {
        let path_str = path.display().to_string();
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!("Removed partial chunk {path_str}"),
            Err(e) => {
                let reason = e.to_string();
                warn!("Failed to remove partial chunk {path_str}: {reason}");
            }
        }
    }
}

/// Decode a local chunk file, used to verify produced output
pub async fn decode_chunk_file(path: &Path) -> Result<Vec<u8>> {
    let file = File::open(path).await?;
    let label = path.display().to_string();
    let mut decoder = Codec::sniff_decoder(&label, tokio::io::BufReader::new(file)).await?;
    let mut decoded = Vec::new();
    let _ = decoder
        .read_to_end(&mut decoded)
        .await
        .map_err(|e| RelayError::decode(&label, e))?;
    Ok(decoded)
}
