// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Chunk compression formats
//!
//! Chunks are written with a configured codec and recognized on the way back
//! by their magic bytes, so the reassembly side needs no codec setting.

use crate::{RelayError, Result};
use async_compression::tokio::bufread::{GzipDecoder, ZstdDecoder};
use async_compression::tokio::write::{GzipEncoder, ZstdEncoder};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::pin::Pin;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncReadExt};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Compression applied to each chunk object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    /// gzip, readable by the legacy reassembly functions
    #[default]
    Gzip,
    Zstd,
}

impl Codec {
    /// Recognize a codec from the first bytes of a chunk object
    #[must_use]
    pub fn detect(head: &[u8]) -> Option<Self> {
        if head.starts_with(&ZSTD_MAGIC) {
            Some(Codec::Zstd)
        } else if head.starts_with(&GZIP_MAGIC) {
            Some(Codec::Gzip)
        } else {
            None
        }
    }

    /// Wrap a compressed reader, sniffing the codec from its magic bytes
    ///
    /// `chunk` only labels errors.
    pub async fn sniff_decoder<R>(chunk: &str, mut reader: R) -> Result<Pin<Box<dyn AsyncRead + Send>>>
    where
        R: AsyncBufRead + Send + Unpin + 'static,
    {
        let mut head = Vec::with_capacity(ZSTD_MAGIC.len());
        while head.len() < ZSTD_MAGIC.len() {
            let mut byte = [0u8; 1];
            let n = reader
                .read(&mut byte)
                .await
                .map_err(|e| RelayError::read_failure(chunk, e))?;
            if n == 0 {
                break;
            }
            head.push(byte[0]);
        }

        let codec = Codec::detect(&head).ok_or_else(|| {
            RelayError::decode(
                chunk,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unrecognized chunk format (leading bytes {head:02x?})"),
                ),
            )
        })?;

        // Put the sniffed bytes back in front of the stream
        Ok(codec.decoder(Cursor::new(head).chain(reader)))
    }

    /// Wrap a compressed reader in this codec's decoder
    pub fn decoder<R>(self, reader: R) -> Pin<Box<dyn AsyncRead + Send>>
    where
        R: AsyncBufRead + Send + 'static,
    {
        match self {
            Codec::Gzip => {
                let mut decoder = GzipDecoder::new(reader);
                decoder.multiple_members(true);
                Box::pin(decoder)
            }
            Codec::Zstd => Box::pin(ZstdDecoder::new(reader)),
        }
    }

    /// An encoder writing compressed output into memory
    pub(crate) fn encoder(self) -> ChunkEncoder {
        match self {
            Codec::Gzip => ChunkEncoder::Gzip(GzipEncoder::with_quality(
                Vec::new(),
                async_compression::Level::Best,
            )),
            Codec::Zstd => ChunkEncoder::Zstd(ZstdEncoder::with_quality(
                Vec::new(),
                async_compression::Level::Default,
            )),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Gzip => write!(f, "gzip"),
            Codec::Zstd => write!(f, "zstd"),
        }
    }
}

impl FromStr for Codec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gzip" | "gz" => Ok(Codec::Gzip),
            "zstd" | "zst" => Ok(Codec::Zstd),
            other => Err(format!("unsupported codec '{other}' (expected gzip or zstd)")),
        }
    }
}

/// Compressor whose output accumulates in an in-memory buffer
///
/// The producer drains the buffer after every write, which is how it counts
/// compressed bytes per chunk.
pub(crate) enum ChunkEncoder {
    Gzip(GzipEncoder<Vec<u8>>),
    Zstd(ZstdEncoder<Vec<u8>>),
}

impl ChunkEncoder {
    pub(crate) async fn write_all(&mut self, data: &[u8]) -> std::io::Result<()> {
        use tokio::io::AsyncWriteExt;
        match self {
            ChunkEncoder::Gzip(e) => e.write_all(data).await,
            ChunkEncoder::Zstd(e) => e.write_all(data).await,
        }
    }

    /// Take whatever compressed output is ready
    pub(crate) fn drain(&mut self) -> Vec<u8> {
        match self {
            ChunkEncoder::Gzip(e) => std::mem::take(e.get_mut()),
            ChunkEncoder::Zstd(e) => std::mem::take(e.get_mut()),
        }
    }

    /// Flush the stream trailer and return the remaining output
    pub(crate) async fn finish(self) -> std::io::Result<Vec<u8>> {
        use tokio::io::AsyncWriteExt;
        match self {
            ChunkEncoder::Gzip(mut e) => {
                e.shutdown().await?;
                Ok(e.into_inner())
            }
            ChunkEncoder::Zstd(mut e) => {
                e.shutdown().await?;
                Ok(e.into_inner())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn compress(codec: Codec, data: &[u8]) -> Vec<u8> {
        let mut encoder = codec.encoder();
        encoder.write_all(data).await.unwrap();
        let mut out = encoder.drain();
        out.extend(encoder.finish().await.unwrap());
        out
    }

    #[test]
    fn test_detect() {
        assert_eq!(Codec::detect(&[0x1f, 0x8b, 0x08, 0x00]), Some(Codec::Gzip));
        assert_eq!(Codec::detect(&ZSTD_MAGIC), Some(Codec::Zstd));
        assert_eq!(Codec::detect(b"PK\x03\x04"), None);
        assert_eq!(Codec::detect(&[]), None);
    }

    #[test]
    fn test_parse_codec() {
        assert_eq!("GZIP".parse::<Codec>(), Ok(Codec::Gzip));
        assert_eq!("zst".parse::<Codec>(), Ok(Codec::Zstd));
        assert!("lz4".parse::<Codec>().is_err());
        assert_eq!(Codec::Zstd.to_string(), "zstd");
    }

    #[tokio::test]
    async fn test_sniffed_roundtrip_both_codecs() {
        let data: Vec<u8> = (0..50_000u32).flat_map(|i| i.to_le_bytes()).collect();
        for codec in [Codec::Gzip, Codec::Zstd] {
            let compressed = compress(codec, &data).await;
            assert_eq!(Codec::detect(&compressed), Some(codec));

            let mut decoder = Codec::sniff_decoder("test", Cursor::new(compressed))
                .await
                .unwrap();
            let mut decoded = Vec::new();
            let _ = decoder.read_to_end(&mut decoded).await.unwrap();
            assert_eq!(decoded, data, "codec {codec}");
        }
    }

    #[tokio::test]
    async fn test_sniff_rejects_unknown_and_empty() {
        let err = Codec::sniff_decoder("a.001", Cursor::new(b"plain text".to_vec()))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, RelayError::Decode { .. }));

        let err = Codec::sniff_decoder("a.002", Cursor::new(Vec::new()))
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("a.002"));
    }
}
